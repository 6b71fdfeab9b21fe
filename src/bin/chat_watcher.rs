//! Long-lived chat ingestor process (§4.4, §5): runs the live handler
//! and the periodic reconciler concurrently against a single chat
//! session, shutting both down within five seconds of a termination
//! signal.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use consilium::chat::grammers_session::GrammersChatSession;
use consilium::chat::ingestor::ChatIngestor;
use consilium::config::Config;
use consilium::embedding::OpenAiEmbedder;
use consilium::error::{ConsiliumError, Result};
use consilium::store::postgres::PostgresStore;

/// Distinctive exit code for authorization/permanent-upstream
/// failures (§4.4: "Authorization failures are fatal and terminate
/// the process with a distinctive exit code"), distinguishing them in
/// process-supervisor logs from a generic crash (exit code 1).
const FATAL_AUTH_EXIT_CODE: i32 = 77;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    if let Err(e) = run().await {
        let code = e.code();
        if e.is_fatal() {
            tracing::error!(error = %e, code, "fatal error, terminating chat watcher with distinctive exit code");
            std::process::exit(FATAL_AUTH_EXIT_CODE);
        }
        tracing::error!(error = %e, code, "chat watcher exiting due to error");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let config = Config::load();
    let (api_id, api_hash, session) = config.require_telegram()?;

    let store = Arc::new(PostgresStore::connect(&config.database_url).await?);

    let openai_key = config
        .openai_api_key
        .clone()
        .ok_or_else(|| ConsiliumError::Config("OPENAI_API_KEY is required".into()))?;
    let embedder = Arc::new(OpenAiEmbedder::new(openai_key, "text-embedding-3-small", config.embedding_deadline));

    let session = GrammersChatSession::connect(api_id, api_hash, session).await?;
    let session = Arc::new(session);

    let ingestor = Arc::new(ChatIngestor::new(store, embedder, session, config.reconcile_interval));

    let cancel = CancellationToken::new();

    let live_cancel = cancel.clone();
    let live_ingestor = ingestor.clone();
    let live_task = tokio::spawn(async move {
        if let Err(e) = live_ingestor.run_live(live_cancel).await {
            let code = e.code();
            if e.is_fatal() {
                tracing::error!(error = %e, code, "live handler hit a fatal error, terminating chat watcher");
                std::process::exit(FATAL_AUTH_EXIT_CODE);
            }
            tracing::error!(error = %e, code, "live handler exited with error");
        }
    });

    let reconciler_cancel = cancel.clone();
    let reconciler_ingestor = ingestor.clone();
    let reconciler_task = tokio::spawn(async move {
        reconciler_ingestor.run_reconciler(reconciler_cancel).await;
    });

    shutdown_signal().await;
    tracing::info!("termination signal received, shutting down chat watcher");
    cancel.cancel();

    let grace = tokio::time::timeout(std::time::Duration::from_secs(5), async {
        let _ = tokio::join!(live_task, reconciler_task);
    });
    if grace.await.is_err() {
        tracing::warn!("chat watcher did not shut down within the 5s grace period");
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
