//! Schema bootstrap for the Postgres+pgvector backend.
//!
//! Mirrors the teacher's versioned-migration pattern (a `schema_version`
//! table gating idempotent `migrate_vN` steps) but runs as plain async
//! SQL against a pool instead of a synchronous rusqlite connection.

use sqlx::PgPool;

use crate::error::Result;
use crate::types::VECTOR_DIM;

pub const SCHEMA_VERSION: i32 = 1;

pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )",
    )
    .execute(pool)
    .await?;

    let current_version: i32 = sqlx::query_scalar("SELECT COALESCE(MAX(version), 0) FROM schema_version")
        .fetch_one(pool)
        .await?;

    if current_version < 1 {
        migrate_v1(pool).await?;
    }

    Ok(())
}

async fn migrate_v1(pool: &PgPool) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query("CREATE EXTENSION IF NOT EXISTS vector").execute(&mut *tx).await?;
    sqlx::query("CREATE EXTENSION IF NOT EXISTS \"uuid-ossp\"").execute(&mut *tx).await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS clients (
            id UUID PRIMARY KEY DEFAULT uuid_generate_v4(),
            name TEXT NOT NULL UNIQUE,
            telegram_chat_id BIGINT,
            external_ids JSONB NOT NULL DEFAULT '{}'::jsonb,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )",
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS meetings (
            id UUID PRIMARY KEY DEFAULT uuid_generate_v4(),
            provider_id TEXT UNIQUE,
            title TEXT NOT NULL,
            date TIMESTAMPTZ,
            transcript TEXT,
            client_id UUID REFERENCES clients(id),
            meeting_type TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )",
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS summaries (
            id UUID PRIMARY KEY DEFAULT uuid_generate_v4(),
            meeting_id UUID NOT NULL REFERENCES meetings(id),
            meeting_type TEXT NOT NULL,
            content_text TEXT NOT NULL,
            content_json JSONB,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )",
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(&format!(
        "CREATE TABLE IF NOT EXISTS meeting_embeddings (
            id UUID PRIMARY KEY DEFAULT uuid_generate_v4(),
            meeting_id UUID NOT NULL REFERENCES meetings(id) ON DELETE CASCADE,
            chunk_text TEXT NOT NULL,
            chunk_index INTEGER NOT NULL,
            embedding vector({VECTOR_DIM}) NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            UNIQUE (meeting_id, chunk_index)
        )"
    ))
    .execute(&mut *tx)
    .await?;

    // HNSW over the meeting corpus (§4.1): the larger, hotter path.
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS meeting_embeddings_hnsw_idx
         ON meeting_embeddings USING hnsw (embedding vector_cosine_ops)",
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS chat_rooms (
            id BIGINT PRIMARY KEY,
            title TEXT NOT NULL,
            client_id UUID REFERENCES clients(id),
            client_name TEXT,
            last_synced_message_id BIGINT,
            is_active BOOLEAN NOT NULL DEFAULT true,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )",
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS chat_messages (
            id UUID PRIMARY KEY DEFAULT uuid_generate_v4(),
            chat_id BIGINT NOT NULL REFERENCES chat_rooms(id) ON DELETE CASCADE,
            external_id BIGINT NOT NULL,
            event_time TIMESTAMPTZ NOT NULL,
            sender_name TEXT,
            text TEXT,
            has_media BOOLEAN NOT NULL DEFAULT false,
            media_tag TEXT,
            meeting_id UUID REFERENCES meetings(id),
            UNIQUE (chat_id, external_id)
        )",
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS chat_messages_chat_time_idx
         ON chat_messages (chat_id, event_time)",
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(&format!(
        "CREATE TABLE IF NOT EXISTS chat_embeddings (
            id UUID PRIMARY KEY DEFAULT uuid_generate_v4(),
            message_id UUID NOT NULL REFERENCES chat_messages(id) ON DELETE CASCADE,
            chunk_text TEXT NOT NULL,
            chunk_index INTEGER NOT NULL DEFAULT 0,
            embedding vector({VECTOR_DIM}) NOT NULL
        )"
    ))
    .execute(&mut *tx)
    .await?;

    // IVF-flat over the chat corpus (§4.1): coarser index is
    // acceptable here since the corpus churns faster and is smaller
    // per-room than the meeting corpus. `lists` is re-tuned offline as
    // the corpus grows; 100 is a reasonable default below ~1M rows.
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS chat_embeddings_ivfflat_idx
         ON chat_embeddings USING ivfflat (embedding vector_cosine_ops) WITH (lists = 100)",
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS settings (
            key VARCHAR(128) PRIMARY KEY,
            value TEXT NOT NULL,
            description TEXT,
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )",
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query("INSERT INTO schema_version (version) VALUES (1)")
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}
