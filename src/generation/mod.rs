//! Generator: drives the generative model with a constrained
//! answer contract (§4.6.5). Production binding speaks to Anthropic's
//! Messages API; the test double is network-free.

pub mod anthropic;
pub mod test_double;

use async_trait::async_trait;

use crate::error::Result;

pub use anthropic::AnthropicGenerator;
pub use test_double::EchoGenerator;

/// Capability interface for the generative model, consumed through a
/// narrow `(system, user)` chat-style contract (§6, §9 Dynamic
/// dispatch). Production and test-double bindings share it so the
/// retrieval engine never depends on a live network call in tests.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, system: &str, user: &str) -> Result<String>;
}
