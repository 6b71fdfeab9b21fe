//! Network-free [`Generator`] test double. Records every call so
//! tests can assert on the exact system/user messages the retrieval
//! engine built, and returns a canned or templated answer without
//! reaching a real model.

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::Result;
use crate::generation::Generator;

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub system: String,
    pub user: String,
}

#[derive(Default)]
pub struct EchoGenerator {
    pub calls: Mutex<Vec<RecordedCall>>,
    pub fixed_answer: Option<String>,
}

impl EchoGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fixed_answer(answer: impl Into<String>) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fixed_answer: Some(answer.into()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn last_call(&self) -> Option<RecordedCall> {
        self.calls.lock().last().cloned()
    }
}

#[async_trait]
impl Generator for EchoGenerator {
    async fn generate(&self, system: &str, user: &str) -> Result<String> {
        self.calls.lock().push(RecordedCall {
            system: system.to_string(),
            user: user.to_string(),
        });
        Ok(self.fixed_answer.clone().unwrap_or_else(|| format!("echo: {user}")))
    }
}
