//! Token acquisition seam.
//!
//! Tokens come from an external issuing service. The client asks for one per
//! connect attempt and never retries a failed fetch itself.

use async_trait::async_trait;

use imlink_core::error::Result;

#[async_trait]
pub trait TokenProvider: Send + Sync + 'static {
    async fn token(&self) -> Result<String>;
}

/// A token obtained out of band (env var, CLI flag, test fixture).
#[derive(Debug, Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn token(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}
