//! Credential plumbing for outbound transfer service calls.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Credential source unavailable: {0}")]
    Unavailable(String),
}

/// Source of bearer tokens for the transfer service.
///
/// Deployments differ in where tokens come from (metadata server, sidecar,
/// mounted file), so the client takes this as a trait object.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn bearer_token(&self) -> Result<String, CredentialError>;
}

/// Reads the token from an environment variable on every call, so a
/// rotated token is picked up without a restart.
pub struct EnvTokenProvider {
    var: String,
}

impl EnvTokenProvider {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

#[async_trait]
impl CredentialProvider for EnvTokenProvider {
    async fn bearer_token(&self) -> Result<String, CredentialError> {
        std::env::var(&self.var)
            .map_err(|_| CredentialError::Unavailable(format!("env var {} not set", self.var)))
    }
}

/// Fixed token, for tests and local runs.
pub struct StaticTokenProvider(pub String);

#[async_trait]
impl CredentialProvider for StaticTokenProvider {
    async fn bearer_token(&self) -> Result<String, CredentialError> {
        Ok(self.0.clone())
    }
}
