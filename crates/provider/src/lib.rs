//! Identity provider catalog for the social login flow
//!
//! Defines the closed set of supported providers and the immutable registry
//! that maps each one to its endpoints, token response encoding, scope and
//! app credentials. The registry is built once at startup and shared
//! read-only; every flow step starts with a registry lookup so that an
//! unsupported provider or a missing credential is rejected before any
//! network I/O.

pub mod catalog;
pub mod config;
pub mod registry;

pub use config::{Credentials, ProviderConfig, TokenEncoding};
pub use registry::ProviderRegistry;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported identity providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Google,
    Facebook,
}

impl Provider {
    pub const ALL: [Provider; 2] = [Provider::Google, Provider::Facebook];

    /// Lowercase name used in URLs, cookies and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Google => "google",
            Provider::Facebook => "facebook",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = ConfigError;

    fn from_str(name: &str) -> Result<Self> {
        match name {
            "google" => Ok(Provider::Google),
            "facebook" => Ok(Provider::Facebook),
            other => Err(ConfigError::UnsupportedProvider(other.to_string())),
        }
    }
}

/// App credential slot that failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialField {
    AppId,
    AppSecret,
}

impl fmt::Display for CredentialField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialField::AppId => f.write_str("app id"),
            CredentialField::AppSecret => f.write_str("app secret"),
        }
    }
}

/// Provider configuration errors. Raised before any network call and never
/// retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("unsupported provider: {0}")]
    UnsupportedProvider(String),

    #[error("invalid {provider} {field}: not configured")]
    MissingCredential {
        provider: Provider,
        field: CredentialField,
    },
}

impl ConfigError {
    /// Unsupported provider names come from the request path (client error);
    /// missing credentials are a server misconfiguration.
    pub fn is_client_error(&self) -> bool {
        matches!(self, ConfigError::UnsupportedProvider(_))
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;
