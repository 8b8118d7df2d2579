//! Error types for the sign-in flow

use provider::ConfigError;

/// Errors from the sign-in flow. None of them are recovered internally;
/// the caller decides how to render them.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid endpoint {url}: {reason}")]
    InvalidEndpoint { url: String, reason: String },

    /// The provider redirected back with an `error` parameter.
    #[error("provider denied authorization: {0}")]
    ProviderDenied(String),

    #[error("callback carried neither code nor error")]
    MissingCode,

    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    #[error("malformed token response: {0}")]
    MalformedResponse(String),

    #[error("profile fetch failed ({status}): {body}")]
    Fetch { status: u16, body: String },

    #[error("HTTP request failed: {0}")]
    Transport(String),

    #[error("sign-in hook failed: {0}")]
    SignIn(String),

    #[error("callback cancelled before completion")]
    Cancelled,
}

impl Error {
    /// Failures talking to the provider that might succeed on a second try.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Transport(_) | Error::Fetch { .. } | Error::MalformedResponse(_)
        )
    }

    /// Short label for metrics and structured logs.
    pub fn error_type(&self) -> &'static str {
        match self {
            Error::Config(ConfigError::UnsupportedProvider(_)) => "unsupported_provider",
            Error::Config(ConfigError::MissingCredential { .. }) => "missing_credential",
            Error::InvalidEndpoint { .. } => "invalid_endpoint",
            Error::ProviderDenied(_) => "provider_denied",
            Error::MissingCode => "missing_code",
            Error::TokenExchange(_) => "token_exchange",
            Error::MalformedResponse(_) => "malformed_response",
            Error::Fetch { .. } => "profile_fetch",
            Error::Transport(_) => "transport",
            Error::SignIn(_) => "sign_in",
            Error::Cancelled => "cancelled",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
