//! Per-provider configuration

use common::Secret;

use crate::catalog::*;
use crate::{ConfigError, CredentialField, Provider, Result};

/// How a provider's token endpoint encodes its response body. A static
/// property of the provider, never sniffed from the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenEncoding {
    /// `{"access_token": "...", ...}`
    Json,
    /// `access_token=...&expires=...`
    QueryString,
}

/// App credentials issued by the provider's developer console.
///
/// Both fields may be absent at construction; they are validated lazily
/// when a flow step first touches the provider.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub app_id: Option<String>,
    pub app_secret: Option<Secret<String>>,
}

impl Credentials {
    pub fn new(app_id: impl Into<String>, app_secret: impl Into<String>) -> Self {
        Self {
            app_id: Some(app_id.into()),
            app_secret: Some(Secret::new(app_secret.into())),
        }
    }
}

/// Everything the flow needs to talk to one provider.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub provider: Provider,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub profile_endpoint: String,
    pub token_encoding: TokenEncoding,
    pub scope: String,
    pub credentials: Credentials,
}

impl ProviderConfig {
    /// Catalog entry for `provider` with the given credentials.
    pub fn for_provider(provider: Provider, credentials: Credentials) -> Self {
        match provider {
            Provider::Google => Self::google(credentials),
            Provider::Facebook => Self::facebook(credentials),
        }
    }

    pub fn google(credentials: Credentials) -> Self {
        Self {
            provider: Provider::Google,
            authorization_endpoint: GOOGLE_AUTHORIZATION_ENDPOINT.to_string(),
            token_endpoint: GOOGLE_TOKEN_ENDPOINT.to_string(),
            profile_endpoint: GOOGLE_PROFILE_ENDPOINT.to_string(),
            token_encoding: TokenEncoding::Json,
            scope: GOOGLE_DEFAULT_SCOPE.to_string(),
            credentials,
        }
    }

    pub fn facebook(credentials: Credentials) -> Self {
        Self {
            provider: Provider::Facebook,
            authorization_endpoint: FACEBOOK_AUTHORIZATION_ENDPOINT.to_string(),
            token_endpoint: FACEBOOK_TOKEN_ENDPOINT.to_string(),
            profile_endpoint: FACEBOOK_PROFILE_ENDPOINT.to_string(),
            token_encoding: TokenEncoding::QueryString,
            scope: FACEBOOK_DEFAULT_SCOPE.to_string(),
            credentials,
        }
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    pub fn with_authorization_endpoint(mut self, url: impl Into<String>) -> Self {
        self.authorization_endpoint = url.into();
        self
    }

    pub fn with_token_endpoint(mut self, url: impl Into<String>) -> Self {
        self.token_endpoint = url.into();
        self
    }

    pub fn with_profile_endpoint(mut self, url: impl Into<String>) -> Self {
        self.profile_endpoint = url.into();
        self
    }

    /// Check that both app credentials are present and non-empty, app id
    /// first.
    pub fn validate(&self) -> Result<()> {
        let app_id_ok = self
            .credentials
            .app_id
            .as_deref()
            .is_some_and(|id| !id.is_empty());
        if !app_id_ok {
            return Err(ConfigError::MissingCredential {
                provider: self.provider,
                field: CredentialField::AppId,
            });
        }

        let app_secret_ok = self
            .credentials
            .app_secret
            .as_ref()
            .is_some_and(|secret| !secret.is_empty());
        if !app_secret_ok {
            return Err(ConfigError::MissingCredential {
                provider: self.provider,
                field: CredentialField::AppSecret,
            });
        }

        Ok(())
    }

    /// Validated app id. Empty string when unset; call `validate` first.
    pub fn app_id(&self) -> &str {
        self.credentials.app_id.as_deref().unwrap_or_default()
    }

    /// Validated app secret. Empty string when unset; call `validate` first.
    pub fn app_secret(&self) -> &str {
        self.credentials
            .app_secret
            .as_ref()
            .map(|s| s.expose().as_str())
            .unwrap_or_default()
    }
}
