//! Immutable provider registry
//!
//! Built once at process start and shared via `Arc`. Every supported
//! provider always has an entry, so a provider the operator never configured
//! fails with `MissingCredential` rather than looking unsupported.

use tracing::debug;

use crate::{Credentials, Provider, ProviderConfig, Result};

#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    google: ProviderConfig,
    facebook: ProviderConfig,
}

impl ProviderRegistry {
    /// Build a registry from the given configs. Providers without a config
    /// get their catalog entry with no credentials. A later config for the
    /// same provider replaces an earlier one.
    pub fn new(configs: impl IntoIterator<Item = ProviderConfig>) -> Self {
        let mut registry = Self::unconfigured();
        for config in configs {
            match config.provider {
                Provider::Google => registry.google = config,
                Provider::Facebook => registry.facebook = config,
            }
        }
        registry
    }

    /// Catalog entries for every provider, none of them usable until
    /// credentials are supplied.
    pub fn unconfigured() -> Self {
        Self {
            google: ProviderConfig::google(Credentials::default()),
            facebook: ProviderConfig::facebook(Credentials::default()),
        }
    }

    /// Resolve a provider name from an inbound request.
    ///
    /// Checks the name against the supported set first, then the app
    /// credentials. Both checks run before any network I/O.
    pub fn lookup(&self, name: &str) -> Result<&ProviderConfig> {
        let provider: Provider = name.parse()?;
        self.get(provider)
    }

    /// Credential-checked config for an already-parsed provider.
    pub fn get(&self, provider: Provider) -> Result<&ProviderConfig> {
        let config = self.entry(provider);
        config.validate()?;
        debug!(%provider, "provider config resolved");
        Ok(config)
    }

    /// Raw entry without credential validation.
    pub fn entry(&self, provider: Provider) -> &ProviderConfig {
        match provider {
            Provider::Google => &self.google,
            Provider::Facebook => &self.facebook,
        }
    }

    pub fn is_configured(&self, provider: Provider) -> bool {
        self.entry(provider).validate().is_ok()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::unconfigured()
    }
}
