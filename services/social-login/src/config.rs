//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! App secrets are loaded from `{PROVIDER}_APP_SECRET` env vars or an
//! `app_secret_file`, never stored in the TOML directly.

use common::Secret;
use serde::Deserialize;
use social_auth::{Credentials, Provider, ProviderConfig, ProviderRegistry};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
}

/// HTTP listener and provider client settings
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    /// Externally visible base URL; callback URIs are derived from it and
    /// must match the ones registered with each provider.
    pub public_url: String,
    /// Timeout for each call to a provider endpoint
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub google: ProviderSettings,
    #[serde(default)]
    pub facebook: ProviderSettings,
}

impl ProvidersConfig {
    pub fn settings(&self, provider: Provider) -> &ProviderSettings {
        match provider {
            Provider::Google => &self.google,
            Provider::Facebook => &self.facebook,
        }
    }

    fn settings_mut(&mut self, provider: Provider) -> &mut ProviderSettings {
        match provider {
            Provider::Google => &mut self.google,
            Provider::Facebook => &mut self.facebook,
        }
    }
}

/// App credentials and scope for one provider
#[derive(Debug, Default, Deserialize)]
pub struct ProviderSettings {
    #[serde(default)]
    pub app_id: Option<String>,
    #[serde(skip)]
    pub app_secret: Option<Secret<String>>,
    /// Path to a file containing the app secret (alternative to the env var)
    #[serde(default)]
    pub app_secret_file: Option<PathBuf>,
    /// Overrides the provider's default scope
    #[serde(default)]
    pub scope: Option<String>,
}

fn default_timeout() -> u64 {
    10
}

fn default_max_connections() -> usize {
    1000
}

/// Env var prefix for a provider's credentials, e.g. `GOOGLE`.
fn env_prefix(provider: Provider) -> &'static str {
    match provider {
        Provider::Google => "GOOGLE",
        Provider::Facebook => "FACEBOOK",
    }
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// Per provider, app id resolution: `{PREFIX}_APP_ID` env var, then
    /// `app_id`. App secret resolution: `{PREFIX}_APP_SECRET` env var, then
    /// `app_secret_file`.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        if !config.server.public_url.starts_with("http://")
            && !config.server.public_url.starts_with("https://")
        {
            return Err(common::Error::Config(format!(
                "public_url must start with http:// or https://, got: {}",
                config.server.public_url
            )));
        }
        config.server.public_url = config.server.public_url.trim_end_matches('/').to_string();

        if config.server.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        if config.server.max_connections == 0 {
            return Err(common::Error::Config(
                "max_connections must be greater than 0".into(),
            ));
        }

        for provider in Provider::ALL {
            resolve_credentials(provider, config.providers.settings_mut(provider))?;
        }

        Ok(config)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("social-login.toml")
    }

    /// Immutable registry holding every provider's credentials and scope.
    pub fn registry(&self) -> ProviderRegistry {
        ProviderRegistry::new(Provider::ALL.into_iter().map(|provider| {
            let settings = self.providers.settings(provider);
            let credentials = Credentials {
                app_id: settings.app_id.clone(),
                app_secret: settings.app_secret.clone(),
            };
            let config = ProviderConfig::for_provider(provider, credentials);
            match &settings.scope {
                Some(scope) => config.with_scope(scope.as_str()),
                None => config,
            }
        }))
    }
}

fn resolve_credentials(provider: Provider, settings: &mut ProviderSettings) -> common::Result<()> {
    let prefix = env_prefix(provider);

    if let Ok(app_id) = std::env::var(format!("{prefix}_APP_ID")) {
        settings.app_id = Some(app_id);
    }

    if let Ok(secret) = std::env::var(format!("{prefix}_APP_SECRET")) {
        settings.app_secret = Some(Secret::new(secret));
    } else if let Some(ref secret_file) = settings.app_secret_file {
        let secret = std::fs::read_to_string(secret_file).map_err(|e| {
            common::Error::Config(format!(
                "failed to read {provider} app_secret_file {}: {e}",
                secret_file.display()
            ))
        })?;
        let secret = secret.trim().to_owned();
        if !secret.is_empty() {
            settings.app_secret = Some(Secret::new(secret));
        }
    }

    Ok(())
}
