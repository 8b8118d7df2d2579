//! Two-step OAuth 2.0 authorization code flow
//!
//! `initiate_login` sends the browser to the provider; `handle_callback`
//! runs when the provider sends it back. The two calls share no in-process
//! state: everything the callback needs arrives in its query string or
//! comes from the immutable registry, so the callback may land on a
//! different process than the one that issued the redirect.
//!
//! States for one login:
//! - Idle → AwaitingProviderRedirect (redirect URL built)
//! - AwaitingCallback → ExchangingToken → FetchingProfile → Complete
//! - any non-Idle state → Error

use std::future::Future;
use std::sync::Arc;

use provider::{Provider, ProviderConfig, ProviderRegistry};
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use crate::error::{Error, Result};
use crate::profile::{UserProfile, fetch_profile};
use crate::token::exchange_code;
use crate::transport::{BoxFuture, HttpTransport, with_query};

/// Capabilities the embedding application must supply.
///
/// Both are bound at construction, so an application that forgets one does
/// not compile.
pub trait SignInHook: Send + Sync {
    /// What a successful sign-in hands back to the caller, e.g. an HTTP
    /// response that sets the session cookie and redirects.
    type Outcome: Send;

    /// Callback URL for `provider`. Must exactly match the redirect URI
    /// registered in the provider's app console.
    fn callback_uri(&self, provider: Provider) -> String;

    /// Called once per successful callback with the normalized profile.
    fn on_signin(
        &self,
        provider: Provider,
        profile: UserProfile,
    ) -> BoxFuture<'_, Result<Self::Outcome>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    Idle,
    AwaitingProviderRedirect,
    AwaitingCallback,
    ExchangingToken,
    FetchingProfile,
    Complete,
    Error,
}

impl FlowState {
    pub fn label(&self) -> &'static str {
        match self {
            FlowState::Idle => "idle",
            FlowState::AwaitingProviderRedirect => "awaiting_provider_redirect",
            FlowState::AwaitingCallback => "awaiting_callback",
            FlowState::ExchangingToken => "exchanging_token",
            FlowState::FetchingProfile => "fetching_profile",
            FlowState::Complete => "complete",
            FlowState::Error => "error",
        }
    }
}

fn transition(state: &mut FlowState, next: FlowState) {
    debug!(from = state.label(), to = next.label(), "flow transition");
    *state = next;
}

/// Query parameters of the authorization redirect.
pub struct AuthorizationRequestParams<'a> {
    pub client_id: &'a str,
    pub redirect_uri: &'a str,
    pub scope: &'a str,
}

impl<'a> AuthorizationRequestParams<'a> {
    pub const RESPONSE_TYPE: &'static str = "code";

    pub fn pairs(&self) -> [(&'a str, &'a str); 4] {
        [
            ("response_type", Self::RESPONSE_TYPE),
            ("client_id", self.client_id),
            ("redirect_uri", self.redirect_uri),
            ("scope", self.scope),
        ]
    }
}

/// Where to send the browser. The caller issues the redirect; the flow
/// keeps nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRedirect {
    pub provider: Provider,
    pub url: String,
}

/// Query parameters the provider appends to the callback URL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

impl CallbackParams {
    pub fn with_code(code: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            ..Self::default()
        }
    }

    pub fn with_error(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Parse a raw callback query string; the first occurrence of a key wins.
    pub fn from_query(query: &str) -> Self {
        let mut params = Self::default();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            let slot = match key.as_ref() {
                "code" => &mut params.code,
                "error" => &mut params.error,
                "error_description" => &mut params.error_description,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into_owned());
            }
        }
        params
    }

    fn provider_error(&self) -> Option<&str> {
        self.error.as_deref().filter(|e| !e.is_empty())
    }
}

/// The sign-in flow, bound to a registry, a transport and the embedder's
/// hook. Cheap to share behind an `Arc`; holds no per-login state.
pub struct OAuth2Flow<H> {
    registry: Arc<ProviderRegistry>,
    transport: Arc<dyn HttpTransport>,
    hook: H,
}

impl<H: SignInHook> OAuth2Flow<H> {
    pub fn new(registry: Arc<ProviderRegistry>, transport: Arc<dyn HttpTransport>, hook: H) -> Self {
        Self {
            registry,
            transport,
            hook,
        }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn hook(&self) -> &H {
        &self.hook
    }

    /// Step one: build the provider's authorization URL.
    ///
    /// Fails with `Error::Config` for an unsupported provider or missing app
    /// credentials, before anything else happens.
    #[instrument(skip(self))]
    pub fn initiate_login(&self, provider: &str) -> Result<AuthorizationRedirect> {
        let mut state = FlowState::Idle;
        let config = self.registry.lookup(provider)?;

        let redirect_uri = self.hook.callback_uri(config.provider);
        let params = AuthorizationRequestParams {
            client_id: config.app_id(),
            redirect_uri: &redirect_uri,
            scope: &config.scope,
        };
        let url = with_query(&config.authorization_endpoint, &params.pairs())?;

        transition(&mut state, FlowState::AwaitingProviderRedirect);
        info!(provider = %config.provider, "redirecting to provider");
        Ok(AuthorizationRedirect {
            provider: config.provider,
            url: url.into(),
        })
    }

    /// Step two: turn the provider's callback into a signed-in user.
    ///
    /// Steps run strictly in order and the first failure ends the callback:
    /// config check, provider-reported error, code exchange, profile fetch,
    /// then `on_signin`. Dropping the returned future aborts any provider
    /// call in flight and `on_signin` is never reached.
    #[instrument(skip(self, params))]
    pub async fn handle_callback(&self, provider: &str, params: &CallbackParams) -> Result<H::Outcome> {
        let mut state = FlowState::AwaitingCallback;
        match self.run_callback(provider, params, &mut state).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                warn!(
                    failed_in = state.label(),
                    error_type = e.error_type(),
                    error = %e,
                    "sign-in callback failed"
                );
                transition(&mut state, FlowState::Error);
                Err(e)
            }
        }
    }

    /// `handle_callback`, abandoned with `Error::Cancelled` as soon as
    /// `cancel` completes (e.g. the client disconnected).
    pub async fn handle_callback_until<F>(
        &self,
        provider: &str,
        params: &CallbackParams,
        cancel: F,
    ) -> Result<H::Outcome>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            biased;
            _ = cancel => {
                info!(provider, "sign-in callback cancelled");
                Err(Error::Cancelled)
            }
            result = self.handle_callback(provider, params) => result,
        }
    }

    async fn run_callback(
        &self,
        provider: &str,
        params: &CallbackParams,
        state: &mut FlowState,
    ) -> Result<H::Outcome> {
        // No state from initiate_login is assumed: the callback may follow a
        // restart or land on another instance.
        let config = self.registry.lookup(provider)?;

        if let Some(error) = params.provider_error() {
            if let Some(description) = &params.error_description {
                debug!(provider = %config.provider, %description, "provider error description");
            }
            return Err(Error::ProviderDenied(error.to_string()));
        }
        let code = params.code.as_deref().ok_or(Error::MissingCode)?;

        transition(state, FlowState::ExchangingToken);
        let access_token = self.exchange(config, code).await?;

        transition(state, FlowState::FetchingProfile);
        let profile = fetch_profile(self.transport.as_ref(), config, &access_token).await?;

        let outcome = self.hook.on_signin(config.provider, profile).await?;
        transition(state, FlowState::Complete);
        info!(provider = %config.provider, "user signed in");
        Ok(outcome)
    }

    async fn exchange(&self, config: &ProviderConfig, code: &str) -> Result<String> {
        let redirect_uri = self.hook.callback_uri(config.provider);
        let tokens = exchange_code(self.transport.as_ref(), config, code, &redirect_uri).await?;
        // exchange_code guarantees the token is present
        Ok(tokens.access_token().unwrap_or_default().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubTransport;
    use crate::transport::HttpResponse;
    use provider::{ConfigError, Credentials};
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::sync::Mutex;
    use std::time::Duration;

    const GOOGLE_TOKEN: &str = "https://google.test/token";
    const GOOGLE_PROFILE: &str = "https://google.test/userinfo";
    const FACEBOOK_TOKEN: &str = "https://facebook.test/access_token";
    const FACEBOOK_PROFILE: &str = "https://facebook.test/me";

    /// Hook that records every sign-in and returns a session id.
    #[derive(Default)]
    struct RecordingHook {
        signins: Mutex<Vec<(Provider, UserProfile)>>,
    }

    impl RecordingHook {
        fn signins(&self) -> Vec<(Provider, UserProfile)> {
            self.signins.lock().unwrap().clone()
        }
    }

    impl SignInHook for RecordingHook {
        type Outcome = String;

        fn callback_uri(&self, _provider: Provider) -> String {
            "https://app/cb".to_string()
        }

        fn on_signin(
            &self,
            provider: Provider,
            profile: UserProfile,
        ) -> BoxFuture<'_, Result<String>> {
            let session = format!("{provider}:{}", profile.id());
            self.signins.lock().unwrap().push((provider, profile));
            Box::pin(async move { Ok(session) })
        }
    }

    fn registry_with(google: Credentials, facebook: Credentials) -> Arc<ProviderRegistry> {
        Arc::new(ProviderRegistry::new([
            ProviderConfig::google(google)
                .with_scope("S")
                .with_token_endpoint(GOOGLE_TOKEN)
                .with_profile_endpoint(GOOGLE_PROFILE),
            ProviderConfig::facebook(facebook)
                .with_token_endpoint(FACEBOOK_TOKEN)
                .with_profile_endpoint(FACEBOOK_PROFILE),
        ]))
    }

    fn registry() -> Arc<ProviderRegistry> {
        registry_with(Credentials::new("X", "Y"), Credentials::new("fb-id", "fb-secret"))
    }

    fn flow(transport: Arc<StubTransport>) -> OAuth2Flow<RecordingHook> {
        flow_with(registry(), transport)
    }

    fn flow_with(
        registry: Arc<ProviderRegistry>,
        transport: Arc<StubTransport>,
    ) -> OAuth2Flow<RecordingHook> {
        OAuth2Flow::new(registry, transport, RecordingHook::default())
    }

    fn google_happy_path() -> Arc<StubTransport> {
        Arc::new(
            StubTransport::new()
                .respond(GOOGLE_TOKEN, HttpResponse::new(200, r#"{"access_token":"T123"}"#))
                .respond(GOOGLE_PROFILE, HttpResponse::new(200, r#"{"sub":"42","name":"A"}"#)),
        )
    }

    #[test]
    fn redirect_url_carries_exactly_the_authorization_params() {
        let transport = Arc::new(StubTransport::new());
        let redirect = flow(transport.clone()).initiate_login("google").unwrap();

        assert_eq!(redirect.provider, Provider::Google);
        assert!(
            redirect
                .url
                .starts_with("https://accounts.google.com/o/oauth2/auth?"),
            "got: {}",
            redirect.url
        );

        let url = url::Url::parse(&redirect.url).unwrap();
        let params: BTreeMap<String, String> = url.query_pairs().into_owned().collect();
        let expected: BTreeMap<String, String> = [
            ("response_type", "code"),
            ("client_id", "X"),
            ("redirect_uri", "https://app/cb"),
            ("scope", "S"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        assert_eq!(params, expected);
        assert!(transport.calls().is_empty(), "initiation must not call out");
    }

    #[test]
    fn facebook_redirect_uses_catalog_scope() {
        let redirect = flow(Arc::new(StubTransport::new()))
            .initiate_login("facebook")
            .unwrap();
        let url = url::Url::parse(&redirect.url).unwrap();
        assert_eq!(url.host_str(), Some("www.facebook.com"));
        let scope = url
            .query_pairs()
            .find(|(k, _)| k == "scope")
            .map(|(_, v)| v.into_owned());
        assert_eq!(scope.as_deref(), Some("email,user_about_me"));
    }

    #[tokio::test]
    async fn unsupported_provider_fails_without_network() {
        let transport = Arc::new(StubTransport::new());
        let flow = flow(transport.clone());

        for name in ["twitter", "", "GOOGLE"] {
            let err = flow.initiate_login(name).unwrap_err();
            assert!(
                matches!(err, Error::Config(ConfigError::UnsupportedProvider(_))),
                "{name:?} gave {err:?}"
            );

            let err = flow
                .handle_callback(name, &CallbackParams::with_code("abc"))
                .await
                .unwrap_err();
            assert!(
                matches!(err, Error::Config(ConfigError::UnsupportedProvider(_))),
                "{name:?} gave {err:?}"
            );
        }
        assert!(transport.calls().is_empty());
        assert!(flow.hook().signins().is_empty());
    }

    #[tokio::test]
    async fn missing_credentials_fail_both_entry_points() {
        let cases = [
            Credentials::new("", "Y"),
            Credentials::new("X", ""),
            Credentials::default(),
        ];
        for provider in Provider::ALL {
            for broken in cases.clone() {
                let ok = Credentials::new("id", "secret");
                let registry = match provider {
                    Provider::Google => registry_with(broken, ok),
                    Provider::Facebook => registry_with(ok, broken),
                };
                let transport = Arc::new(StubTransport::new());
                let flow = flow_with(registry, transport.clone());

                let err = flow.initiate_login(provider.as_str()).unwrap_err();
                assert!(
                    matches!(
                        err,
                        Error::Config(ConfigError::MissingCredential { provider: p, .. }) if p == provider
                    ),
                    "{provider} gave {err:?}"
                );
                let err = flow
                    .handle_callback(provider.as_str(), &CallbackParams::with_code("abc"))
                    .await
                    .unwrap_err();
                assert!(
                    matches!(
                        err,
                        Error::Config(ConfigError::MissingCredential { provider: p, .. }) if p == provider
                    ),
                    "{provider} gave {err:?}"
                );
                assert!(transport.calls().is_empty());
                assert!(flow.hook().signins().is_empty());
            }
        }
    }

    #[tokio::test]
    async fn provider_error_short_circuits() {
        let transport = google_happy_path();
        let flow = flow(transport.clone());

        let err = flow
            .handle_callback("google", &CallbackParams::with_error("access_denied"))
            .await
            .unwrap_err();

        assert!(
            matches!(&err, Error::ProviderDenied(e) if e == "access_denied"),
            "got {err:?}"
        );
        assert!(transport.calls().is_empty());
        assert!(flow.hook().signins().is_empty());
    }

    #[tokio::test]
    async fn provider_error_wins_over_code() {
        let transport = google_happy_path();
        let flow = flow(transport.clone());
        let params = CallbackParams::from_query("code=abc&error=access_denied");

        let err = flow.handle_callback("google", &params).await.unwrap_err();
        assert!(matches!(err, Error::ProviderDenied(_)), "got {err:?}");
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn callback_without_code_or_error() {
        let transport = google_happy_path();
        let flow = flow(transport.clone());

        let err = flow
            .handle_callback("google", &CallbackParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MissingCode), "got {err:?}");
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn google_sign_in_normalizes_profile() {
        let transport = google_happy_path();
        let flow = flow(transport.clone());

        let session = flow
            .handle_callback("google", &CallbackParams::with_code("abc"))
            .await
            .unwrap();
        assert_eq!(session, "google:42");

        let calls = transport.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].url, GOOGLE_TOKEN);
        assert_eq!(calls[0].param("code"), Some("abc"));
        assert_eq!(calls[0].param("redirect_uri"), Some("https://app/cb"));
        assert_eq!(calls[1].url, GOOGLE_PROFILE);
        assert_eq!(calls[1].param("access_token"), Some("T123"));

        let signins = flow.hook().signins();
        assert_eq!(signins.len(), 1);
        let (provider, profile) = &signins[0];
        assert_eq!(*provider, Provider::Google);
        assert_eq!(
            serde_json::to_value(profile).unwrap(),
            json!({"id": "42", "sub": "42", "name": "A"})
        );
    }

    #[tokio::test]
    async fn facebook_sign_in_uses_query_string_token() {
        let transport = Arc::new(
            StubTransport::new()
                .respond(
                    FACEBOOK_TOKEN,
                    HttpResponse::new(200, "access_token=T999&expires=3600"),
                )
                .respond(
                    FACEBOOK_PROFILE,
                    HttpResponse::new(200, r#"{"id":"1001","name":"B"}"#),
                ),
        );
        let flow = flow(transport.clone());

        let session = flow
            .handle_callback("facebook", &CallbackParams::with_code("xyz"))
            .await
            .unwrap();
        assert_eq!(session, "facebook:1001");

        let calls = transport.calls();
        assert_eq!(calls[0].param("client_id"), Some("fb-id"));
        assert_eq!(calls[0].param("client_secret"), Some("fb-secret"));
        assert_eq!(calls[1].param("access_token"), Some("T999"));
    }

    #[tokio::test]
    async fn token_error_skips_profile_fetch() {
        let transport = Arc::new(
            StubTransport::new()
                .respond(GOOGLE_TOKEN, HttpResponse::new(400, r#"{"error":"invalid_grant"}"#))
                .respond(GOOGLE_PROFILE, HttpResponse::new(200, r#"{"sub":"42"}"#)),
        );
        let flow = flow(transport.clone());

        let err = flow
            .handle_callback("google", &CallbackParams::with_code("stale"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::TokenExchange(_)), "got {err:?}");
        assert_eq!(transport.calls_to(GOOGLE_TOKEN), 1);
        assert_eq!(transport.calls_to(GOOGLE_PROFILE), 0);
        assert!(flow.hook().signins().is_empty());
    }

    #[tokio::test]
    async fn profile_failure_skips_sign_in() {
        let transport = Arc::new(
            StubTransport::new()
                .respond(GOOGLE_TOKEN, HttpResponse::new(200, r#"{"access_token":"T123"}"#))
                .respond(GOOGLE_PROFILE, HttpResponse::new(500, "backend error")),
        );
        let flow = flow(transport.clone());

        let err = flow
            .handle_callback("google", &CallbackParams::with_code("abc"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Fetch { status: 500, .. }), "got {err:?}");
        assert!(flow.hook().signins().is_empty());
    }

    #[tokio::test]
    async fn hook_failure_propagates() {
        struct FailingHook;
        impl SignInHook for FailingHook {
            type Outcome = ();
            fn callback_uri(&self, _provider: Provider) -> String {
                "https://app/cb".into()
            }
            fn on_signin(&self, _provider: Provider, _profile: UserProfile) -> BoxFuture<'_, Result<()>> {
                Box::pin(async { Err(Error::SignIn("user store unavailable".into())) })
            }
        }

        let flow = OAuth2Flow::new(registry(), google_happy_path(), FailingHook);
        let err = flow
            .handle_callback("google", &CallbackParams::with_code("abc"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SignIn(_)), "got {err:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_aborts_before_sign_in() {
        let transport = Arc::new(
            StubTransport::new()
                .respond_after(
                    GOOGLE_TOKEN,
                    Duration::from_secs(30),
                    HttpResponse::new(200, r#"{"access_token":"T123"}"#),
                )
                .respond(GOOGLE_PROFILE, HttpResponse::new(200, r#"{"sub":"42"}"#)),
        );
        let flow = flow(transport.clone());

        let err = flow
            .handle_callback_until(
                "google",
                &CallbackParams::with_code("abc"),
                tokio::time::sleep(Duration::from_secs(1)),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Cancelled), "got {err:?}");
        assert_eq!(transport.calls_to(GOOGLE_PROFILE), 0);
        assert!(flow.hook().signins().is_empty());
    }

    #[tokio::test]
    async fn uncancelled_callback_completes() {
        let flow = flow(google_happy_path());
        let session = flow
            .handle_callback_until(
                "google",
                &CallbackParams::with_code("abc"),
                std::future::pending(),
            )
            .await
            .unwrap();
        assert_eq!(session, "google:42");
    }

    #[test]
    fn callback_params_from_query() {
        let params = CallbackParams::from_query(
            "code=4%2F0Ab&state=ignored&error_description=User+denied&code=second",
        );
        assert_eq!(params.code.as_deref(), Some("4/0Ab"));
        assert_eq!(params.error, None);
        assert_eq!(params.error_description.as_deref(), Some("User denied"));
    }

    #[test]
    fn empty_error_param_is_not_a_denial() {
        let params = CallbackParams::from_query("error=&code=abc");
        assert_eq!(params.provider_error(), None);
    }

    #[test]
    fn state_labels_are_distinct() {
        let states = [
            FlowState::Idle,
            FlowState::AwaitingProviderRedirect,
            FlowState::AwaitingCallback,
            FlowState::ExchangingToken,
            FlowState::FetchingProfile,
            FlowState::Complete,
            FlowState::Error,
        ];
        let labels: std::collections::HashSet<_> = states.iter().map(|s| s.label()).collect();
        assert_eq!(labels.len(), states.len());
    }
}
