//! OAuth 2.0 social sign-in
//!
//! Provider-agnostic authorization code flow: redirect the browser to the
//! provider, exchange the returned code for an access token, fetch the
//! user's profile and hand it to the embedding application.
//!
//! Sign-in flow:
//! 1. Caller builds an `OAuth2Flow` from a `ProviderRegistry`, an
//!    `HttpTransport` and its `SignInHook`
//! 2. `OAuth2Flow::initiate_login()` returns the provider authorization URL
//! 3. Provider redirects back; caller passes the query to `handle_callback()`
//! 4. `token::exchange_code()` trades the code for an access token
//! 5. `profile::fetch_profile()` retrieves and normalizes the profile
//! 6. `SignInHook::on_signin()` establishes the caller's session
//!
//! No `state` parameter is sent or checked, so a forged callback cannot be
//! told apart from a real one.

pub mod error;
pub mod flow;
pub mod profile;
pub mod token;
pub mod transport;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};
pub use flow::{
    AuthorizationRedirect, AuthorizationRequestParams, CallbackParams, FlowState, OAuth2Flow,
    SignInHook,
};
pub use profile::{UserProfile, fetch_profile};
pub use provider::{
    ConfigError, CredentialField, Credentials, Provider, ProviderConfig, ProviderRegistry,
};
pub use token::{TokenExchangeRequest, TokenResponse, exchange_code};
pub use transport::{BoxFuture, DEFAULT_TIMEOUT, HttpResponse, HttpTransport, ReqwestTransport};
