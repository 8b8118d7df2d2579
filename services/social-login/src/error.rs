//! Mapping sign-in failures to HTTP responses

use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use social_auth::{ConfigError, Error};

use crate::pages;

/// Status used for callbacks abandoned because the client went away.
/// Non-standard; nobody is left to read the page.
const CLIENT_CLOSED_REQUEST: u16 = 499;

/// A failed login or callback, tagged with the request id shown to the user
/// and written to the logs.
#[derive(Debug)]
pub struct AuthError {
    pub error: Error,
    pub request_id: String,
}

impl AuthError {
    pub fn new(error: Error, request_id: impl Into<String>) -> Self {
        Self {
            error,
            request_id: request_id.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match &self.error {
            Error::Config(ConfigError::UnsupportedProvider(_)) => StatusCode::NOT_FOUND,
            Error::Config(ConfigError::MissingCredential { .. }) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Error::InvalidEndpoint { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::ProviderDenied(_) => StatusCode::UNAUTHORIZED,
            Error::MissingCode => StatusCode::BAD_REQUEST,
            Error::TokenExchange(_) => StatusCode::UNAUTHORIZED,
            Error::MalformedResponse(_) | Error::Fetch { .. } | Error::Transport(_) => {
                StatusCode::BAD_GATEWAY
            }
            Error::SignIn(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Cancelled => {
                StatusCode::from_u16(CLIENT_CLOSED_REQUEST).unwrap_or(StatusCode::BAD_REQUEST)
            }
        }
    }

    /// Message shown on the error page. Provider response bodies and
    /// configuration details stay in the logs.
    pub fn user_message(&self) -> String {
        match &self.error {
            Error::Config(ConfigError::UnsupportedProvider(name)) => {
                format!("Sign-in with \"{name}\" is not supported.")
            }
            Error::Config(ConfigError::MissingCredential { provider, .. }) => {
                format!("Sign-in with {provider} is not configured on this server.")
            }
            Error::ProviderDenied(reason) => format!("The provider denied sign-in: {reason}"),
            Error::MissingCode => "The sign-in callback is missing its authorization code.".into(),
            Error::TokenExchange(_) => "The provider rejected the authorization code.".into(),
            Error::MalformedResponse(_) | Error::Fetch { .. } | Error::Transport(_) => {
                "The provider could not be reached or returned an unexpected response.".into()
            }
            Error::InvalidEndpoint { .. } | Error::SignIn(_) => {
                "Sign-in could not be completed.".into()
            }
            Error::Cancelled => "Sign-in was cancelled.".into(),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        if matches!(self.error, Error::Cancelled) {
            return status.into_response();
        }
        let page = pages::error_page(status, &self.user_message(), &self.request_id);
        (status, Html(page)).into_response()
    }
}
