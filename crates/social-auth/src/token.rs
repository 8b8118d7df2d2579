//! Authorization code exchange and token response parsing
//!
//! The token endpoint is POSTed a form-encoded `TokenExchangeRequest`. Its
//! reply is normalized to a flat string map whatever the provider's
//! encoding: Google answers with a JSON object, Facebook with a query
//! string. Which parser runs is fixed by the provider's `TokenEncoding`.

use std::collections::BTreeMap;
use std::fmt;

use provider::{ProviderConfig, TokenEncoding};
use tracing::debug;

use crate::error::{Error, Result};
use crate::transport::HttpTransport;

/// Keys never rendered into logs or error messages.
const SENSITIVE_KEYS: &[&str] = &["access_token", "refresh_token", "id_token"];

/// Parsed token endpoint reply. Used once to fetch the profile, never stored.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct TokenResponse {
    fields: BTreeMap<String, String>,
}

impl TokenResponse {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn access_token(&self) -> Option<&str> {
        self.get("access_token").filter(|t| !t.is_empty())
    }

    /// Provider-reported error code, if any.
    pub fn error(&self) -> Option<&str> {
        self.get("error").filter(|e| !e.is_empty())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// `key=value` listing with token values masked, for error messages.
    pub fn describe(&self) -> String {
        self.fields
            .iter()
            .map(|(k, v)| {
                if SENSITIVE_KEYS.contains(&k.as_str()) {
                    format!("{k}=[REDACTED]")
                } else {
                    format!("{k}={v}")
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenResponse {{ {} }}", self.describe())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for TokenResponse {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Parse a token endpoint body with the provider's encoding.
pub fn parse(encoding: TokenEncoding, raw: &str) -> Result<TokenResponse> {
    match encoding {
        TokenEncoding::Json => parse_json(raw),
        TokenEncoding::QueryString => Ok(parse_query_string(raw)),
    }
}

/// Parse a JSON object body. Strings are taken as-is, other scalars keep
/// their JSON text (`3600`, `true`), nested values are re-serialized and
/// nulls are dropped.
pub fn parse_json(raw: &str) -> Result<TokenResponse> {
    let value: serde_json::Value = serde_json::from_str(raw)
        .map_err(|e| Error::MalformedResponse(format!("invalid JSON: {e}")))?;
    let serde_json::Value::Object(object) = value else {
        return Err(Error::MalformedResponse(
            "expected a JSON object".to_string(),
        ));
    };

    Ok(object
        .into_iter()
        .filter_map(|(key, value)| match value {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some((key, s)),
            other => Some((key, other.to_string())),
        })
        .collect())
}

/// Parse a `key=value&key=value` body. Percent and `+` escapes are decoded,
/// the first occurrence of a key wins and blank values are dropped.
pub fn parse_query_string(raw: &str) -> TokenResponse {
    let mut fields = BTreeMap::new();
    for (key, value) in url::form_urlencoded::parse(raw.trim().as_bytes()) {
        if value.is_empty() {
            continue;
        }
        fields
            .entry(key.into_owned())
            .or_insert_with(|| value.into_owned());
    }
    TokenResponse { fields }
}

/// Form body POSTed to the token endpoint. Built per callback and dropped
/// after the request; holds the client secret so it has no `Debug`.
pub struct TokenExchangeRequest<'a> {
    pub code: &'a str,
    pub client_id: &'a str,
    pub client_secret: &'a str,
    pub redirect_uri: &'a str,
}

impl<'a> TokenExchangeRequest<'a> {
    pub const GRANT_TYPE: &'static str = "authorization_code";

    pub fn form(&self) -> [(&'a str, &'a str); 5] {
        [
            ("code", self.code),
            ("client_id", self.client_id),
            ("client_secret", self.client_secret),
            ("redirect_uri", self.redirect_uri),
            ("grant_type", Self::GRANT_TYPE),
        ]
    }
}

/// Exchange an authorization code for an access token.
///
/// A provider-reported `error` takes precedence over the HTTP status. A
/// non-2xx reply without a readable error is still a token exchange failure;
/// a 2xx reply without an access token is a malformed response.
pub async fn exchange_code(
    transport: &dyn HttpTransport,
    config: &ProviderConfig,
    code: &str,
    redirect_uri: &str,
) -> Result<TokenResponse> {
    let request = TokenExchangeRequest {
        code,
        client_id: config.app_id(),
        client_secret: config.app_secret(),
        redirect_uri,
    };
    let form = request.form();

    let response = transport.post_form(&config.token_endpoint, &form).await?;
    let parsed = parse(config.token_encoding, &response.body);

    if let Ok(tokens) = &parsed
        && tokens.error().is_some()
    {
        return Err(Error::TokenExchange(tokens.describe()));
    }

    if !response.is_success() {
        return Err(Error::TokenExchange(format!(
            "token endpoint returned {}: {}",
            response.status, response.body
        )));
    }

    let tokens = parsed?;
    if tokens.access_token().is_none() {
        return Err(Error::MalformedResponse(format!(
            "no access_token in response ({})",
            tokens.describe()
        )));
    }

    debug!(provider = %config.provider, fields = tokens.len(), "token exchange succeeded");
    Ok(tokens)
}
