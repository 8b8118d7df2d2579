//! User profile retrieval
//!
//! Calls the provider's user-info endpoint with the access token as a query
//! parameter and normalizes the JSON object so it always carries an `id`.
//! Google's v3 userinfo endpoint only returns `sub`; it is copied into `id`.

use provider::ProviderConfig;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{Error, Result};
use crate::transport::HttpTransport;

/// Provider profile, guaranteed to contain a non-null `id`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct UserProfile(Map<String, Value>);

impl UserProfile {
    /// Normalize a profile object. Copies `sub` into `id` when `id` is
    /// missing; returns the object back if neither is present.
    pub fn from_map(mut map: Map<String, Value>) -> std::result::Result<Self, Map<String, Value>> {
        if !has_value(&map, "id")
            && let Some(sub) = map.get("sub").filter(|v| !v.is_null()).cloned()
        {
            map.insert("id".to_string(), sub);
        }
        if has_value(&map, "id") {
            Ok(Self(map))
        } else {
            Err(map)
        }
    }

    /// Provider-scoped user id as text; numeric ids keep their decimal form.
    pub fn id(&self) -> String {
        match self.0.get("id") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Convenience accessor for string fields such as `name` or `email`.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    pub fn to_json(&self) -> String {
        Value::Object(self.0.clone()).to_string()
    }
}

fn has_value(map: &Map<String, Value>, key: &str) -> bool {
    map.get(key).is_some_and(|v| !v.is_null())
}

/// Fetch and normalize the signed-in user's profile.
///
/// Any non-2xx status, unparsable body, non-object body or a profile with
/// no usable id surfaces as `Error::Fetch` with the raw status and body.
pub async fn fetch_profile(
    transport: &dyn HttpTransport,
    config: &ProviderConfig,
    access_token: &str,
) -> Result<UserProfile> {
    let response = transport
        .get(&config.profile_endpoint, &[("access_token", access_token)])
        .await?;

    let fetch_error = |status: u16, body: String| Error::Fetch { status, body };

    if !response.is_success() {
        return Err(fetch_error(response.status, response.body));
    }

    let map = match serde_json::from_str::<Value>(&response.body) {
        Ok(Value::Object(map)) => map,
        _ => return Err(fetch_error(response.status, response.body)),
    };

    let profile = UserProfile::from_map(map).map_err(|_| fetch_error(response.status, response.body))?;

    debug!(provider = %config.provider, fields = profile.as_map().len(), "profile fetched");
    Ok(profile)
}
