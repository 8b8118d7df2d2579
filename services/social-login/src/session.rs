//! Cookie-backed session
//!
//! A successful sign-in stores `"{provider}:{id}"` in `_id` and the profile
//! JSON (base64url, unpadded) in `_profile`. Nothing is kept server-side.

use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::Value;
use social_auth::{BoxFuture, Provider, SignInHook, UserProfile};
use tracing::{debug, info};

pub const USER_ID_COOKIE: &str = "_id";
pub const PROFILE_COOKIE: &str = "_profile";

/// Browsers silently drop cookies whose `name=value; attributes` line is
/// larger than this.
const MAX_COOKIE_BYTES: usize = 4096;

/// Sign-in hook that turns a profile into session cookies and a redirect
/// back to the home page.
#[derive(Debug, Clone)]
pub struct CookieSession {
    public_url: String,
    secure: bool,
}

impl CookieSession {
    pub fn new(public_url: impl Into<String>) -> Self {
        let public_url = public_url.into().trim_end_matches('/').to_string();
        let secure = public_url.starts_with("https://");
        Self { public_url, secure }
    }

    fn cookie(&self, name: &'static str, value: String) -> Cookie<'static> {
        Cookie::build((name, value))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure)
            .build()
    }

    fn signin_response(&self, provider: Provider, profile: &UserProfile) -> social_auth::Result<Response> {
        let id_cookie = self.cookie(USER_ID_COOKIE, format!("{provider}:{}", profile.id()));
        let profile_cookie = self.cookie(PROFILE_COOKIE, encode_profile(profile));
        for cookie in [&id_cookie, &profile_cookie] {
            let size = set_cookie_len(cookie);
            if size > MAX_COOKIE_BYTES {
                return Err(social_auth::Error::SignIn(format!(
                    "{} cookie is {size} bytes, limit is {MAX_COOKIE_BYTES}",
                    cookie.name()
                )));
            }
        }

        let jar = CookieJar::new().add(id_cookie).add(profile_cookie);
        info!(%provider, "session established");
        Ok((jar, Redirect::to("/")).into_response())
    }
}

/// Length of the `Set-Cookie` value as sent, percent-encoding included.
fn set_cookie_len(cookie: &Cookie<'_>) -> usize {
    cookie.encoded().to_string().len()
}

impl SignInHook for CookieSession {
    type Outcome = Response;

    fn callback_uri(&self, provider: Provider) -> String {
        format!("{}/auth/{provider}/callback", self.public_url)
    }

    fn on_signin(
        &self,
        provider: Provider,
        profile: UserProfile,
    ) -> BoxFuture<'_, social_auth::Result<Response>> {
        Box::pin(async move { self.signin_response(provider, &profile) })
    }
}

pub fn encode_profile(profile: &UserProfile) -> String {
    URL_SAFE_NO_PAD.encode(profile.to_json())
}

/// Decode a `_profile` cookie value; `None` if it was tampered with or is
/// not a JSON document.
pub fn decode_profile(value: &str) -> Option<Value> {
    let bytes = URL_SAFE_NO_PAD.decode(value).ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// The user carried by the request's cookies.
#[derive(Debug, Clone, PartialEq)]
pub struct SignedInUser {
    pub id: String,
    pub profile: Option<Value>,
}

impl SignedInUser {
    /// The provider's own id from the stored profile, falling back to the
    /// `provider:id` session key when no readable profile is present.
    pub fn display_id(&self) -> String {
        match self.profile.as_ref().and_then(|p| p.get("id")) {
            Some(Value::String(id)) => id.clone(),
            Some(id) if !id.is_null() => id.to_string(),
            _ => self.id.clone(),
        }
    }
}

pub fn current_user(jar: &CookieJar) -> Option<SignedInUser> {
    let id = jar.get(USER_ID_COOKIE)?.value().to_string();
    if id.is_empty() {
        return None;
    }
    let profile = jar.get(PROFILE_COOKIE).and_then(|c| {
        let decoded = decode_profile(c.value());
        if decoded.is_none() {
            debug!("ignoring undecodable profile cookie");
        }
        decoded
    });
    Some(SignedInUser { id, profile })
}

/// Expire both session cookies and go home.
pub async fn logout_handler(jar: CookieJar) -> (CookieJar, Redirect) {
    let jar = jar
        .remove(Cookie::build(USER_ID_COOKIE).path("/"))
        .remove(Cookie::build(PROFILE_COOKIE).path("/"));
    (jar, Redirect::to("/"))
}
