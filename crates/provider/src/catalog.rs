//! Provider endpoint catalog
//!
//! Public endpoint URLs and default scopes. These identify the providers'
//! OAuth servers and are not secrets; app credentials are supplied by
//! configuration.

pub const GOOGLE_AUTHORIZATION_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/auth";

/// Returns a JSON body.
pub const GOOGLE_TOKEN_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/token";

/// Returns `sub` rather than `id`.
pub const GOOGLE_PROFILE_ENDPOINT: &str = "https://www.googleapis.com/oauth2/v3/userinfo";

pub const GOOGLE_DEFAULT_SCOPE: &str = "https://www.googleapis.com/auth/userinfo.profile https://www.googleapis.com/auth/userinfo.email";

pub const FACEBOOK_AUTHORIZATION_ENDPOINT: &str = "https://www.facebook.com/dialog/oauth";

/// Returns a query-string body (`access_token=...&expires=...`).
pub const FACEBOOK_TOKEN_ENDPOINT: &str = "https://graph.facebook.com/oauth/access_token";

pub const FACEBOOK_PROFILE_ENDPOINT: &str = "https://graph.facebook.com/me";

pub const FACEBOOK_DEFAULT_SCOPE: &str = "email,user_about_me";
