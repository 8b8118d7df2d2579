//! HTML pages for the demo site
//!
//! Everything interpolated into markup goes through `escape_html`; profile
//! fields come straight from the provider.

use axum::http::StatusCode;
use axum::response::Html;
use axum_extra::extract::cookie::CookieJar;
use social_auth::Provider;

use crate::session::current_user;

pub fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

fn layout(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>{}</title></head>\n<body>\n{body}</body>\n</html>\n",
        escape_html(title)
    )
}

fn display_name(provider: Provider) -> &'static str {
    match provider {
        Provider::Google => "Google",
        Provider::Facebook => "Facebook",
    }
}

pub fn login_page() -> String {
    let links: String = Provider::ALL
        .iter()
        .map(|p| {
            format!(
                "<li><a href=\"/auth/{p}\">Log in with {}</a></li>\n",
                display_name(*p)
            )
        })
        .collect();
    layout("Sign in", &format!("<ul>\n{links}</ul>\n"))
}

pub fn profile_page(user_id: &str, profile_json: Option<&str>) -> String {
    let profile = match profile_json {
        Some(json) => format!("<pre>{}</pre>\n", escape_html(json)),
        None => "<p>No profile stored.</p>\n".to_string(),
    };
    layout(
        "Signed in",
        &format!(
            "<p>Hello {}, your profile:</p>\n{profile}<p><a href=\"/logout\">Log out</a></p>\n",
            escape_html(user_id)
        ),
    )
}

pub fn error_page(status: StatusCode, message: &str, request_id: &str) -> String {
    layout(
        "Sign-in failed",
        &format!(
            "<h1>{} {}</h1>\n<p>{}</p>\n<p><small>Request ID: {}</small></p>\n<p><a href=\"/\">Back</a></p>\n",
            status.as_u16(),
            escape_html(status.canonical_reason().unwrap_or("Error")),
            escape_html(message),
            escape_html(request_id)
        ),
    )
}

/// Home page: the signed-in user's profile, or the login links.
pub async fn index_handler(jar: CookieJar) -> Html<String> {
    match current_user(&jar) {
        Some(user) => {
            let pretty = user
                .profile
                .as_ref()
                .and_then(|p| serde_json::to_string_pretty(p).ok());
            Html(profile_page(&user.display_id(), pretty.as_deref()))
        }
        None => Html(login_page()),
    }
}
