//! Sticky-session cookie handling.

use axum::http::header::COOKIE;
use axum::http::{HeaderMap, HeaderValue};

use crate::config::CookieOptions;

/// Extract the sticky-session value from the request's cookie header(s).
pub fn extract(headers: &HeaderMap, name: &str) -> Option<String> {
    for value in headers.get_all(COOKIE) {
        let Ok(raw) = value.to_str() else { continue };
        for pair in raw.split(';') {
            if let Some((key, value)) = pair.trim().split_once('=') {
                if key == name {
                    return Some(value.to_string());
                }
            }
        }
    }
    None
}

/// Build the `Set-Cookie` value pinning the client to `backend_id`.
pub fn session_cookie(
    name: &str,
    backend_id: &str,
    options: &CookieOptions,
) -> Option<HeaderValue> {
    let mut cookie = format!(
        "{}={}; Path={}; Max-Age={}",
        name, backend_id, options.path, options.max_age_secs
    );
    if options.http_only {
        cookie.push_str("; HttpOnly");
    }
    if options.secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie).ok()
}
