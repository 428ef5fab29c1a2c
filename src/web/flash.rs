//! One-shot confirmation messages carried between requests in a cookie.
//!
//! The cookie value is a JSON array of strings, base64url encoded without
//! padding so it stays a valid cookie value.

use axum_extra::extract::cookie::{Cookie, CookieJar};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;

pub const FLASH_COOKIE: &str = "flash";

fn decode(value: &str) -> Vec<String> {
    URL_SAFE_NO_PAD
        .decode(value)
        .ok()
        .and_then(|bytes| serde_json::from_slice(&bytes).ok())
        .unwrap_or_default()
}

fn encode(messages: &[String]) -> String {
    let json = serde_json::to_vec(messages).unwrap_or_default();
    URL_SAFE_NO_PAD.encode(json)
}

/// Queue a message for the next page that renders flashes.
pub fn push_flash(jar: CookieJar, message: impl Into<String>) -> CookieJar {
    let mut messages = jar
        .get(FLASH_COOKIE)
        .map(|c| decode(c.value()))
        .unwrap_or_default();
    messages.push(message.into());
    jar.add(
        Cookie::build((FLASH_COOKIE, encode(&messages)))
            .path("/")
            .http_only(true),
    )
}

/// Drain queued messages. The returned jar clears the cookie if any were set.
pub fn take_flashes(jar: CookieJar) -> (CookieJar, Vec<String>) {
    match jar.get(FLASH_COOKIE).map(|c| decode(c.value())) {
        Some(messages) => {
            let jar = jar.remove(Cookie::build(FLASH_COOKIE).path("/"));
            (jar, messages)
        }
        None => (jar, Vec::new()),
    }
}
