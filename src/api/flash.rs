//! One-shot flash messages
//!
//! Messages travel in the `flash` cookie as URL-encoded JSON. A redirect
//! writes them; the next rendered page shows them and clears the cookie.

use axum::{
    http::HeaderMap,
    response::{IntoResponse, Redirect, Response},
};

use super::middleware::{append_cookie, cookie_value};
pub use crate::theme::FlashMessage;

/// Name of the cookie carrying pending messages
pub const FLASH_COOKIE: &str = "flash";

pub fn success(message: impl Into<String>) -> FlashMessage {
    FlashMessage {
        category: "success".to_string(),
        message: message.into(),
    }
}

pub fn info(message: impl Into<String>) -> FlashMessage {
    FlashMessage {
        category: "info".to_string(),
        message: message.into(),
    }
}

pub fn error(message: impl Into<String>) -> FlashMessage {
    FlashMessage {
        category: "error".to_string(),
        message: message.into(),
    }
}

/// Pending messages from the request cookie. A malformed cookie reads as empty.
pub fn read(headers: &HeaderMap) -> Vec<FlashMessage> {
    cookie_value(headers, FLASH_COOKIE)
        .and_then(|raw| decode(&raw))
        .unwrap_or_default()
}

fn decode(raw: &str) -> Option<Vec<FlashMessage>> {
    if raw.is_empty() {
        return None;
    }
    let json = urlencoding::decode(raw).ok()?;
    serde_json::from_str(&json).ok()
}

/// `Set-Cookie` value that stores `messages`
pub fn store_cookie(messages: &[FlashMessage]) -> String {
    let json = serde_json::to_string(messages).unwrap_or_else(|_| "[]".to_string());
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax",
        FLASH_COOKIE,
        urlencoding::encode(&json)
    )
}

/// `Set-Cookie` value that drops all pending messages
pub fn clear_cookie() -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", FLASH_COOKIE)
}

/// 303 redirect carrying any unread messages plus `message`
pub fn redirect(to: &str, mut pending: Vec<FlashMessage>, message: FlashMessage) -> Response {
    pending.push(message);
    let mut response = Redirect::to(to).into_response();
    append_cookie(&mut response, &store_cookie(&pending));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, HeaderValue, StatusCode};

    fn cookie_headers(set_cookie: &str) -> HeaderMap {
        // Turn "flash=<value>; Path=/..." into a request Cookie header.
        let pair = set_cookie.split(';').next().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(pair).unwrap());
        headers
    }

    #[test]
    fn test_messages_survive_the_cookie() {
        let messages = vec![success("Post added"), error("Сбой; \"quoted\" = yes")];
        let headers = cookie_headers(&store_cookie(&messages));
        assert_eq!(read(&headers), messages);
    }

    #[test]
    fn test_missing_or_garbled_cookie_reads_empty() {
        assert!(read(&HeaderMap::new()).is_empty());

        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("flash=%7Bnot-json"));
        assert!(read(&headers).is_empty());
    }

    #[test]
    fn test_redirect_keeps_unread_messages() {
        let response = redirect("/post/list", vec![success("first")], error("second"));
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/post/list");

        let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
        let stored = read(&cookie_headers(set_cookie));
        assert_eq!(stored, vec![success("first"), error("second")]);
    }
}
