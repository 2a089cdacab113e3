//! HTTP middleware and shared handler plumbing
//!
//! Contains:
//! - `AppState`, shared by every handler
//! - `resolve_identity`, which turns the session cookie into an `Identity`
//! - `require_login`, the guard for protected routes
//! - `render_error_pages`, which renders 404 and 500 pages for `AppError`s
//! - `AppError` and the cookie helpers

use anyhow::Result;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::api::context::PageContext;
use crate::api::flash;
use crate::config::{Config, SessionConfig};
use crate::db::repositories::{SqlxPostRepository, SqlxSessionRepository, SqlxUserRepository};
use crate::db::DynDatabasePool;
use crate::models::Identity;
use crate::services::{PostService, PostServiceError, UserService, UserServiceError};
use crate::theme::ThemeEngine;

/// Name of the cookie holding the session token
pub const SESSION_COOKIE: &str = "session";

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub pool: DynDatabasePool,
    pub user_service: Arc<UserService>,
    pub post_service: Arc<PostService>,
    pub theme_engine: Arc<ThemeEngine>,
    pub session_config: Arc<SessionConfig>,
}

impl AppState {
    /// Wire repositories, services and templates onto a connected pool
    pub fn new(pool: DynDatabasePool, config: &Config) -> Result<Self> {
        let user_service = UserService::with_session_expiration(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxSessionRepository::boxed(pool.clone()),
            config.session.expiration_days,
        );
        let post_service = PostService::new(SqlxPostRepository::boxed(pool.clone()));
        let theme_engine = ThemeEngine::embedded()?;

        Ok(Self {
            pool,
            user_service: Arc::new(user_service),
            post_service: Arc::new(post_service),
            theme_engine: Arc::new(theme_engine),
            session_config: Arc::new(config.session.clone()),
        })
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Handler failure that ends in an error page
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found")]
    NotFound,

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Marks a response whose body should be replaced by a rendered error page
#[derive(Debug, Clone, Copy)]
pub struct ErrorPage;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Internal(e) => {
                tracing::error!("Request failed: {:#}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let mut response = status.into_response();
        response.extensions_mut().insert(ErrorPage);
        response
    }
}

impl From<PostServiceError> for AppError {
    fn from(err: PostServiceError) -> Self {
        match err {
            PostServiceError::NotFound(_) => AppError::NotFound,
            PostServiceError::InternalError(e) => AppError::Internal(e),
            other => AppError::Internal(anyhow::anyhow!(other)),
        }
    }
}

impl From<UserServiceError> for AppError {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::InternalError(e) => AppError::Internal(e),
            other => AppError::Internal(anyhow::anyhow!(other)),
        }
    }
}

// ============================================================================
// Cookies
// ============================================================================

/// Read a cookie from the request headers
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    cookie_value(headers, SESSION_COOKIE).filter(|token| !token.is_empty())
}

/// `Set-Cookie` value for a fresh session.
///
/// With `max_age` the cookie survives a browser restart; without it the
/// browser drops it at the end of the session.
pub fn session_cookie(token: &str, max_age: Option<i64>, secure: bool) -> String {
    let mut cookie = format!("{}={}; Path=/; HttpOnly; SameSite=Lax", SESSION_COOKIE, token);
    if let Some(seconds) = max_age {
        cookie.push_str(&format!("; Max-Age={}", seconds));
    }
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value that removes the session cookie
pub fn clear_session_cookie() -> &'static str {
    "session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0"
}

/// Append a `Set-Cookie` header to a response
pub fn append_cookie(response: &mut Response, cookie: &str) {
    match HeaderValue::from_str(cookie) {
        Ok(value) => {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
        Err(e) => tracing::error!("Refusing to set malformed cookie: {}", e),
    }
}

// ============================================================================
// Middleware
// ============================================================================

/// Resolve the session cookie into an `Identity` request extension.
///
/// Runs for every request. A cookie that no longer maps to a live session
/// is cleared on the way out; a failed lookup leaves it in place.
pub async fn resolve_identity(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let token = extract_session_token(request.headers());

    let mut stale_cookie = false;
    let identity = match &token {
        Some(token) => match state.user_service.resolve_identity(token).await {
            Ok(identity) => {
                stale_cookie = !identity.is_authenticated();
                identity
            }
            Err(e) => {
                tracing::error!("Session lookup failed: {:#}", e);
                Identity::Anonymous
            }
        },
        None => Identity::Anonymous,
    };

    request.extensions_mut().insert(identity);
    let mut response = next.run(request).await;

    if stale_cookie {
        append_cookie(&mut response, clear_session_cookie());
    }
    response
}

/// Guard for protected routes.
///
/// Anonymous visitors are sent to the login page with the original path and
/// query in `next`, so a successful login can bring them back.
pub async fn require_login(request: Request, next: Next) -> Response {
    let identity = request
        .extensions()
        .get::<Identity>()
        .copied()
        .unwrap_or_default();

    if identity.is_authenticated() {
        return next.run(request).await;
    }

    let target = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());
    let location = format!("/auth/login?next={}", urlencoding::encode(&target));

    let pending = flash::read(request.headers());
    flash::redirect(&location, pending, flash::info("Please log in to access this page."))
}

/// Replace the body of `AppError` responses with the 404 or 500 page
pub async fn render_error_pages(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let identity = request
        .extensions()
        .get::<Identity>()
        .copied()
        .unwrap_or_default();

    let response = next.run(request).await;
    if response.extensions().get::<ErrorPage>().is_none() {
        return response;
    }

    let status = response.status();
    let (template, title) = if status == StatusCode::NOT_FOUND {
        ("page404.html", "Page not found")
    } else {
        ("error.html", "Server error")
    };

    let context = PageContext::new(identity, Vec::new()).into_tera(title);
    let html = state.theme_engine.render_with_fallback(template, &context);

    let (mut parts, _) = response.into_parts();
    parts.headers.remove(header::CONTENT_LENGTH);
    parts.headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/html; charset=utf-8"),
    );
    Response::from_parts(parts, html.into())
}

/// Router fallback
pub async fn not_found() -> AppError {
    AppError::NotFound
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cookie_value() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("flash=abc; session=tok-123; other=x"),
        );
        assert_eq!(cookie_value(&headers, "session").as_deref(), Some("tok-123"));
        assert_eq!(cookie_value(&headers, "flash").as_deref(), Some("abc"));
        assert_eq!(cookie_value(&headers, "missing"), None);
    }

    #[test]
    fn test_empty_session_cookie_is_no_token() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("session="));
        assert_eq!(extract_session_token(&headers), None);
    }

    #[test]
    fn test_session_cookie_attributes() {
        let transient = session_cookie("t", None, false);
        assert_eq!(transient, "session=t; Path=/; HttpOnly; SameSite=Lax");

        let persistent = session_cookie("t", Some(604800), true);
        assert!(persistent.contains("Max-Age=604800"));
        assert!(persistent.ends_with("; Secure"));
    }

    #[test]
    fn test_app_error_status() {
        let response = AppError::NotFound.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.extensions().get::<ErrorPage>().is_some());

        let response = AppError::Internal(anyhow::anyhow!("boom")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_post_not_found_maps_to_404() {
        let err: AppError = PostServiceError::NotFound(3).into();
        assert!(matches!(err, AppError::NotFound));
    }
}
