//! Account pages
//!
//! - `GET|POST /auth/register`
//! - `GET|POST /auth/login`, honouring a local `next` target
//! - `GET /auth/logout` (login)
//! - `GET /auth/profile` (login)

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Form, Router,
};
use serde::{Deserialize, Serialize};
use tera::Context as TeraContext;

use super::context::PageContext;
use super::flash;
use super::middleware::{
    append_cookie, clear_session_cookie, cookie_value, session_cookie, AppError, AppState,
    SESSION_COOKIE,
};
use crate::models::{LoginInput, RegisterInput};
use crate::services::{FieldErrors, UserServiceError};

const INVALID_CREDENTIALS: &str = "Incorrect username and/or password entered";

/// Routes anyone may visit
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/auth/register", get(register_form).post(register))
        .route("/auth/login", get(login_form).post(login))
}

/// Routes behind `require_login`
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/auth/logout", get(logout))
        .route("/auth/profile", get(profile))
}

#[derive(Debug, Default, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

/// Accept only same-site paths, so `next` cannot bounce to another host
pub fn safe_next(next: Option<&str>) -> Option<&str> {
    next.filter(|n| n.starts_with('/') && !n.starts_with("//") && !n.contains('\\'))
}

// ============================================================================
// Registration
// ============================================================================

/// One input of the registration form, as the template lays it out
#[derive(Debug, Serialize)]
struct FormField<'a> {
    name: &'static str,
    label: &'static str,
    kind: &'static str,
    value: &'a str,
    errors: &'a [String],
}

fn register_context(input: &RegisterInput, errors: &FieldErrors) -> TeraContext {
    let fields = [
        FormField { name: "name", label: "Name: ", kind: "text", value: &input.name, errors: errors.get("name") },
        FormField { name: "age", label: "Age: ", kind: "number", value: &input.age, errors: errors.get("age") },
        FormField { name: "city", label: "City: ", kind: "text", value: &input.city, errors: errors.get("city") },
        FormField { name: "email", label: "Email: ", kind: "email", value: &input.email, errors: errors.get("email") },
        FormField { name: "password1", label: "Password: ", kind: "password", value: "", errors: errors.get("password1") },
        FormField { name: "password2", label: "Confirm password: ", kind: "password", value: "", errors: errors.get("password2") },
    ];

    let mut data = TeraContext::new();
    data.insert("fields", &fields);
    data
}

async fn register_form(State(state): State<AppState>, page: PageContext) -> Response {
    let data = register_context(&RegisterInput::default(), &FieldErrors::new());
    page.render(&state, "auth/register.html", "Sign up", data)
}

async fn register(
    State(state): State<AppState>,
    mut page: PageContext,
    Form(input): Form<RegisterInput>,
) -> Response {
    match state.user_service.register(input.clone()).await {
        Ok(_) => page.redirect("/auth/login", flash::success("You have successfully registered!")),
        Err(UserServiceError::ValidationError(errors)) => {
            page.render(&state, "auth/register.html", "Sign up", register_context(&input, &errors))
        }
        Err(UserServiceError::DuplicateEmail(_)) => {
            page.flash(flash::error("Registration error: email already registered"));
            let data = register_context(&input, &FieldErrors::new());
            page.render(&state, "auth/register.html", "Sign up", data)
        }
        Err(e) => {
            tracing::error!("Registration failed: {:#}", e);
            page.flash(flash::error("Registration error"));
            let data = register_context(&input, &FieldErrors::new());
            page.render(&state, "auth/register.html", "Sign up", data)
        }
    }
}

// ============================================================================
// Login / logout
// ============================================================================

fn login_context(input: &LoginInput, errors: &FieldErrors, next: Option<&str>) -> TeraContext {
    let mut data = TeraContext::new();
    data.insert("form", &LoginInput {
        password: String::new(),
        ..input.clone()
    });
    data.insert("errors", errors);
    data.insert("next", &next);
    data
}

async fn login_form(
    State(state): State<AppState>,
    Query(query): Query<NextQuery>,
    page: PageContext,
) -> Response {
    if page.identity.is_authenticated() {
        return Redirect::to("/auth/profile").into_response();
    }

    let next = safe_next(query.next.as_deref());
    let data = login_context(&LoginInput::default(), &FieldErrors::new(), next);
    page.render(&state, "auth/login.html", "Authorization", data)
}

async fn login(
    State(state): State<AppState>,
    Query(query): Query<NextQuery>,
    mut page: PageContext,
    Form(input): Form<LoginInput>,
) -> Response {
    if page.identity.is_authenticated() {
        return Redirect::to("/auth/profile").into_response();
    }

    let next = safe_next(query.next.as_deref());

    match state.user_service.login(&input).await {
        Ok(session) => {
            let max_age = input
                .remember()
                .then(|| state.user_service.session_lifetime().num_seconds());
            let target = next.unwrap_or("/auth/profile").to_string();

            let mut response = page.redirect(&target, flash::success("Logged in successfully."));
            append_cookie(
                &mut response,
                &session_cookie(&session.id, max_age, state.session_config.secure_cookie),
            );
            response
        }
        Err(UserServiceError::InvalidCredentials) => {
            page.flash(flash::error(INVALID_CREDENTIALS));
            let data = login_context(&input, &FieldErrors::new(), next);
            page.render(&state, "auth/login.html", "Authorization", data)
        }
        Err(UserServiceError::ValidationError(errors)) => {
            page.render(&state, "auth/login.html", "Authorization", login_context(&input, &errors, next))
        }
        Err(e) => AppError::from(e).into_response(),
    }
}

async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    page: PageContext,
) -> Result<Response, AppError> {
    if let Some(token) = cookie_value(&headers, SESSION_COOKIE) {
        state.user_service.logout(&token).await?;
    }

    let mut response = page.redirect("/", flash::success("Logged out successfully"));
    append_cookie(&mut response, clear_session_cookie());
    Ok(response)
}

// ============================================================================
// Profile
// ============================================================================

async fn profile(State(state): State<AppState>, page: PageContext) -> Result<Response, AppError> {
    let user_id = page.identity.user_id().ok_or(AppError::NotFound)?;
    let (user, profile) = state
        .user_service
        .get_user_with_profile(user_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut data = TeraContext::new();
    data.insert("user", &user);
    data.insert("profile", &profile);
    Ok(page.render(&state, "auth/profile.html", "Profile", data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_next() {
        assert_eq!(safe_next(Some("/post/add")), Some("/post/add"));
        assert_eq!(safe_next(Some("/post/1/x?a=b")), Some("/post/1/x?a=b"));
        assert_eq!(safe_next(Some("//evil.example")), None);
        assert_eq!(safe_next(Some("https://evil.example")), None);
        assert_eq!(safe_next(Some("/\\evil.example")), None);
        assert_eq!(safe_next(Some("")), None);
        assert_eq!(safe_next(None), None);
    }
}
