//! HTTP layer - handlers and routing
//!
//! Server-rendered pages:
//! - Post list, detail and editing
//! - Registration, login, logout and profile
//! - Feedback form
//!
//! Every request passes through `resolve_identity`; protected routes add
//! `require_login`. Handler errors become rendered 404/500 pages.

pub mod auth;
pub mod context;
pub mod feedback;
pub mod flash;
pub mod middleware;
pub mod posts;

use axum::{middleware as axum_middleware, Router};
use tower_http::trace::TraceLayer;

pub use context::PageContext;
pub use middleware::{AppError, AppState};

/// Build the complete router with middleware
pub fn build_router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .merge(posts::protected_router())
        .merge(auth::protected_router())
        .route_layer(axum_middleware::from_fn(middleware::require_login));

    let public_routes = Router::new()
        .merge(posts::public_router())
        .merge(auth::public_router())
        .merge(feedback::router());

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .fallback(middleware::not_found)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::render_error_pages,
        ))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::resolve_identity,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
