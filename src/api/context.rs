//! Per-request page context
//!
//! `PageContext` is extracted in every HTML handler. It carries the
//! request's `Identity` and the pending flash messages, and knows how to
//! render a page or redirect while keeping the flash cookie consistent.

use axum::{
    extract::FromRequestParts,
    http::request::Parts,
    response::{Html, IntoResponse, Response},
};
use std::convert::Infallible;
use tera::Context as TeraContext;

use super::flash::{self, FlashMessage};
use super::middleware::{append_cookie, AppState};
use crate::models::Identity;
use crate::theme::PageVars;

/// Identity plus flash messages for the current request
#[derive(Debug, Clone, Default)]
pub struct PageContext {
    pub identity: Identity,
    /// Messages read from the cookie, not yet shown
    pending: Vec<FlashMessage>,
    /// Messages raised while handling this request
    current: Vec<FlashMessage>,
}

impl<S: Send + Sync> FromRequestParts<S> for PageContext {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let identity = parts.extensions.get::<Identity>().copied().unwrap_or_default();
        Ok(Self::new(identity, flash::read(&parts.headers)))
    }
}

impl PageContext {
    pub fn new(identity: Identity, pending: Vec<FlashMessage>) -> Self {
        Self {
            identity,
            pending,
            current: Vec::new(),
        }
    }

    /// Show `message` on the page rendered by this request
    pub fn flash(&mut self, message: FlashMessage) {
        self.current.push(message);
    }

    /// Base template context; consumes the messages
    pub fn into_tera(self, title: &str) -> TeraContext {
        let mut flashes = self.pending;
        flashes.extend(self.current);
        PageVars::new(title, self.identity, flashes).into_context()
    }

    /// Render `template` with status 200
    pub fn render(self, state: &AppState, template: &str, title: &str, data: TeraContext) -> Response {
        let had_pending = !self.pending.is_empty();
        let mut context = self.into_tera(title);
        context.extend(data);

        let html = state.theme_engine.render_with_fallback(template, &context);
        let mut response = Html(html).into_response();
        if had_pending {
            append_cookie(&mut response, &flash::clear_cookie());
        }
        response
    }

    /// Redirect with a message, keeping any unread ones
    pub fn redirect(self, to: &str, message: FlashMessage) -> Response {
        let mut pending = self.pending;
        pending.extend(self.current);
        flash::redirect(to, pending, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserId;

    #[test]
    fn test_into_tera_orders_pending_before_current() {
        let mut page = PageContext::new(
            Identity::Authenticated(UserId(1)),
            vec![flash::success("from before")],
        );
        page.flash(flash::error("from now"));

        let context = page.into_tera("Title").into_json();
        assert_eq!(context["title"], "Title");
        assert_eq!(context["current_user"]["is_authenticated"], true);
        assert_eq!(context["flashes"][0]["message"], "from before");
        assert_eq!(context["flashes"][1]["message"], "from now");
        assert_eq!(context["menu"].as_array().map(Vec::len), Some(3));
    }
}
