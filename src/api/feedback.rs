//! Feedback page

use axum::{extract::State, response::Response, routing::get, Form, Router};
use tera::Context as TeraContext;

use super::context::PageContext;
use super::flash;
use super::middleware::AppState;
use crate::services::{validate_feedback, FeedbackInput};

const TITLE: &str = "Feedback!";

pub fn router() -> Router<AppState> {
    Router::new().route("/feedback", get(feedback_form).post(send_feedback))
}

async fn feedback_form(State(state): State<AppState>, page: PageContext) -> Response {
    page.render(&state, "main/feedback.html", TITLE, TeraContext::new())
}

async fn send_feedback(
    State(state): State<AppState>,
    mut page: PageContext,
    Form(input): Form<FeedbackInput>,
) -> Response {
    if validate_feedback(&input) {
        tracing::info!("Feedback received from {}", input.username);
        page.flash(flash::success("Message sent"));
    } else {
        page.flash(flash::error("Sending error"));
    }
    page.render(&state, "main/feedback.html", TITLE, TeraContext::new())
}
