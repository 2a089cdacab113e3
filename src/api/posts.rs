//! Post pages
//!
//! - `GET /`, `/index`, `/post/list`: all posts, newest first
//! - `GET /post/{id}/{slug}`: one post (login)
//! - `GET|POST /post/add`, `/add-post`: create (login)
//! - `GET|POST /post/{id}/update`: edit (login)
//! - `GET /post/{id}/delete`: delete (login)

use axum::{
    extract::{Path, State},
    response::Response,
    routing::get,
    Form, Router,
};
use tera::Context as TeraContext;

use super::context::PageContext;
use super::flash;
use super::middleware::{AppError, AppState};
use crate::models::{Post, PostInput};
use crate::services::{FieldErrors, PostServiceError};

/// Routes anyone may visit
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_posts))
        .route("/index", get(list_posts))
        .route("/post/list", get(list_posts))
}

/// Routes behind `require_login`
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/post/add", get(add_form).post(add_post))
        .route("/add-post", get(add_form).post(add_post))
        .route("/post/{id}/update", get(update_form).post(update_post))
        .route("/post/{id}/delete", get(delete_post))
        .route("/post/{id}/{slug}", get(post_detail))
}

/// Path ids that are not integers name no post
fn parse_id(raw: &str) -> Result<i64, AppError> {
    raw.parse().map_err(|_| AppError::NotFound)
}

async fn list_posts(State(state): State<AppState>, page: PageContext) -> Result<Response, AppError> {
    let posts = state.post_service.list().await?;

    let mut data = TeraContext::new();
    data.insert("posts", &posts);
    Ok(page.render(&state, "post/list.html", "Main page", data))
}

async fn post_detail(
    State(state): State<AppState>,
    Path((id, slug)): Path<(String, String)>,
    page: PageContext,
) -> Result<Response, AppError> {
    let post = state
        .post_service
        .get_by_id_and_slug(parse_id(&id)?, &slug)
        .await?;

    let mut data = TeraContext::new();
    data.insert("post", &post);
    let title = post.title.clone();
    Ok(page.render(&state, "post/detail.html", &title, data))
}

fn form_context(form: &PostInput, errors: &FieldErrors) -> TeraContext {
    let mut data = TeraContext::new();
    data.insert("form", form);
    data.insert("errors", errors);
    data
}

async fn add_form(State(state): State<AppState>, page: PageContext) -> Response {
    let data = form_context(&PostInput::default(), &FieldErrors::new());
    page.render(&state, "post/add.html", "Add post", data)
}

async fn add_post(
    State(state): State<AppState>,
    mut page: PageContext,
    Form(input): Form<PostInput>,
) -> Result<Response, AppError> {
    match state.post_service.create(input.clone()).await {
        Ok(post) => Ok(page.redirect(&post.url(), flash::success("Post added"))),
        Err(PostServiceError::ValidationError(errors)) => {
            Ok(page.render(&state, "post/add.html", "Add post", form_context(&input, &errors)))
        }
        Err(PostServiceError::DuplicateTitle(_)) => {
            page.flash(flash::error("Adding post error: Enter a unique post title!"));
            let data = form_context(&input, &FieldErrors::new());
            Ok(page.render(&state, "post/add.html", "Add post", data))
        }
        Err(e) => Err(e.into()),
    }
}

fn update_context(post: &Post, form: &PostInput, errors: &FieldErrors) -> TeraContext {
    let mut data = form_context(form, errors);
    data.insert("post", post);
    data
}

async fn update_form(
    State(state): State<AppState>,
    Path(id): Path<String>,
    page: PageContext,
) -> Result<Response, AppError> {
    let post = state.post_service.get(parse_id(&id)?).await?;
    let form = PostInput {
        title: post.title.clone(),
        text: post.text.clone(),
    };

    let data = update_context(&post, &form, &FieldErrors::new());
    Ok(page.render(&state, "post/update.html", "Update post", data))
}

async fn update_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
    mut page: PageContext,
    Form(input): Form<PostInput>,
) -> Result<Response, AppError> {
    let id = parse_id(&id)?;

    match state.post_service.update(id, input.clone()).await {
        Ok(post) => Ok(page.redirect(&post.url(), flash::success("Post updated"))),
        Err(PostServiceError::ValidationError(errors)) => {
            let post = state.post_service.get(id).await?;
            let data = update_context(&post, &input, &errors);
            Ok(page.render(&state, "post/update.html", "Update post", data))
        }
        Err(PostServiceError::DuplicateTitle(_)) => {
            let post = state.post_service.get(id).await?;
            page.flash(flash::error("Update post error: Enter a unique post title!"));
            let data = update_context(&post, &input, &FieldErrors::new());
            Ok(page.render(&state, "post/update.html", "Update post", data))
        }
        Err(e) => Err(e.into()),
    }
}

async fn delete_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
    page: PageContext,
) -> Result<Response, AppError> {
    state.post_service.delete(parse_id(&id)?).await?;
    Ok(page.redirect("/post/list", flash::success("Post successfully deleted!")))
}
