//! Template engine
//!
//! Tera templates are embedded in the binary from `templates/` and loaded
//! once at start-up. Every page gets the same base variables (title, menu,
//! current user, flashes) from `PageVars`, built per request.

use anyhow::Result;
use chrono::{DateTime, FixedOffset};
use rust_embed::RustEmbed;
use serde::Serialize;
use std::collections::HashMap;
use std::error::Error as StdError;
use tera::{Context as TeraContext, Tera, Value};

use crate::models::Identity;

mod error;

pub use error::ThemeError;

#[derive(RustEmbed)]
#[folder = "templates/"]
#[include = "*.html"]
struct EmbeddedTemplates;

/// Template engine for rendering pages
pub struct ThemeEngine {
    tera: Tera,
}

impl ThemeEngine {
    /// Load the templates compiled into the binary
    pub fn embedded() -> Result<Self> {
        let mut templates = Vec::new();
        for name in EmbeddedTemplates::iter() {
            let file = EmbeddedTemplates::get(&name)
                .ok_or_else(|| ThemeError::NotFound(name.to_string()))?;
            let content = String::from_utf8(file.data.into_owned())
                .map_err(|_| ThemeError::InvalidEncoding(name.to_string()))?;
            templates.push((name.to_string(), content));
        }
        Self::from_templates(templates)
    }

    /// Build an engine from `(name, source)` pairs
    pub fn from_templates(mut templates: Vec<(String, String)>) -> Result<Self> {
        let mut tera = Tera::default();

        // Base templates first so children can resolve their parent.
        templates.sort_by(|a, b| {
            let a_is_base = a.0 == "base.html" || a.0.ends_with("/base.html");
            let b_is_base = b.0 == "base.html" || b.0.ends_with("/base.html");
            b_is_base.cmp(&a_is_base).then_with(|| a.0.cmp(&b.0))
        });

        for (name, content) in templates {
            tera.add_raw_template(&name, &content)
                .map_err(|e| ThemeError::TemplateError(format!("Failed to add template {}: {}", name, e)))?;
        }

        tera.build_inheritance_chains()
            .map_err(|e| ThemeError::TemplateError(format!("Failed to build template inheritance: {}", e)))?;

        tera.register_filter("iso_time", iso_time);

        tracing::debug!("Loaded {} templates", tera.get_template_names().count());
        Ok(Self { tera })
    }

    /// Render a template with context
    pub fn render(&self, template: &str, context: &TeraContext) -> Result<String> {
        self.tera.render(template, context).map_err(|e| {
            let mut error_msg = format!("Failed to render '{}': {}", template, e);
            let mut source = e.source();
            while let Some(s) = source {
                error_msg.push_str(&format!("\n  Caused by: {}", s));
                source = s.source();
            }
            ThemeError::TemplateError(error_msg).into()
        })
    }

    /// Render a template, falling back to `error.html` and then to a bare
    /// HTML page. Never fails.
    pub fn render_with_fallback(&self, template: &str, context: &TeraContext) -> String {
        match self.render(template, context) {
            Ok(html) => html,
            Err(e) => {
                tracing::error!("{:#}", e);
                self.render("error.html", context)
                    .unwrap_or_else(|_| simple_error_page().to_string())
            }
        }
    }

    #[cfg(test)]
    fn has_template(&self, name: &str) -> bool {
        self.tera.get_template_names().any(|t| t == name)
    }
}

/// Last-resort page when no template can be rendered
fn simple_error_page() -> &'static str {
    r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="UTF-8"><title>Server error</title></head>
<body><h1>Something went wrong</h1><p>Please try again later.</p></body>
</html>"#
}

/// `{{ post.created_at | iso_time }}` renders as `YYYY-MM-DD HH:MM:SS`.
/// Values that are not RFC 3339 timestamps pass through unchanged.
fn iso_time(value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
    let Some(raw) = value.as_str() else {
        return Ok(value.clone());
    };

    match DateTime::<FixedOffset>::parse_from_rfc3339(raw) {
        Ok(ts) => Ok(Value::String(ts.format("%Y-%m-%d %H:%M:%S").to_string())),
        Err(_) => Ok(value.clone()),
    }
}

/// One entry of the navigation menu
#[derive(Debug, Clone, Serialize)]
pub struct MenuItem {
    pub name: &'static str,
    pub url: &'static str,
}

/// The site navigation, built fresh for each page
pub fn main_menu() -> Vec<MenuItem> {
    vec![
        MenuItem { name: "Main page", url: "/post/list" },
        MenuItem { name: "Add post", url: "/post/add" },
        MenuItem { name: "Feedback", url: "/feedback" },
    ]
}

/// The current user as templates see it
#[derive(Debug, Clone, Serialize)]
pub struct CurrentUser {
    pub is_authenticated: bool,
    pub id: Option<i64>,
}

impl From<Identity> for CurrentUser {
    fn from(identity: Identity) -> Self {
        Self {
            is_authenticated: identity.is_authenticated(),
            id: identity.user_id().map(|id| id.0),
        }
    }
}

/// A flash message as templates see it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, serde::Deserialize)]
pub struct FlashMessage {
    pub category: String,
    pub message: String,
}

/// Variables every page receives
#[derive(Debug, Clone)]
pub struct PageVars {
    pub title: String,
    pub current_user: CurrentUser,
    pub flashes: Vec<FlashMessage>,
}

impl PageVars {
    pub fn new(title: impl Into<String>, identity: Identity, flashes: Vec<FlashMessage>) -> Self {
        Self {
            title: title.into(),
            current_user: identity.into(),
            flashes,
        }
    }

    /// Start a Tera context pre-filled with the base variables
    pub fn into_context(self) -> TeraContext {
        let mut context = TeraContext::new();
        context.insert("title", &self.title);
        context.insert("menu", &main_menu());
        context.insert("current_user", &self.current_user);
        context.insert("flashes", &self.flashes);
        context
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserId;

    fn engine(templates: &[(&str, &str)]) -> ThemeEngine {
        ThemeEngine::from_templates(
            templates
                .iter()
                .map(|(n, c)| (n.to_string(), c.to_string()))
                .collect(),
        )
        .expect("Failed to build engine")
    }

    #[test]
    fn test_embedded_templates_load() {
        let engine = ThemeEngine::embedded().expect("Embedded templates should load");
        for name in [
            "base.html",
            "page404.html",
            "error.html",
            "post/list.html",
            "post/detail.html",
            "post/add.html",
            "post/update.html",
            "auth/login.html",
            "auth/register.html",
            "auth/profile.html",
            "main/feedback.html",
        ] {
            assert!(engine.has_template(name), "missing {}", name);
        }
    }

    #[test]
    fn test_inheritance_regardless_of_order() {
        let engine = engine(&[
            ("child.html", "{% extends \"base.html\" %}{% block body %}child{% endblock %}"),
            ("base.html", "<main>{% block body %}{% endblock %}</main>"),
        ]);
        let html = engine.render("child.html", &TeraContext::new()).unwrap();
        assert_eq!(html, "<main>child</main>");
    }

    #[test]
    fn test_iso_time_filter() {
        let engine = engine(&[("t.html", "{{ ts | iso_time }}")]);
        let mut context = TeraContext::new();
        context.insert("ts", "2024-03-05T07:08:09.123456Z");
        assert_eq!(engine.render("t.html", &context).unwrap(), "2024-03-05 07:08:09");

        context.insert("ts", "yesterday");
        assert_eq!(engine.render("t.html", &context).unwrap(), "yesterday");
    }

    #[test]
    fn test_html_is_escaped() {
        let engine = engine(&[("t.html", "{{ text }}")]);
        let mut context = TeraContext::new();
        context.insert("text", "<script>");
        assert_eq!(engine.render("t.html", &context).unwrap(), "&lt;script&gt;");
    }

    #[test]
    fn test_render_with_fallback() {
        let engine = engine(&[
            ("broken.html", "{{ missing.field }}"),
            ("error.html", "oops"),
        ]);
        assert_eq!(engine.render_with_fallback("broken.html", &TeraContext::new()), "oops");

        let bare = ThemeEngine::from_templates(Vec::new()).unwrap();
        assert!(bare
            .render_with_fallback("anything.html", &TeraContext::new())
            .contains("Something went wrong"));
    }

    #[test]
    fn test_page_vars_context() {
        let engine = engine(&[(
            "t.html",
            "{{ title }}|{% for m in menu %}{{ m.name }},{% endfor %}|{{ current_user.is_authenticated }}|{{ current_user.id }}|{% for f in flashes %}{{ f.category }}:{{ f.message }}{% endfor %}",
        )]);
        let flashes = vec![FlashMessage {
            category: "success".to_string(),
            message: "Hi".to_string(),
        }];
        let context = PageVars::new("Main page", Identity::Authenticated(UserId(5)), flashes).into_context();

        assert_eq!(
            engine.render("t.html", &context).unwrap(),
            "Main page|Main page,Add post,Feedback,|true|5|success:Hi"
        );
    }
}
