//! Inkwell - a small server-rendered blog
//!
//! Posts, user accounts with login sessions, a feedback form and a
//! profile page, served as HTML from embedded Tera templates.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
pub mod theme;
