//! Locale-aware blog server with a compiled-in plugin slot system.

pub mod auth;
pub mod config;
pub mod content;
pub mod cookies;
pub mod error;
pub mod guard;
pub mod html;
pub mod i18n;
pub mod middleware;
pub mod plugins;
pub mod rate_limit;
pub mod render;
pub mod server;
