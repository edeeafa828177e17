//! frontpipe - Static front-end build pipeline
//!
//! This library provides functionality to:
//! - Compile HTML templates with `@@include` partials, SCSS and JS
//! - Optimize images and pack sprite sheets with retina variants
//! - Rebuild incrementally on file changes and live-reload browsers
//! - Model the page-side layer and scroll behavior shipped with sites

pub mod build;
pub mod cli;
pub mod config;
pub mod reload;
pub mod server;
pub mod transforms;
pub mod ui;
pub mod watch;
