//! Core functionality: notebook model, loading, rendering, and configuration

pub mod config;
pub mod error;
pub mod highlight;
pub mod library;
pub mod loader;
pub mod notebook;
pub mod render;
pub mod session;
pub mod suggestions;
