//! UI components for nbview

pub mod library;
pub mod notebook_view;
pub mod suggestions;
