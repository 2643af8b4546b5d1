//! Terminal rendering with ratatui.
//!
//! - [`instances`]: Sortable instance table with sparklines
//! - [`warnings`]: Campaign and instance warnings
//! - [`detail`]: Instance detail overlay
//! - [`common`]: Header, tabs, status bar, and help overlay
//! - [`theme`]: Light and dark color themes

pub mod common;
pub mod detail;
pub mod instances;
pub mod theme;
pub mod warnings;

pub use theme::Theme;
