//! Utility functions and helpers.

pub mod quote;

// Re-export commonly used items
pub use quote::{quote_identifier, unquote_identifier};
