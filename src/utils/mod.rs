//! Shared utility functions.
//!
//! - `html`: HTML sanitizing before text goes to the model
//! - `text`: character-budget truncation and name normalization

mod html;
mod text;

pub use html::clean_html;
pub use text::{normalize_name, truncate_chars, TRUNCATION_MARKER};
