//! Utilities Module - shared helpers
//!
//! - `casing`: data-key camelCase and attribute kebab-case conversion

pub mod casing;

pub use casing::{attribute_name, data_key};
