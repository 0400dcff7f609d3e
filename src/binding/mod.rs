//! Binding Module - attribute-encoded bindings
//!
//! - `entry`: raw text → Direct / Reference descriptors
//! - `extract`: collect raw binding text from a subtree
//! - `resolve`: follow references to their direct bindings
//!
//! Declaration forms:
//! ```text
//! data-@fill='{"events": "activate", "handler": {"on": "green", "off": "red"}}'
//! data-@stroke='{"id": "r1", "attribute": "@fill"}'
//! data-@stroke='r1@@fill'
//! ```
//!
//! Data flow:
//! ```text
//! node attributes → extract → NodeBindings (raw text)
//!                               ↓
//!                   resolve (parse + follow references)
//!                               ↓
//!                   ResolvedNode (every slot → direct binding)
//! ```

mod entry;
mod extract;
mod resolve;

pub use entry::{Binding, Events, RawBinding, Reference};
pub use extract::{extract, extract_nodes, has_data_key, NodeBindings};
pub use resolve::{resolve, ResolvedBinding, ResolvedNode};
