//! dataevents - declarative attribute bindings recomputed from named events
//!
//! A node declares bindings as data attributes. Each binding subscribes to
//! events and owns a handler, or references another node's binding by that
//! node's reference id. Dispatching an event resolves every reference,
//! evaluates the matching handlers and writes the results back as attributes.
//!
//! ```
//! use dataevents::{Document, Engine, MemoryDocument};
//!
//! let doc = MemoryDocument::new();
//! let svg = doc.create_node("svg");
//! doc.set_attribute(svg, "data-at", "");
//! doc.set_attribute(
//!     svg,
//!     "data-@fill",
//!     r#"{"events": "activate", "handler": {"on": "green", "off": "red"}}"#,
//! );
//!
//! let engine = Engine::default();
//! engine.trigger_event(&doc, svg, "activate", "on").unwrap();
//! assert_eq!(doc.attribute(svg, "fill").as_deref(), Some("green"));
//! ```

pub mod binding;
pub mod config;
pub mod dispatch;
pub mod document;
pub mod error;
pub mod handler;
pub mod trace;
pub mod util;

pub use config::Options;
pub use dispatch::{DispatchMode, Engine};
pub use document::{Document, MemoryDocument, NodeId};
pub use error::{DataEventError, FixSuggestion, Result};
pub use handler::{AttributeContext, Handler, HandlerCall, HandlerRegistry, Outcome};
pub use trace::{TraceKind, TraceLog, TraceRecord};
