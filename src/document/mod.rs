//! Document collaborator
//!
//! The engine never owns nodes. It walks and mutates them through the
//! [`Document`] trait, which a DOM binding, an SVG tree or the bundled
//! [`MemoryDocument`] implements.
//!
//! All methods take `&self`: a functional handler may hold the same document
//! and dispatch again while an outer dispatch is running. Implementations must
//! not hold internal locks across calls. Concurrent dispatch over overlapping
//! nodes is not guarded; callers serialize it.

pub mod memory;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use memory::MemoryDocument;

/// Opaque node handle minted by a [`Document`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(u64);

impl NodeId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Node provider: tree enumeration and raw attribute access
pub trait Document {
    /// `root` followed by all of its descendants in document order
    fn subtree(&self, root: NodeId) -> Vec<NodeId>;

    /// Every raw attribute of `node` in declaration order
    fn attributes(&self, node: NodeId) -> Vec<(String, String)>;

    fn attribute(&self, node: NodeId, name: &str) -> Option<String>;

    fn set_attribute(&self, node: NodeId, name: &str, value: &str);

    fn remove_attribute(&self, node: NodeId, name: &str);

    fn has_attribute(&self, node: NodeId, name: &str) -> bool {
        self.attribute(node, name).is_some()
    }
}
