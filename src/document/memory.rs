//! In-memory document tree
//!
//! Backs the CLI and the tests. Trees are built programmatically or loaded
//! from YAML:
//!
//! ```yaml
//! tag: svg
//! attributes:
//!   data-at: ""
//! children:
//!   - tag: rect
//!     attributes:
//!       data-@fill: { events: activate, handler: { on: green, off: red } }
//! ```
//!
//! Mapping and sequence attribute values are stored as compact JSON text,
//! `null` as the empty string.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value as YamlValue};

use super::{Document, NodeId};
use crate::error::{DataEventError, Result};

/// Serializable shape of a node and its subtree
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeSpec {
    pub tag: String,

    #[serde(default, skip_serializing_if = "Mapping::is_empty")]
    pub attributes: Mapping,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeSpec>,
}

#[derive(Debug)]
struct NodeData {
    tag: String,
    parent: Option<NodeId>,
    attributes: Vec<(String, String)>,
    children: Vec<NodeId>,
}

/// Arena-backed tree; handles index into the arena
#[derive(Debug, Default)]
pub struct MemoryDocument {
    nodes: RwLock<Vec<NodeData>>,
}

impl MemoryDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a YAML tree, returning the document and its root node
    pub fn from_yaml(yaml: &str) -> Result<(Self, NodeId)> {
        let spec: NodeSpec = serde_yaml::from_str(yaml)?;
        let doc = Self::new();
        let root = doc.insert_spec(&spec)?;
        Ok((doc, root))
    }

    /// Serialize the subtree under `root` back to YAML
    pub fn to_yaml(&self, root: NodeId) -> Result<String> {
        let spec = self.to_spec(root).ok_or_else(|| DataEventError::InvalidArgument {
            reason: format!("node {} does not exist", root),
        })?;
        Ok(serde_yaml::to_string(&spec)?)
    }

    /// Snapshot the subtree under `root`
    pub fn to_spec(&self, root: NodeId) -> Option<NodeSpec> {
        let nodes = self.nodes.read();
        Self::spec_of(&nodes, root)
    }

    /// Built bottom-up from a preorder walk, so depth never grows the call stack
    fn spec_of(nodes: &[NodeData], root: NodeId) -> Option<NodeSpec> {
        nodes.get(root.raw() as usize)?;

        let mut order = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            order.push(id);
            if let Some(data) = nodes.get(id.raw() as usize) {
                stack.extend(data.children.iter().copied());
            }
        }

        // Parents precede descendants in `order`; reversed, children are built first
        let mut built: FxHashMap<NodeId, NodeSpec> = FxHashMap::default();
        for id in order.into_iter().rev() {
            let Some(data) = nodes.get(id.raw() as usize) else {
                continue;
            };
            let attributes = data
                .attributes
                .iter()
                .map(|(k, v)| (YamlValue::String(k.clone()), YamlValue::String(v.clone())))
                .collect();
            let children = data
                .children
                .iter()
                .filter_map(|child| built.remove(child))
                .collect();
            built.insert(
                id,
                NodeSpec {
                    tag: data.tag.clone(),
                    attributes,
                    children,
                },
            );
        }
        built.remove(&root)
    }

    fn insert_spec(&self, spec: &NodeSpec) -> Result<NodeId> {
        let root = self.create_node(&spec.tag);
        let mut stack = vec![(root, spec)];

        while let Some((id, spec)) = stack.pop() {
            for (key, value) in &spec.attributes {
                let name = key.as_str().ok_or_else(|| DataEventError::InvalidArgument {
                    reason: format!("attribute names of <{}> must be strings", spec.tag),
                })?;
                self.set_attribute(id, name, &attribute_text(value)?);
            }
            for child in &spec.children {
                stack.push((self.append_child(id, &child.tag), child));
            }
        }
        Ok(root)
    }

    /// Create a detached node (a new root)
    pub fn create_node(&self, tag: &str) -> NodeId {
        let mut nodes = self.nodes.write();
        let id = NodeId::new(nodes.len() as u64);
        nodes.push(NodeData {
            tag: tag.to_string(),
            parent: None,
            attributes: Vec::new(),
            children: Vec::new(),
        });
        id
    }

    /// Create a node as the last child of `parent`
    ///
    /// An unknown `parent` yields a detached node.
    pub fn append_child(&self, parent: NodeId, tag: &str) -> NodeId {
        let id = self.create_node(tag);
        let mut nodes = self.nodes.write();
        if let Some(data) = nodes.get_mut(parent.raw() as usize) {
            data.children.push(id);
            nodes[id.raw() as usize].parent = Some(parent);
        }
        id
    }

    /// Builder helper: set an attribute and hand the node back
    pub fn with_attribute(&self, node: NodeId, name: &str, value: &str) -> NodeId {
        self.set_attribute(node, name, value);
        node
    }

    pub fn tag(&self, node: NodeId) -> Option<String> {
        self.nodes.read().get(node.raw() as usize).map(|d| d.tag.clone())
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.read().get(node.raw() as usize).and_then(|d| d.parent)
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.nodes
            .read()
            .get(node.raw() as usize)
            .map(|d| d.children.clone())
            .unwrap_or_default()
    }

    /// Number of nodes ever created
    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Document for MemoryDocument {
    fn subtree(&self, root: NodeId) -> Vec<NodeId> {
        let nodes = self.nodes.read();
        if nodes.get(root.raw() as usize).is_none() {
            return Vec::new();
        }

        let mut order = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            order.push(id);
            if let Some(data) = nodes.get(id.raw() as usize) {
                stack.extend(data.children.iter().rev().copied());
            }
        }
        order
    }

    fn attributes(&self, node: NodeId) -> Vec<(String, String)> {
        self.nodes
            .read()
            .get(node.raw() as usize)
            .map(|d| d.attributes.clone())
            .unwrap_or_default()
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        let nodes = self.nodes.read();
        let data = nodes.get(node.raw() as usize)?;
        data.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone())
    }

    fn set_attribute(&self, node: NodeId, name: &str, value: &str) {
        let mut nodes = self.nodes.write();
        let Some(data) = nodes.get_mut(node.raw() as usize) else {
            return;
        };
        match data.attributes.iter_mut().find(|(k, _)| k == name) {
            Some((_, existing)) => *existing = value.to_string(),
            None => data.attributes.push((name.to_string(), value.to_string())),
        }
    }

    fn remove_attribute(&self, node: NodeId, name: &str) {
        if let Some(data) = self.nodes.write().get_mut(node.raw() as usize) {
            data.attributes.retain(|(k, _)| k != name);
        }
    }
}

/// Flatten a YAML attribute value into attribute text
fn attribute_text(value: &YamlValue) -> Result<String> {
    match value {
        YamlValue::Null => Ok(String::new()),
        YamlValue::String(s) => Ok(s.clone()),
        YamlValue::Bool(b) => Ok(b.to_string()),
        YamlValue::Number(n) => Ok(n.to_string()),
        other => serde_json::to_string(other).map_err(|e| DataEventError::InvalidArgument {
            reason: format!("attribute value is not JSON-compatible: {}", e),
        }),
    }
}
