//! Binding extraction - read raw binding text from a subtree
//!
//! Pure read of document state: no parsing, no errors. Nodes without any
//! binding are left out.

use crate::config::Options;
use crate::document::{Document, NodeId};
use crate::util::casing;

/// Raw bindings of one node, in attribute declaration order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeBindings {
    pub node: NodeId,
    /// Value of the reference-id data key, if declared
    pub reference_id: Option<String>,
    /// `(data key, raw text)`, e.g. `("@fill", "{\"events\": ...}")`
    pub bindings: Vec<(String, String)>,
}

/// Collect `root` and every descendant that carries at least one binding
pub fn extract<D: Document + ?Sized>(doc: &D, root: NodeId, options: &Options) -> Vec<NodeBindings> {
    extract_nodes(doc, &doc.subtree(root), options)
}

/// Same as [`extract`] over an explicit node list, kept in the given order
pub fn extract_nodes<D: Document + ?Sized>(doc: &D, nodes: &[NodeId], options: &Options) -> Vec<NodeBindings> {
    nodes
        .iter()
        .filter_map(|node| node_bindings(doc, *node, options))
        .collect()
}

fn node_bindings<D: Document + ?Sized>(doc: &D, node: NodeId, options: &Options) -> Option<NodeBindings> {
    let mut reference_id = None;
    let mut bindings = Vec::new();

    for (name, value) in doc.attributes(node) {
        let Some(key) = casing::data_key(&name, &options.data_prefix) else {
            continue;
        };
        if key.len() > options.binding_prefix.len() && key.starts_with(&options.binding_prefix) {
            bindings.push((key, value));
        } else if key == options.reference_attribute {
            reference_id = Some(value);
        }
    }

    if bindings.is_empty() {
        return None;
    }
    Some(NodeBindings {
        node,
        reference_id,
        bindings,
    })
}

/// Whether `node` carries the data key `data_key`
pub fn has_data_key<D: Document + ?Sized>(doc: &D, node: NodeId, data_key: &str, options: &Options) -> bool {
    doc.attributes(node)
        .iter()
        .any(|(name, _)| casing::data_key(name, &options.data_prefix).as_deref() == Some(data_key))
}
