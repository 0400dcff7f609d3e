//! Reference resolution
//!
//! Rewrites every binding of an extracted collection into the direct binding
//! it ends at. Per binding:
//! 1. Parse the raw text (shorthand, reference or direct descriptor).
//! 2. A direct binding is final.
//! 3. A reference looks up the single node declaring its id, then that
//!    node's binding at the referenced data key; references keep being
//!    followed until a direct binding is reached.
//!
//! The walk is iterative. Visited slots are keyed by `(node, data key)` and
//! seeded with the originating slot, so `A → B → A` and self references fail
//! with `CyclicReference`. Chains longer than `max_reference_depth` fail with
//! `ReferenceTooDeep`. All state is local to one call.

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use tracing::debug;

use super::entry::{Binding, RawBinding, Reference};
use super::extract::NodeBindings;
use crate::config::Options;
use crate::document::NodeId;
use crate::error::{DataEventError, Result};
use crate::handler::HandlerRegistry;
use crate::trace::{TraceKind, TraceLog};

/// A binding slot with its terminal direct binding
#[derive(Debug, Clone)]
pub struct ResolvedBinding {
    /// Binding key without the binding prefix (`fillOpacity`)
    pub key: String,
    /// Data key as declared (`@fillOpacity`)
    pub data_key: String,
    pub binding: Arc<Binding>,
    /// Node owning `binding` (the slot's own node when `hops == 0`)
    pub source: NodeId,
    /// Reference hops followed to reach `binding`
    pub hops: usize,
}

#[derive(Debug, Clone)]
pub struct ResolvedNode {
    pub node: NodeId,
    pub bindings: Vec<ResolvedBinding>,
}

impl ResolvedNode {
    pub fn get(&self, key: &str) -> Option<&ResolvedBinding> {
        self.bindings.iter().find(|b| b.key == key)
    }
}

/// Parsed collection with its reference-id index
struct Parsed<'a> {
    nodes: Vec<(NodeId, Vec<(&'a str, RawBinding)>)>,
    by_id: FxHashMap<&'a str, SmallVec<[usize; 1]>>,
}

impl Parsed<'_> {
    fn lookup(&self, id: &str) -> Result<usize> {
        match self.by_id.get(id).map(SmallVec::as_slice) {
            None | Some([]) => Err(DataEventError::ReferenceNotFound { id: id.to_string() }),
            Some([index]) => Ok(*index),
            Some(many) => Err(DataEventError::AmbiguousReference {
                id: id.to_string(),
                count: many.len(),
            }),
        }
    }

    fn slot(&self, index: usize, data_key: &str) -> Option<&RawBinding> {
        self.nodes[index]
            .1
            .iter()
            .find(|(k, _)| *k == data_key)
            .map(|(_, raw)| raw)
    }
}

/// Resolve every binding in `extracted`, in extraction order
pub fn resolve(
    extracted: &[NodeBindings],
    options: &Options,
    registry: &HandlerRegistry,
    trace: Option<&TraceLog>,
) -> Result<Vec<ResolvedNode>> {
    let parsed = parse_all(extracted, options, registry)?;

    let mut resolved = Vec::with_capacity(parsed.nodes.len());
    for (index, (node, slots)) in parsed.nodes.iter().enumerate() {
        let mut bindings = Vec::with_capacity(slots.len());

        for (data_key, raw) in slots {
            let (binding, source, hops) = match raw {
                RawBinding::Direct(binding) => (Arc::clone(binding), *node, 0),
                RawBinding::Reference(reference) => {
                    let (binding, target, hops) = follow(&parsed, index, data_key, reference, options)?;
                    debug!(node = %node, key = %data_key, target = %target, hops, "Resolved reference");
                    if let Some(trace) = trace {
                        trace.emit(TraceKind::ReferenceResolved {
                            node: *node,
                            key: data_key.to_string(),
                            target,
                            hops,
                        });
                    }
                    (binding, target, hops)
                }
            };

            bindings.push(ResolvedBinding {
                key: data_key
                    .strip_prefix(options.binding_prefix.as_str())
                    .unwrap_or(data_key)
                    .to_string(),
                data_key: data_key.to_string(),
                binding,
                source,
                hops,
            });
        }

        resolved.push(ResolvedNode { node: *node, bindings });
    }

    Ok(resolved)
}

fn parse_all<'a>(
    extracted: &'a [NodeBindings],
    options: &Options,
    registry: &HandlerRegistry,
) -> Result<Parsed<'a>> {
    let mut nodes = Vec::with_capacity(extracted.len());
    let mut by_id: FxHashMap<&'a str, SmallVec<[usize; 1]>> = FxHashMap::default();

    for (index, entry) in extracted.iter().enumerate() {
        if let Some(id) = entry.reference_id.as_deref() {
            by_id.entry(id).or_default().push(index);
        }

        let slots = entry
            .bindings
            .iter()
            .map(|(data_key, text)| {
                RawBinding::parse(text, entry.node, data_key, options, registry)
                    .map(|raw| (data_key.as_str(), raw))
            })
            .collect::<Result<Vec<_>>>()?;
        nodes.push((entry.node, slots));
    }

    Ok(Parsed { nodes, by_id })
}

/// Follow a reference chain from slot `(origin, data_key)` to its direct binding
fn follow(
    parsed: &Parsed<'_>,
    origin: usize,
    data_key: &str,
    first: &Reference,
    options: &Options,
) -> Result<(Arc<Binding>, NodeId, usize)> {
    let mut visited: FxHashSet<(usize, &str)> = FxHashSet::default();
    visited.insert((origin, data_key));
    let mut chain = vec![slot_label(parsed.nodes[origin].0, data_key)];

    let mut current = first;
    let mut hops = 0;
    loop {
        hops += 1;
        if hops > options.max_reference_depth {
            return Err(DataEventError::ReferenceTooDeep {
                key: data_key.to_string(),
                limit: options.max_reference_depth,
            });
        }

        let target = parsed.lookup(&current.id)?;
        let raw = parsed
            .slot(target, &current.attribute)
            .ok_or_else(|| DataEventError::ReferenceTargetMissing {
                id: current.id.clone(),
                attribute: current.attribute.clone(),
            })?;

        let target_node = parsed.nodes[target].0;
        chain.push(slot_label(target_node, &current.attribute));
        if !visited.insert((target, current.attribute.as_str())) {
            return Err(DataEventError::CyclicReference {
                chain: chain.join(" → "),
            });
        }

        match raw {
            RawBinding::Direct(binding) => return Ok((Arc::clone(binding), target_node, hops)),
            RawBinding::Reference(next) => current = next,
        }
    }
}

fn slot_label(node: NodeId, data_key: &str) -> String {
    format!("{}{}", node, data_key)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(n: u64, id: Option<&str>, bindings: &[(&str, &str)]) -> NodeBindings {
        NodeBindings {
            node: NodeId::new(n),
            reference_id: id.map(str::to_string),
            bindings: bindings
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    fn run(extracted: &[NodeBindings]) -> Result<Vec<ResolvedNode>> {
        resolve(extracted, &Options::default(), &HandlerRegistry::new(), None)
    }

    const FILL: &str = r#"{"events": "activate", "handler": {"on": "green", "off": "red"}}"#;

    #[test]
    fn direct_bindings_pass_through() {
        let resolved = run(&[node(1, None, &[("@fill", FILL)])]).unwrap();
        let fill = resolved[0].get("fill").unwrap();
        assert_eq!(fill.hops, 0);
        assert_eq!(fill.source, NodeId::new(1));
        assert_eq!(fill.data_key, "@fill");
        assert!(fill.binding.events.contains("activate"));
    }

    #[test]
    fn single_hop_reference() {
        let resolved = run(&[
            node(1, Some("r1"), &[("@fill", FILL)]),
            node(2, None, &[("@fill", r#"{"id": "r1", "attribute": "@fill"}"#)]),
        ])
        .unwrap();
        let borrowed = resolved[1].get("fill").unwrap();
        assert_eq!(borrowed.hops, 1);
        assert_eq!(borrowed.source, NodeId::new(1));
        assert!(Arc::ptr_eq(&borrowed.binding, &resolved[0].get("fill").unwrap().binding));
    }

    #[test]
    fn multi_hop_chain_reaches_origin_slot() {
        let resolved = run(&[
            node(1, Some("a"), &[("@stroke", "b@@stroke")]),
            node(2, Some("b"), &[("@stroke", "c@@stroke")]),
            node(3, Some("c"), &[("@stroke", FILL)]),
            node(4, None, &[("@stroke", "a@@stroke")]),
        ])
        .unwrap();
        assert_eq!(resolved[0].get("stroke").unwrap().hops, 2);
        assert_eq!(resolved[1].get("stroke").unwrap().hops, 1);
        let deepest = resolved[3].get("stroke").unwrap();
        assert_eq!(deepest.hops, 3);
        assert_eq!(deepest.source, NodeId::new(3));
    }

    #[test]
    fn reference_to_other_attribute() {
        let resolved = run(&[
            node(1, Some("r1"), &[("@fill", FILL)]),
            node(2, None, &[("@stroke", "r1@@fill")]),
        ])
        .unwrap();
        let stroke = resolved[1].get("stroke").unwrap();
        assert_eq!(stroke.key, "stroke");
        assert!(stroke.binding.events.contains("activate"));
    }

    #[test]
    fn resolution_is_idempotent() {
        let input = [
            node(1, Some("r1"), &[("@fill", FILL)]),
            node(2, None, &[("@fill", "r1@@fill"), ("@stroke", "r1@@fill")]),
        ];
        let first = run(&input).unwrap();
        let second = run(&input).unwrap();
        for (a, b) in first[1].bindings.iter().zip(&second[1].bindings) {
            assert_eq!(a.source, b.source);
            assert_eq!(a.hops, b.hops);
            assert_eq!(a.binding.events, b.binding.events);
        }
        assert!(Arc::ptr_eq(&first[1].bindings[0].binding, &first[1].bindings[1].binding));
    }

    #[test]
    fn two_node_cycle() {
        let err = run(&[
            node(1, Some("a"), &[("@fill", "b@@fill")]),
            node(2, Some("b"), &[("@fill", "a@@fill")]),
        ])
        .unwrap_err();
        assert!(matches!(err, DataEventError::CyclicReference { .. }));
        assert!(err.to_string().contains("#1@fill → #2@fill → #1@fill"));
    }

    #[test]
    fn self_reference_is_cycle() {
        let err = run(&[node(1, Some("a"), &[("@fill", "a@@fill")])]).unwrap_err();
        assert!(matches!(err, DataEventError::CyclicReference { .. }));
    }

    #[test]
    fn cycle_not_through_origin() {
        // C enters the A ↔ B loop without being part of it
        let err = run(&[
            node(1, Some("a"), &[("@fill", "b@@fill")]),
            node(2, Some("b"), &[("@fill", "a@@fill")]),
            node(3, None, &[("@fill", "a@@fill")]),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("BIND-023"));
    }

    #[test]
    fn missing_id() {
        let err = run(&[node(1, None, &[("@fill", "nowhere@@fill")])]).unwrap_err();
        assert!(matches!(err, DataEventError::ReferenceNotFound { ref id } if id == "nowhere"));
    }

    #[test]
    fn ambiguous_id() {
        let err = run(&[
            node(1, Some("r1"), &[("@fill", FILL)]),
            node(2, Some("r1"), &[("@fill", FILL)]),
            node(3, None, &[("@fill", "r1@@fill")]),
        ])
        .unwrap_err();
        assert!(matches!(err, DataEventError::AmbiguousReference { count: 2, .. }));
    }

    #[test]
    fn duplicate_ids_without_references_are_fine() {
        assert!(run(&[
            node(1, Some("r1"), &[("@fill", FILL)]),
            node(2, Some("r1"), &[("@fill", FILL)]),
        ])
        .is_ok());
    }

    #[test]
    fn missing_target_attribute() {
        let err = run(&[
            node(1, Some("r1"), &[("@fill", FILL)]),
            node(2, None, &[("@fill", "r1@@stroke")]),
        ])
        .unwrap_err();
        assert!(matches!(err, DataEventError::ReferenceTargetMissing { .. }));
    }

    #[test]
    fn depth_limit() {
        let options = Options {
            max_reference_depth: 2,
            ..Options::default()
        };
        let input = [
            node(1, Some("a"), &[("@fill", "b@@fill")]),
            node(2, Some("b"), &[("@fill", "c@@fill")]),
            node(3, Some("c"), &[("@fill", FILL)]),
            node(4, None, &[("@fill", "a@@fill")]),
        ];
        let err = resolve(&input, &options, &HandlerRegistry::new(), None).unwrap_err();
        assert!(matches!(err, DataEventError::ReferenceTooDeep { limit: 2, .. }));
    }

    #[test]
    fn every_reference_resolved_even_if_unused() {
        // A broken reference fails the pass no matter which event fires
        let err = run(&[
            node(1, None, &[("@fill", FILL)]),
            node(2, None, &[("@other", "ghost@@x")]),
        ])
        .unwrap_err();
        assert!(err.is_resolution_error());
    }

    #[test]
    fn format_errors_surface_first() {
        let err = run(&[node(1, None, &[("@fill", "not a reference")])]).unwrap_err();
        assert!(matches!(err, DataEventError::InvalidBindingFormat { .. }));
    }

    #[test]
    fn trace_records_hops() {
        let trace = TraceLog::new();
        resolve(
            &[
                node(1, Some("r1"), &[("@fill", FILL)]),
                node(2, None, &[("@fill", "r1@@fill")]),
            ],
            &Options::default(),
            &HandlerRegistry::new(),
            Some(&trace),
        )
        .unwrap();
        let records = trace.records();
        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0].kind,
            TraceKind::ReferenceResolved {
                node: NodeId::new(2),
                key: "@fill".into(),
                target: NodeId::new(1),
                hops: 1,
            }
        );
    }
}
