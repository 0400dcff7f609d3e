//! Event dispatch
//!
//! One call processes one event to completion:
//! extract → resolve → match events → evaluate → write back, for each
//! dispatch root under the given node. The first error aborts the call;
//! attribute writes already applied stay applied.
//!
//! Dispatch roots are the given node and its descendants carrying the root
//! marker, in document order. Each root owns its subtree down to the next
//! marked node, so every node belongs to exactly one root and each binding
//! is evaluated at most once per call. References resolve within the owning
//! root.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::binding::{self, ResolvedNode};
use crate::config::Options;
use crate::document::{Document, NodeId};
use crate::error::{DataEventError, Result};
use crate::handler::{AttributeContext, HandlerCall, HandlerRegistry, Outcome};
use crate::trace::{TraceKind, TraceLog};
use crate::util::casing;

/// Triggering mode of a dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// A value is supplied by the caller
    Value,
    /// No value: advance each binding from its current attribute state
    Cycle,
}

/// Binding engine: options, registered handlers and the debug trace log
///
/// `Engine` is `Send + Sync` and dispatches through `&self`, so a functional
/// handler can capture it and dispatch again while an outer call runs.
#[derive(Debug, Clone, Default)]
pub struct Engine {
    options: Options,
    handlers: HandlerRegistry,
    trace: TraceLog,
}

impl Engine {
    /// Build an engine with validated options and no handlers
    pub fn new(options: Options) -> Result<Self> {
        Ok(Self {
            options: options.validate()?,
            handlers: HandlerRegistry::new(),
            trace: TraceLog::new(),
        })
    }

    pub fn with_handlers(mut self, handlers: HandlerRegistry) -> Self {
        self.handlers = handlers;
        self
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    /// Records of recent dispatches, oldest dropped past
    /// [`DEFAULT_TRACE_CAPACITY`](crate::trace::DEFAULT_TRACE_CAPACITY) (empty unless `debug`)
    pub fn trace(&self) -> &TraceLog {
        &self.trace
    }

    /// Value-driven dispatch of `event` with `value`
    ///
    /// Returns `root` for chaining.
    pub fn trigger_event<D: Document + ?Sized>(
        &self,
        doc: &D,
        root: NodeId,
        event: &str,
        value: impl Into<Value>,
    ) -> Result<NodeId> {
        let value = value.into();
        validate_event(event)?;
        if value.is_null() {
            return Err(DataEventError::InvalidArgument {
                reason: format!("value for event '{}' is null; use advance_cycle to dispatch without a value", event),
            });
        }
        self.dispatch(doc, root, event, Some(&value))?;
        Ok(root)
    }

    /// Cycle-mode dispatch of `event` (no supplied value)
    ///
    /// Returns `root` for chaining.
    pub fn advance_cycle<D: Document + ?Sized>(&self, doc: &D, root: NodeId, event: &str) -> Result<NodeId> {
        validate_event(event)?;
        self.dispatch(doc, root, event, None)?;
        Ok(root)
    }

    /// Extract and resolve every dispatch root under `root` without evaluating
    pub fn resolve<D: Document + ?Sized>(&self, doc: &D, root: NodeId) -> Result<Vec<ResolvedNode>> {
        let mut all = Vec::new();
        for (scope, nodes) in self.scopes(doc, root) {
            all.extend(self.resolve_scope(doc, scope, &nodes)?);
        }
        Ok(all)
    }

    /// Dispatch roots under (and including) `root`, in document order
    pub fn dispatch_roots<D: Document + ?Sized>(&self, doc: &D, root: NodeId) -> Vec<NodeId> {
        self.scopes(doc, root).into_iter().map(|(scope, _)| scope).collect()
    }

    /// Every dispatch root with the nodes it owns
    fn scopes<D: Document + ?Sized>(&self, doc: &D, root: NodeId) -> Vec<(NodeId, Vec<NodeId>)> {
        let nodes = doc.subtree(root);
        let Some(marker) = self.options.root_marker.as_deref() else {
            return vec![(root, nodes)];
        };

        let roots: Vec<NodeId> = std::iter::once(root)
            .chain(
                nodes
                    .iter()
                    .skip(1)
                    .copied()
                    .filter(|node| binding::has_data_key(doc, *node, marker, &self.options)),
            )
            .collect();
        if roots.len() == 1 {
            return vec![(root, nodes)];
        }

        // Preorder: a nested root comes after its enclosing root and takes over its subtree
        let mut owner: FxHashMap<NodeId, NodeId> = FxHashMap::default();
        for &scope in &roots {
            owner.extend(doc.subtree(scope).into_iter().map(|node| (node, scope)));
        }
        roots
            .into_iter()
            .map(|scope| {
                let owned = nodes
                    .iter()
                    .copied()
                    .filter(|node| owner.get(node) == Some(&scope))
                    .collect();
                (scope, owned)
            })
            .collect()
    }

    #[instrument(skip(self, doc, root, value), fields(root = %root, cycle = value.is_none()))]
    fn dispatch<D: Document + ?Sized>(
        &self,
        doc: &D,
        root: NodeId,
        event: &str,
        value: Option<&Value>,
    ) -> Result<usize> {
        let trace = self.options.debug.then_some(&self.trace);
        if let Some(trace) = trace {
            trace.emit(TraceKind::DispatchStarted {
                root,
                event: event.to_string(),
                mode: if value.is_some() { DispatchMode::Value } else { DispatchMode::Cycle },
                value: value.cloned(),
            });
        }

        let result = self
            .scopes(doc, root)
            .into_iter()
            .try_fold(0, |evaluated, (scope, nodes)| {
                self.dispatch_scope(doc, scope, &nodes, event, value, trace)
                    .map(|n| evaluated + n)
            });

        match (&result, trace) {
            (Ok(evaluated), Some(trace)) => {
                trace.emit(TraceKind::DispatchCompleted { root, evaluated: *evaluated });
            }
            (Err(e), Some(trace)) => {
                trace.emit(TraceKind::DispatchFailed {
                    root,
                    code: e.code().to_string(),
                    error: e.to_string(),
                });
            }
            (_, None) => {}
        }
        if let Ok(evaluated) = &result {
            debug!(evaluated, "Dispatch completed");
        }
        result
    }

    fn resolve_scope<D: Document + ?Sized>(
        &self,
        doc: &D,
        scope: NodeId,
        nodes: &[NodeId],
    ) -> Result<Vec<ResolvedNode>> {
        let trace = self.options.debug.then_some(&self.trace);
        let extracted = binding::extract_nodes(doc, nodes, &self.options);
        if let Some(trace) = trace {
            trace.emit(TraceKind::BindingsExtracted {
                root: scope,
                nodes: extracted.len(),
                bindings: extracted.iter().map(|n| n.bindings.len()).sum(),
            });
        }
        binding::resolve(&extracted, &self.options, &self.handlers, trace)
    }

    /// Evaluate and write back every binding of `scope` subscribed to `event`
    fn dispatch_scope<D: Document + ?Sized>(
        &self,
        doc: &D,
        scope: NodeId,
        nodes: &[NodeId],
        event: &str,
        value: Option<&Value>,
        trace: Option<&TraceLog>,
    ) -> Result<usize> {
        let resolved = self.resolve_scope(doc, scope, nodes)?;
        let mut evaluated = 0;

        for ResolvedNode { node, bindings } in &resolved {
            for slot in bindings.iter().filter(|b| b.binding.events.contains(event)) {
                let attribute = casing::attribute_name(&slot.key);
                let current = doc.attribute(*node, &attribute);
                let call = HandlerCall {
                    event,
                    value,
                    attribute: AttributeContext {
                        name: &slot.key,
                        value: current.as_deref(),
                    },
                    node: *node,
                };

                let outcome = slot.binding.handler.evaluate(&call)?;
                evaluated += 1;
                if let Some(trace) = trace {
                    trace.emit(TraceKind::HandlerEvaluated {
                        node: *node,
                        key: slot.key.clone(),
                        handler: slot.binding.handler.kind().to_string(),
                    });
                }

                match outcome {
                    Outcome::Set(text) => {
                        doc.set_attribute(*node, &attribute, &text);
                        debug!(node = %node, attribute = %attribute, value = %text, "Attribute written");
                        if let Some(trace) = trace {
                            trace.emit(TraceKind::AttributeWritten {
                                node: *node,
                                attribute,
                                value: text,
                            });
                        }
                    }
                    Outcome::Remove => {
                        doc.remove_attribute(*node, &attribute);
                        debug!(node = %node, attribute = %attribute, "Attribute removed");
                        if let Some(trace) = trace {
                            trace.emit(TraceKind::AttributeRemoved { node: *node, attribute });
                        }
                    }
                }
            }
        }

        Ok(evaluated)
    }
}

fn validate_event(event: &str) -> Result<()> {
    if event.is_empty() {
        return Err(DataEventError::InvalidArgument {
            reason: "event name cannot be empty".into(),
        });
    }
    Ok(())
}
