//! Debug tracing of dispatch steps
//!
//! When [`Options::debug`](crate::Options) is set, the engine appends one
//! record per extraction, resolution, evaluation and write to a [`TraceLog`].
//! - TraceRecord: envelope with id + timestamp + kind
//! - TraceKind: dispatch / resolution / evaluation / write variants
//! - TraceLog: thread-safe, append-only, shared by clones
//!
//! Records are observability only; nothing reads them back during dispatch.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dispatch::DispatchMode;
use crate::document::NodeId;

/// Single trace record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceRecord {
    /// Monotonic sequence ID (for ordering)
    pub id: u64,
    /// Time since the log was created (ms)
    pub timestamp_ms: u64,
    pub kind: TraceKind,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TraceKind {
    // ═══════════════════════════════════════════
    // DISPATCH LEVEL
    // ═══════════════════════════════════════════
    DispatchStarted {
        root: NodeId,
        event: String,
        mode: DispatchMode,
        value: Option<Value>,
    },
    DispatchCompleted {
        root: NodeId,
        evaluated: usize,
    },
    DispatchFailed {
        root: NodeId,
        code: String,
        error: String,
    },

    // ═══════════════════════════════════════════
    // RESOLUTION
    // ═══════════════════════════════════════════
    BindingsExtracted {
        root: NodeId,
        nodes: usize,
        bindings: usize,
    },
    ReferenceResolved {
        node: NodeId,
        key: String,
        /// Node owning the terminal direct binding
        target: NodeId,
        hops: usize,
    },

    // ═══════════════════════════════════════════
    // EVALUATION / WRITE-BACK
    // ═══════════════════════════════════════════
    HandlerEvaluated {
        node: NodeId,
        key: String,
        handler: String,
    },
    AttributeWritten {
        node: NodeId,
        attribute: String,
        value: String,
    },
    AttributeRemoved {
        node: NodeId,
        attribute: String,
    },
}

impl TraceKind {
    /// Node a record is about, if node-scoped
    pub fn node(&self) -> Option<NodeId> {
        match self {
            Self::ReferenceResolved { node, .. }
            | Self::HandlerEvaluated { node, .. }
            | Self::AttributeWritten { node, .. }
            | Self::AttributeRemoved { node, .. } => Some(*node),
            Self::DispatchStarted { .. }
            | Self::DispatchCompleted { .. }
            | Self::DispatchFailed { .. }
            | Self::BindingsExtracted { .. } => None,
        }
    }

    pub fn is_write(&self) -> bool {
        matches!(self, Self::AttributeWritten { .. } | Self::AttributeRemoved { .. })
    }
}

/// Records kept by [`TraceLog::new`] before the oldest are dropped
pub const DEFAULT_TRACE_CAPACITY: usize = 10_000;

/// Thread-safe, append-only trace log
///
/// Holds at most `capacity` records; emitting past it drops the oldest.
/// IDs keep counting, so gaps at the front show what was dropped. Call
/// [`clear`](Self::clear) between dispatches to keep only the latest one.
#[derive(Clone)]
pub struct TraceLog {
    records: Arc<RwLock<VecDeque<TraceRecord>>>,
    capacity: usize,
    start_time: Instant,
    next_id: Arc<AtomicU64>,
}

impl TraceLog {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_TRACE_CAPACITY)
    }

    /// Log keeping the most recent `capacity` records (at least one)
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Arc::new(RwLock::new(VecDeque::new())),
            capacity: capacity.max(1),
            start_time: Instant::now(),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append a record, returning its ID
    pub fn emit(&self, kind: TraceKind) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let record = TraceRecord {
            id,
            timestamp_ms: self.start_time.elapsed().as_millis() as u64,
            kind,
        };

        let mut records = self.records.write();
        if records.len() == self.capacity {
            records.pop_front();
        }
        records.push_back(record);
        id
    }

    /// All records (cloned)
    pub fn records(&self) -> Vec<TraceRecord> {
        self.records.read().iter().cloned().collect()
    }

    /// Records about one node
    pub fn filter_node(&self, node: NodeId) -> Vec<TraceRecord> {
        self.records()
            .into_iter()
            .filter(|r| r.kind.node() == Some(node))
            .collect()
    }

    /// Attribute writes and removals only
    pub fn writes(&self) -> Vec<TraceRecord> {
        self.records().into_iter().filter(|r| r.kind.is_write()).collect()
    }

    /// Serialize to JSON for persistence/debugging
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self.records()).unwrap_or(Value::Null)
    }

    pub fn clear(&self) {
        self.records.write().clear();
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TraceLog {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TraceLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceLog").field("len", &self.len()).finish()
    }
}
