//! Error types with fix suggestions
//!
//! Error code ranges:
//! - BIND-000-009: API boundary, config and IO errors
//! - BIND-010-019: Binding format errors
//! - BIND-020-029: Reference resolution errors
//! - BIND-030-039: Handler errors

use thiserror::Error;

use crate::document::NodeId;

pub type Result<T> = std::result::Result<T, DataEventError>;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

/// Every error aborts the current dispatch. Writes already applied stand.
#[derive(Error, Debug)]
pub enum DataEventError {
    // ─────────────────────────────────────────────────────────────
    // API boundary, config, IO (BIND-000 to BIND-009)
    // ─────────────────────────────────────────────────────────────
    #[error("BIND-001: Invalid argument: {reason}")]
    InvalidArgument { reason: String },

    #[error("BIND-002: Invalid configuration: {reason}")]
    ConfigError { reason: String },

    #[error("BIND-003: YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("BIND-004: IO error: {0}")]
    Io(#[from] std::io::Error),

    // ─────────────────────────────────────────────────────────────
    // Binding format (BIND-010 to BIND-019)
    // ─────────────────────────────────────────────────────────────
    #[error("BIND-010: Invalid binding '{key}' on node {node}: {details}")]
    InvalidBindingFormat {
        node: NodeId,
        key: String,
        details: String,
    },

    // ─────────────────────────────────────────────────────────────
    // References (BIND-020 to BIND-029)
    // ─────────────────────────────────────────────────────────────
    #[error("BIND-020: Reference id not found: '{id}'")]
    ReferenceNotFound { id: String },

    #[error("BIND-021: Reference '{id}' has no binding '{attribute}'")]
    ReferenceTargetMissing { id: String, attribute: String },

    #[error("BIND-022: Reference id '{id}' is ambiguous ({count} nodes declare it)")]
    AmbiguousReference { id: String, count: usize },

    #[error("BIND-023: References are cyclic: {chain}")]
    CyclicReference { chain: String },

    #[error("BIND-024: Reference chain from '{key}' exceeds {limit} hops")]
    ReferenceTooDeep { key: String, limit: usize },

    // ─────────────────────────────────────────────────────────────
    // Handlers (BIND-030 to BIND-039)
    // ─────────────────────────────────────────────────────────────
    #[error("BIND-030: Handler for '{key}' is invalid: {reason}")]
    InvalidHandler { key: String, reason: String },
}

impl DataEventError {
    /// Stable error code, also embedded at the start of the message
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidArgument { .. } => "BIND-001",
            Self::ConfigError { .. } => "BIND-002",
            Self::YamlParse(_) => "BIND-003",
            Self::Io(_) => "BIND-004",
            Self::InvalidBindingFormat { .. } => "BIND-010",
            Self::ReferenceNotFound { .. } => "BIND-020",
            Self::ReferenceTargetMissing { .. } => "BIND-021",
            Self::AmbiguousReference { .. } => "BIND-022",
            Self::CyclicReference { .. } => "BIND-023",
            Self::ReferenceTooDeep { .. } => "BIND-024",
            Self::InvalidHandler { .. } => "BIND-030",
        }
    }

    /// True for the reference-resolution family (BIND-02x)
    pub fn is_resolution_error(&self) -> bool {
        matches!(
            self,
            Self::ReferenceNotFound { .. }
                | Self::ReferenceTargetMissing { .. }
                | Self::AmbiguousReference { .. }
                | Self::CyclicReference { .. }
                | Self::ReferenceTooDeep { .. }
        )
    }
}

impl FixSuggestion for DataEventError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            Self::InvalidArgument { .. } => {
                Some("Pass a non-empty event name and a non-null value")
            }
            Self::ConfigError { .. } => Some("Check the option names and that prefixes are non-empty"),
            Self::YamlParse(_) => Some("Check YAML syntax: indentation and quoting"),
            Self::Io(_) => Some("Check file path and permissions"),
            Self::InvalidBindingFormat { .. } => Some(
                "Use {\"events\": ..., \"handler\": ...}, {\"id\": ..., \"attribute\": ...} or the shorthand id@@attribute",
            ),
            Self::ReferenceNotFound { .. } => Some("Declare the id on a node inside the managed root (data-id@)"),
            Self::ReferenceTargetMissing { .. } => {
                Some("Add the referenced binding to the node or fix the attribute name")
            }
            Self::AmbiguousReference { .. } => Some("Reference ids must be unique within a managed root"),
            Self::CyclicReference { .. } => {
                Some("Break the cycle: one binding in the chain must declare events and a handler")
            }
            Self::ReferenceTooDeep { .. } => Some("Shorten the chain or raise max_reference_depth"),
            Self::InvalidHandler { .. } => {
                Some("Make sure the discrete mapping has the value, or the named handler is registered and returns a value")
            }
        }
    }
}
