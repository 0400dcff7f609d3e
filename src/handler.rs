//! Handler evaluation
//!
//! A binding's handler is decided once, when its descriptor is normalized:
//! - absent / `null` → [`Handler::PassThrough`]
//! - JSON object → [`Handler::Discrete`] (ordered `value → result` entries)
//! - string → [`Handler::Functional`], the name of a callable registered in
//!   the [`HandlerRegistry`]. Handler text is never parsed or executed.
//!
//! Two triggering modes:
//!
//! | Handler | value supplied | cycle (no value) |
//! |---|---|---|
//! | PassThrough | the value | toggle present(empty) / absent |
//! | Discrete | `mapping[value]` | next entry after the current one, wrapping |
//! | Functional | `f(event, value, ctx, node)` | `f(event, None, ctx, node)` |

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde_json::Value;
use tracing::debug;

use crate::document::NodeId;
use crate::error::{DataEventError, Result};

/// Injected handler capability. `None` (or JSON `null`) means "no result".
pub type HandlerFn = Arc<dyn Fn(&HandlerCall<'_>) -> Option<Value> + Send + Sync>;

/// `{ name, value }` view of the target attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeContext<'a> {
    /// Binding key (without the binding prefix)
    pub name: &'a str,
    /// Current raw attribute value, `None` when absent
    pub value: Option<&'a str>,
}

/// Arguments of one handler evaluation
#[derive(Debug, Clone, Copy)]
pub struct HandlerCall<'a> {
    /// The fired event name
    pub event: &'a str,
    /// Supplied value; `None` in cycle mode
    pub value: Option<&'a Value>,
    pub attribute: AttributeContext<'a>,
    pub node: NodeId,
}

/// What the dispatcher applies to the target attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Set(String),
    Remove,
}

#[derive(Clone)]
pub enum Handler {
    PassThrough,
    /// Entries in declaration order
    Discrete(Vec<(String, Value)>),
    Functional { name: String, func: HandlerFn },
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PassThrough => f.write_str("PassThrough"),
            Self::Discrete(entries) => f.debug_tuple("Discrete").field(entries).finish(),
            Self::Functional { name, .. } => {
                f.debug_struct("Functional").field("name", name).finish_non_exhaustive()
            }
        }
    }
}

impl Handler {
    /// Normalize the `handler` field of a direct binding
    ///
    /// Errors carry a reason only; the caller attaches node and key.
    pub fn from_descriptor(
        descriptor: Option<&Value>,
        registry: &HandlerRegistry,
    ) -> std::result::Result<Self, HandlerSpecError> {
        match descriptor {
            None | Some(Value::Null) => Ok(Self::PassThrough),
            Some(Value::Object(map)) => {
                let mut entries = Vec::with_capacity(map.len());
                for (key, result) in map {
                    if result.is_null() || result.is_object() || result.is_array() {
                        return Err(HandlerSpecError::Format(format!(
                            "discrete entry '{}' must map to a string, number or boolean",
                            key
                        )));
                    }
                    entries.push((key.clone(), result.clone()));
                }
                Ok(Self::Discrete(entries))
            }
            Some(Value::String(name)) => match registry.get(name) {
                Some(func) => Ok(Self::Functional {
                    name: name.clone(),
                    func,
                }),
                None => Err(HandlerSpecError::Unknown(name.clone())),
            },
            Some(other) => Err(HandlerSpecError::Format(format!(
                "handler must be absent, an object or a handler name, got {}",
                other
            ))),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::PassThrough => "pass_through",
            Self::Discrete(_) => "discrete",
            Self::Functional { .. } => "functional",
        }
    }

    /// Compute the new attribute state for one matching binding
    pub fn evaluate(&self, call: &HandlerCall<'_>) -> Result<Outcome> {
        let key = call.attribute.name;
        let invalid = |reason: String| DataEventError::InvalidHandler {
            key: key.to_string(),
            reason,
        };

        let outcome = match (self, call.value) {
            (Self::PassThrough, Some(value)) => Outcome::Set(
                value_text(value).ok_or_else(|| invalid("supplied value is null".into()))?,
            ),
            (Self::PassThrough, None) => match call.attribute.value {
                Some(_) => Outcome::Remove,
                None => Outcome::Set(String::new()),
            },
            (Self::Discrete(entries), Some(value)) => {
                let lookup =
                    value_text(value).ok_or_else(|| invalid("supplied value is null".into()))?;
                let (_, result) = entries
                    .iter()
                    .find(|(k, _)| *k == lookup)
                    .ok_or_else(|| invalid(format!("no entry for value '{}'", lookup)))?;
                Outcome::Set(
                    value_text(result).ok_or_else(|| invalid("entry result is null".into()))?,
                )
            }
            (Self::Discrete(entries), None) => Outcome::Set(next_in_ring(entries, call.attribute.value).ok_or_else(
                || invalid("discrete handler has no entries to cycle through".into()),
            )?),
            (Self::Functional { name, func }, _) => {
                let result = func(call)
                    .and_then(|v| value_text(&v))
                    .ok_or_else(|| invalid(format!("handler '{}' returned no value", name)))?;
                Outcome::Set(result)
            }
        };

        debug!(
            node = %call.node,
            key,
            event = call.event,
            handler = self.kind(),
            cycle = call.value.is_none(),
            ?outcome,
            "Evaluated handler"
        );
        Ok(outcome)
    }
}

/// Why a handler descriptor was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerSpecError {
    /// Malformed descriptor (a binding format problem)
    Format(String),
    /// Names a callable that is not registered
    Unknown(String),
}

/// Entry after the one whose result equals `current`; first entry when
/// nothing matches or `current` is the last one
fn next_in_ring(entries: &[(String, Value)], current: Option<&str>) -> Option<String> {
    let ring: Vec<String> = entries.iter().filter_map(|(_, v)| value_text(v)).collect();
    if ring.is_empty() {
        return None;
    }
    let next = current
        .and_then(|cur| ring.iter().position(|entry| entry == cur))
        .map(|i| (i + 1) % ring.len())
        .unwrap_or(0);
    Some(ring[next].clone())
}

/// Attribute text of a JSON value; `null` has none
pub fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(_) | Value::Number(_) | Value::Array(_) | Value::Object(_) => {
            Some(value.to_string())
        }
    }
}

/// Named callables available to functional handlers
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: FxHashMap<String, HandlerFn>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a callable under `name`
    pub fn register<F>(&mut self, name: impl Into<String>, func: F) -> &mut Self
    where
        F: Fn(&HandlerCall<'_>) -> Option<Value> + Send + Sync + 'static,
    {
        self.handlers.insert(name.into(), Arc::new(func));
        self
    }

    /// Builder form of [`register`](Self::register)
    pub fn with<F>(mut self, name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&HandlerCall<'_>) -> Option<Value> + Send + Sync + 'static,
    {
        self.register(name, func);
        self
    }

    pub fn get(&self, name: &str) -> Option<HandlerFn> {
        self.handlers.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("HandlerRegistry").field("handlers", &names).finish()
    }
}
