//! Binding descriptors - raw attribute text to typed bindings
//!
//! Two shapes (serde auto-detects via untagged):
//! - Direct: `{"events": "activate", "handler": {"on": "green"}}`
//!   (`event` is accepted as an alias of `events`)
//! - Reference: `{"id": "r1", "attribute": "@fill"}`
//!
//! Text not starting with `{` is the shorthand reference
//! `<id><separator><attribute>`, e.g. `r1@@fill` with the default separator.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use smallvec::SmallVec;

use crate::config::Options;
use crate::document::NodeId;
use crate::error::{DataEventError, Result};
use crate::handler::{Handler, HandlerRegistry, HandlerSpecError};
use crate::util::casing;

/// Event names a direct binding subscribes to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Events(SmallVec<[String; 2]>);

impl Events {
    pub fn contains(&self, event: &str) -> bool {
        self.0.iter().any(|e| e == event)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for Events {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// A binding that owns its events and handler
#[derive(Debug, Clone)]
pub struct Binding {
    pub events: Events,
    pub handler: Handler,
}

/// Points at the binding `attribute` (a data key) of the node declaring `id`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    pub id: String,
    pub attribute: String,
}

/// Normalized but unresolved binding value
#[derive(Debug, Clone)]
pub enum RawBinding {
    Direct(Arc<Binding>),
    Reference(Reference),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Descriptor {
    Direct(DirectDescriptor),
    Reference(ReferenceDescriptor),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DirectDescriptor {
    #[serde(alias = "event")]
    events: EventsField,
    #[serde(default)]
    handler: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EventsField {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ReferenceDescriptor {
    id: String,
    attribute: String,
}

impl RawBinding {
    /// Parse the raw text of binding `data_key` on `node`
    pub fn parse(
        text: &str,
        node: NodeId,
        data_key: &str,
        options: &Options,
        registry: &HandlerRegistry,
    ) -> Result<Self> {
        let format_error = |details: String| DataEventError::InvalidBindingFormat {
            node,
            key: data_key.to_string(),
            details,
        };

        let trimmed = text.trim();
        if !trimmed.starts_with('{') {
            let (id, attribute) = trimmed
                .split_once(options.separator.as_str())
                .filter(|(id, attribute)| !id.is_empty() && !attribute.is_empty())
                .ok_or_else(|| {
                    format_error(format!(
                        "'{}' is neither a JSON descriptor nor a reference of the form <id>{}<attribute>",
                        trimmed, options.separator
                    ))
                })?;
            return Ok(Self::Reference(Reference::new(id, attribute, options)));
        }

        let descriptor: Descriptor = serde_json::from_str(trimmed).map_err(|e| {
            format_error(format!(
                "expected {{\"events\", \"handler\"}} or {{\"id\", \"attribute\"}}: {}",
                e
            ))
        })?;

        match descriptor {
            Descriptor::Reference(ReferenceDescriptor { id, attribute }) => {
                if id.is_empty() || attribute.is_empty() {
                    return Err(format_error("reference id and attribute cannot be empty".into()));
                }
                Ok(Self::Reference(Reference::new(&id, &attribute, options)))
            }
            Descriptor::Direct(DirectDescriptor { events, handler }) => {
                let events: Events = match events {
                    EventsField::One(event) => std::iter::once(event).collect(),
                    EventsField::Many(events) => events.into_iter().collect(),
                };
                if events.0.is_empty() || events.iter().any(str::is_empty) {
                    return Err(format_error("events must name at least one non-empty event".into()));
                }

                let handler = Handler::from_descriptor(handler.as_ref(), registry).map_err(|e| match e {
                    HandlerSpecError::Format(details) => format_error(details),
                    HandlerSpecError::Unknown(name) => DataEventError::InvalidHandler {
                        key: data_key.to_string(),
                        reason: format!("no handler registered as '{}'", name),
                    },
                })?;

                Ok(Self::Direct(Arc::new(Binding { events, handler })))
            }
        }
    }
}

impl Reference {
    /// Build a reference, normalizing `attribute` to a prefixed camelCase data key
    pub fn new(id: &str, attribute: &str, options: &Options) -> Self {
        let attribute = casing::data_key(attribute, "").unwrap_or_default();
        let attribute = if attribute.starts_with(&options.binding_prefix) {
            attribute
        } else {
            format!("{}{}", options.binding_prefix, attribute)
        };
        Self {
            id: id.to_string(),
            attribute,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(text: &str) -> Result<RawBinding> {
        let registry = HandlerRegistry::new().with("halve", |_| None);
        RawBinding::parse(text, NodeId::new(1), "@fill", &Options::default(), &registry)
    }

    fn reference(text: &str) -> Reference {
        match parse(text).unwrap() {
            RawBinding::Reference(r) => r,
            other => panic!("Expected Reference, got {:?}", other),
        }
    }

    fn direct(text: &str) -> Arc<Binding> {
        match parse(text).unwrap() {
            RawBinding::Direct(b) => b,
            other => panic!("Expected Direct, got {:?}", other),
        }
    }

    #[test]
    fn direct_single_event() {
        let binding = direct(r#"{"events": "activate", "handler": {"on": "green", "off": "red"}}"#);
        assert!(binding.events.contains("activate"));
        assert!(!binding.events.contains("deactivate"));
        assert_eq!(binding.handler.kind(), "discrete");
    }

    #[test]
    fn direct_event_alias_and_many() {
        let binding = direct(r#"{"event": ["hover", "focus"]}"#);
        assert_eq!(binding.events.iter().collect::<Vec<_>>(), vec!["hover", "focus"]);
        assert_eq!(binding.handler.kind(), "pass_through");
    }

    #[test]
    fn direct_functional_by_name() {
        assert_eq!(direct(r#"{"events": "x", "handler": "halve"}"#).handler.kind(), "functional");
    }

    #[test]
    fn discrete_keeps_declaration_order() {
        let binding = direct(r#"{"events": "x", "handler": {"z": "1", "a": "2", "m": "3"}}"#);
        let Handler::Discrete(entries) = &binding.handler else {
            panic!("Expected Discrete")
        };
        let keys: Vec<&str> = entries.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }

    #[test]
    fn structural_reference() {
        assert_eq!(
            reference(r#"{"id": "r1", "attribute": "@fill"}"#),
            Reference { id: "r1".into(), attribute: "@fill".into() }
        );
    }

    #[test]
    fn shorthand_reference_normalizes_attribute() {
        assert_eq!(reference("r1@@fill").attribute, "@fill");
        assert_eq!(reference("r1@fill").attribute, "@fill");
        assert_eq!(reference(" r1@@fill-opacity ").attribute, "@fillOpacity");
        assert_eq!(reference("r1@@fill").id, "r1");
    }

    #[test]
    fn malformed_shorthand() {
        for text in ["plain", "@fill", "r1@", ""] {
            let err = parse(text).unwrap_err();
            assert!(err.to_string().contains("BIND-010"), "{text}: {err}");
        }
    }

    #[test]
    fn malformed_json() {
        for text in [
            r#"{"events": "x""#,
            r#"{"handler": {"a": "b"}}"#,
            r#"{"events": ""}"#,
            r#"{"events": []}"#,
            r#"{"events": 3}"#,
            r#"{"id": "r1"}"#,
            r#"{"id": "", "attribute": "@fill"}"#,
            r#"{"events": "x", "handler": 7}"#,
        ] {
            let err = parse(text).unwrap_err();
            assert!(
                matches!(err, DataEventError::InvalidBindingFormat { .. }),
                "{text}: {err}"
            );
        }
    }

    #[test]
    fn unregistered_function_is_invalid_handler() {
        let err = parse(r#"{"events": "x", "handler": "double"}"#).unwrap_err();
        assert!(matches!(err, DataEventError::InvalidHandler { .. }));
        assert!(err.to_string().contains("double"));
    }

    #[test]
    fn custom_separator() {
        let options = Options { separator: "#".into(), ..Options::default() };
        let raw = RawBinding::parse("r1#fill", NodeId::new(0), "@fill", &options, &HandlerRegistry::new())
            .unwrap();
        assert!(matches!(raw, RawBinding::Reference(Reference { ref id, .. }) if id == "r1"));
    }
}
