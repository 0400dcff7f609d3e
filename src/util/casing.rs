//! Attribute-name casing
//!
//! Data attributes are read the way browsers expose `dataset` keys:
//! `data-@fill-opacity` → data key `@fillOpacity`. Write-back converts a
//! binding key back to a dashed attribute: `fillOpacity` → `fill-opacity`.

use once_cell::sync::Lazy;
use regex::Regex;

static DASH_LOWER: Lazy<Regex> = Lazy::new(|| Regex::new(r"-([a-z])").expect("valid regex"));
static CAMEL_HUMP: Lazy<Regex> = Lazy::new(|| Regex::new(r"([a-z])([A-Z])").expect("valid regex"));

/// Data key of an attribute carrying `prefix`, or `None` for other attributes
pub fn data_key(attribute: &str, prefix: &str) -> Option<String> {
    let rest = attribute.strip_prefix(prefix)?;
    if rest.is_empty() {
        return None;
    }
    Some(
        DASH_LOWER
            .replace_all(rest, |caps: &regex::Captures<'_>| caps[1].to_ascii_uppercase())
            .into_owned(),
    )
}

/// Attribute written for a binding key
pub fn attribute_name(binding_key: &str) -> String {
    CAMEL_HUMP.replace_all(binding_key, "$1-$2").to_lowercase()
}
