use crate::types::{SarError, SarResult};
use serde_yaml::{Mapping, Value};

/// Merge YAML documents into a single document.
///
/// The strings are joined with newlines and parsed as one document, so
/// later top-level keys override earlier ones. With `section`, the merged
/// content is nested under that key.
pub fn merge_yaml<S: AsRef<str>>(yaml_strings: &[S], section: Option<&str>) -> SarResult<String> {
    let joined = yaml_strings
        .iter()
        .map(|s| s.as_ref())
        .collect::<Vec<_>>()
        .join("\n");

    let mut merged: Value = serde_yaml::from_str(&joined)
        .map_err(|e| SarError::InvalidFormat(format!("Invalid YAML: {}", e)))?;

    if let Some(section) = section {
        let mut wrapped = Mapping::new();
        wrapped.insert(Value::String(section.to_string()), merged);
        merged = Value::Mapping(wrapped);
    }

    serde_yaml::to_string(&merged)
        .map_err(|e| SarError::InvalidFormat(format!("Cannot serialize YAML: {}", e)))
}
