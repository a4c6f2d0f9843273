//! Typed access to nested descriptor metadata.

use serde_json::Value;

/// Path of the experiment label used to classify demultiplexed samples.
pub const EXPERIMENT_NAME_PATH: &[&str] = &["other", "experiment_name"];
/// Path of the organism attribute that must be uniform within a group.
pub const ORGANISM_PATH: &[&str] = &["sample", "organism"];

/// Why a descriptor field could not be read.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DescriptorError {
    #[error("descriptor field `{path}` is missing")]
    Missing { path: String },
    #[error("descriptor is malformed: `{path}` is {found}, expected an object")]
    NotAnObject { path: String, found: &'static str },
    #[error("descriptor field `{path}` is {found}, expected a string")]
    NotAString { path: String, found: &'static str },
    #[error("descriptor field `{path}` is empty")]
    Empty { path: String },
}

/// Read the string at `path` exactly as stored. Blank values are rejected.
pub fn lookup_str<'a>(descriptor: &'a Value, path: &[&str]) -> Result<&'a str, DescriptorError> {
    let mut current = descriptor;
    for (depth, key) in path.iter().enumerate() {
        let Some(object) = current.as_object() else {
            let parent = if depth == 0 {
                "descriptor".to_string()
            } else {
                dotted(&path[..depth])
            };
            return Err(DescriptorError::NotAnObject {
                path: parent,
                found: kind(current),
            });
        };
        current = object.get(*key).ok_or_else(|| DescriptorError::Missing {
            path: dotted(path),
        })?;
    }
    let text = current.as_str().ok_or_else(|| DescriptorError::NotAString {
        path: dotted(path),
        found: kind(current),
    })?;
    if text.trim().is_empty() {
        return Err(DescriptorError::Empty { path: dotted(path) });
    }
    Ok(text)
}

fn dotted(path: &[&str]) -> String {
    path.join(".")
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
