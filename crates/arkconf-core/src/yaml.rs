//! YAML codec for hierarchical documents
//!
//! Include references are written with the `!include` tag:
//!
//! ```yaml
//! ServerSettings: !include GameUserSettings.ServerSettings.yml
//! ```

use serde_yaml::value::{Tag, TaggedValue};
use serde_yaml::{Mapping as YamlMapping, Number, Value};

use crate::error::{Error, Result};
use crate::value::{HierNode, Mapping, ScalarValue};

/// Tag marking an include reference
pub const INCLUDE_TAG: &str = "include";

/// Parse YAML text into a hierarchical document
///
/// An empty document is an empty mapping.
pub fn parse(text: &str) -> Result<HierNode> {
    let value: Value = serde_yaml::from_str(text).map_err(|e| Error::parse(e.to_string()))?;
    match value {
        Value::Null => Ok(HierNode::default()),
        other => from_value(other, ""),
    }
}

/// Serialize a hierarchical document as YAML text
pub fn to_string(node: &HierNode) -> Result<String> {
    serde_yaml::to_string(&to_value(node)).map_err(|e| Error::parse(e.to_string()))
}

/// Structural signature of a subtree; equal signatures mean equal trees
/// including key order
pub fn signature(node: &HierNode) -> String {
    format!("{:?}", node)
}

fn from_value(value: Value, path: &str) -> Result<HierNode> {
    Ok(match value {
        Value::Null => HierNode::string(""),
        Value::Bool(b) => HierNode::Scalar(ScalarValue::Bool(b)),
        Value::Number(n) => HierNode::Scalar(number_scalar(&n)),
        Value::String(s) => HierNode::string(s),
        Value::Sequence(items) => HierNode::Sequence(
            items
                .into_iter()
                .enumerate()
                .map(|(i, item)| from_value(item, &format!("{}[{}]", path, i)))
                .collect::<Result<Vec<_>>>()?,
        ),
        Value::Mapping(map) => {
            let mut out = Mapping::with_capacity(map.len());
            for (key, value) in map {
                let key = mapping_key(key).map_err(|e| e.with_path(path))?;
                let child = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", path, key)
                };
                let node = from_value(value, &child)?;
                out.insert(key, node);
            }
            HierNode::Mapping(out)
        }
        Value::Tagged(tagged) => {
            if tagged.tag != INCLUDE_TAG {
                return Err(Error::parse(format!("Unsupported YAML tag {}", tagged.tag))
                    .with_path(path));
            }
            match tagged.value {
                Value::String(p) if !p.trim().is_empty() => HierNode::IncludeRef(p.trim().to_string()),
                _ => {
                    return Err(Error::parse("!include expects a file path").with_path(path));
                }
            }
        }
    })
}

fn number_scalar(n: &Number) -> ScalarValue {
    if let Some(i) = n.as_i64() {
        ScalarValue::Int(i)
    } else if n.is_u64() {
        ScalarValue::String(n.to_string())
    } else {
        ScalarValue::Float(n.as_f64().unwrap_or(f64::NAN))
    }
}

fn mapping_key(key: Value) -> Result<String> {
    match key {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(number_scalar(&n).render()),
        Value::Bool(b) => Ok(ScalarValue::Bool(b).render()),
        other => Err(Error::parse(format!(
            "Mapping keys must be scalars, found {:?}",
            other
        ))),
    }
}

fn to_value(node: &HierNode) -> Value {
    match node {
        HierNode::Scalar(ScalarValue::String(s)) => Value::String(s.clone()),
        HierNode::Scalar(ScalarValue::Int(i)) => Value::Number(Number::from(*i)),
        HierNode::Scalar(ScalarValue::Float(f)) => Value::Number(Number::from(*f)),
        HierNode::Scalar(ScalarValue::Bool(b)) => Value::Bool(*b),
        HierNode::Sequence(items) => Value::Sequence(items.iter().map(to_value).collect()),
        HierNode::Mapping(map) => {
            let mut out = YamlMapping::with_capacity(map.len());
            for (key, value) in map {
                out.insert(key_value(key), to_value(value));
            }
            Value::Mapping(out)
        }
        HierNode::IncludeRef(path) => Value::Tagged(Box::new(TaggedValue {
            tag: Tag::new(INCLUDE_TAG),
            value: Value::String(path.clone()),
        })),
    }
}

/// Integer keys (indexed directives) are written as YAML numbers
fn key_value(key: &str) -> Value {
    match ScalarValue::infer(key) {
        ScalarValue::Int(i) => Value::Number(Number::from(i)),
        _ => Value::String(key.to_string()),
    }
}
