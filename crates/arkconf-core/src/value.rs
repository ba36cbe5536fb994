//! Hierarchical configuration values
//!
//! A [`HierNode`] tree is the in-memory form of one hierarchical (YAML)
//! document. Scalars are a closed set of kinds decided by a strict grammar
//! so that every scalar read from INI text re-renders byte-identically.

use std::fmt;
use std::sync::OnceLock;

use indexmap::IndexMap;
use regex::Regex;

use crate::error::{Error, Result};

/// Ordered mapping of keys to nodes
pub type Mapping = IndexMap<String, HierNode>;

/// A scalar value
///
/// Grammar (applied to INI literals by [`ScalarValue::infer`]):
/// - `Bool`: exactly `True` or `False`
/// - `Int`: `-?(0|[1-9][0-9]*)` that fits in an i64
/// - `Float`: `-?(0|[1-9][0-9]*)\.[0-9]+` whose shortest rendering is the literal
/// - `String`: anything else, kept verbatim
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

fn int_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^-?(0|[1-9][0-9]*)$").expect("valid int regex"))
}

fn float_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^-?(0|[1-9][0-9]*)\.[0-9]+$").expect("valid float regex"))
}

impl ScalarValue {
    /// Infer the scalar kind of a raw literal
    pub fn infer(raw: &str) -> Self {
        match raw {
            "True" => return ScalarValue::Bool(true),
            "False" => return ScalarValue::Bool(false),
            _ => {}
        }

        if int_re().is_match(raw) && raw != "-0" {
            if let Ok(i) = raw.parse::<i64>() {
                return ScalarValue::Int(i);
            }
        }

        if float_re().is_match(raw) {
            if let Ok(f) = raw.parse::<f64>() {
                if render_float(f) == raw {
                    return ScalarValue::Float(f);
                }
            }
        }

        ScalarValue::String(raw.to_string())
    }

    /// Render the scalar in INI form
    pub fn render(&self) -> String {
        match self {
            ScalarValue::String(s) => s.clone(),
            ScalarValue::Int(i) => i.to_string(),
            ScalarValue::Float(f) => render_float(*f),
            ScalarValue::Bool(true) => "True".to_string(),
            ScalarValue::Bool(false) => "False".to_string(),
        }
    }

    /// Returns the kind name of this scalar
    pub fn kind_name(&self) -> &'static str {
        match self {
            ScalarValue::String(_) => "string",
            ScalarValue::Int(_) => "integer",
            ScalarValue::Float(_) => "float",
            ScalarValue::Bool(_) => "boolean",
        }
    }
}

/// Floats render in shortest round-trip form, always with a fractional part
fn render_float(f: f64) -> String {
    format!("{:?}", f)
}

/// A node of a hierarchical document
#[derive(Debug, Clone, PartialEq)]
pub enum HierNode {
    /// Scalar leaf
    Scalar(ScalarValue),
    /// Ordered list
    Sequence(Vec<HierNode>),
    /// Ordered mapping
    Mapping(Mapping),
    /// Reference to an external include file (`!include path`)
    IncludeRef(String),
}

impl Default for HierNode {
    fn default() -> Self {
        HierNode::Mapping(Mapping::new())
    }
}

impl HierNode {
    /// Create a string scalar
    pub fn string(s: impl Into<String>) -> Self {
        HierNode::Scalar(ScalarValue::String(s.into()))
    }

    /// Check if this node is a scalar
    pub fn is_scalar(&self) -> bool {
        matches!(self, HierNode::Scalar(_))
    }

    /// Check if this node is a sequence
    pub fn is_sequence(&self) -> bool {
        matches!(self, HierNode::Sequence(_))
    }

    /// Check if this node is a mapping
    pub fn is_mapping(&self) -> bool {
        matches!(self, HierNode::Mapping(_))
    }

    /// Check if this node is an include reference
    pub fn is_include(&self) -> bool {
        matches!(self, HierNode::IncludeRef(_))
    }

    /// Get as scalar
    pub fn as_scalar(&self) -> Option<&ScalarValue> {
        match self {
            HierNode::Scalar(s) => Some(s),
            _ => None,
        }
    }

    /// Get as str if this is a string scalar
    pub fn as_str(&self) -> Option<&str> {
        match self {
            HierNode::Scalar(ScalarValue::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Get as i64 if this is an integer scalar
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            HierNode::Scalar(ScalarValue::Int(i)) => Some(*i),
            _ => None,
        }
    }

    /// Get as f64 if this is a float or integer scalar
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            HierNode::Scalar(ScalarValue::Float(f)) => Some(*f),
            HierNode::Scalar(ScalarValue::Int(i)) => Some(*i as f64),
            _ => None,
        }
    }

    /// Get as bool if this is a boolean scalar
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            HierNode::Scalar(ScalarValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    /// Get as slice if this is a sequence
    pub fn as_sequence(&self) -> Option<&[HierNode]> {
        match self {
            HierNode::Sequence(s) => Some(s),
            _ => None,
        }
    }

    /// Get as mapping if this is a mapping
    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            HierNode::Mapping(m) => Some(m),
            _ => None,
        }
    }

    /// Number of leaves (scalars and include references) in this subtree
    pub fn leaf_count(&self) -> usize {
        match self {
            HierNode::Scalar(_) | HierNode::IncludeRef(_) => 1,
            HierNode::Sequence(items) => items.iter().map(HierNode::leaf_count).sum(),
            HierNode::Mapping(map) => map.values().map(HierNode::leaf_count).sum(),
        }
    }

    /// Check whether any include reference remains in this subtree
    pub fn contains_include(&self) -> bool {
        match self {
            HierNode::IncludeRef(_) => true,
            HierNode::Scalar(_) => false,
            HierNode::Sequence(items) => items.iter().any(HierNode::contains_include),
            HierNode::Mapping(map) => map.values().any(HierNode::contains_include),
        }
    }

    /// Get a node by path (e.g., "ServerSettings.DifficultyOffset" or "Section.List[0]")
    pub fn get_path(&self, path: &str) -> Result<&HierNode> {
        if path.is_empty() {
            return Ok(self);
        }

        let segments = parse_path(path)?;
        let mut current = self;

        for segment in &segments {
            current = match segment {
                PathSegment::Key(key) => match current {
                    HierNode::Mapping(map) => map
                        .get(key.as_str())
                        .ok_or_else(|| Error::not_found(path))?,
                    _ => return Err(Error::not_found(path)),
                },
                PathSegment::Index(idx) => match current {
                    HierNode::Sequence(seq) => seq.get(*idx).ok_or_else(|| Error::not_found(path))?,
                    _ => return Err(Error::not_found(path)),
                },
            };
        }

        Ok(current)
    }

    /// Returns the type name of this node
    pub fn type_name(&self) -> &'static str {
        match self {
            HierNode::Scalar(s) => s.kind_name(),
            HierNode::Sequence(_) => "sequence",
            HierNode::Mapping(_) => "mapping",
            HierNode::IncludeRef(_) => "include",
        }
    }
}

impl fmt::Display for HierNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HierNode::Scalar(s) => write!(f, "{}", s.render()),
            HierNode::IncludeRef(p) => write!(f, "!include {}", p),
            HierNode::Sequence(seq) => {
                write!(f, "[")?;
                for (i, v) in seq.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            HierNode::Mapping(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<ScalarValue> for HierNode {
    fn from(s: ScalarValue) -> Self {
        HierNode::Scalar(s)
    }
}

impl From<bool> for HierNode {
    fn from(b: bool) -> Self {
        HierNode::Scalar(ScalarValue::Bool(b))
    }
}

impl From<i64> for HierNode {
    fn from(i: i64) -> Self {
        HierNode::Scalar(ScalarValue::Int(i))
    }
}

impl From<f64> for HierNode {
    fn from(f: f64) -> Self {
        HierNode::Scalar(ScalarValue::Float(f))
    }
}

impl From<&str> for HierNode {
    fn from(s: &str) -> Self {
        HierNode::string(s)
    }
}

impl From<String> for HierNode {
    fn from(s: String) -> Self {
        HierNode::string(s)
    }
}

impl From<Mapping> for HierNode {
    fn from(m: Mapping) -> Self {
        HierNode::Mapping(m)
    }
}

impl<T: Into<HierNode>> From<Vec<T>> for HierNode {
    fn from(v: Vec<T>) -> Self {
        HierNode::Sequence(v.into_iter().map(Into::into).collect())
    }
}

/// A segment in a path expression
#[derive(Debug, Clone, PartialEq)]
enum PathSegment {
    Key(String),
    Index(usize),
}

/// Parse a path string into segments
/// Supports: "key", "key.subkey", "key[0]", "key[0].subkey"
fn parse_path(path: &str) -> Result<Vec<PathSegment>> {
    let mut segments = Vec::new();
    let mut current_key = String::new();
    let mut chars = path.chars();

    while let Some(c) = chars.next() {
        match c {
            '.' => {
                if !current_key.is_empty() {
                    segments.push(PathSegment::Key(std::mem::take(&mut current_key)));
                }
            }
            '[' => {
                if !current_key.is_empty() {
                    segments.push(PathSegment::Key(std::mem::take(&mut current_key)));
                }
                let index_str: String = chars.by_ref().take_while(|&c| c != ']').collect();
                let idx: usize = index_str.parse().map_err(|_| {
                    Error::parse(format!("Invalid sequence index in path: {}", index_str))
                })?;
                segments.push(PathSegment::Index(idx));
            }
            ']' => {
                return Err(Error::parse("Unexpected ']' in path"));
            }
            _ => current_key.push(c),
        }
    }

    if !current_key.is_empty() {
        segments.push(PathSegment::Key(current_key));
    }

    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_bool_is_case_exact() {
        assert_eq!(ScalarValue::infer("True"), ScalarValue::Bool(true));
        assert_eq!(ScalarValue::infer("False"), ScalarValue::Bool(false));
        assert_eq!(ScalarValue::infer("true"), ScalarValue::String("true".into()));
        assert_eq!(ScalarValue::infer("FALSE"), ScalarValue::String("FALSE".into()));
    }

    #[test]
    fn test_infer_integers() {
        assert_eq!(ScalarValue::infer("70"), ScalarValue::Int(70));
        assert_eq!(ScalarValue::infer("-3"), ScalarValue::Int(-3));
        assert_eq!(ScalarValue::infer("0"), ScalarValue::Int(0));
        // Ambiguous spellings stay strings
        assert_eq!(ScalarValue::infer("007"), ScalarValue::String("007".into()));
        assert_eq!(ScalarValue::infer("+5"), ScalarValue::String("+5".into()));
        assert_eq!(ScalarValue::infer("-0"), ScalarValue::String("-0".into()));
        assert_eq!(
            ScalarValue::infer("99999999999999999999"),
            ScalarValue::String("99999999999999999999".into())
        );
    }

    #[test]
    fn test_infer_floats() {
        assert_eq!(ScalarValue::infer("1.5"), ScalarValue::Float(1.5));
        assert_eq!(ScalarValue::infer("1.0"), ScalarValue::Float(1.0));
        assert_eq!(ScalarValue::infer("-0.25"), ScalarValue::Float(-0.25));
        assert_eq!(ScalarValue::infer("1.000000"), ScalarValue::String("1.000000".into()));
        assert_eq!(ScalarValue::infer(".5"), ScalarValue::String(".5".into()));
        assert_eq!(ScalarValue::infer("1e5"), ScalarValue::String("1e5".into()));
    }

    #[test]
    fn test_render_inverts_infer() {
        for raw in ["True", "False", "12", "-7", "0.1", "2.5", "1.000000", "abc", "", "(a,b)"] {
            assert_eq!(ScalarValue::infer(raw).render(), raw, "literal {:?}", raw);
        }
    }

    #[test]
    fn test_render_yaml_sourced_values() {
        assert_eq!(ScalarValue::Float(3.0).render(), "3.0");
        assert_eq!(ScalarValue::Bool(true).render(), "True");
        assert_eq!(ScalarValue::Int(-12).render(), "-12");
    }

    #[test]
    fn test_get_path() {
        let mut settings = Mapping::new();
        settings.insert("DifficultyOffset".into(), HierNode::from(1.0));
        settings.insert("MaxPlayers".into(), HierNode::from(70i64));
        settings.insert(
            "Mods".into(),
            HierNode::from(vec!["731604991", "889745138"]),
        );
        let mut root = Mapping::new();
        root.insert("ServerSettings".into(), HierNode::Mapping(settings));
        let root = HierNode::Mapping(root);

        assert_eq!(
            root.get_path("ServerSettings.DifficultyOffset").unwrap().as_f64(),
            Some(1.0)
        );
        assert_eq!(root.get_path("ServerSettings.MaxPlayers").unwrap().as_i64(), Some(70));
        assert_eq!(
            root.get_path("ServerSettings.Mods[1]").unwrap().as_str(),
            Some("889745138")
        );
        assert!(root.get_path("ServerSettings.Missing").is_err());
        assert!(root.get_path("ServerSettings.Mods[x]").is_err());
    }

    #[test]
    fn test_leaf_count_and_includes() {
        let mut inner = Mapping::new();
        inner.insert("A".into(), HierNode::from(1i64));
        inner.insert("B".into(), HierNode::IncludeRef("b.yml".into()));
        let node = HierNode::Sequence(vec![HierNode::Mapping(inner), HierNode::from("x")]);

        assert_eq!(node.leaf_count(), 3);
        assert!(node.contains_include());
        assert!(!HierNode::from("x").contains_include());
    }

    #[test]
    fn test_type_names() {
        assert_eq!(HierNode::from(true).type_name(), "boolean");
        assert_eq!(HierNode::from(1i64).type_name(), "integer");
        assert_eq!(HierNode::from(1.5).type_name(), "float");
        assert_eq!(HierNode::from("s").type_name(), "string");
        assert_eq!(HierNode::Sequence(vec![]).type_name(), "sequence");
        assert_eq!(HierNode::default().type_name(), "mapping");
        assert_eq!(HierNode::IncludeRef("x".into()).type_name(), "include");
    }
}
