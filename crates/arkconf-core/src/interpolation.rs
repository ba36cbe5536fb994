//! Variable interpolation
//!
//! Recognizes:
//! - `${NAME}` - environment variable, NAME is `[A-Za-z_][A-Za-z0-9_]*`
//! - `\${` - escaped (literal) `${`
//!
//! Any other `$` (including `${` not followed by a valid name and `}`)
//! passes through unchanged. [`escape`] is the inverse of [`interpolate`]:
//! interpolating an escaped string gives back the original text.

use crate::env::Environment;
use crate::error::{Error, Result};
use crate::value::{HierNode, ScalarValue};

/// A parsed piece of an interpolated string
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// Literal text
    Literal(String),
    /// A `${NAME}` placeholder
    Variable(String),
}

/// Parser for interpolation expressions
pub struct InterpolationParser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> InterpolationParser<'a> {
    /// Create a new parser for the given input
    pub fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    /// Parse the entire input into segments; adjacent literals are merged
    pub fn parse(&mut self) -> Vec<Segment> {
        let mut segments: Vec<Segment> = Vec::new();

        while !self.is_eof() {
            if self.check_escape() {
                self.pos += "\\${".len();
                push_literal(&mut segments, "${");
            } else if let Some(name) = self.try_placeholder() {
                segments.push(Segment::Variable(name));
            } else {
                let literal = self.collect_literal();
                push_literal(&mut segments, &literal);
            }
        }

        segments
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    /// Check if we're at an escape sequence (\${)
    fn check_escape(&self) -> bool {
        self.rest().starts_with("\\${")
    }

    /// Consume `${NAME}` if it is well formed
    fn try_placeholder(&mut self) -> Option<String> {
        let body = self.rest().strip_prefix("${")?;
        let end = body.find('}')?;
        let name = &body[..end];
        if !is_variable_name(name) {
            return None;
        }
        self.pos += 2 + end + 1;
        Some(name.to_string())
    }

    /// Collect literal text up to the next escape or `$`
    fn collect_literal(&mut self) -> String {
        let rest = self.rest();
        // Always consume at least one character so a stray `$` or `\` advances
        let mut chars = rest.char_indices();
        let first_len = chars.next().map(|(_, c)| c.len_utf8()).unwrap_or(0);
        let end = rest[first_len..]
            .find(['$', '\\'])
            .map(|i| i + first_len)
            .unwrap_or(rest.len());
        self.pos += end;
        rest[..end].to_string()
    }
}

fn push_literal(segments: &mut Vec<Segment>, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(Segment::Literal(prev)) = segments.last_mut() {
        prev.push_str(text);
    } else {
        segments.push(Segment::Literal(text.to_string()));
    }
}

/// Check that `name` matches `[A-Za-z_][A-Za-z0-9_]*`
pub fn is_variable_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Parse a string into segments
pub fn parse(input: &str) -> Vec<Segment> {
    InterpolationParser::new(input).parse()
}

/// Check if a string contains any `${NAME}` placeholder
pub fn contains_interpolation(input: &str) -> bool {
    parse(input)
        .iter()
        .any(|s| matches!(s, Segment::Variable(_)))
}

/// Check if a string needs processing (placeholders or escapes)
pub fn needs_processing(input: &str) -> bool {
    input.contains("${")
}

/// Substitute every placeholder in `input` from `env`
///
/// Fails with `UnresolvedVariable` naming the first missing variable.
pub fn interpolate(input: &str, env: &Environment) -> Result<String> {
    if !needs_processing(input) {
        return Ok(input.to_string());
    }

    let mut out = String::with_capacity(input.len());
    for segment in parse(input) {
        match segment {
            Segment::Literal(text) => out.push_str(&text),
            Segment::Variable(name) => match env.get(&name) {
                Some(value) => out.push_str(value),
                None => return Err(Error::unresolved_variable(name)),
            },
        }
    }
    Ok(out)
}

/// Make every `${` in `input` literal
pub fn escape(input: &str) -> String {
    input.replace("${", "\\${")
}

/// Escape every string scalar in a tree, in place
pub fn escape_node(node: &mut HierNode) {
    match node {
        HierNode::Scalar(ScalarValue::String(s)) => {
            if needs_processing(s) {
                *s = escape(s);
            }
        }
        HierNode::Scalar(_) | HierNode::IncludeRef(_) => {}
        HierNode::Sequence(items) => items.iter_mut().for_each(escape_node),
        HierNode::Mapping(map) => map.values_mut().for_each(escape_node),
    }
}

/// Interpolate every string scalar in a tree, in place
///
/// Substituted text keeps the string kind; it is not re-inferred.
pub fn interpolate_node(node: &mut HierNode, env: &Environment) -> Result<()> {
    interpolate_at(node, env, "")
}

fn interpolate_at(node: &mut HierNode, env: &Environment, path: &str) -> Result<()> {
    match node {
        HierNode::Scalar(ScalarValue::String(s)) => {
            if needs_processing(s) {
                *s = interpolate(s, env).map_err(|e| e.with_path(path))?;
            }
            Ok(())
        }
        HierNode::Scalar(_) | HierNode::IncludeRef(_) => Ok(()),
        HierNode::Sequence(items) => {
            for (i, item) in items.iter_mut().enumerate() {
                interpolate_at(item, env, &format!("{}[{}]", path, i))?;
            }
            Ok(())
        }
        HierNode::Mapping(map) => {
            for (key, value) in map.iter_mut() {
                let child = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", path, key)
                };
                interpolate_at(value, env, &child)?;
            }
            Ok(())
        }
    }
}
