//! Parenthesized structured values
//!
//! ARK packs structured directives into a single INI value:
//!
//! ```text
//! ConfigOverrideItemMaxQuantity=(ItemClassString="PrimalItemResource_Stone_C",Quantity=(MaxItemQuantity=500,bIgnoreMultiplier=true))
//! ```
//!
//! `(Field=v,...)` decodes to a mapping and `(v,...)` to a sequence, nested
//! to any depth. Quoted strings keep their quotes. A value is only decoded
//! when rendering the result reproduces the original text exactly.

use crate::error::{Error, Result};
use crate::value::{HierNode, Mapping, ScalarValue};

const DELIMITERS: &[char] = &[',', '(', ')', '=', '"'];

/// Decode a parenthesized value, or `None` if `raw` is not one
pub fn decode(raw: &str) -> Option<HierNode> {
    if !raw.starts_with('(') {
        return None;
    }

    let mut parser = GroupParser { input: raw, pos: 0 };
    let node = parser.parse_group()?;
    if parser.pos != raw.len() {
        return None;
    }

    match render(&node, "") {
        Ok(text) if text == raw => Some(node),
        _ => None,
    }
}

/// Render a mapping or sequence as a parenthesized value
pub fn render(node: &HierNode, path: &str) -> Result<String> {
    match node {
        HierNode::Mapping(map) => {
            if map.is_empty() {
                return Err(Error::unrepresentable(path, "empty mapping inside a structured value"));
            }
            let mut parts = Vec::with_capacity(map.len());
            for (key, value) in map {
                if !is_field_name(key) {
                    return Err(Error::unrepresentable(
                        path,
                        format!("`{}` is not a valid field name", key),
                    ));
                }
                parts.push(format!("{}={}", key, render_element(value, &join(path, key))?));
            }
            Ok(format!("({})", parts.join(",")))
        }
        HierNode::Sequence(items) => {
            if items.is_empty() {
                return Err(Error::unrepresentable(path, "empty list inside a structured value"));
            }
            let parts = items
                .iter()
                .enumerate()
                .map(|(i, item)| render_element(item, &format!("{}[{}]", path, i)))
                .collect::<Result<Vec<_>>>()?;
            Ok(format!("({})", parts.join(",")))
        }
        other => render_element(other, path),
    }
}

fn render_element(node: &HierNode, path: &str) -> Result<String> {
    match node {
        HierNode::Scalar(scalar) => {
            let text = scalar.render();
            if matches!(scalar, ScalarValue::String(_)) && !is_atom(&text) {
                return Err(Error::unrepresentable(
                    path,
                    format!("string {:?} needs quoting inside a structured value", text),
                ));
            }
            Ok(text)
        }
        HierNode::Mapping(_) | HierNode::Sequence(_) => render(node, path),
        HierNode::IncludeRef(p) => Err(Error::unrepresentable(
            path,
            format!("unexpanded include `{}`", p),
        )),
    }
}

/// A field name starts with a letter or underscore
pub fn is_field_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Text that can stand alone inside a group
fn is_atom(text: &str) -> bool {
    if text.contains(['\n', '\r']) {
        return false;
    }
    if let Some(inner) = text.strip_prefix('"').and_then(|t| t.strip_suffix('"')) {
        return !inner.contains('"');
    }
    !text.contains(DELIMITERS)
}

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", path, key)
    }
}

struct GroupParser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> GroupParser<'a> {
    fn peek(&self) -> Option<u8> {
        self.input.as_bytes().get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    fn parse_group(&mut self) -> Option<HierNode> {
        if self.bump()? != b'(' {
            return None;
        }

        let mut fields: Vec<(String, HierNode)> = Vec::new();
        let mut items: Vec<HierNode> = Vec::new();

        loop {
            match self.field_name() {
                Some(name) => {
                    let value = self.parse_element()?;
                    fields.push((name, value));
                }
                None => items.push(self.parse_element()?),
            }
            match self.bump()? {
                b',' => continue,
                b')' => break,
                _ => return None,
            }
        }

        if !fields.is_empty() && !items.is_empty() {
            return None;
        }
        if items.is_empty() {
            let mut map = Mapping::with_capacity(fields.len());
            for (name, value) in fields {
                if map.insert(name, value).is_some() {
                    return None;
                }
            }
            Some(HierNode::Mapping(map))
        } else {
            Some(HierNode::Sequence(items))
        }
    }

    /// Consume `Name=` if present
    fn field_name(&mut self) -> Option<String> {
        let rest = &self.input[self.pos..];
        let end = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
        let name = &rest[..end];
        if !is_field_name(name) || rest.as_bytes().get(end) != Some(&b'=') {
            return None;
        }
        self.pos += end + 1;
        Some(name.to_string())
    }

    fn parse_element(&mut self) -> Option<HierNode> {
        match self.peek()? {
            b'(' => self.parse_group(),
            b'"' => {
                let rest = &self.input[self.pos + 1..];
                let close = rest.find('"')?;
                let text = &self.input[self.pos..self.pos + close + 2];
                self.pos += close + 2;
                Some(HierNode::string(text))
            }
            _ => {
                let rest = &self.input[self.pos..];
                let end = rest.find(DELIMITERS).unwrap_or(rest.len());
                match rest.as_bytes().get(end) {
                    Some(b',') | Some(b')') => {}
                    _ => return None,
                }
                self.pos += end;
                Some(HierNode::Scalar(ScalarValue::infer(&rest[..end])))
            }
        }
    }
}
