//! Flat ↔ hierarchical transcoding
//!
//! Encoding of a section's lines as a mapping:
//!
//! | INI                           | YAML                              |
//! |-------------------------------|-----------------------------------|
//! | `Key=v`                       | `Key: v`                          |
//! | `Key=a` `Key=b` (repeated)    | `Key: [a, b]`                     |
//! | `Key[0]=a` `Key[3]=b`         | `Key: {0: a, 3: b}`               |
//! | `Key=(A=1,B=(2,3))`           | `Key: {A: 1, B: [2, 3]}`          |
//! | `Key=(1,2)` (single)          | `Key: [[1, 2]]`                   |
//! | `;comment`                    | `;1: comment`                     |
//!
//! Repeated and indexed keys are grouped at their first occurrence.

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use indexmap::IndexMap;
use regex::Regex;

use crate::error::{Error, Result};
use crate::flat::{FlatDocument, FlatLine, FlatSection};
use crate::group;
use crate::value::{HierNode, Mapping, ScalarValue};

fn indexed_key_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(.+)\[(0|[1-9][0-9]*)\]$").expect("valid indexed key regex"))
}

fn comment_key_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^;[1-9][0-9]*$").expect("valid comment key regex"))
}

/// Reserved key holding the `n`th comment of a section (1-based)
pub fn comment_key(n: usize) -> String {
    format!(";{}", n)
}

/// Check whether a key is a reserved comment key
pub fn is_comment_key(key: &str) -> bool {
    comment_key_re().is_match(key)
}

fn split_indexed(key: &str) -> Option<(&str, u64)> {
    let caps = indexed_key_re().captures(key)?;
    let base = caps.get(1)?.as_str();
    let index = caps.get(2)?.as_str().parse().ok()?;
    Some((base, index))
}

/// Decode one raw INI value
fn decode_value(raw: &str) -> HierNode {
    group::decode(raw).unwrap_or_else(|| HierNode::Scalar(ScalarValue::infer(raw)))
}

enum Slot {
    Plain(Vec<HierNode>),
    Indexed(Mapping),
    Comment(String),
}

/// Convert a flat document into a hierarchical one
pub fn to_hier(doc: &FlatDocument) -> Result<HierNode> {
    let mut root = Mapping::new();

    for (i, comment) in doc.preamble.iter().enumerate() {
        root.insert(comment_key(i + 1), HierNode::string(strip_comment(comment)));
    }

    for section in &doc.sections {
        if is_comment_key(&section.name) {
            return Err(Error::unrepresentable(
                section.name.as_str(),
                "section name collides with a comment key",
            ));
        }
        root.insert(section.name.clone(), section_to_hier(section));
    }

    Ok(HierNode::Mapping(root))
}

fn section_to_hier(section: &FlatSection) -> HierNode {
    let indexed_bases = decodable_indexed_bases(section);
    let mut slots: IndexMap<String, Slot> = IndexMap::new();
    let mut comments = 0;

    for line in &section.lines {
        match line {
            FlatLine::Comment(text) => {
                comments += 1;
                slots.insert(
                    comment_key(comments),
                    Slot::Comment(strip_comment(text).to_string()),
                );
            }
            FlatLine::Entry { key, value } => {
                let node = decode_value(value);
                match split_indexed(key) {
                    Some((base, index)) if indexed_bases.contains(base) => {
                        let slot = slots
                            .entry(base.to_string())
                            .or_insert_with(|| Slot::Indexed(Mapping::new()));
                        if let Slot::Indexed(map) = slot {
                            map.insert(index.to_string(), node);
                        }
                    }
                    _ => {
                        let slot = slots
                            .entry(key.clone())
                            .or_insert_with(|| Slot::Plain(Vec::new()));
                        if let Slot::Plain(values) = slot {
                            values.push(node);
                        }
                    }
                }
            }
        }
    }

    let mut out = Mapping::with_capacity(slots.len());
    for (key, slot) in slots {
        let node = match slot {
            Slot::Comment(text) => HierNode::string(text),
            Slot::Indexed(map) => HierNode::Mapping(map),
            Slot::Plain(mut values) => {
                if values.len() == 1 && !values[0].is_sequence() {
                    values.remove(0)
                } else {
                    HierNode::Sequence(values)
                }
            }
        };
        out.insert(key, node);
    }
    HierNode::Mapping(out)
}

/// Bases of `Key[N]` entries that can become an index mapping: no plain
/// `Key` entry in the section and no index used twice
fn decodable_indexed_bases(section: &FlatSection) -> HashSet<&str> {
    let plain: HashSet<&str> = section.entries().map(|(k, _)| k).collect();
    let mut seen: HashMap<&str, HashSet<u64>> = HashMap::new();
    let mut rejected: HashSet<&str> = HashSet::new();

    for (key, _) in section.entries() {
        if let Some((base, index)) = split_indexed(key) {
            if plain.contains(base) || !seen.entry(base).or_default().insert(index) {
                rejected.insert(base);
            }
        }
    }

    seen.into_keys().filter(|b| !rejected.contains(b)).collect()
}

fn strip_comment(line: &str) -> &str {
    line.strip_prefix(';').unwrap_or(line)
}

/// Convert a fully expanded hierarchical document into a flat one
pub fn to_flat(node: &HierNode) -> Result<FlatDocument> {
    let HierNode::Mapping(root) = node else {
        return Err(Error::unrepresentable(
            "",
            format!("document root must be a mapping, found {}", node.type_name()),
        ));
    };

    let mut doc = FlatDocument::new();

    for (name, value) in root {
        if is_comment_key(name) {
            doc.preamble.push(format!(";{}", comment_text(value, name)?));
            continue;
        }
        check_name(name, name, "section name")?;

        let HierNode::Mapping(entries) = value else {
            return Err(Error::unrepresentable(
                name.as_str(),
                format!("section must be a mapping, found {}", value.type_name()),
            ));
        };

        let section = doc.section_mut(name);
        for (key, value) in entries {
            let path = format!("{}.{}", name, key);
            flatten_entry(section, key, value, &path)?;
        }
    }

    Ok(doc)
}

fn flatten_entry(section: &mut FlatSection, key: &str, value: &HierNode, path: &str) -> Result<()> {
    if is_comment_key(key) {
        section.push_comment(format!(";{}", comment_text(value, path)?));
        return Ok(());
    }
    check_name(key, path, "key")?;
    if key.contains('=') || key.starts_with(';') || key.starts_with('[') {
        return Err(Error::unrepresentable(path, format!("key `{}` cannot be written as INI", key)));
    }

    match value {
        HierNode::Sequence(items) => {
            for (i, item) in items.iter().enumerate() {
                let text = render_value(item, &format!("{}[{}]", path, i))?;
                section.push_entry(key, text);
            }
        }
        HierNode::Mapping(map) if is_index_mapping(map) => {
            for (index, item) in map {
                let text = render_value(item, &format!("{}.{}", path, index))?;
                section.push_entry(format!("{}[{}]", key, index), text);
            }
        }
        HierNode::Mapping(map) if map.keys().any(|k| is_index_key(k)) => {
            return Err(Error::unrepresentable(
                path,
                "mapping mixes index keys with field names",
            ));
        }
        other => {
            let text = render_value(other, path)?;
            section.push_entry(key, text);
        }
    }
    Ok(())
}

/// Render a node as a single INI value
fn render_value(node: &HierNode, path: &str) -> Result<String> {
    match node {
        HierNode::Scalar(scalar) => {
            let text = scalar.render();
            if text.contains(['\n', '\r']) {
                return Err(Error::unrepresentable(path, "multi-line string"));
            }
            Ok(text)
        }
        HierNode::Mapping(_) | HierNode::Sequence(_) => group::render(node, path),
        HierNode::IncludeRef(p) => Err(Error::unrepresentable(
            path,
            format!("unexpanded include `{}`", p),
        )),
    }
}

fn comment_text(value: &HierNode, path: &str) -> Result<String> {
    match value {
        HierNode::Scalar(scalar) => {
            let text = scalar.render();
            if text.contains(['\n', '\r']) {
                return Err(Error::unrepresentable(path, "multi-line comment"));
            }
            Ok(text)
        }
        other => Err(Error::unrepresentable(
            path,
            format!("comment must be a scalar, found {}", other.type_name()),
        )),
    }
}

fn check_name(name: &str, path: &str, what: &str) -> Result<()> {
    if name.is_empty() || name.trim() != name || name.contains(['\n', '\r']) {
        return Err(Error::unrepresentable(path, format!("invalid {} {:?}", what, name)));
    }
    Ok(())
}

fn is_index_key(key: &str) -> bool {
    key == "0" || (!key.starts_with('0') && !key.is_empty() && key.bytes().all(|b| b.is_ascii_digit()))
}

fn is_index_mapping(map: &Mapping) -> bool {
    !map.is_empty() && map.keys().all(|k| is_index_key(k))
}
