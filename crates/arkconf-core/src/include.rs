//! Include expansion and extraction
//!
//! `expand` replaces every `!include path` with the parsed content of
//! `<includes dir>/<path>`, recursively. `extract` goes the other way:
//! sub-trees that several server documents share verbatim are moved into
//! include files and replaced by references.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::storage::Storage;
use crate::transcode::is_comment_key;
use crate::value::HierNode;
use crate::yaml;

/// Expands include references against a directory in storage
pub struct IncludeResolver<'a> {
    storage: &'a dyn Storage,
    base: PathBuf,
}

impl<'a> IncludeResolver<'a> {
    /// Create a resolver reading include files under `base`
    pub fn new(storage: &'a dyn Storage, base: impl Into<PathBuf>) -> Self {
        Self {
            storage,
            base: base.into(),
        }
    }

    /// Return a copy of `node` with every include reference expanded
    pub fn expand(&self, node: &HierNode) -> Result<HierNode> {
        let mut stack = Vec::new();
        self.expand_inner(node, &mut stack)
    }

    fn expand_inner(&self, node: &HierNode, stack: &mut Vec<String>) -> Result<HierNode> {
        match node {
            HierNode::IncludeRef(path) => self.load(path, stack),
            HierNode::Scalar(_) => Ok(node.clone()),
            HierNode::Sequence(items) => Ok(HierNode::Sequence(
                items
                    .iter()
                    .map(|item| self.expand_inner(item, stack))
                    .collect::<Result<Vec<_>>>()?,
            )),
            HierNode::Mapping(map) => {
                let mut out = map.clone();
                for (key, value) in map {
                    if value.contains_include() {
                        out.insert(key.clone(), self.expand_inner(value, stack)?);
                    }
                }
                Ok(HierNode::Mapping(out))
            }
        }
    }

    fn load(&self, path: &str, stack: &mut Vec<String>) -> Result<HierNode> {
        let path = normalize(path)?;

        if let Some(pos) = stack.iter().position(|p| *p == path) {
            let mut chain = stack[pos..].to_vec();
            chain.push(path);
            return Err(Error::include_cycle(chain));
        }

        let file = self.base.join(&path);
        let bytes = self.storage.read(&file).map_err(|e| {
            if e.is_not_found() {
                Error::include_not_found(path.clone())
            } else {
                e
            }
        })?;
        let text = String::from_utf8(bytes)
            .map_err(|e| Error::parse(format!("Invalid UTF-8: {}", e)).in_file(file.display().to_string()))?;
        let parsed = yaml::parse(&text).map_err(|e| e.in_file(file.display().to_string()))?;

        log::debug!("Expanding include {}", path);
        stack.push(path);
        let expanded = self.expand_inner(&parsed, stack);
        stack.pop();
        expanded
    }
}

/// Normalize an include path: `./` segments dropped, `/` separators
///
/// The path must name a file inside the includes directory: absolute
/// paths and `..` segments are rejected.
pub(crate) fn normalize(path: &str) -> Result<String> {
    let mut parts = Vec::new();
    for component in Path::new(path.trim()).components() {
        match component {
            Component::CurDir => {}
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(Error::include_not_found(path.trim())
                    .with_help("Include paths must stay inside the includes directory"));
            }
        }
    }
    if parts.is_empty() {
        return Err(Error::include_not_found(path.trim()));
    }
    Ok(parts.join("/"))
}

/// Include references in `node`, normalized, in document order
pub(crate) fn references(node: &HierNode) -> Vec<String> {
    let mut found = Vec::new();
    collect_references(node, &mut found);
    found
}

fn collect_references(node: &HierNode, found: &mut Vec<String>) {
    match node {
        HierNode::IncludeRef(path) => {
            if let Ok(path) = normalize(path) {
                found.push(path);
            }
        }
        HierNode::Scalar(_) => {}
        HierNode::Sequence(items) => items.iter().for_each(|i| collect_references(i, found)),
        HierNode::Mapping(map) => map.values().for_each(|v| collect_references(v, found)),
    }
}

/// Which shared sub-trees `extract` factors out
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractPolicy {
    /// Turn extraction on or off
    pub enabled: bool,
    /// Minimum number of documents that must share a sub-tree
    pub min_documents: usize,
    /// Minimum number of leaves in a shared sub-tree
    pub min_leaves: usize,
    /// Consider whole sections
    pub sections: bool,
    /// Consider individual entries of sections
    pub entries: bool,
}

impl Default for ExtractPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            min_documents: 2,
            min_leaves: 2,
            sections: true,
            entries: true,
        }
    }
}

/// Result of extracting shared sub-trees
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    /// The input documents, with shared sub-trees replaced by references
    pub documents: Vec<HierNode>,
    /// Include file name to content, in creation order
    pub includes: IndexMap<String, HierNode>,
}

/// Factor sub-trees shared by several documents into include files
///
/// `stem` names the configured file the documents came from (e.g.
/// `GameUserSettings`) and prefixes every include file name. Whole
/// sections are considered before the entries inside them.
pub fn extract(documents: Vec<HierNode>, stem: &str, policy: &ExtractPolicy) -> Extraction {
    let mut extraction = Extraction {
        documents,
        includes: IndexMap::new(),
    };

    if !policy.enabled || extraction.documents.len() < policy.min_documents.max(1) {
        return extraction;
    }

    let mut names = HashSet::new();

    if policy.sections {
        for section in section_names(&extraction.documents) {
            let stem_name = format!("{}.{}", stem, slug(&section));
            extract_at(&mut extraction, policy, &mut names, &stem_name, |doc| {
                doc_mapping(doc)?.get_mut(section.as_str())
            });
        }
    }

    if policy.entries {
        for (section, key) in entry_names(&extraction.documents) {
            let stem_name = format!("{}.{}.{}", stem, slug(&section), slug(&key));
            extract_at(&mut extraction, policy, &mut names, &stem_name, |doc| {
                match doc_mapping(doc)?.get_mut(section.as_str())? {
                    HierNode::Mapping(entries) => entries.get_mut(key.as_str()),
                    _ => None,
                }
            });
        }
    }

    extraction
}

/// Replace the node found by `locate` in every document sharing it
fn extract_at<F>(
    extraction: &mut Extraction,
    policy: &ExtractPolicy,
    names: &mut HashSet<String>,
    stem_name: &str,
    locate: F,
) where
    F: Fn(&mut HierNode) -> Option<&mut HierNode>,
{
    // signature -> (node, indices of documents holding it)
    let mut groups: IndexMap<String, (HierNode, Vec<usize>)> = IndexMap::new();
    for (i, doc) in extraction.documents.iter_mut().enumerate() {
        let Some(node) = locate(doc) else { continue };
        if node.is_include() || node.is_scalar() {
            continue;
        }
        groups
            .entry(yaml::signature(node))
            .or_insert_with(|| (node.clone(), Vec::new()))
            .1
            .push(i);
    }

    for (_, (node, holders)) in groups {
        if holders.len() < policy.min_documents || node.leaf_count() < policy.min_leaves {
            continue;
        }

        let name = unique_name(names, stem_name);
        log::info!("Extracting {} shared by {} documents", name, holders.len());
        for i in holders {
            if let Some(slot) = locate(&mut extraction.documents[i]) {
                *slot = HierNode::IncludeRef(name.clone());
            }
        }
        extraction.includes.insert(name, node);
    }
}

fn doc_mapping(doc: &mut HierNode) -> Option<&mut IndexMap<String, HierNode>> {
    match doc {
        HierNode::Mapping(map) => Some(map),
        _ => None,
    }
}

/// Section names across all documents, first-seen order
fn section_names(documents: &[HierNode]) -> Vec<String> {
    let mut seen = IndexMap::new();
    for doc in documents {
        if let HierNode::Mapping(map) = doc {
            for (name, value) in map {
                if !is_comment_key(name) && value.is_mapping() {
                    seen.insert(name.clone(), ());
                }
            }
        }
    }
    seen.into_keys().collect()
}

/// `(section, key)` pairs of structured entries across all documents
fn entry_names(documents: &[HierNode]) -> Vec<(String, String)> {
    let mut seen = IndexMap::new();
    for doc in documents {
        let HierNode::Mapping(map) = doc else { continue };
        for (name, section) in map {
            let HierNode::Mapping(entries) = section else { continue };
            for (key, value) in entries {
                if !is_comment_key(key) && !value.is_scalar() && !value.is_include() {
                    seen.insert((name.clone(), key.clone()), ());
                }
            }
        }
    }
    seen.into_keys().collect()
}

fn unique_name(names: &mut HashSet<String>, stem_name: &str) -> String {
    let mut candidate = format!("{}.yml", stem_name);
    let mut n = 2;
    while names.contains(&candidate) {
        candidate = format!("{}-{}.yml", stem_name, n);
        n += 1;
    }
    names.insert(candidate.clone());
    candidate
}

/// File-name-safe form of a section or key name
pub fn slug(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                c
            } else {
                '-'
            }
        })
        .collect();
    let trimmed = replaced.trim_matches(|c| c == '-' || c == '.');
    if trimmed.is_empty() {
        "section".to_string()
    } else {
        trimmed.to_string()
    }
}
