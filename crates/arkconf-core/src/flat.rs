//! Flat (INI) document model
//!
//! Grammar:
//! - lines are trimmed, empty lines are insignificant
//! - `;` starts a comment line, kept verbatim
//! - `[name]` opens a section (a repeated header continues it)
//! - `key=value` splits on the first `=`, both sides trimmed
//!
//! Keys may repeat inside a section. A key never starts with `[` and a
//! section name never starts with `;`.

use crate::error::{Error, Result, SourceLocation};

/// Line terminator used when serializing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineEnding {
    #[default]
    Lf,
    CrLf,
}

impl LineEnding {
    /// Detect the terminator of the first line break in `text`
    pub fn detect(text: &str) -> Self {
        match text.find('\n') {
            Some(i) if i > 0 && text.as_bytes()[i - 1] == b'\r' => LineEnding::CrLf,
            _ => LineEnding::Lf,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
        }
    }
}

/// One line inside a section
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlatLine {
    Entry { key: String, value: String },
    /// Full comment line including the leading `;`
    Comment(String),
}

/// A named section with its lines in file order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatSection {
    pub name: String,
    pub lines: Vec<FlatLine>,
}

impl FlatSection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lines: Vec::new(),
        }
    }

    pub fn push_entry(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.lines.push(FlatLine::Entry {
            key: key.into(),
            value: value.into(),
        });
    }

    pub fn push_comment(&mut self, comment: impl Into<String>) {
        self.lines.push(FlatLine::Comment(comment.into()));
    }

    /// Iterate over `(key, value)` entries, skipping comments
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.lines.iter().filter_map(|line| match line {
            FlatLine::Entry { key, value } => Some((key.as_str(), value.as_str())),
            FlatLine::Comment(_) => None,
        })
    }

    /// All values recorded for `key`, in order
    pub fn values<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries().filter(move |(k, _)| *k == key).map(|(_, v)| v)
    }
}

/// An ordered INI document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlatDocument {
    /// Comment lines before the first section
    pub preamble: Vec<String>,
    pub sections: Vec<FlatSection>,
}

impl FlatDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse INI text
    pub fn parse(text: &str) -> Result<Self> {
        let mut doc = FlatDocument::new();
        let mut current: Option<usize> = None;

        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim();

            if line.is_empty() {
                continue;
            }

            if line.starts_with(';') {
                match current {
                    Some(i) => doc.sections[i].push_comment(line),
                    None => doc.preamble.push(line.to_string()),
                }
                continue;
            }

            if let Some(name) = section_header(line) {
                if name.starts_with(';') {
                    return Err(malformed(line_no, format!("section name `{}` cannot start with `;`", name)));
                }
                current = Some(doc.section_index_or_insert(name));
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                return Err(malformed(line_no, "expected `key=value` or `[section]`"));
            };
            let key = key.trim();
            if key.is_empty() {
                return Err(malformed(line_no, "empty key"));
            }
            if key.starts_with('[') {
                return Err(malformed(line_no, format!("unterminated section header `{}`", key)));
            }
            let Some(i) = current else {
                return Err(malformed(line_no, format!("entry `{}` before any section", key)));
            };
            doc.sections[i].push_entry(key, value.trim());
        }

        Ok(doc)
    }

    /// Serialize in canonical form
    ///
    /// The preamble and each section are separated by one blank line and
    /// the text ends with a line terminator.
    pub fn to_text(&self, ending: LineEnding) -> String {
        let nl = ending.as_str();
        let mut blocks: Vec<String> = Vec::new();

        if !self.preamble.is_empty() {
            let mut block = String::new();
            for comment in &self.preamble {
                block.push_str(comment);
                block.push_str(nl);
            }
            blocks.push(block);
        }

        for section in &self.sections {
            let mut block = format!("[{}]{}", section.name, nl);
            for line in &section.lines {
                match line {
                    FlatLine::Entry { key, value } => {
                        block.push_str(key);
                        block.push('=');
                        block.push_str(value);
                    }
                    FlatLine::Comment(c) => block.push_str(c),
                }
                block.push_str(nl);
            }
            blocks.push(block);
        }

        blocks.join(nl)
    }

    pub fn section(&self, name: &str) -> Option<&FlatSection> {
        self.sections.iter().find(|s| s.name == name)
    }

    /// Get a section, appending an empty one if absent
    pub fn section_mut(&mut self, name: &str) -> &mut FlatSection {
        let i = self.section_index_or_insert(name);
        &mut self.sections[i]
    }

    fn section_index_or_insert(&mut self, name: &str) -> usize {
        match self.sections.iter().position(|s| s.name == name) {
            Some(i) => i,
            None => {
                self.sections.push(FlatSection::new(name));
                self.sections.len() - 1
            }
        }
    }
}

fn section_header(line: &str) -> Option<&str> {
    let inner = line.strip_prefix('[')?.strip_suffix(']')?;
    if inner.is_empty() {
        None
    } else {
        Some(inner)
    }
}

fn malformed(line: usize, message: impl Into<String>) -> Error {
    Error::malformed_flat(line, message).with_source_location(SourceLocation::line("<input>", line))
}
