//! Environment snapshot
//!
//! The process environment is read exactly once, here. Everything else
//! (server registry, interpolation) receives an [`Environment`] value.

use std::collections::HashMap;

use crate::error::{Error, Result};

/// An immutable key-value view of the environment
#[derive(Clone, Default)]
pub struct Environment {
    vars: HashMap<String, String>,
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<_> = self.vars.keys().collect();
        keys.sort();
        f.debug_struct("Environment").field("keys", &keys).finish()
    }
}

impl Environment {
    /// Create an empty environment
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the current process environment
    pub fn from_process() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    /// Build an environment from explicit pairs
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Overlay dotenv text; existing keys win
    pub fn with_dotenv(mut self, text: &str) -> Result<Self> {
        for item in dotenvy::from_read_iter(text.as_bytes()) {
            let (key, value) = item.map_err(|e| Error::parse(format!("Invalid .env file: {}", e)))?;
            self.vars.entry(key).or_insert(value);
        }
        Ok(self)
    }

    /// Look up a variable
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    /// Check if a variable is set
    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    /// Set a variable, replacing any previous value
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_pairs_lookup() {
        let env = Environment::from_pairs([("ISLAND_HOST", "10.0.0.1")]);
        assert_eq!(env.get("ISLAND_HOST"), Some("10.0.0.1"));
        assert_eq!(env.get("ISLAND_USER"), None);
        assert!(env.contains("ISLAND_HOST"));
    }

    #[test]
    fn test_dotenv_overlay_does_not_override() {
        let env = Environment::from_pairs([("ISLAND_HOST", "from-process")])
            .with_dotenv("ISLAND_HOST=from-file\nISLAND_USER=admin\n")
            .unwrap();

        assert_eq!(env.get("ISLAND_HOST"), Some("from-process"));
        assert_eq!(env.get("ISLAND_USER"), Some("admin"));
    }

    #[test]
    fn test_dotenv_quotes_comments_export() {
        let text = r#"
# credentials
export ISLAND_PASS="s3cr3t=="
RAGNAROK_PASS='single'
EMPTY=
"#;
        let env = Environment::new().with_dotenv(text).unwrap();

        assert_eq!(env.get("ISLAND_PASS"), Some("s3cr3t=="));
        assert_eq!(env.get("RAGNAROK_PASS"), Some("single"));
        assert_eq!(env.get("EMPTY"), Some(""));
    }

    #[test]
    fn test_dotenv_inline_comment_and_escapes() {
        let text = "ISLAND_PASS=s3cret # rotated 2024\nMOTD=\"line one\\nline two\"\n";
        let env = Environment::new().with_dotenv(text).unwrap();

        assert_eq!(env.get("ISLAND_PASS"), Some("s3cret"));
        assert_eq!(env.get("MOTD"), Some("line one\nline two"));
    }

    #[test]
    fn test_dotenv_rejects_garbage() {
        let result = Environment::new().with_dotenv("NOT A PAIR");
        assert!(result.is_err());
    }

    #[test]
    fn test_debug_hides_values() {
        let env = Environment::from_pairs([("ISLAND_PASS", "hunter2")]);
        let debug = format!("{:?}", env);

        assert!(debug.contains("ISLAND_PASS"));
        assert!(!debug.contains("hunter2"));
    }
}
