//! Error types for arkconf
//!
//! Errors are structured: a kind, optional location context (config path,
//! file and line) and an actionable help message.

use std::fmt;

/// Result type alias for arkconf operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for arkconf operations
#[derive(Debug, Clone)]
pub struct Error {
    /// The kind of error that occurred
    pub kind: ErrorKind,
    /// Location inside a document (e.g., "ServerSettings.DifficultyOffset")
    pub path: Option<String>,
    /// Source location (file, line) if available
    pub source_location: Option<SourceLocation>,
    /// Actionable help message
    pub help: Option<String>,
    /// Underlying cause (as string for Clone compatibility)
    pub cause: Option<String>,
}

/// Location in a source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: String,
    pub line: Option<usize>,
}

impl SourceLocation {
    pub fn file(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            line: None,
        }
    }

    pub fn line(file: impl Into<String>, line: usize) -> Self {
        Self {
            file: file.into(),
            line: Some(line),
        }
    }
}

/// Categories of errors that can occur
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// A `${NAME}` placeholder has no value in the environment
    UnresolvedVariable { name: String },
    /// An include chain loops back onto itself
    IncludeCycle { chain: Vec<String> },
    /// An include reference points at a missing file
    IncludeNotFound { path: String },
    /// Flat (INI) text could not be parsed
    MalformedFlatSyntax { line: usize },
    /// A hierarchical node has no flat encoding
    UnrepresentableStructure,
    /// A server has only part of its host/user/credential triple
    IncompleteServerConfig {
        server: String,
        missing: Vec<String>,
    },
    /// A selected server name is not a recognized server
    UnknownServerSelected { name: String },
    /// Error parsing YAML or decoding text
    Parse,
    /// A storage path does not exist
    NotFound { path: String },
    /// Invalid project configuration
    Config,
    /// I/O error
    Io,
    /// Internal error (bug in arkconf)
    Internal,
}

impl ErrorKind {
    /// Stable snake_case name, used in JSON reports
    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::UnresolvedVariable { .. } => "unresolved_variable",
            ErrorKind::IncludeCycle { .. } => "include_cycle",
            ErrorKind::IncludeNotFound { .. } => "include_not_found",
            ErrorKind::MalformedFlatSyntax { .. } => "malformed_flat_syntax",
            ErrorKind::UnrepresentableStructure => "unrepresentable_structure",
            ErrorKind::IncompleteServerConfig { .. } => "incomplete_server_config",
            ErrorKind::UnknownServerSelected { .. } => "unknown_server_selected",
            ErrorKind::Parse => "parse",
            ErrorKind::NotFound { .. } => "not_found",
            ErrorKind::Config => "config",
            ErrorKind::Io => "io",
            ErrorKind::Internal => "internal",
        }
    }
}

impl Error {
    fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            path: None,
            source_location: None,
            help: None,
            cause: None,
        }
    }

    /// Create a parse error
    pub fn parse(message: impl Into<String>) -> Self {
        Self {
            cause: Some(message.into()),
            ..Self::new(ErrorKind::Parse)
        }
    }

    /// Create an unresolved variable error
    pub fn unresolved_variable(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            help: Some(format!(
                "Set {} in the environment or .env file, or write \\${{{}}} for a literal placeholder",
                name, name
            )),
            ..Self::new(ErrorKind::UnresolvedVariable { name })
        }
    }

    /// Create an include cycle error
    pub fn include_cycle(chain: Vec<String>) -> Self {
        let chain_str = chain.join(" → ");
        Self {
            help: Some("Break the cycle by removing one of the !include references".into()),
            cause: Some(format!("Chain: {}", chain_str)),
            ..Self::new(ErrorKind::IncludeCycle { chain })
        }
    }

    /// Create an include not found error
    pub fn include_not_found(path: impl Into<String>) -> Self {
        Self {
            help: Some("Include paths are relative to the includes directory".into()),
            ..Self::new(ErrorKind::IncludeNotFound { path: path.into() })
        }
    }

    /// Create a malformed flat syntax error
    pub fn malformed_flat(line: usize, message: impl Into<String>) -> Self {
        Self {
            cause: Some(message.into()),
            ..Self::new(ErrorKind::MalformedFlatSyntax { line })
        }
    }

    /// Create an unrepresentable structure error
    pub fn unrepresentable(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            cause: Some(message.into()),
            ..Self::new(ErrorKind::UnrepresentableStructure)
        }
    }

    /// Create an incomplete server config error
    pub fn incomplete_server(server: impl Into<String>, missing: Vec<String>) -> Self {
        let server = server.into();
        Self {
            help: Some(format!("Set {} in the environment", missing.join(", "))),
            ..Self::new(ErrorKind::IncompleteServerConfig { server, missing })
        }
    }

    /// Create an unknown server error
    pub fn unknown_server(name: impl Into<String>, known: &[String]) -> Self {
        Self {
            help: Some(format!("Recognized servers: {}", known.join(", "))),
            ..Self::new(ErrorKind::UnknownServerSelected { name: name.into() })
        }
    }

    /// Create a not found error for a storage path
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound { path: path.into() })
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self {
            cause: Some(message.into()),
            ..Self::new(ErrorKind::Config)
        }
    }

    /// Create an I/O error
    pub fn io(path: impl Into<String>, err: std::io::Error) -> Self {
        Self {
            path: Some(path.into()),
            cause: Some(err.to_string()),
            ..Self::new(ErrorKind::Io)
        }
    }

    /// Create an internal error (bug in arkconf)
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            help: Some("This is likely a bug in arkconf. Please report it.".into()),
            cause: Some(message.into()),
            ..Self::new(ErrorKind::Internal)
        }
    }

    /// Add path context to the error
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Add source location to the error
    pub fn with_source_location(mut self, loc: SourceLocation) -> Self {
        self.source_location = Some(loc);
        self
    }

    /// Attach a file name, keeping any line number already recorded
    pub fn in_file(mut self, file: impl Into<String>) -> Self {
        let line = self.source_location.as_ref().and_then(|l| l.line);
        self.source_location = Some(SourceLocation {
            file: file.into(),
            line,
        });
        self
    }

    /// Add help message to the error
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Check whether this is a storage not-found error
    pub fn is_not_found(&self) -> bool {
        matches!(self.kind, ErrorKind::NotFound { .. })
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ErrorKind::UnresolvedVariable { name } => write!(f, "Unresolved variable: {}", name)?,
            ErrorKind::IncludeCycle { .. } => write!(f, "Include cycle detected")?,
            ErrorKind::IncludeNotFound { path } => write!(f, "Include file not found: {}", path)?,
            ErrorKind::MalformedFlatSyntax { line } => {
                write!(f, "Malformed INI syntax at line {}", line)?
            }
            ErrorKind::UnrepresentableStructure => {
                write!(f, "Structure cannot be represented in INI form")?
            }
            ErrorKind::IncompleteServerConfig { server, missing } => write!(
                f,
                "Incomplete configuration for server {}: missing {}",
                server,
                missing.join(", ")
            )?,
            ErrorKind::UnknownServerSelected { name } => write!(f, "Unknown server: {}", name)?,
            ErrorKind::Parse => write!(f, "Parse error")?,
            ErrorKind::NotFound { path } => write!(f, "Not found: {}", path)?,
            ErrorKind::Config => write!(f, "Configuration error")?,
            ErrorKind::Io => write!(f, "I/O error")?,
            ErrorKind::Internal => write!(f, "Internal error")?,
        }

        if let Some(path) = &self.path {
            write!(f, "\n  Path: {}", path)?;
        }

        if let Some(loc) = &self.source_location {
            write!(f, "\n  File: {}", loc.file)?;
            if let Some(line) = loc.line {
                write!(f, ":{}", line)?;
            }
        }

        if let Some(cause) = &self.cause {
            write!(f, "\n  {}", cause)?;
        }

        if let Some(help) = &self.help {
            write!(f, "\n  Help: {}", help)?;
        }

        Ok(())
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unresolved_variable_display() {
        let err = Error::unresolved_variable("ADMIN_PASS").with_path("ServerSettings.ServerAdminPassword");
        let display = format!("{}", err);

        assert!(display.contains("Unresolved variable: ADMIN_PASS"));
        assert!(display.contains("Path: ServerSettings.ServerAdminPassword"));
        assert!(display.contains("Help:"));
        assert!(display.contains("\\${ADMIN_PASS}"));
    }

    #[test]
    fn test_include_cycle_display() {
        let err = Error::include_cycle(vec!["a.yml".into(), "b.yml".into(), "a.yml".into()]);
        let display = format!("{}", err);

        assert!(display.contains("Include cycle detected"));
        assert!(display.contains("a.yml → b.yml → a.yml"));
    }

    #[test]
    fn test_malformed_flat_with_location() {
        let err = Error::malformed_flat(7, "expected key=value")
            .with_source_location(SourceLocation::line("Game.ini", 7));
        let display = format!("{}", err);

        assert!(display.contains("Malformed INI syntax at line 7"));
        assert!(display.contains("Game.ini:7"));
    }

    #[test]
    fn test_in_file_keeps_line() {
        let err = Error::malformed_flat(3, "no section")
            .with_source_location(SourceLocation::line("<input>", 3))
            .in_file("Aberration/Game.ini");

        assert_eq!(
            err.source_location,
            Some(SourceLocation::line("Aberration/Game.ini", 3))
        );
    }

    #[test]
    fn test_incomplete_server_lists_missing() {
        let err = Error::incomplete_server(
            "Crystal_Isles",
            vec!["CRYSTAL_ISLES_PASS".into()],
        );
        let display = format!("{}", err);

        assert!(display.contains("Crystal_Isles"));
        assert!(display.contains("CRYSTAL_ISLES_PASS"));
        assert!(matches!(
            err.kind,
            ErrorKind::IncompleteServerConfig { ref missing, .. } if missing == &vec!["CRYSTAL_ISLES_PASS".to_string()]
        ));
    }

    #[test]
    fn test_unknown_server_help() {
        let err = Error::unknown_server("Valguero", &["Island".into(), "Ragnarok".into()]);
        let display = format!("{}", err);

        assert!(display.contains("Unknown server: Valguero"));
        assert!(display.contains("Island, Ragnarok"));
    }

    #[test]
    fn test_not_found_predicate() {
        assert!(Error::not_found("configs/yml/Island/Game.yml").is_not_found());
        assert!(!Error::parse("bad").is_not_found());
    }

    #[test]
    fn test_internal_error() {
        let err = Error::internal("Unexpected state");
        let display = format!("{}", err);

        assert!(display.contains("Internal error"));
        assert!(display.contains("Unexpected state"));
    }
}
