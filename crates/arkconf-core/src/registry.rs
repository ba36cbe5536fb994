//! Server registry
//!
//! Each recognized server reads its connection parameters from
//! `<PREFIX>_HOST`, `<PREFIX>_USER`, `<PREFIX>_PASS` and optionally
//! `<PREFIX>_PORT`, where PREFIX is the upper-cased server name with
//! non-alphanumerics replaced by `_`.

use std::fmt;

use crate::env::Environment;
use crate::error::{Error, Result};

/// Default SSH port
pub const DEFAULT_PORT: u16 = 22;

/// Connection parameters for one server
#[derive(Clone, PartialEq, Eq)]
pub struct ServerSpec {
    pub name: String,
    pub host: String,
    pub user: String,
    pub credential: String,
    pub port: u16,
}

impl fmt::Debug for ServerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerSpec")
            .field("name", &self.name)
            .field("host", &self.host)
            .field("user", &self.user)
            .field("credential", &"[REDACTED]")
            .field("port", &self.port)
            .finish()
    }
}

/// Environment variable prefix for a server name (`Crystal_Isles` -> `CRYSTAL_ISLES`)
pub fn env_prefix(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// The recognized servers and the connection parameters of those configured
#[derive(Debug, Clone)]
pub struct ServerRegistry {
    recognized: Vec<String>,
    specs: Vec<ServerSpec>,
}

impl ServerRegistry {
    /// Build the registry from the environment
    ///
    /// A server with none of its variables set is not configured. A server
    /// with only some of them fails with `IncompleteServerConfig`.
    pub fn from_env(recognized: &[String], env: &Environment) -> Result<Self> {
        let mut specs = Vec::new();

        for name in recognized {
            let prefix = env_prefix(name);
            let var = |suffix: &str| format!("{}_{}", prefix, suffix);

            let host = env.get(&var("HOST"));
            let user = env.get(&var("USER"));
            let pass = env.get(&var("PASS"));

            let (host, user, credential) = match (host, user, pass) {
                (None, None, None) => {
                    log::debug!("Server {} has no credentials configured", name);
                    continue;
                }
                (Some(h), Some(u), Some(p)) => (h, u, p),
                _ => {
                    let missing = [("HOST", host), ("USER", user), ("PASS", pass)]
                        .into_iter()
                        .filter(|(_, v)| v.is_none())
                        .map(|(s, _)| var(s))
                        .collect();
                    return Err(Error::incomplete_server(name.as_str(), missing));
                }
            };

            let port = match env.get(&var("PORT")) {
                None => DEFAULT_PORT,
                Some(raw) => raw.trim().parse::<u16>().map_err(|_| {
                    Error::config(format!("{} is not a valid port: {:?}", var("PORT"), raw))
                })?,
            };

            specs.push(ServerSpec {
                name: name.clone(),
                host: host.to_string(),
                user: user.to_string(),
                credential: credential.to_string(),
                port,
            });
        }

        Ok(Self {
            recognized: recognized.to_vec(),
            specs,
        })
    }

    /// Recognized server names, in configured order
    pub fn recognized(&self) -> &[String] {
        &self.recognized
    }

    /// Servers with complete connection parameters
    pub fn configured(&self) -> &[ServerSpec] {
        &self.specs
    }

    pub fn get(&self, name: &str) -> Option<&ServerSpec> {
        self.specs.iter().find(|s| s.name == name)
    }

    /// Resolve a selection to connection parameters
    ///
    /// An empty selection means every configured server. Explicitly
    /// selecting a recognized server without credentials is an error.
    pub fn select(&self, selection: &[String]) -> Result<Vec<ServerSpec>> {
        if selection.is_empty() {
            return Ok(self.specs.clone());
        }

        select_names(&self.recognized, selection)?
            .into_iter()
            .map(|name| {
                self.get(&name).cloned().ok_or_else(|| {
                    let prefix = env_prefix(&name);
                    Error::incomplete_server(
                        name,
                        vec![
                            format!("{}_HOST", prefix),
                            format!("{}_USER", prefix),
                            format!("{}_PASS", prefix),
                        ],
                    )
                })
            })
            .collect()
    }
}

/// Resolve a selection against recognized names without needing credentials
///
/// Matching is case-insensitive; the result keeps the recognized order and
/// has no duplicates. An empty selection selects every recognized name.
pub fn select_names(recognized: &[String], selection: &[String]) -> Result<Vec<String>> {
    if selection.is_empty() {
        return Ok(recognized.to_vec());
    }

    for wanted in selection {
        if !recognized.iter().any(|r| r.eq_ignore_ascii_case(wanted)) {
            return Err(Error::unknown_server(wanted.as_str(), recognized));
        }
    }

    Ok(recognized
        .iter()
        .filter(|r| selection.iter().any(|s| s.eq_ignore_ascii_case(r)))
        .cloned()
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use pretty_assertions::assert_eq;

    fn names() -> Vec<String> {
        ["Aberration", "Crystal_Isles", "Island", "Ragnarok"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn full_env() -> Environment {
        Environment::from_pairs([
            ("ISLAND_HOST", "10.0.0.1"),
            ("ISLAND_USER", "ark"),
            ("ISLAND_PASS", "pw1"),
            ("RAGNAROK_HOST", "10.0.0.2"),
            ("RAGNAROK_USER", "ark"),
            ("RAGNAROK_PASS", "pw2"),
            ("RAGNAROK_PORT", "2222"),
        ])
    }

    #[test]
    fn test_env_prefix() {
        assert_eq!(env_prefix("Crystal_Isles"), "CRYSTAL_ISLES");
        assert_eq!(env_prefix("Gen 2"), "GEN_2");
        assert_eq!(env_prefix("island"), "ISLAND");
    }

    #[test]
    fn test_from_env_builds_configured_servers() {
        let registry = ServerRegistry::from_env(&names(), &full_env()).unwrap();

        let configured: Vec<_> = registry.configured().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(configured, vec!["Island", "Ragnarok"]);
        assert_eq!(registry.get("Island").unwrap().port, 22);
        assert_eq!(registry.get("Ragnarok").unwrap().port, 2222);
        assert_eq!(registry.get("Ragnarok").unwrap().credential, "pw2");
    }

    #[test]
    fn test_partial_triple_fails_fast() {
        let mut env = full_env();
        env.set("CRYSTAL_ISLES_HOST", "10.0.0.3");
        env.set("CRYSTAL_ISLES_USER", "ark");

        let err = ServerRegistry::from_env(&names(), &env).unwrap_err();
        assert_eq!(
            err.kind,
            ErrorKind::IncompleteServerConfig {
                server: "Crystal_Isles".into(),
                missing: vec!["CRYSTAL_ISLES_PASS".into()],
            }
        );
    }

    #[test]
    fn test_invalid_port() {
        let mut env = full_env();
        env.set("ISLAND_PORT", "ssh");

        let err = ServerRegistry::from_env(&names(), &env).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Config);
    }

    #[test]
    fn test_select_case_insensitive_ordered_deduplicated() {
        let registry = ServerRegistry::from_env(&names(), &full_env()).unwrap();

        let selected = registry
            .select(&["ragnarok".into(), "ISLAND".into(), "Ragnarok".into()])
            .unwrap();
        let selected: Vec<_> = selected.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(selected, vec!["Island", "Ragnarok"]);
    }

    #[test]
    fn test_select_unknown_server() {
        let registry = ServerRegistry::from_env(&names(), &full_env()).unwrap();

        let err = registry.select(&["Valguero".into()]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnknownServerSelected { name: "Valguero".into() });
    }

    #[test]
    fn test_select_unconfigured_server() {
        let registry = ServerRegistry::from_env(&names(), &full_env()).unwrap();

        let err = registry.select(&["Aberration".into()]).unwrap_err();
        assert!(matches!(
            err.kind,
            ErrorKind::IncompleteServerConfig { ref server, .. } if server == "Aberration"
        ));
    }

    #[test]
    fn test_empty_selection_is_everything() {
        let registry = ServerRegistry::from_env(&names(), &full_env()).unwrap();
        assert_eq!(registry.select(&[]).unwrap().len(), 2);
        assert_eq!(select_names(&names(), &[]).unwrap(), names());
    }

    #[test]
    fn test_debug_redacts_credential() {
        let registry = ServerRegistry::from_env(&names(), &full_env()).unwrap();
        let debug = format!("{:?}", registry);

        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("pw1"));
    }
}
