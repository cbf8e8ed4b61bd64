//! Session credential sources
//!
//! Sources are tried in the order configured; the first one that yields a
//! non-empty cookie, CSRF token and org id wins. All reads go through a
//! [`SourceLookup`] so resolution can be exercised without touching the
//! process environment.

use rosetta_fetch::SessionCredentials;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Default environment variable prefix
pub const DEFAULT_ENV_PREFIX: &str = "ROSETTA";

/// File names read by a [`CredentialSource::Files`] source
pub const COOKIE_FILE: &str = "cookie.txt";
/// CSRF token file name
pub const CSRF_TOKEN_FILE: &str = "csrf_token.txt";
/// Org id file name
pub const ORG_ID_FILE: &str = "org_id.txt";

/// Credential resolution errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CredentialError {
    /// Every source was missing at least one value
    #[error("no complete credential source (tried: {})", .tried.join("; "))]
    NoCompleteSource {
        /// One line per source naming what was missing
        tried: Vec<String>,
    },
}

/// One place credentials may come from
#[derive(Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum CredentialSource {
    /// `<PREFIX>_COOKIE`, `<PREFIX>_CSRF_TOKEN`, `<PREFIX>_ORG_ID`
    Env {
        /// Variable prefix
        #[serde(default = "default_prefix")]
        prefix: String,
    },
    /// `cookie.txt`, `csrf_token.txt` and `org_id.txt` in a directory
    Files {
        /// Directory holding the three files
        dir: PathBuf,
    },
    /// Values written directly in the config file
    Inline {
        /// Session cookie header
        #[serde(default)]
        cookie: String,
        /// CSRF token header
        #[serde(default)]
        csrf_token: String,
        /// Organization id
        #[serde(default)]
        org_id: String,
    },
}

fn default_prefix() -> String {
    DEFAULT_ENV_PREFIX.to_string()
}

impl Default for CredentialSource {
    fn default() -> Self {
        Self::Env {
            prefix: default_prefix(),
        }
    }
}

impl fmt::Debug for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Env { prefix } => f.debug_struct("Env").field("prefix", prefix).finish(),
            Self::Files { dir } => f.debug_struct("Files").field("dir", dir).finish(),
            Self::Inline { org_id, .. } => f
                .debug_struct("Inline")
                .field("cookie", &"<redacted>")
                .field("csrf_token", &"<redacted>")
                .field("org_id", org_id)
                .finish(),
        }
    }
}

impl CredentialSource {
    /// Human readable name for logs
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Env { prefix } => format!("env ({prefix}_*)"),
            Self::Files { dir } => format!("files ({})", dir.display()),
            Self::Inline { .. } => "inline".to_string(),
        }
    }

    fn read(&self, lookup: &dyn SourceLookup) -> [Option<String>; 3] {
        match self {
            Self::Env { prefix } => [
                lookup.env(&format!("{prefix}_COOKIE")),
                lookup.env(&format!("{prefix}_CSRF_TOKEN")),
                lookup.env(&format!("{prefix}_ORG_ID")),
            ],
            Self::Files { dir } => [
                lookup.read_file(&dir.join(COOKIE_FILE)),
                lookup.read_file(&dir.join(CSRF_TOKEN_FILE)),
                lookup.read_file(&dir.join(ORG_ID_FILE)),
            ],
            Self::Inline {
                cookie,
                csrf_token,
                org_id,
            } => [
                Some(cookie.clone()),
                Some(csrf_token.clone()),
                Some(org_id.clone()),
            ],
        }
    }
}

/// Environment and filesystem reads used by credential sources
pub trait SourceLookup {
    /// Value of an environment variable
    fn env(&self, name: &str) -> Option<String>;

    /// Contents of a file
    fn read_file(&self, path: &Path) -> Option<String>;
}

/// Reads the real process environment and filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemLookup;

impl SourceLookup for SystemLookup {
    fn env(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }

    fn read_file(&self, path: &Path) -> Option<String> {
        std::fs::read_to_string(path).ok()
    }
}

/// First complete credential set among `sources`
///
/// Values are trimmed; a blank value counts as missing.
///
/// # Errors
/// Returns [`CredentialError::NoCompleteSource`] when no source is complete.
pub fn resolve_credentials(
    sources: &[CredentialSource],
    lookup: &dyn SourceLookup,
) -> Result<SessionCredentials, CredentialError> {
    const PARTS: [&str; 3] = ["cookie", "csrf_token", "org_id"];
    let mut tried = Vec::with_capacity(sources.len());

    for source in sources {
        let values = source
            .read(lookup)
            .map(|value| value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()));

        if let [Some(cookie), Some(csrf_token), Some(org_id)] = values.clone() {
            tracing::info!("using credentials from {}", source.describe());
            return Ok(SessionCredentials {
                cookie,
                csrf_token,
                org_id,
            });
        }

        let missing: Vec<&str> = PARTS
            .iter()
            .zip(values.iter())
            .filter(|(_, value)| value.is_none())
            .map(|(part, _)| *part)
            .collect();
        tracing::debug!("{} is missing {}", source.describe(), missing.join(", "));
        tried.push(format!("{} missing {}", source.describe(), missing.join(", ")));
    }

    Err(CredentialError::NoCompleteSource { tried })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct FakeLookup {
        env: HashMap<String, String>,
        files: HashMap<PathBuf, String>,
    }

    impl FakeLookup {
        fn with_env(mut self, name: &str, value: &str) -> Self {
            self.env.insert(name.to_string(), value.to_string());
            self
        }

        fn with_file(mut self, path: &str, value: &str) -> Self {
            self.files.insert(PathBuf::from(path), value.to_string());
            self
        }
    }

    impl SourceLookup for FakeLookup {
        fn env(&self, name: &str) -> Option<String> {
            self.env.get(name).cloned()
        }

        fn read_file(&self, path: &Path) -> Option<String> {
            self.files.get(path).cloned()
        }
    }

    fn files(dir: &str) -> CredentialSource {
        CredentialSource::Files { dir: dir.into() }
    }

    #[test]
    fn first_complete_source_wins() {
        let lookup = FakeLookup::default()
            .with_env("ROSETTA_COOKIE", "env-cookie")
            .with_file("acme/cookie.txt", "file-cookie\n")
            .with_file("acme/csrf_token.txt", " crmcsrfparam=abc ")
            .with_file("acme/org_id.txt", "123");

        let credentials =
            resolve_credentials(&[CredentialSource::default(), files("acme")], &lookup).unwrap();

        assert_eq!(credentials.cookie, "file-cookie");
        assert_eq!(credentials.csrf_token, "crmcsrfparam=abc");
        assert_eq!(credentials.org_id, "123");
    }

    #[test]
    fn custom_env_prefix() {
        let lookup = FakeLookup::default()
            .with_env("ACME_COOKIE", "c")
            .with_env("ACME_CSRF_TOKEN", "t")
            .with_env("ACME_ORG_ID", "1");
        let source = CredentialSource::Env {
            prefix: "ACME".into(),
        };
        assert!(resolve_credentials(&[source], &lookup).is_ok());
    }

    #[test]
    fn blank_values_count_as_missing() {
        let inline = CredentialSource::Inline {
            cookie: "c".into(),
            csrf_token: "   ".into(),
            org_id: "1".into(),
        };
        let err = resolve_credentials(&[inline], &FakeLookup::default()).unwrap_err();
        assert_eq!(
            err,
            CredentialError::NoCompleteSource {
                tried: vec!["inline missing csrf_token".into()]
            }
        );
    }

    #[test]
    fn reports_every_source_tried() {
        let err = resolve_credentials(&[CredentialSource::default(), files("none")], &FakeLookup::default())
            .unwrap_err();
        let CredentialError::NoCompleteSource { tried } = err;
        assert_eq!(tried.len(), 2);
        assert!(tried[0].starts_with("env (ROSETTA_*)"));
        assert!(tried[1].contains("cookie, csrf_token, org_id"));
    }

    #[test]
    fn inline_debug_is_redacted() {
        let inline = CredentialSource::Inline {
            cookie: "secret".into(),
            csrf_token: "token".into(),
            org_id: "1".into(),
        };
        let debug = format!("{inline:?}");
        assert!(!debug.contains("secret"));
        assert!(!debug.contains("\"token\""));
    }
}
