//! Service-account credential resolution.
//!
//! Deployments have supplied the Firebase key in three shapes over time, so
//! the resolver tries each of them in a fixed order:
//!
//! 1. `FIREBASE_SERVICE_ACCOUNT` holding the whole key JSON
//! 2. `FIREBASE_PROJECT_ID`, `FIREBASE_CLIENT_EMAIL` and `FIREBASE_PRIVATE_KEY`
//! 3. a key file (`firestore.credentials_file` / `GOOGLE_APPLICATION_CREDENTIALS`,
//!    else `serviceAccountKey.json` when present)

use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::FirestoreConfig;
use crate::error::ConfigError;

pub const ENV_SERVICE_ACCOUNT: &str = "FIREBASE_SERVICE_ACCOUNT";
pub const ENV_PROJECT_ID: &str = "FIREBASE_PROJECT_ID";
pub const ENV_CLIENT_EMAIL: &str = "FIREBASE_CLIENT_EMAIL";
pub const ENV_PRIVATE_KEY: &str = "FIREBASE_PRIVATE_KEY";
pub const FALLBACK_KEY_FILE: &str = "serviceAccountKey.json";
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

#[derive(Clone, Deserialize)]
pub struct ServiceAccount {
    pub project_id: String,
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.into()
}

// Keep the key out of logs.
impl fmt::Debug for ServiceAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccount")
            .field("project_id", &self.project_id)
            .field("client_email", &self.client_email)
            .field("private_key", &"<redacted>")
            .field("private_key_id", &self.private_key_id)
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    JsonBlob,
    EnvVars,
    KeyFile(PathBuf),
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::JsonBlob => write!(f, "{}", ENV_SERVICE_ACCOUNT),
            CredentialSource::EnvVars => write!(f, "FIREBASE_* variables"),
            CredentialSource::KeyFile(path) => write!(f, "key file {}", path.display()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub account: ServiceAccount,
    pub source: CredentialSource,
}

/// Resolve credentials from the process environment and the configured key file.
pub fn resolve(cfg: &FirestoreConfig) -> Result<Credentials, ConfigError> {
    resolve_with(|name| std::env::var(name).ok(), cfg.credentials_file.as_deref())
}

pub fn resolve_with<F>(lookup: F, key_file: Option<&str>) -> Result<Credentials, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let lookup = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(blob) = lookup(ENV_SERVICE_ACCOUNT) {
        let account = parse_account(&blob, ENV_SERVICE_ACCOUNT)?;
        return finish(account, CredentialSource::JsonBlob);
    }

    let discrete = [ENV_PROJECT_ID, ENV_CLIENT_EMAIL, ENV_PRIVATE_KEY].map(|name| lookup(name));
    if discrete.iter().any(Option::is_some) {
        return match discrete {
            [Some(project_id), Some(client_email), Some(private_key)] => finish(
                ServiceAccount {
                    project_id,
                    client_email,
                    private_key: unescape_newlines(&private_key),
                    private_key_id: None,
                    token_uri: default_token_uri(),
                },
                CredentialSource::EnvVars,
            ),
            _ => {
                let missing: Vec<&str> = [ENV_PROJECT_ID, ENV_CLIENT_EMAIL, ENV_PRIVATE_KEY]
                    .into_iter()
                    .zip(discrete.iter())
                    .filter(|(_, value)| value.is_none())
                    .map(|(name, _)| name)
                    .collect();
                Err(ConfigError(format!(
                    "missing required Firebase config values: {}",
                    missing.join(", ")
                )))
            }
        };
    }

    let path = match key_file {
        Some(path) => PathBuf::from(path),
        None if Path::new(FALLBACK_KEY_FILE).exists() => PathBuf::from(FALLBACK_KEY_FILE),
        None => {
            return Err(ConfigError(format!(
                "no Firebase credentials found: set {}, the {}/{}/{} variables, or a key file",
                ENV_SERVICE_ACCOUNT, ENV_PROJECT_ID, ENV_CLIENT_EMAIL, ENV_PRIVATE_KEY
            )))
        }
    };

    let raw = std::fs::read_to_string(&path).map_err(|e| {
        ConfigError(format!("failed to read key file {}: {}", path.display(), e))
    })?;
    let account = parse_account(&raw, &path.display().to_string())?;
    finish(account, CredentialSource::KeyFile(path))
}

fn parse_account(raw: &str, origin: &str) -> Result<ServiceAccount, ConfigError> {
    let mut account: ServiceAccount = serde_json::from_str(raw)
        .map_err(|e| ConfigError(format!("invalid service account JSON in {}: {}", origin, e)))?;
    account.private_key = unescape_newlines(&account.private_key);
    Ok(account)
}

fn finish(account: ServiceAccount, source: CredentialSource) -> Result<Credentials, ConfigError> {
    validate(&account)?;
    Ok(Credentials { account, source })
}

fn validate(account: &ServiceAccount) -> Result<(), ConfigError> {
    if account.project_id.trim().is_empty() {
        return Err(ConfigError("service account has an empty project_id".into()));
    }
    if account.client_email.trim().is_empty() {
        return Err(ConfigError("service account has an empty client_email".into()));
    }
    let key = account.private_key.trim();
    if !key.starts_with("-----BEGIN") || !key.contains("PRIVATE KEY-----") {
        return Err(ConfigError(
            "service account private_key is not a PEM private key".into(),
        ));
    }
    Ok(())
}

/// Env-var keys usually arrive with literal `\n` sequences instead of line breaks.
fn unescape_newlines(key: &str) -> String {
    key.replace("\\n", "\n")
}
