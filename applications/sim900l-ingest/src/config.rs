use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_CONFIG_PATH: &str = "config/config.yaml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub firestore: FirestoreConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_host")]
    pub host: String,
    #[serde(default = "default_api_port")]
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_api_host(),
            port: default_api_port(),
        }
    }
}

fn default_api_host() -> String {
    "0.0.0.0".into()
}

fn default_api_port() -> u16 {
    3000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirestoreConfig {
    #[serde(default = "default_database_id")]
    pub database_id: String,
    #[serde(default = "default_collection")]
    pub collection: String,
    /// Path to a service-account key file.
    #[serde(default)]
    pub credentials_file: Option<String>,
    /// host:port of a Firestore emulator; disables token exchange.
    #[serde(default)]
    pub emulator_host: Option<String>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Upper bound on the connectivity check run before the server binds.
    #[serde(default = "default_startup_check_timeout_secs")]
    pub startup_check_timeout_secs: u64,
}

impl Default for FirestoreConfig {
    fn default() -> Self {
        Self {
            database_id: default_database_id(),
            collection: default_collection(),
            credentials_file: None,
            emulator_host: None,
            base_url: default_base_url(),
            startup_check_timeout_secs: default_startup_check_timeout_secs(),
        }
    }
}

fn default_database_id() -> String {
    "(default)".into()
}

fn default_collection() -> String {
    "sensorReadings".into()
}

fn default_base_url() -> String {
    "https://firestore.googleapis.com/v1".into()
}

fn default_startup_check_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Stored when a reading arrives without a deviceId.
    #[serde(default = "default_device_id")]
    pub default_device_id: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            default_device_id: default_device_id(),
        }
    }
}

fn default_device_id() -> String {
    "sim900l-device".into()
}

impl Config {
    /// Resolve the config file from APP_CONFIG and load it. Without APP_CONFIG a
    /// missing default file means built-in defaults; env overrides apply either way.
    pub fn load() -> Result<Self, anyhow::Error> {
        match std::env::var("APP_CONFIG") {
            Ok(path) => Self::load_from(path),
            Err(_) if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::load_from(DEFAULT_CONFIG_PATH)
            }
            Err(_) => {
                let mut cfg = Self::default();
                cfg.apply_env_overrides()?;
                Ok(cfg)
            }
        }
    }

    /// Load YAML from disk, substitute $(VAR)/${VAR} with env vars, then parse.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, anyhow::Error> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let mut cfg = Self::parse(&raw)?;
        cfg.apply_env_overrides()?;
        Ok(cfg)
    }

    pub fn parse(raw: &str) -> Result<Self, anyhow::Error> {
        let expanded = expand_env_placeholders(raw)?;
        let cfg = serde_yaml::from_str(&expanded).context("failed to parse config YAML")?;
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self) -> Result<(), anyhow::Error> {
        if let Ok(host) = std::env::var("HOST") {
            self.api.host = host;
        }

        if let Ok(port) = std::env::var("PORT") {
            self.api.port = port
                .parse()
                .with_context(|| format!("PORT is not a valid port number: {}", port))?;
        }

        if let Ok(path) = std::env::var("GOOGLE_APPLICATION_CREDENTIALS") {
            self.firestore.credentials_file = Some(path);
        }

        if let Ok(host) = std::env::var("FIRESTORE_EMULATOR_HOST") {
            self.firestore.emulator_host = Some(host);
        }

        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}

/// Expand $(VAR) and ${VAR} placeholders using environment variables.
fn expand_env_placeholders(input: &str) -> Result<String, anyhow::Error> {
    let mut out = String::with_capacity(input.len());
    let mut it = input.chars().peekable();

    while let Some(c) = it.next() {
        if c != '$' {
            out.push(c);
            continue;
        }

        let close = match it.peek().copied() {
            Some('$') => {
                it.next();
                out.push('$');
                continue;
            }
            Some('(') => ')',
            Some('{') => '}',
            _ => {
                out.push('$');
                continue;
            }
        };

        it.next();
        let var = read_until(&mut it, close)
            .with_context(|| format!("unterminated env placeholder: missing '{}'", close))?;
        let val = std::env::var(&var)
            .with_context(|| format!("missing environment variable: {}", var))?;
        out.push_str(&val);
    }

    Ok(out)
}

fn read_until<I>(it: &mut std::iter::Peekable<I>, end: char) -> Option<String>
where
    I: Iterator<Item = char>,
{
    let mut buf = String::new();
    for ch in it.by_ref() {
        if ch == end {
            return Some(buf);
        }
        buf.push(ch);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_expand_env_placeholders() {
        std::env::set_var("SIM900L_TEST_HOST", "10.0.0.7");
        std::env::set_var("SIM900L_TEST_PORT", "8081");

        let out = expand_env_placeholders("host: $(SIM900L_TEST_HOST)\nport: ${SIM900L_TEST_PORT}")
            .unwrap();
        assert_eq!(out, "host: 10.0.0.7\nport: 8081");

        std::env::remove_var("SIM900L_TEST_HOST");
        std::env::remove_var("SIM900L_TEST_PORT");
    }

    #[test]
    fn test_expand_keeps_literal_dollars() {
        let out = expand_env_placeholders("price: $$5 and $x").unwrap();
        assert_eq!(out, "price: $5 and $x");
    }

    #[test]
    fn test_expand_unterminated_placeholder() {
        let err = expand_env_placeholders("url: ${NEVER_CLOSED").unwrap_err();
        assert!(err.to_string().contains("unterminated"));
    }

    #[test]
    #[serial]
    fn test_expand_missing_variable() {
        std::env::remove_var("SIM900L_TEST_UNSET");
        let err = expand_env_placeholders("x: $(SIM900L_TEST_UNSET)").unwrap_err();
        assert!(err.to_string().contains("SIM900L_TEST_UNSET"));
    }

    #[test]
    fn test_parse_applies_defaults() {
        let cfg = Config::parse("api:\n  port: 8088\n").unwrap();
        assert_eq!(cfg.api.host, "0.0.0.0");
        assert_eq!(cfg.api.port, 8088);
        assert_eq!(cfg.firestore.collection, "sensorReadings");
        assert_eq!(cfg.firestore.database_id, "(default)");
        assert_eq!(cfg.firestore.startup_check_timeout_secs, 10);
        assert_eq!(cfg.ingest.default_device_id, "sim900l-device");
        assert!(cfg.firestore.emulator_host.is_none());
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        std::env::set_var("PORT", "4000");
        std::env::set_var("FIRESTORE_EMULATOR_HOST", "localhost:8085");

        let mut cfg = Config::default();
        cfg.apply_env_overrides().unwrap();
        assert_eq!(cfg.api.port, 4000);
        assert_eq!(cfg.bind_address(), "0.0.0.0:4000");
        assert_eq!(cfg.firestore.emulator_host.as_deref(), Some("localhost:8085"));

        std::env::set_var("PORT", "not-a-port");
        assert!(cfg.apply_env_overrides().is_err());

        std::env::remove_var("PORT");
        std::env::remove_var("FIRESTORE_EMULATOR_HOST");
    }
}
