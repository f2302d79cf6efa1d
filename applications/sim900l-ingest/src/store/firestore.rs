use async_trait::async_trait;
use rand::{distributions::Alphanumeric, Rng};
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::auth::TokenProvider;
use super::{Document, DocumentStore, FieldValue, StoreError};
use crate::config::FirestoreConfig;
use crate::credentials::ServiceAccount;

const AUTO_ID_LEN: usize = 20;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const EMULATOR_TOKEN: &str = "owner";

enum Auth {
    ServiceAccount(TokenProvider),
    Emulator,
}

/// Firestore over its REST API. Every document is created through a single
/// `documents:commit` write so server timestamps can be requested as transforms.
pub struct FirestoreClient {
    http: reqwest::Client,
    base_url: String,
    database: String,
    auth: Auth,
    startup_check_timeout: Duration,
    connected: AtomicBool,
}

impl FirestoreClient {
    pub fn new(account: &ServiceAccount, cfg: &FirestoreConfig) -> Result<Self, StoreError> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        let (base_url, auth) = match &cfg.emulator_host {
            Some(host) => (format!("http://{}/v1", host), Auth::Emulator),
            None => (
                cfg.base_url.trim_end_matches('/').to_string(),
                Auth::ServiceAccount(TokenProvider::new(http.clone(), account)?),
            ),
        };

        Ok(Self {
            http,
            base_url,
            database: format!(
                "projects/{}/databases/{}",
                account.project_id, cfg.database_id
            ),
            auth,
            startup_check_timeout: Duration::from_secs(cfg.startup_check_timeout_secs),
            connected: AtomicBool::new(false),
        })
    }

    pub fn is_emulator(&self) -> bool {
        matches!(self.auth, Auth::Emulator)
    }

    /// Startup connectivity check: list at most one document of `collection`.
    /// That needs a usable token and an existing database, so a disabled API
    /// or a wrong database id reports as disconnected. Bounded by
    /// `startup_check_timeout`; failure is logged, not fatal.
    pub async fn check_connection(&self, collection: &str) -> bool {
        let result = match tokio::time::timeout(
            self.startup_check_timeout,
            self.list_one(collection),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(self.startup_check_timeout)),
        };

        match result {
            Ok(()) => {
                info!(database = %self.database, collection, "Firestore database reachable");
                self.connected.store(true, Ordering::Relaxed);
                true
            }
            Err(e) => {
                warn!(error = %e, database = %self.database, "Firestore not reachable at startup");
                self.connected.store(false, Ordering::Relaxed);
                false
            }
        }
    }

    async fn list_one(&self, collection: &str) -> Result<(), StoreError> {
        let token = self.bearer().await?;
        let url = format!(
            "{}/{}/documents/{}?pageSize=1",
            self.base_url, self.database, collection
        );

        let response = self.http.get(&url).bearer_auth(token).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let text = response.text().await.unwrap_or_default();
        Err(StoreError::Rejected {
            status: status.as_u16(),
            message: error_message(&text),
        })
    }

    async fn bearer(&self) -> Result<String, StoreError> {
        match &self.auth {
            Auth::ServiceAccount(tokens) => tokens.access_token().await,
            Auth::Emulator => Ok(EMULATOR_TOKEN.to_string()),
        }
    }

    fn document_name(&self, collection: &str, id: &str) -> String {
        format!("{}/documents/{}/{}", self.database, collection, id)
    }

    /// Body of the `documents:commit` request creating one document.
    pub fn commit_body(
        &self,
        collection: &str,
        id: &str,
        fields: &Document,
    ) -> Result<Value, StoreError> {
        let mut encoded = Map::new();
        let mut transforms = Vec::new();

        for (name, value) in fields {
            if *value == FieldValue::ServerTimestamp {
                transforms.push(json!({
                    "fieldPath": quote_field_path(name),
                    "setToServerValue": "REQUEST_TIME",
                }));
            } else {
                encoded.insert(name.clone(), encode_value(value)?);
            }
        }

        let mut write = json!({
            "update": {
                "name": self.document_name(collection, id),
                "fields": encoded,
            },
            "currentDocument": { "exists": false },
        });
        if !transforms.is_empty() {
            write["updateTransforms"] = Value::Array(transforms);
        }

        Ok(json!({ "writes": [write] }))
    }

    async fn commit(&self, body: &Value) -> Result<(), StoreError> {
        let token = self.bearer().await?;
        let url = format!("{}/{}/documents:commit", self.base_url, self.database);

        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let text = response.text().await.unwrap_or_default();
        Err(StoreError::Rejected {
            status: status.as_u16(),
            message: error_message(&text),
        })
    }
}

#[async_trait]
impl DocumentStore for FirestoreClient {
    async fn create_document(
        &self,
        collection: &str,
        fields: Document,
    ) -> Result<String, StoreError> {
        let id = auto_id();
        let body = self.commit_body(collection, &id, &fields)?;

        match self.commit(&body).await {
            Ok(()) => {
                self.connected.store(true, Ordering::Relaxed);
                debug!(collection, id = %id, "document committed");
                Ok(id)
            }
            Err(e) => {
                if is_connectivity_failure(&e) {
                    self.connected.store(false, Ordering::Relaxed);
                }
                Err(e)
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    fn backend(&self) -> &'static str {
        if self.is_emulator() {
            "firestore-emulator"
        } else {
            "firestore"
        }
    }
}

/// 20 alphanumeric characters, the same shape as Firestore auto-ids.
pub fn auto_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(AUTO_ID_LEN)
        .map(char::from)
        .collect()
}

/// Firestore's typed JSON value representation.
pub fn encode_value(value: &FieldValue) -> Result<Value, StoreError> {
    let encoded = match value {
        FieldValue::Null => json!({ "nullValue": null }),
        FieldValue::Bool(b) => json!({ "booleanValue": b }),
        // int64 travels as a string
        FieldValue::Integer(i) => json!({ "integerValue": i.to_string() }),
        FieldValue::Double(d) => {
            if !d.is_finite() {
                return Err(StoreError::Encoding(format!("non-finite double: {}", d)));
            }
            json!({ "doubleValue": d })
        }
        FieldValue::String(s) => json!({ "stringValue": s }),
        FieldValue::Array(items) => {
            if items.iter().any(|item| matches!(item, FieldValue::Array(_))) {
                return Err(StoreError::Encoding(
                    "arrays cannot directly contain arrays".into(),
                ));
            }
            let values = items.iter().map(encode_value).collect::<Result<Vec<_>, _>>()?;
            json!({ "arrayValue": { "values": values } })
        }
        FieldValue::Map(fields) => {
            let mut encoded = Map::new();
            for (name, value) in fields {
                encoded.insert(name.clone(), encode_value(value)?);
            }
            json!({ "mapValue": { "fields": encoded } })
        }
        FieldValue::ServerTimestamp => {
            return Err(StoreError::Encoding(
                "server timestamps are only supported on top-level fields".into(),
            ))
        }
    };
    Ok(encoded)
}

/// Field names outside `[A-Za-z_][A-Za-z0-9_]*` must be backtick-quoted in a field path.
fn quote_field_path(name: &str) -> String {
    let mut chars = name.chars();
    let simple = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if simple {
        name.to_string()
    } else {
        format!("`{}`", name.replace('\\', "\\\\").replace('`', "\\`"))
    }
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

fn is_connectivity_failure(err: &StoreError) -> bool {
    match err {
        StoreError::Http(_) | StoreError::Auth(_) | StoreError::Timeout(_) => true,
        StoreError::Rejected { status, .. } => *status == 401 || *status == 403 || *status >= 500,
        StoreError::Signing(_) | StoreError::Encoding(_) => false,
    }
}
