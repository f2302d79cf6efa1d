use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub persistence: PersistenceStatus,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PersistenceStatus {
    pub backend: String,
    pub connected: bool,
}
