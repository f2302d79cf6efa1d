use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct IngestResponse {
    pub success: bool,
    pub id: String,
}

impl IngestResponse {
    pub fn created(id: String) -> Self {
        Self { success: true, id }
    }
}
