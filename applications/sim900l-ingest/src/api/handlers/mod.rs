pub mod readings;
pub mod status;

use std::sync::Arc;

use crate::config::IngestConfig;
use crate::store::DocumentStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub collection: String,
    pub ingest: IngestConfig,
}

impl AppState {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        collection: impl Into<String>,
        ingest: IngestConfig,
    ) -> Self {
        Self {
            store,
            collection: collection.into(),
            ingest,
        }
    }
}
