pub mod api;
pub mod config;
pub mod credentials;
pub mod error;
pub mod ingest;
pub mod store;

pub use config::Config;
pub use error::{AppError, ConfigError, Result};
pub use ingest::SensorReading;
pub use store::{Document, DocumentStore, FieldValue, FirestoreClient, StoreError};
