pub mod reading;
pub mod status;

pub use reading::IngestResponse;
pub use status::{PersistenceStatus, StatusResponse};
