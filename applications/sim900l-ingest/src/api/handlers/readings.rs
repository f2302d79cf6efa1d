use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde_json::Value;
use tracing::{debug, info};

use super::AppState;
use crate::api::models::IngestResponse;
use crate::error::{AppError, Result};
use crate::ingest::SensorReading;

/// POST /sim900l-data
pub async fn ingest_reading(
    State(state): State<AppState>,
    payload: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<Json<IngestResponse>> {
    let Json(payload) = payload.map_err(|e| AppError::MalformedRequest(e.body_text()))?;

    let reading = SensorReading::from_payload(&payload, &state.ingest.default_device_id)?;
    let device_id = reading.device_id.clone();
    debug!(device_id = %device_id, "reading accepted");

    let id = state
        .store
        .create_document(&state.collection, reading.into_document())
        .await?;

    info!(id = %id, device_id = %device_id, "Data saved");
    Ok(Json(IngestResponse::created(id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IngestConfig;
    use crate::store::{FieldValue, MockDocumentStore, StoreError};
    use axum::{http::StatusCode, response::IntoResponse};
    use serde_json::json;
    use std::sync::Arc;

    fn state(store: MockDocumentStore) -> AppState {
        AppState::new(Arc::new(store), "sensorReadings", IngestConfig::default())
    }

    #[tokio::test]
    async fn test_persists_exactly_once() {
        let mut store = MockDocumentStore::new();
        store
            .expect_create_document()
            .withf(|collection, fields| {
                collection == "sensorReadings"
                    && fields["temperature"] == FieldValue::Double(23.5)
                    && fields["humidity"] == FieldValue::Double(60.0)
                    && fields["deviceId"] == FieldValue::String("sim900l-device".into())
                    && fields["location"] == FieldValue::Null
            })
            .times(1)
            .returning(|_, _| Ok("doc-1".to_string()));

        let Json(body) = ingest_reading(
            State(state(store)),
            Ok(Json(json!({"temperature": 23.5, "humidity": 60}))),
        )
        .await
        .unwrap();

        assert!(body.success);
        assert_eq!(body.id, "doc-1");
    }

    #[tokio::test]
    async fn test_zero_readings_are_persisted() {
        let mut store = MockDocumentStore::new();
        store
            .expect_create_document()
            .withf(|_, fields| {
                fields["temperature"] == FieldValue::Double(0.0)
                    && fields["humidity"] == FieldValue::Double(0.0)
                    && fields["deviceId"] == FieldValue::String("d1".into())
            })
            .times(1)
            .returning(|_, _| Ok("doc-0".to_string()));

        let result = ingest_reading(
            State(state(store)),
            Ok(Json(json!({"temperature": 0, "humidity": 0, "deviceId": "d1"}))),
        )
        .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_missing_field_never_reaches_store() {
        let mut store = MockDocumentStore::new();
        store.expect_create_document().times(0);

        let err = ingest_reading(State(state(store)), Ok(Json(json!({"humidity": 50}))))
            .await
            .unwrap_err();

        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_store_failure_is_internal_error() {
        let mut store = MockDocumentStore::new();
        store
            .expect_create_document()
            .times(1)
            .returning(|_, _| {
                Err(StoreError::Rejected {
                    status: 503,
                    message: "backend unavailable".into(),
                })
            });

        let err = ingest_reading(
            State(state(store)),
            Ok(Json(json!({"temperature": 21, "humidity": 40}))),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::Persistence(_)));
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
