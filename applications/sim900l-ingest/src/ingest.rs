use serde_json::Value;

use crate::error::AppError;
use crate::store::{Document, FieldValue};

#[derive(Debug, Clone, PartialEq)]
pub struct SensorReading {
    pub device_id: String,
    pub temperature: f64,
    pub humidity: f64,
    pub location: Value,
}

impl SensorReading {
    /// Validate and normalize one modem payload.
    ///
    /// Only an absent (or null) `temperature`/`humidity` counts as missing; a
    /// reading of `0` is valid. Numeric strings are accepted because some
    /// firmware builds format the AT+HTTPDATA body by hand.
    pub fn from_payload(payload: &Value, default_device_id: &str) -> Result<Self, AppError> {
        let temperature = payload.get("temperature").filter(|v| !v.is_null());
        let humidity = payload.get("humidity").filter(|v| !v.is_null());

        let (temperature, humidity) = match (temperature, humidity) {
            (Some(t), Some(h)) => (t, h),
            (t, h) => {
                let missing: Vec<&str> = [("temperature", t), ("humidity", h)]
                    .into_iter()
                    .filter(|(_, v)| v.is_none())
                    .map(|(name, _)| name)
                    .collect();
                return Err(AppError::Validation(format!("missing {}", missing.join(", "))));
            }
        };

        let device_id = match payload.get("deviceId") {
            Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => default_device_id.to_string(),
        };

        let location = payload.get("location").cloned().unwrap_or(Value::Null);
        check_storable(&location, "location")?;

        Ok(Self {
            device_id,
            temperature: coerce_number("temperature", temperature)?,
            humidity: coerce_number("humidity", humidity)?,
            location,
        })
    }

    /// Fields written to the store; `timestamp` is assigned by the store.
    pub fn into_document(self) -> Document {
        let mut doc = Document::new();
        doc.insert("deviceId".into(), FieldValue::String(self.device_id));
        doc.insert("temperature".into(), FieldValue::Double(self.temperature));
        doc.insert("humidity".into(), FieldValue::Double(self.humidity));
        doc.insert("location".into(), self.location.into());
        doc.insert("timestamp".into(), FieldValue::ServerTimestamp);
        doc
    }
}

fn coerce_number(field: &str, value: &Value) -> Result<f64, AppError> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    parsed
        .filter(|n| n.is_finite())
        .ok_or_else(|| AppError::Validation(format!("{} is not a number: {}", field, value)))
}

/// Firestore refuses arrays that directly contain arrays, and map keys that
/// are empty or of the reserved `__name__` form.
fn check_storable(value: &Value, path: &str) -> Result<(), AppError> {
    match value {
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                let item_path = format!("{}[{}]", path, i);
                if item.is_array() {
                    return Err(AppError::Validation(format!(
                        "{} is an array inside an array",
                        item_path
                    )));
                }
                check_storable(item, &item_path)?;
            }
            Ok(())
        }
        Value::Object(map) => {
            for (key, item) in map {
                if is_reserved_key(key) {
                    return Err(AppError::Validation(format!(
                        "{} has an unsupported key {:?}",
                        path, key
                    )));
                }
                check_storable(item, &format!("{}.{}", path, key))?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

fn is_reserved_key(key: &str) -> bool {
    key.is_empty() || (key.len() >= 4 && key.starts_with("__") && key.ends_with("__"))
}
