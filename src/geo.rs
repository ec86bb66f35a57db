use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::json;

use crate::error::ApiError;

/// Radius used by the nearby query when the caller does not pass one.
pub const DEFAULT_NEARBY_DISTANCE_METERS: f64 = 5000.0;

/// A WGS84 point. Longitude always comes before latitude: in request
/// bodies, in storage, and in responses.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub longitude: f64,
    pub latitude: f64,
}

#[derive(Serialize, Deserialize)]
struct GeoJsonPoint {
    #[serde(rename = "type")]
    kind: String,
    coordinates: Vec<f64>,
}

impl GeoPoint {
    pub fn new(longitude: f64, latitude: f64) -> Result<Self, ApiError> {
        if !longitude.is_finite() || !latitude.is_finite() {
            return Err(ApiError::Validation(
                "coordinates must be finite numbers".into(),
            ));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(ApiError::Validation(format!(
                "longitude {longitude} out of range [-180, 180]"
            )));
        }
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(ApiError::Validation(format!(
                "latitude {latitude} out of range [-90, 90]"
            )));
        }
        Ok(Self {
            longitude,
            latitude,
        })
    }

    /// Accepts the shapes clients actually send for `coordinates`: a JSON
    /// array of two numbers, an array of numeric strings, or (from a
    /// multipart form field) a string holding either of those or `lon,lat`.
    pub fn from_request_value(value: &serde_json::Value) -> Result<Self, ApiError> {
        match value {
            serde_json::Value::Array(items) => {
                if items.len() != 2 {
                    return Err(ApiError::Validation(format!(
                        "coordinates must have exactly 2 elements, got {}",
                        items.len()
                    )));
                }
                Self::new(coerce_number(&items[0])?, coerce_number(&items[1])?)
            }
            serde_json::Value::String(text) => Self::from_text(text),
            _ => Err(ApiError::Validation(
                "coordinates must be a [longitude, latitude] array".into(),
            )),
        }
    }

    pub fn from_text(text: &str) -> Result<Self, ApiError> {
        let trimmed = text.trim();
        if trimmed.starts_with('[') {
            let value: serde_json::Value = serde_json::from_str(trimmed)
                .map_err(|e| ApiError::Validation(format!("malformed coordinates: {e}")))?;
            return Self::from_request_value(&value);
        }
        let parts: Vec<&str> = trimmed.split(',').collect();
        if parts.len() != 2 {
            return Err(ApiError::Validation(
                "coordinates must have exactly 2 elements".into(),
            ));
        }
        let lon = parse_number(parts[0])?;
        let lat = parse_number(parts[1])?;
        Self::new(lon, lat)
    }

    /// The stored representation: a GeoJSON `Point`.
    pub fn to_json(&self) -> serde_json::Value {
        json!({ "type": "Point", "coordinates": [self.longitude, self.latitude] })
    }
}

impl Serialize for GeoPoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        GeoJsonPoint {
            kind: "Point".to_string(),
            coordinates: vec![self.longitude, self.latitude],
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for GeoPoint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = GeoJsonPoint::deserialize(deserializer)?;
        if raw.kind != "Point" {
            return Err(D::Error::custom(format!(
                "expected GeoJSON type \"Point\", got \"{}\"",
                raw.kind
            )));
        }
        if raw.coordinates.len() != 2 {
            return Err(D::Error::custom(
                "coordinates must have exactly 2 elements",
            ));
        }
        GeoPoint::new(raw.coordinates[0], raw.coordinates[1]).map_err(D::Error::custom)
    }
}

fn coerce_number(value: &serde_json::Value) -> Result<f64, ApiError> {
    match value {
        serde_json::Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| ApiError::Validation(format!("'{n}' is not a number"))),
        serde_json::Value::String(s) => parse_number(s),
        other => Err(ApiError::Validation(format!("'{other}' is not a number"))),
    }
}

fn parse_number(text: &str) -> Result<f64, ApiError> {
    text.trim()
        .parse::<f64>()
        .map_err(|_| ApiError::Validation(format!("'{}' is not a number", text.trim())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_as_geojson_point_longitude_first() {
        let point = GeoPoint::new(2.35, 48.85).unwrap();
        let value = serde_json::to_value(point).unwrap();
        assert_eq!(
            value,
            json!({ "type": "Point", "coordinates": [2.35, 48.85] })
        );
        assert_eq!(value, point.to_json());
    }

    #[test]
    fn round_trips_through_storage_form() {
        let point = GeoPoint::new(-122.42, 37.77).unwrap();
        let back: GeoPoint = serde_json::from_value(point.to_json()).unwrap();
        assert_eq!(back, point);
    }

    #[test]
    fn rejects_wrong_arity() {
        assert!(GeoPoint::from_request_value(&json!([2.35])).is_err());
        assert!(GeoPoint::from_request_value(&json!([2.35, 48.85, 0.0])).is_err());
        assert!(GeoPoint::from_request_value(&json!([])).is_err());
        assert!(GeoPoint::from_request_value(&json!(null)).is_err());
        assert!(GeoPoint::from_request_value(&json!({"lat": 48.85})).is_err());
    }

    #[test]
    fn rejects_out_of_range() {
        assert!(GeoPoint::new(-180.1, 0.0).is_err());
        assert!(GeoPoint::new(180.1, 0.0).is_err());
        assert!(GeoPoint::new(0.0, 90.5).is_err());
        assert!(GeoPoint::new(0.0, -90.5).is_err());
        assert!(GeoPoint::new(f64::NAN, 0.0).is_err());
        assert!(GeoPoint::new(-180.0, 90.0).is_ok());
        assert!(GeoPoint::new(180.0, -90.0).is_ok());
    }

    #[test]
    fn coerces_numeric_strings() {
        let point = GeoPoint::from_request_value(&json!(["2.35", "48.85"])).unwrap();
        assert_eq!(point.longitude, 2.35);
        assert_eq!(point.latitude, 48.85);
        assert!(GeoPoint::from_request_value(&json!(["east", "48.85"])).is_err());
    }

    #[test]
    fn parses_multipart_text_forms() {
        let from_json = GeoPoint::from_text("[2.35, 48.85]").unwrap();
        let from_pair = GeoPoint::from_text("2.35,48.85").unwrap();
        assert_eq!(from_json, from_pair);
        assert!(GeoPoint::from_text("2.35").is_err());
        assert!(GeoPoint::from_text("2.35,48.85,1.0").is_err());
        assert!(GeoPoint::from_text("[2.35]").is_err());
    }

    #[test]
    fn deserialization_enforces_the_point_type() {
        let bad: Result<GeoPoint, _> =
            serde_json::from_value(json!({ "type": "Polygon", "coordinates": [0.0, 0.0] }));
        assert!(bad.is_err());
    }
}
