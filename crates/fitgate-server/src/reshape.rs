//! Response bodies built from raw provider records.
//!
//! Each function picks the handful of fields a resource exposes and keeps the
//! untouched record under `raw` where the resource has one. Numeric summary
//! fields fall back to `0` when the provider omits them or sends `null`.

use chrono::NaiveDate;
use serde_json::{json, Value};

/// Millilitres per US cup, as the provider's apps count them
const ML_PER_CUP: f64 = 240.0;

fn number_or_zero(record: &Value, key: &str) -> Value {
    match record.get(key) {
        Some(v) if v.is_number() => v.clone(),
        _ => json!(0),
    }
}

fn field_or_null(record: &Value, key: &str) -> Value {
    record.get(key).cloned().unwrap_or(Value::Null)
}

pub fn user(full_name: Option<String>, device: Value) -> Value {
    let profile_number = field_or_null(&device, "userProfileNumber");
    json!({
        "fullName": full_name,
        "profileNumber": profile_number,
        "deviceInfo": device,
    })
}

pub fn daily_stats(date: NaiveDate, summary: Value) -> Value {
    json!({
        "date": date.to_string(),
        "steps": number_or_zero(&summary, "totalSteps"),
        "distance": number_or_zero(&summary, "totalDistanceMeters"),
        "calories": number_or_zero(&summary, "totalKilocalories"),
        "floors": number_or_zero(&summary, "floorsClimbed"),
        "activeMinutes": number_or_zero(&summary, "activeMinutes"),
        "raw": summary,
    })
}

pub fn heart_rate(date: NaiveDate, record: Value) -> Value {
    let values = match record.get("heartRateValues") {
        Some(v) if !v.is_null() => v.clone(),
        _ => json!([]),
    };
    json!({
        "date": date.to_string(),
        "restingHeartRate": field_or_null(&record, "restingHeartRate"),
        "maxHeartRate": field_or_null(&record, "maxHeartRate"),
        "minHeartRate": field_or_null(&record, "minHeartRate"),
        "heartRateValues": values,
        "raw": record,
    })
}

pub fn activities(items: Vec<Value>) -> Value {
    let count = items.len();
    json!({
        "activities": items,
        "count": count,
    })
}

pub fn hydration(date: NaiveDate, record: Value) -> Value {
    let value_ml = number_or_zero(&record, "valueInML");
    let cups = (value_ml.as_f64().unwrap_or(0.0) / ML_PER_CUP * 10.0).round() / 10.0;
    json!({
        "date": date.to_string(),
        "valueInML": value_ml,
        "goalInML": number_or_zero(&record, "goalInML"),
        "valueInCups": cups,
        "raw": record,
    })
}

/// Resources that pass the record through whole under `key`.
pub fn dated(date: NaiveDate, key: &str, record: Value) -> Value {
    let mut body = serde_json::Map::new();
    body.insert("date".to_string(), json!(date.to_string()));
    body.insert(key.to_string(), record);
    Value::Object(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 15).expect("valid date")
    }

    #[test]
    fn test_daily_stats_defaults_missing_and_null_to_zero() {
        let body = daily_stats(
            day(),
            json!({"totalSteps": 8421, "totalDistanceMeters": null, "floorsClimbed": "n/a"}),
        );
        assert_eq!(body["date"], "2024-01-15");
        assert_eq!(body["steps"], 8421);
        assert_eq!(body["distance"], 0);
        assert_eq!(body["calories"], 0);
        assert_eq!(body["floors"], 0);
        assert_eq!(body["raw"]["totalSteps"], 8421);
    }

    #[test]
    fn test_daily_stats_from_null_record() {
        let body = daily_stats(day(), Value::Null);
        assert_eq!(body["steps"], 0);
        assert_eq!(body["activeMinutes"], 0);
        assert!(body["raw"].is_null());
    }

    #[test]
    fn test_heart_rate_fields() {
        let body = heart_rate(
            day(),
            json!({"restingHeartRate": 52, "maxHeartRate": 171, "heartRateValues": [[1, 60]]}),
        );
        assert_eq!(body["restingHeartRate"], 52);
        assert_eq!(body["maxHeartRate"], 171);
        assert!(body["minHeartRate"].is_null());
        assert_eq!(body["heartRateValues"], json!([[1, 60]]));

        let empty = heart_rate(day(), json!({"heartRateValues": null}));
        assert_eq!(empty["heartRateValues"], json!([]));
    }

    #[test]
    fn test_hydration_cups_rounded_to_tenth() {
        let body = hydration(day(), json!({"valueInML": 1000, "goalInML": 2000}));
        assert_eq!(body["valueInML"], 1000);
        assert_eq!(body["goalInML"], 2000);
        assert_eq!(body["valueInCups"], 4.2);

        let none = hydration(day(), Value::Null);
        assert_eq!(none["valueInML"], 0);
        assert_eq!(none["valueInCups"], 0.0);
    }

    #[test]
    fn test_user_profile_number_from_device() {
        let body = user(
            Some("Pat Runner".to_string()),
            json!({"userProfileNumber": 99, "lastUsedDeviceName": "Forerunner"}),
        );
        assert_eq!(body["fullName"], "Pat Runner");
        assert_eq!(body["profileNumber"], 99);

        let no_device = user(None, Value::Null);
        assert!(no_device["fullName"].is_null());
        assert!(no_device["profileNumber"].is_null());
    }

    #[test]
    fn test_activities_count() {
        let body = activities(vec![json!({"activityId": 1}), json!({"activityId": 2})]);
        assert_eq!(body["count"], 2);
        assert_eq!(body["activities"][1]["activityId"], 2);
    }

    #[test]
    fn test_dated_passthrough() {
        let body = dated(day(), "sleepData", json!({"dailySleepDTO": {}}));
        assert_eq!(body["date"], "2024-01-15");
        assert!(body["sleepData"]["dailySleepDTO"].is_object());
    }
}
