//! WebAssembly module for AgriTrace
//!
//! Lets the browser work offline with the same rules as the backend:
//! - Harvest date prediction
//! - Condition reading validation
//! - Activity form validation

use chrono::NaiveDate;
use shared::{
    validate_condition_readings, ActivityPayloadInput, ActivityType, ConditionReadings,
    FieldErrors, PredictionRequest,
};
use wasm_bindgen::prelude::*;

// Re-export shared types for use in JavaScript
pub use shared::models::*;
pub use shared::types::*;

fn to_js(err: String) -> JsValue {
    JsValue::from_str(&err)
}

/// Today's date according to the browser clock (UTC)
fn browser_today() -> Option<NaiveDate> {
    let now = js_sys::Date::new_0();
    NaiveDate::from_ymd_opt(
        now.get_utc_full_year() as i32,
        now.get_utc_month() + 1,
        now.get_utc_date(),
    )
}

fn errors_json(errors: &FieldErrors) -> Result<String, String> {
    serde_json::to_string(errors).map_err(|e| e.to_string())
}

fn predict(request_json: &str, today: NaiveDate) -> Result<String, String> {
    let request: PredictionRequest = serde_json::from_str(request_json)
        .map_err(|e| format!("Invalid prediction request: {}", e))?;
    if let Some(conditions) = &request.conditions {
        validate_condition_readings(conditions).map_err(|e| format!("Invalid conditions: {}", e))?;
    }
    let prediction = request.evaluate(today);
    serde_json::to_string(&prediction).map_err(|e| e.to_string())
}

fn check_conditions(readings_json: &str) -> Result<String, String> {
    let readings: ConditionReadings =
        serde_json::from_str(readings_json).map_err(|e| format!("Invalid readings JSON: {}", e))?;
    let errors = validate_condition_readings(&readings).err().unwrap_or_default();
    errors_json(&errors)
}

fn check_activity(activity_type: &str, payload_json: &str) -> Result<String, String> {
    let kind: ActivityType = match activity_type.parse() {
        Ok(kind) => kind,
        Err(e) => return errors_json(&FieldErrors::single("activity_type", e.to_string())),
    };
    let payload: ActivityPayloadInput =
        serde_json::from_str(payload_json).map_err(|e| format!("Invalid payload JSON: {}", e))?;
    let errors = payload.into_details(kind).err().unwrap_or_default();
    errors_json(&errors)
}

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    web_sys::console::debug_1(&JsValue::from_str("agritrace-wasm loaded"));
}

/// Predict a harvest date from a JSON prediction request.
///
/// `today` is an ISO date; the browser clock is used when it is omitted and
/// the request carries no `as_of`.
#[wasm_bindgen]
pub fn predict_harvest_json(request_json: &str, today: Option<String>) -> Result<String, JsValue> {
    let today = match today {
        Some(raw) => raw
            .parse::<NaiveDate>()
            .map_err(|e| to_js(format!("Invalid date {}: {}", raw, e)))?,
        None => browser_today().ok_or_else(|| to_js("Browser clock unavailable".to_string()))?,
    };
    predict(request_json, today).map_err(to_js)
}

/// Validate condition readings; returns the field errors as JSON
#[wasm_bindgen]
pub fn validate_condition_json(readings_json: &str) -> Result<String, JsValue> {
    check_conditions(readings_json).map_err(to_js)
}

/// Validate an activity form payload; returns the field errors as JSON
#[wasm_bindgen]
pub fn validate_activity_json(activity_type: &str, payload_json: &str) -> Result<String, JsValue> {
    check_activity(activity_type, payload_json).map_err(to_js)
}

/// Base growing period in days for a crop type
#[wasm_bindgen]
pub fn base_growing_period(crop_type: &str) -> u32 {
    shared::base_growing_period(crop_type).clamp(0, i64::from(u32::MAX)) as u32
}

/// Display name of an activity type ("harvesting" -> "Harvesting")
#[wasm_bindgen]
pub fn activity_display_name(activity_type: &str) -> Option<String> {
    activity_type
        .parse::<ActivityType>()
        .ok()
        .map(|kind| kind.display_name().to_string())
}
