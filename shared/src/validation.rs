//! Validation utilities for AgriTrace records
//!
//! Single-value validators return `Result<(), &'static str>`; record-level
//! validators collect every failure into [`FieldErrors`] so a form can show
//! all problems at once.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::ConditionReadings;

/// A validation failure attached to one input field
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Every validation failure found in one request
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, thiserror::Error)]
#[error("{}", summarize(.errors))]
pub struct FieldErrors {
    errors: Vec<FieldError>,
}

fn summarize(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.errors.push(FieldError {
            field: field.to_string(),
            message: message.into(),
        });
    }

    /// Record `result` against `field`; returns whether it passed
    pub fn check(&mut self, field: &str, result: Result<(), &'static str>) -> bool {
        match result {
            Ok(()) => true,
            Err(message) => {
                self.add(field, message);
                false
            }
        }
    }

    pub fn merge(&mut self, other: FieldErrors) {
        self.errors.extend(other.errors);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.errors.iter()
    }

    pub fn has(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    pub fn first(&self) -> Option<&FieldError> {
        self.errors.first()
    }

    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

// ============================================================================
// Environmental readings
// ============================================================================

/// Validate soil pH (0-14)
pub fn validate_soil_ph(ph: Decimal) -> Result<(), &'static str> {
    if ph < Decimal::ZERO || ph > Decimal::from(14) {
        return Err("Soil pH must be between 0 and 14");
    }
    Ok(())
}

/// Validate soil moisture percentage (0-100)
pub fn validate_soil_moisture(moisture: Decimal) -> Result<(), &'static str> {
    if moisture < Decimal::ZERO || moisture > Decimal::from(100) {
        return Err("Soil moisture must be between 0 and 100%");
    }
    Ok(())
}

pub fn validate_rainfall(rainfall: Decimal) -> Result<(), &'static str> {
    if rainfall < Decimal::ZERO {
        return Err("Rainfall cannot be negative");
    }
    Ok(())
}

/// Validate maximum daily temperature (-50 to 60 °C)
pub fn validate_temperature(temp: Decimal) -> Result<(), &'static str> {
    if temp < Decimal::from(-50) || temp > Decimal::from(60) {
        return Err("Temperature must be between -50 and 60 °C");
    }
    Ok(())
}

/// Validate day length in hours (0-24)
pub fn validate_day_length(hours: Decimal) -> Result<(), &'static str> {
    if hours < Decimal::ZERO || hours > Decimal::from(24) {
        return Err("Day length must be between 0 and 24 hours");
    }
    Ok(())
}

/// Validate every populated reading of a farm condition snapshot
pub fn validate_condition_readings(readings: &ConditionReadings) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();
    if let Some(ph) = readings.soil_ph {
        errors.check("soil_ph", validate_soil_ph(ph));
    }
    if let Some(moisture) = readings.soil_moisture {
        errors.check("soil_moisture", validate_soil_moisture(moisture));
    }
    if let Some(rainfall) = readings.rainfall {
        errors.check("rainfall", validate_rainfall(rainfall));
    }
    if let Some(temp) = readings.max_daily_temp {
        errors.check("max_daily_temp", validate_temperature(temp));
    }
    if let Some(hours) = readings.day_length {
        errors.check("day_length", validate_day_length(hours));
    }
    errors.into_result()
}

// ============================================================================
// Quantities and dates
// ============================================================================

pub fn validate_non_negative(amount: Decimal) -> Result<(), &'static str> {
    if amount < Decimal::ZERO {
        return Err("Amount cannot be negative");
    }
    Ok(())
}

pub fn validate_positive(amount: Decimal) -> Result<(), &'static str> {
    if amount <= Decimal::ZERO {
        return Err("Amount must be greater than zero");
    }
    Ok(())
}

/// Reject empty or whitespace-only text
pub fn validate_required_text(value: &str) -> Result<(), &'static str> {
    if value.trim().is_empty() {
        return Err("This field cannot be empty");
    }
    Ok(())
}

/// Activity timestamps may not lie in the future
pub fn validate_not_in_future(
    timestamp: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<(), &'static str> {
    if timestamp > now {
        return Err("Timestamp cannot be in the future");
    }
    Ok(())
}

/// Expected harvest must fall strictly after planting
pub fn validate_expected_harvest_date(
    planting_date: NaiveDate,
    expected_harvest_date: NaiveDate,
) -> Result<(), &'static str> {
    if expected_harvest_date <= planting_date {
        return Err("Expected harvest date must be after the planting date");
    }
    Ok(())
}

// ============================================================================
// Accounts
// ============================================================================

/// Validate email format (basic check)
pub fn validate_email(email: &str) -> Result<(), &'static str> {
    let Some((local, domain)) = email.split_once('@') else {
        return Err("Invalid email format");
    };
    if local.is_empty()
        || !domain.contains('.')
        || domain.starts_with('.')
        || domain.ends_with('.')
    {
        return Err("Invalid email format");
    }
    Ok(())
}

/// Phone numbers: 7-15 digits, optional leading '+', spaces and dashes ignored
pub fn validate_phone_number(phone: &str) -> Result<(), &'static str> {
    let trimmed = phone.trim();
    let body = trimmed.strip_prefix('+').unwrap_or(trimmed);
    if !body.chars().all(|c| c.is_ascii_digit() || c == ' ' || c == '-') {
        return Err("Phone number may only contain digits, spaces and dashes");
    }
    let digits = body.chars().filter(|c| c.is_ascii_digit()).count();
    if !(7..=15).contains(&digits) {
        return Err("Phone number must have between 7 and 15 digits");
    }
    Ok(())
}

// ============================================================================
// Reviews
// ============================================================================

/// Star rating, 1 to 5
pub fn validate_rating(rating: u8) -> Result<(), &'static str> {
    if !(1..=5).contains(&rating) {
        return Err("Please provide a valid rating between 1 and 5");
    }
    Ok(())
}

pub fn validate_review_text(text: &str) -> Result<(), &'static str> {
    if text.trim().chars().count() < 10 {
        return Err("Please provide a review with at least 10 characters");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_soil_ph_bounds() {
        assert!(validate_soil_ph(Decimal::ZERO).is_ok());
        assert!(validate_soil_ph(Decimal::from(14)).is_ok());
        assert!(validate_soil_ph(Decimal::new(145, 1)).is_err());
        assert!(validate_soil_ph(Decimal::new(-1, 1)).is_err());
    }

    #[test]
    fn test_temperature_bounds() {
        assert!(validate_temperature(Decimal::from(-50)).is_ok());
        assert!(validate_temperature(Decimal::from(60)).is_ok());
        assert!(validate_temperature(Decimal::from(61)).is_err());
    }

    #[test]
    fn test_condition_readings_collects_all_errors() {
        let readings = ConditionReadings {
            soil_ph: Some(Decimal::from(15)),
            soil_moisture: Some(Decimal::from(120)),
            rainfall: Some(Decimal::from(80)),
            max_daily_temp: None,
            day_length: Some(Decimal::from(25)),
        };
        let errors = validate_condition_readings(&readings).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.has("soil_ph"));
        assert!(errors.has("soil_moisture"));
        assert!(errors.has("day_length"));
        assert!(!errors.has("rainfall"));
    }

    #[test]
    fn test_empty_readings_are_valid() {
        assert!(validate_condition_readings(&ConditionReadings::default()).is_ok());
    }

    #[test]
    fn test_future_timestamp_rejected() {
        let now = Utc::now();
        assert!(validate_not_in_future(now, now).is_ok());
        assert!(validate_not_in_future(now + Duration::minutes(5), now).is_err());
    }

    #[test]
    fn test_expected_harvest_after_planting() {
        let planted = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert!(validate_expected_harvest_date(planted, planted).is_err());
        assert!(validate_expected_harvest_date(planted, planted.succ_opt().unwrap()).is_ok());
    }

    #[test]
    fn test_email() {
        assert!(validate_email("farmer@example.com").is_ok());
        assert!(validate_email("farmer.example.com").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("farmer@localhost").is_err());
    }

    #[test]
    fn test_phone_number() {
        assert!(validate_phone_number("+62 812-3456-7890").is_ok());
        assert!(validate_phone_number("081234567").is_ok());
        assert!(validate_phone_number("12345").is_err());
        assert!(validate_phone_number("0812abc").is_err());
    }

    #[test]
    fn test_field_errors_display() {
        let mut errors = FieldErrors::new();
        errors.add("soil_ph", "Soil pH must be between 0 and 14");
        errors.add("name", "This field cannot be empty");
        assert_eq!(
            errors.to_string(),
            "soil_ph: Soil pH must be between 0 and 14; name: This field cannot be empty"
        );
        assert!(errors.has("name"));
    }

    #[test]
    fn test_review_bounds() {
        assert!(validate_rating(0).is_err());
        assert!(validate_rating(1).is_ok());
        assert!(validate_rating(5).is_ok());
        assert!(validate_rating(6).is_err());
        assert!(validate_review_text("  too short ").is_err());
        assert!(validate_review_text("Fresh and well packed").is_ok());
    }
}
