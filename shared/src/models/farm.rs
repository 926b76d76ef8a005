//! Farm, field and environmental condition models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A farm owned by a farmer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Farm {
    pub id: Uuid,
    pub farmer_id: Uuid,
    pub name: String,
    pub location: String,
    /// Farm size in hectares
    pub size_hectares: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A field within a farm
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Field {
    pub id: Uuid,
    pub farm_id: Uuid,
    pub name: String,
    /// Field size in hectares
    pub size_hectares: Decimal,
    /// Free-text description of where the field sits ("North corner")
    pub location_within_farm: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Environmental readings used by the harvest prediction heuristic.
///
/// Every reading is optional; a missing reading contributes nothing to the
/// prediction and nothing to its confidence.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConditionReadings {
    /// Soil pH (0-14)
    pub soil_ph: Option<Decimal>,
    /// Soil moisture percentage (0-100)
    pub soil_moisture: Option<Decimal>,
    /// Rainfall in mm
    pub rainfall: Option<Decimal>,
    /// Maximum daily temperature in °C
    pub max_daily_temp: Option<Decimal>,
    /// Day length in hours
    pub day_length: Option<Decimal>,
}

impl ConditionReadings {
    /// Number of readings that carry a value
    pub fn populated_count(&self) -> usize {
        [
            self.soil_ph,
            self.soil_moisture,
            self.rainfall,
            self.max_daily_temp,
            self.day_length,
        ]
        .iter()
        .filter(|r| r.is_some())
        .count()
    }

    pub fn is_empty(&self) -> bool {
        self.populated_count() == 0
    }
}

/// Point-in-time environmental snapshot for a farm (at most one per farm)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FarmCondition {
    pub farm_id: Uuid,
    #[serde(flatten)]
    pub readings: ConditionReadings,
    pub updated_at: DateTime<Utc>,
}
