//! Rule-based harvest date prediction
//!
//! The predicted harvest date is `planting_date + base + maintenance +
//! environment` days, where the base period comes from a crop table and the
//! two adjustments are banded scores over the crop's maintenance history and
//! the farm's latest environmental snapshot. Every function here is pure; the
//! evaluation date is always passed in.

use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{ConditionReadings, Crop, MaintenanceAmounts};

/// Base growing periods in days, in match priority order
pub const BASE_GROWING_PERIODS: &[(&str, i64)] = &[
    ("corn", 90),
    ("rice", 120),
    ("tomato", 80),
    ("potato", 100),
    ("cabbage", 70),
    ("carrot", 75),
    ("chili", 90),
    ("onion", 100),
    ("soybean", 100),
    ("peanut", 120),
    ("cassava", 300),
    ("coffee", 270),
    ("cacao", 180),
    ("banana", 300),
    ("sugarcane", 300),
];

/// Growing period for crop types missing from the table
pub const DEFAULT_GROWING_PERIOD: i64 = 100;

/// Added when a crop has no maintenance records at all
pub const NEGLECT_PENALTY_DAYS: i64 = 15;

/// Shortest growing period a prediction may report
pub const MIN_GROWING_DAYS: i64 = 1;

const BASE_CONFIDENCE: u32 = 60;
const CONFIDENCE_PER_READING: u32 = 5;
const CONFIDENCE_PER_RECORD: u32 = 3;
const MAX_RECORD_CONFIDENCE: u32 = 15;
const KNOWN_CROP_CONFIDENCE: u32 = 10;

/// What the heuristic needs to know about a crop
#[derive(Debug, Clone, Copy)]
pub struct CropHistory<'a> {
    pub crop_type: &'a str,
    pub planting_date: NaiveDate,
    pub maintenance: &'a [MaintenanceAmounts],
}

impl<'a> CropHistory<'a> {
    pub fn for_crop(crop: &'a Crop, maintenance: &'a [MaintenanceAmounts]) -> Self {
        Self {
            crop_type: &crop.crop_type,
            planting_date: crop.planting_date,
            maintenance,
        }
    }
}

/// Outcome of one prediction, with the components that produced it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HarvestPrediction {
    pub predicted_date: NaiveDate,
    /// Confidence percentage (0-100)
    pub confidence: u8,
    pub base_days: i64,
    pub maintenance_adjustment: i64,
    pub environment_adjustment: i64,
    /// Growing period actually applied, after clamping
    pub total_days: i64,
    /// Table entry the crop type matched, if any
    pub matched_crop_type: Option<String>,
    /// True when the raw total fell below the minimum and was raised to it
    pub clamped: bool,
}

impl HarvestPrediction {
    /// Sum of the components before clamping
    pub fn unclamped_days(&self) -> i64 {
        self.base_days + self.maintenance_adjustment + self.environment_adjustment
    }
}

/// First table entry whose name contains, or is contained in, the crop type
/// (case-insensitive). Blank crop types match nothing.
pub fn match_crop_type(crop_type: &str) -> Option<(&'static str, i64)> {
    let normalized = crop_type.trim().to_lowercase();
    if normalized.is_empty() {
        return None;
    }
    BASE_GROWING_PERIODS
        .iter()
        .find(|(known, _)| normalized.contains(known) || known.contains(normalized.as_str()))
        .copied()
}

pub fn base_growing_period(crop_type: &str) -> i64 {
    match_crop_type(crop_type)
        .map(|(_, days)| days)
        .unwrap_or(DEFAULT_GROWING_PERIOD)
}

/// Mean of the recorded amounts over every record. A sum too large for
/// `Decimal` is reported as `Decimal::MAX`, which lands in the top band.
fn average(
    records: &[MaintenanceAmounts],
    pick: impl Fn(&MaintenanceAmounts) -> Option<Decimal>,
) -> Option<Decimal> {
    let total = records
        .iter()
        .filter_map(&pick)
        .try_fold(Decimal::ZERO, |sum, value| sum.checked_add(value));
    let Some(total) = total else {
        return Some(Decimal::MAX);
    };
    if total > Decimal::ZERO {
        Some(total / Decimal::from(records.len()))
    } else {
        None
    }
}

/// Days added or removed by the maintenance history
pub fn maintenance_adjustment(
    records: &[MaintenanceAmounts],
    planting_date: NaiveDate,
    today: NaiveDate,
) -> i64 {
    if records.is_empty() {
        return NEGLECT_PENALTY_DAYS;
    }

    let mut days = 0;

    if let Some(fertilizer) = average(records, |m| m.fertilizer_applied) {
        if fertilizer <= Decimal::from(5) {
            days -= 5;
        } else if fertilizer <= Decimal::from(15) {
            days -= 10;
        } else {
            days += 5;
        }
    }

    if let Some(irrigation) = average(records, |m| m.irrigation_amount) {
        if irrigation <= Decimal::from(100) {
            days -= 3;
        } else if irrigation <= Decimal::from(500) {
            days -= 7;
        } else {
            days += 10;
        }
    }

    if let Some(pesticide) = average(records, |m| m.pesticide_applied) {
        if pesticide <= Decimal::from(3) {
            days -= 3;
        } else {
            days += 2;
        }
    }

    // Visits per 30 days, compared without division
    let days_since_planting = (today - planting_date).num_days();
    if days_since_planting > 0 {
        let scaled_visits = records.len() as i64 * 30;
        if scaled_visits < days_since_planting {
            days += 10;
        } else if scaled_visits < 4 * days_since_planting {
            days -= 5;
        } else {
            days -= 8;
        }
    }

    days
}

fn in_range(value: Decimal, low: i64, high: i64) -> bool {
    value >= Decimal::from(low) && value <= Decimal::from(high)
}

/// Temperature score; rice and corn have their own bands
pub fn temperature_adjustment(crop_type: &str, temp: Decimal) -> i64 {
    let crop = crop_type.to_lowercase();
    let t = |n: i64| Decimal::from(n);

    if crop.contains("rice") || crop.contains("padi") {
        if in_range(temp, 25, 30) {
            -10
        } else if (temp >= t(20) && temp < t(25)) || (temp > t(30) && temp <= t(35)) {
            -5
        } else if temp > t(35) {
            15
        } else {
            0
        }
    } else if crop.contains("corn") || crop.contains("jagung") {
        if in_range(temp, 20, 30) {
            -8
        } else if (temp >= t(15) && temp < t(20)) || (temp > t(30) && temp <= t(32)) {
            -3
        } else if temp > t(32) {
            10
        } else {
            0
        }
    } else if in_range(temp, 18, 28) {
        -7
    } else if (temp >= t(15) && temp < t(18)) || (temp > t(28) && temp <= t(32)) {
        -3
    } else {
        10
    }
}

pub fn soil_ph_adjustment(ph: Decimal) -> i64 {
    let (low, high) = (Decimal::new(55, 1), Decimal::new(75, 1));
    if in_range(ph, 6, 7) {
        -5
    } else if (ph >= low && ph < Decimal::from(6)) || (ph > Decimal::from(7) && ph <= high) {
        -2
    } else {
        8
    }
}

pub fn soil_moisture_adjustment(moisture: Decimal) -> i64 {
    let t = |n: i64| Decimal::from(n);
    if in_range(moisture, 50, 70) {
        -7
    } else if (moisture >= t(40) && moisture < t(50)) || (moisture > t(70) && moisture <= t(80)) {
        -3
    } else if moisture < t(20) {
        15
    } else if moisture > t(90) {
        20
    } else {
        0
    }
}

pub fn rainfall_adjustment(rainfall: Decimal) -> i64 {
    let t = |n: i64| Decimal::from(n);
    if in_range(rainfall, 100, 200) {
        -5
    } else if (rainfall >= t(50) && rainfall < t(100))
        || (rainfall > t(200) && rainfall <= t(300))
    {
        -2
    } else if rainfall > t(400) {
        10
    } else {
        0
    }
}

pub fn day_length_adjustment(hours: Decimal) -> i64 {
    let t = |n: i64| Decimal::from(n);
    if in_range(hours, 10, 14) {
        -5
    } else if (hours >= t(8) && hours < t(10)) || (hours > t(14) && hours <= t(16)) {
        -2
    } else {
        3
    }
}

/// Days added or removed by the environmental snapshot (0 without one)
pub fn environment_adjustment(crop_type: &str, condition: Option<&ConditionReadings>) -> i64 {
    let Some(readings) = condition else {
        return 0;
    };

    readings
        .max_daily_temp
        .map(|temp| temperature_adjustment(crop_type, temp))
        .unwrap_or(0)
        + readings.soil_ph.map(soil_ph_adjustment).unwrap_or(0)
        + readings.soil_moisture.map(soil_moisture_adjustment).unwrap_or(0)
        + readings.rainfall.map(rainfall_adjustment).unwrap_or(0)
        + readings.day_length.map(day_length_adjustment).unwrap_or(0)
}

/// Confidence in the prediction based on how much data backs it
pub fn prediction_confidence(
    crop_type: &str,
    maintenance_records: usize,
    condition: Option<&ConditionReadings>,
) -> u8 {
    let readings = condition.map(|c| c.populated_count() as u32).unwrap_or(0);
    let records = (maintenance_records.min(u32::MAX as usize) as u32)
        .saturating_mul(CONFIDENCE_PER_RECORD)
        .min(MAX_RECORD_CONFIDENCE);
    let known = if match_crop_type(crop_type).is_some() {
        KNOWN_CROP_CONFIDENCE
    } else {
        0
    };

    (BASE_CONFIDENCE + readings * CONFIDENCE_PER_READING + records + known).min(100) as u8
}

/// Predict with the default one-day floor
pub fn predict_harvest(
    history: &CropHistory<'_>,
    condition: Option<&ConditionReadings>,
    today: NaiveDate,
) -> HarvestPrediction {
    predict_harvest_with_floor(history, condition, today, MIN_GROWING_DAYS)
}

/// Predict, raising any total below `min_days` to `min_days`
pub fn predict_harvest_with_floor(
    history: &CropHistory<'_>,
    condition: Option<&ConditionReadings>,
    today: NaiveDate,
    min_days: i64,
) -> HarvestPrediction {
    let matched = match_crop_type(history.crop_type);
    let base_days = matched.map(|(_, days)| days).unwrap_or(DEFAULT_GROWING_PERIOD);
    let maintenance = maintenance_adjustment(history.maintenance, history.planting_date, today);
    let environment = environment_adjustment(history.crop_type, condition);

    let raw_total = base_days + maintenance + environment;
    let floor = min_days.max(MIN_GROWING_DAYS);
    let clamped = raw_total < floor;
    let total_days = raw_total.max(floor);

    let predicted_date = history
        .planting_date
        .checked_add_days(Days::new(total_days as u64))
        .unwrap_or(NaiveDate::MAX);

    HarvestPrediction {
        predicted_date,
        confidence: prediction_confidence(history.crop_type, history.maintenance.len(), condition),
        base_days,
        maintenance_adjustment: maintenance,
        environment_adjustment: environment,
        total_days,
        matched_crop_type: matched.map(|(name, _)| name.to_string()),
        clamped,
    }
}

/// Self-contained prediction input, as read by the CLI and browser bindings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PredictionRequest {
    pub crop_type: String,
    pub planting_date: NaiveDate,
    #[serde(default)]
    pub maintenance: Vec<MaintenanceAmounts>,
    #[serde(default)]
    pub conditions: Option<ConditionReadings>,
    /// Evaluation date; the caller's "today" when absent
    #[serde(default)]
    pub as_of: Option<NaiveDate>,
}

impl PredictionRequest {
    pub fn history(&self) -> CropHistory<'_> {
        CropHistory {
            crop_type: &self.crop_type,
            planting_date: self.planting_date,
            maintenance: &self.maintenance,
        }
    }

    pub fn evaluate(&self, today: NaiveDate) -> HarvestPrediction {
        self.evaluate_with_floor(today, MIN_GROWING_DAYS)
    }

    pub fn evaluate_with_floor(&self, today: NaiveDate, min_days: i64) -> HarvestPrediction {
        predict_harvest_with_floor(
            &self.history(),
            self.conditions.as_ref(),
            self.as_of.unwrap_or(today),
            min_days,
        )
    }
}
