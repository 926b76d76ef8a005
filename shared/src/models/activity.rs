//! Activity log models
//!
//! An activity log records one farm event. The kind of event is carried by
//! [`ActivityDetails`], a tagged union whose variant *is* the discriminator:
//! a log can never claim to be a harvest while holding planting data, and a
//! specialized payload can never exist without its log.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::validation::{validate_non_negative, validate_required_text, FieldErrors};

/// Activity discriminator
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    Preparation,
    Planting,
    Maintenance,
    Harvesting,
    Other,
}

impl ActivityType {
    pub const ALL: [ActivityType; 5] = [
        ActivityType::Preparation,
        ActivityType::Planting,
        ActivityType::Maintenance,
        ActivityType::Harvesting,
        ActivityType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::Preparation => "preparation",
            ActivityType::Planting => "planting",
            ActivityType::Maintenance => "maintenance",
            ActivityType::Harvesting => "harvesting",
            ActivityType::Other => "other",
        }
    }

    /// Human readable label
    pub fn display_name(&self) -> &'static str {
        match self {
            ActivityType::Preparation => "Land Preparation",
            ActivityType::Planting => "Planting",
            ActivityType::Maintenance => "Maintenance",
            ActivityType::Harvesting => "Harvesting",
            ActivityType::Other => "Other",
        }
    }
}

impl std::fmt::Display for ActivityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Returned when a discriminator string names no known activity
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown activity type: {0}")]
pub struct UnknownActivityType(pub String);

impl std::str::FromStr for ActivityType {
    type Err = UnknownActivityType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "preparation" => Ok(ActivityType::Preparation),
            "planting" => Ok(ActivityType::Planting),
            "maintenance" => Ok(ActivityType::Maintenance),
            "harvesting" => Ok(ActivityType::Harvesting),
            "other" => Ok(ActivityType::Other),
            _ => Err(UnknownActivityType(s.to_string())),
        }
    }
}

/// Harvest quality grade
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum HarvestQuality {
    Poor,
    Fair,
    Good,
    Excellent,
}

impl std::fmt::Display for HarvestQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HarvestQuality::Poor => write!(f, "Poor"),
            HarvestQuality::Fair => write!(f, "Fair"),
            HarvestQuality::Good => write!(f, "Good"),
            HarvestQuality::Excellent => write!(f, "Excellent"),
        }
    }
}

/// Land preparation on a field
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PreparationDetails {
    pub field_id: Uuid,
    pub equipment_used: String,
    pub description: String,
}

/// Planting on a field; creates the crop
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlantingDetails {
    pub field_id: Uuid,
    pub crop_type: String,
    /// Seed quantity in kg
    pub seed_quantity: Decimal,
    pub seed_variety: String,
    /// Fertilizer in kg
    pub fertilizer_applied: Decimal,
    pub expected_harvest_date: Option<NaiveDate>,
}

/// Inputs applied during one maintenance visit
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MaintenanceAmounts {
    /// Pesticide in litres
    pub pesticide_applied: Option<Decimal>,
    /// Irrigation in litres
    pub irrigation_amount: Option<Decimal>,
    /// Fertilizer in kg
    pub fertilizer_applied: Option<Decimal>,
}

/// Maintenance on a growing crop
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MaintenanceDetails {
    pub crop_id: Uuid,
    #[serde(flatten)]
    pub amounts: MaintenanceAmounts,
}

/// Harvest of a crop; terminates the crop lifecycle
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HarvestingDetails {
    pub crop_id: Uuid,
    /// Yield in kg
    pub yield_amount: Decimal,
    pub harvest_quality: HarvestQuality,
}

/// Variant-specific payload of an activity log
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "activity_type", content = "details", rename_all = "snake_case")]
pub enum ActivityDetails {
    Preparation(PreparationDetails),
    Planting(PlantingDetails),
    Maintenance(MaintenanceDetails),
    Harvesting(HarvestingDetails),
    Other,
}

impl ActivityDetails {
    pub fn activity_type(&self) -> ActivityType {
        match self {
            ActivityDetails::Preparation(_) => ActivityType::Preparation,
            ActivityDetails::Planting(_) => ActivityType::Planting,
            ActivityDetails::Maintenance(_) => ActivityType::Maintenance,
            ActivityDetails::Harvesting(_) => ActivityType::Harvesting,
            ActivityDetails::Other => ActivityType::Other,
        }
    }

    /// Crop this activity acts on (maintenance and harvesting only)
    pub fn target_crop(&self) -> Option<Uuid> {
        match self {
            ActivityDetails::Maintenance(m) => Some(m.crop_id),
            ActivityDetails::Harvesting(h) => Some(h.crop_id),
            _ => None,
        }
    }

    /// Field this activity acts on (preparation and planting only)
    pub fn target_field(&self) -> Option<Uuid> {
        match self {
            ActivityDetails::Preparation(p) => Some(p.field_id),
            ActivityDetails::Planting(p) => Some(p.field_id),
            _ => None,
        }
    }
}

/// Free-form named value attached to an activity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActivityField {
    pub name: String,
    pub value: String,
}

/// A timestamped farm event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActivityLog {
    pub id: Uuid,
    pub farm_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub details: ActivityDetails,
    #[serde(default)]
    pub custom_fields: Vec<ActivityField>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ActivityLog {
    pub fn activity_type(&self) -> ActivityType {
        self.details.activity_type()
    }

    /// Calendar date the activity took place on
    pub fn activity_date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }

    pub fn maintenance(&self) -> Option<&MaintenanceDetails> {
        match &self.details {
            ActivityDetails::Maintenance(m) => Some(m),
            _ => None,
        }
    }

    pub fn harvesting(&self) -> Option<&HarvestingDetails> {
        match &self.details {
            ActivityDetails::Harvesting(h) => Some(h),
            _ => None,
        }
    }

    pub fn planting(&self) -> Option<&PlantingDetails> {
        match &self.details {
            ActivityDetails::Planting(p) => Some(p),
            _ => None,
        }
    }
}

/// Loosely typed payload as submitted by a form or API client.
///
/// Every field is optional here; [`ActivityPayloadInput::into_details`]
/// checks the fields the chosen activity type requires and reports each
/// missing or invalid one separately.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ActivityPayloadInput {
    pub field_id: Option<Uuid>,
    pub equipment_used: Option<String>,
    pub description: Option<String>,
    pub crop_type: Option<String>,
    pub seed_quantity: Option<Decimal>,
    pub seed_variety: Option<String>,
    pub fertilizer_applied: Option<Decimal>,
    pub expected_harvest_date: Option<NaiveDate>,
    pub crop_id: Option<Uuid>,
    pub pesticide_applied: Option<Decimal>,
    pub irrigation_amount: Option<Decimal>,
    pub yield_amount: Option<Decimal>,
    pub harvest_quality: Option<HarvestQuality>,
}

const REQUIRED: &str = "This field is required";

fn required<T: Clone>(errors: &mut FieldErrors, field: &str, value: &Option<T>) -> Option<T> {
    if value.is_none() {
        errors.add(field, REQUIRED);
    }
    value.clone()
}

fn required_text(errors: &mut FieldErrors, field: &str, value: &Option<String>) -> Option<String> {
    match value {
        None => {
            errors.add(field, REQUIRED);
            None
        }
        Some(text) => {
            if errors.check(field, validate_required_text(text)) {
                Some(text.trim().to_string())
            } else {
                None
            }
        }
    }
}

fn amount(errors: &mut FieldErrors, field: &str, value: Option<Decimal>) -> Option<Decimal> {
    if let Some(v) = value {
        errors.check(field, validate_non_negative(v));
    }
    value
}

fn required_amount(
    errors: &mut FieldErrors,
    field: &str,
    value: &Option<Decimal>,
) -> Option<Decimal> {
    let value = required(errors, field, value);
    amount(errors, field, value)
}

impl ActivityPayloadInput {
    /// Validate the payload against `kind` and build the typed details
    pub fn into_details(self, kind: ActivityType) -> Result<ActivityDetails, FieldErrors> {
        let mut errors = FieldErrors::new();

        let details = match kind {
            ActivityType::Preparation => {
                let field_id = required(&mut errors, "field_id", &self.field_id);
                let equipment = required_text(&mut errors, "equipment_used", &self.equipment_used);
                let description = required_text(&mut errors, "description", &self.description);
                match (field_id, equipment, description) {
                    (Some(field_id), Some(equipment_used), Some(description)) => {
                        Some(ActivityDetails::Preparation(PreparationDetails {
                            field_id,
                            equipment_used,
                            description,
                        }))
                    }
                    _ => None,
                }
            }
            ActivityType::Planting => {
                let field_id = required(&mut errors, "field_id", &self.field_id);
                let crop_type = required_text(&mut errors, "crop_type", &self.crop_type);
                let seed_quantity =
                    required_amount(&mut errors, "seed_quantity", &self.seed_quantity);
                let seed_variety = required_text(&mut errors, "seed_variety", &self.seed_variety);
                let fertilizer =
                    required_amount(&mut errors, "fertilizer_applied", &self.fertilizer_applied);
                match (field_id, crop_type, seed_quantity, seed_variety, fertilizer) {
                    (
                        Some(field_id),
                        Some(crop_type),
                        Some(seed_quantity),
                        Some(seed_variety),
                        Some(fertilizer_applied),
                    ) => Some(ActivityDetails::Planting(PlantingDetails {
                        field_id,
                        crop_type,
                        seed_quantity,
                        seed_variety,
                        fertilizer_applied,
                        expected_harvest_date: self.expected_harvest_date,
                    })),
                    _ => None,
                }
            }
            ActivityType::Maintenance => {
                let crop_id = required(&mut errors, "crop_id", &self.crop_id);
                let pesticide = amount(&mut errors, "pesticide_applied", self.pesticide_applied);
                let irrigation = amount(&mut errors, "irrigation_amount", self.irrigation_amount);
                let fertilizer = amount(&mut errors, "fertilizer_applied", self.fertilizer_applied);
                let amounts = MaintenanceAmounts {
                    pesticide_applied: pesticide,
                    irrigation_amount: irrigation,
                    fertilizer_applied: fertilizer,
                };
                crop_id.map(|crop_id| {
                    ActivityDetails::Maintenance(MaintenanceDetails { crop_id, amounts })
                })
            }
            ActivityType::Harvesting => {
                let crop_id = required(&mut errors, "crop_id", &self.crop_id);
                let yield_amount =
                    required_amount(&mut errors, "yield_amount", &self.yield_amount);
                let quality = required(&mut errors, "harvest_quality", &self.harvest_quality);
                match (crop_id, yield_amount, quality) {
                    (Some(crop_id), Some(yield_amount), Some(harvest_quality)) => {
                        Some(ActivityDetails::Harvesting(HarvestingDetails {
                            crop_id,
                            yield_amount,
                            harvest_quality,
                        }))
                    }
                    _ => None,
                }
            }
            ActivityType::Other => Some(ActivityDetails::Other),
        };

        match details {
            Some(details) if errors.is_empty() => Ok(details),
            _ => Err(errors),
        }
    }

    /// Values present in `changes` replace the ones in `self`
    pub fn overlay(self, changes: ActivityPayloadInput) -> Self {
        Self {
            field_id: changes.field_id.or(self.field_id),
            equipment_used: changes.equipment_used.or(self.equipment_used),
            description: changes.description.or(self.description),
            crop_type: changes.crop_type.or(self.crop_type),
            seed_quantity: changes.seed_quantity.or(self.seed_quantity),
            seed_variety: changes.seed_variety.or(self.seed_variety),
            fertilizer_applied: changes.fertilizer_applied.or(self.fertilizer_applied),
            expected_harvest_date: changes.expected_harvest_date.or(self.expected_harvest_date),
            crop_id: changes.crop_id.or(self.crop_id),
            pesticide_applied: changes.pesticide_applied.or(self.pesticide_applied),
            irrigation_amount: changes.irrigation_amount.or(self.irrigation_amount),
            yield_amount: changes.yield_amount.or(self.yield_amount),
            harvest_quality: changes.harvest_quality.or(self.harvest_quality),
        }
    }
}

impl From<&ActivityDetails> for ActivityPayloadInput {
    fn from(details: &ActivityDetails) -> Self {
        match details {
            ActivityDetails::Preparation(p) => Self {
                field_id: Some(p.field_id),
                equipment_used: Some(p.equipment_used.clone()),
                description: Some(p.description.clone()),
                ..Default::default()
            },
            ActivityDetails::Planting(p) => Self {
                field_id: Some(p.field_id),
                crop_type: Some(p.crop_type.clone()),
                seed_quantity: Some(p.seed_quantity),
                seed_variety: Some(p.seed_variety.clone()),
                fertilizer_applied: Some(p.fertilizer_applied),
                expected_harvest_date: p.expected_harvest_date,
                ..Default::default()
            },
            ActivityDetails::Maintenance(m) => Self {
                crop_id: Some(m.crop_id),
                pesticide_applied: m.amounts.pesticide_applied,
                irrigation_amount: m.amounts.irrigation_amount,
                fertilizer_applied: m.amounts.fertilizer_applied,
                ..Default::default()
            },
            ActivityDetails::Harvesting(h) => Self {
                crop_id: Some(h.crop_id),
                yield_amount: Some(h.yield_amount),
                harvest_quality: Some(h.harvest_quality),
                ..Default::default()
            },
            ActivityDetails::Other => Self::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activity_type_from_str() {
        assert_eq!("planting".parse::<ActivityType>(), Ok(ActivityType::Planting));
        assert_eq!(" Harvesting ".parse::<ActivityType>(), Ok(ActivityType::Harvesting));
        assert!("sowing".parse::<ActivityType>().is_err());
        for kind in ActivityType::ALL {
            assert_eq!(kind.as_str().parse::<ActivityType>(), Ok(kind));
        }
    }

    #[test]
    fn test_harvest_yield_missing_or_negative() {
        let missing = ActivityPayloadInput {
            crop_id: Some(Uuid::new_v4()),
            harvest_quality: Some(HarvestQuality::Good),
            ..Default::default()
        };
        let errors = missing.into_details(ActivityType::Harvesting).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors.has("yield_amount"));

        let negative = ActivityPayloadInput {
            crop_id: Some(Uuid::new_v4()),
            yield_amount: Some(Decimal::from(-40)),
            harvest_quality: Some(HarvestQuality::Good),
            ..Default::default()
        };
        let errors = negative.into_details(ActivityType::Harvesting).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors.has("yield_amount"));
    }

    #[test]
    fn test_planting_missing_fields_reported_per_field() {
        let input = ActivityPayloadInput {
            field_id: Some(Uuid::new_v4()),
            seed_quantity: Some(Decimal::from(-2)),
            ..Default::default()
        };
        let errors = input.into_details(ActivityType::Planting).unwrap_err();

        assert!(errors.has("crop_type"));
        assert!(errors.has("seed_variety"));
        assert!(errors.has("fertilizer_applied"));
        assert!(errors.has("seed_quantity"));
        assert!(!errors.has("field_id"));
    }

    #[test]
    fn test_blank_text_is_rejected() {
        let input = ActivityPayloadInput {
            field_id: Some(Uuid::new_v4()),
            equipment_used: Some("   ".to_string()),
            description: Some("Ploughed".to_string()),
            ..Default::default()
        };
        let errors = input.into_details(ActivityType::Preparation).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors.has("equipment_used"));
    }

    #[test]
    fn test_maintenance_amounts_optional() {
        let crop_id = Uuid::new_v4();
        let input = ActivityPayloadInput {
            crop_id: Some(crop_id),
            irrigation_amount: Some(Decimal::from(200)),
            ..Default::default()
        };
        let details = input.into_details(ActivityType::Maintenance).unwrap();
        assert_eq!(details.activity_type(), ActivityType::Maintenance);
        assert_eq!(details.target_crop(), Some(crop_id));
    }

    #[test]
    fn test_negative_maintenance_amount_rejected() {
        let input = ActivityPayloadInput {
            crop_id: Some(Uuid::new_v4()),
            pesticide_applied: Some(Decimal::new(-5, 1)),
            ..Default::default()
        };
        let errors = input.into_details(ActivityType::Maintenance).unwrap_err();
        assert!(errors.has("pesticide_applied"));
    }

    #[test]
    fn test_other_needs_no_payload() {
        let details = ActivityPayloadInput::default()
            .into_details(ActivityType::Other)
            .unwrap();
        assert_eq!(details, ActivityDetails::Other);
    }

    #[test]
    fn test_overlay_keeps_existing_values() {
        let existing = ActivityDetails::Harvesting(HarvestingDetails {
            crop_id: Uuid::new_v4(),
            yield_amount: Decimal::from(100),
            harvest_quality: HarvestQuality::Fair,
        });
        let changes = ActivityPayloadInput {
            harvest_quality: Some(HarvestQuality::Excellent),
            ..Default::default()
        };
        let merged = ActivityPayloadInput::from(&existing)
            .overlay(changes)
            .into_details(ActivityType::Harvesting)
            .unwrap();

        match merged {
            ActivityDetails::Harvesting(h) => {
                assert_eq!(h.yield_amount, Decimal::from(100));
                assert_eq!(h.harvest_quality, HarvestQuality::Excellent);
            }
            other => panic!("unexpected details: {:?}", other),
        }
    }

    #[test]
    fn test_details_serialize_with_discriminator() {
        let details = ActivityDetails::Maintenance(MaintenanceDetails {
            crop_id: Uuid::nil(),
            amounts: MaintenanceAmounts {
                irrigation_amount: Some(Decimal::from(50)),
                ..Default::default()
            },
        });
        let json = serde_json::to_value(&details).unwrap();
        assert_eq!(json["activity_type"], "maintenance");
        assert_eq!(json["details"]["irrigation_amount"], "50");
    }
}
