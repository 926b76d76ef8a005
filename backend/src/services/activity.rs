//! Activity log service
//!
//! Creates, updates and deletes farm activity logs together with their
//! side effects on crops. Each operation runs in a single store transaction
//! and is scoped to a farm owned by the calling farmer.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use shared::{
    validate_expected_harvest_date, validate_not_in_future, validate_required_text, ActivityDetails,
    ActivityField, ActivityLog, ActivityPayloadInput, ActivityType, Crop, DateRange, FieldErrors,
    MaintenanceAmounts, PaginatedResponse, Pagination, PlantingDetails,
};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::store::{Store, Tables};

/// Activity service for recording farm events
#[derive(Clone)]
pub struct ActivityService {
    store: Store,
}

/// Input for recording an activity
#[derive(Debug, Clone, Deserialize)]
pub struct CreateActivityInput {
    /// Discriminator as submitted ("planting", "harvesting", ...)
    pub activity_type: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub custom_fields: Vec<ActivityField>,
    #[serde(default)]
    pub payload: ActivityPayloadInput,
}

/// Input for updating an activity. Absent values are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateActivityInput {
    /// Must match the stored type when present
    pub activity_type: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub custom_fields: Option<Vec<ActivityField>>,
    #[serde(default)]
    pub payload: ActivityPayloadInput,
}

/// Filter for activity listings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActivityFilter {
    pub activity_type: Option<ActivityType>,
    pub date_range: Option<DateRange>,
}

/// One maintenance visit on a crop
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MaintenanceRecord {
    pub activity_id: Uuid,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub amounts: MaintenanceAmounts,
}

fn parse_activity_type(raw: &str) -> AppResult<ActivityType> {
    raw.parse::<ActivityType>()
        .map_err(|e| AppError::invalid("activity_type", e.to_string()))
}

fn check_custom_fields(errors: &mut FieldErrors, fields: &[ActivityField]) {
    for field in fields {
        if validate_required_text(&field.name).is_err() {
            errors.add("custom_fields", "Custom field names cannot be empty");
            break;
        }
    }
}

fn require_field(tables: &Tables, farm_id: Uuid, field_id: Uuid) -> AppResult<()> {
    tables
        .field_in_farm(farm_id, field_id)
        .map(|_| ())
        .ok_or_else(|| AppError::invalid("field_id", "Field does not belong to this farm"))
}

/// Crop a maintenance or harvesting log may target
fn require_active_crop(tables: &Tables, farm_id: Uuid, crop_id: Uuid) -> AppResult<Crop> {
    let crop = tables
        .crop_in_farm(farm_id, crop_id)
        .ok_or_else(|| AppError::invalid("crop_id", "Crop does not belong to this farm"))?;
    if !crop.is_active() {
        return Err(AppError::InvalidStateTransition(format!(
            "Crop {} has already been harvested",
            crop.crop_type
        )));
    }
    Ok(crop.clone())
}

fn check_expected_harvest(planting: &PlantingDetails, planting_date: NaiveDate) -> AppResult<()> {
    if let Some(expected) = planting.expected_harvest_date {
        validate_expected_harvest_date(planting_date, expected)
            .map_err(|msg| AppError::invalid("expected_harvest_date", msg))?;
    }
    Ok(())
}

fn crop_in_farm(tables: &Tables, farm_id: Uuid, crop_id: Uuid) -> AppResult<Crop> {
    tables
        .crop_in_farm(farm_id, crop_id)
        .cloned()
        .ok_or_else(|| AppError::invalid("crop_id", "Crop does not belong to this farm"))
}

fn check_not_before_planting(crop: &Crop, date: NaiveDate) -> AppResult<()> {
    if date < crop.planting_date {
        return Err(AppError::invalid(
            "timestamp",
            "Activity date cannot be before the crop's planting date",
        ));
    }
    Ok(())
}

impl ActivityService {
    /// Create a new ActivityService instance
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Record an activity and apply its side effects
    pub fn create_activity(
        &self,
        farmer_id: Uuid,
        farm_id: Uuid,
        input: CreateActivityInput,
    ) -> AppResult<ActivityLog> {
        let kind = parse_activity_type(&input.activity_type)?;

        let now = Utc::now();
        let mut errors = FieldErrors::new();
        errors.check("timestamp", validate_not_in_future(input.timestamp, now));
        check_custom_fields(&mut errors, &input.custom_fields);
        let details = match input.payload.into_details(kind) {
            Ok(details) => Some(details),
            Err(payload_errors) => {
                errors.merge(payload_errors);
                None
            }
        };
        errors.into_result()?;
        let details = details.ok_or_else(|| AppError::Internal("payload missing".to_string()))?;

        let mut tx = self.store.begin()?;
        tx.owned_farm(farmer_id, farm_id)?;

        let log_id = Uuid::new_v4();
        let activity_date = input.timestamp.date_naive();

        match &details {
            ActivityDetails::Preparation(prep) => {
                require_field(&tx, farm_id, prep.field_id)?;
            }
            ActivityDetails::Planting(planting) => {
                require_field(&tx, farm_id, planting.field_id)?;
                check_expected_harvest(planting, activity_date)?;

                let crop = Crop {
                    id: Uuid::new_v4(),
                    farm_id,
                    field_id: planting.field_id,
                    crop_type: planting.crop_type.clone(),
                    planting_date: activity_date,
                    expected_harvest_date: planting.expected_harvest_date,
                    is_harvested: false,
                    harvest_date: None,
                    seed_variety: Some(planting.seed_variety.clone()),
                    planting_log_id: log_id,
                };
                tracing::info!(crop_id = %crop.id, crop_type = %crop.crop_type, "Crop planted");
                tx.crops.insert(crop.id, crop);
            }
            ActivityDetails::Maintenance(maintenance) => {
                let crop = require_active_crop(&tx, farm_id, maintenance.crop_id)?;
                check_not_before_planting(&crop, activity_date)?;
            }
            ActivityDetails::Harvesting(harvest) => {
                let mut crop = require_active_crop(&tx, farm_id, harvest.crop_id)?;
                crop.mark_harvested(activity_date)
                    .map_err(|msg| AppError::invalid("timestamp", msg))?;
                tracing::info!(
                    crop_id = %crop.id,
                    harvest_date = %activity_date,
                    "Crop harvested"
                );
                tx.crops.insert(crop.id, crop);
            }
            ActivityDetails::Other => {}
        }

        let log = ActivityLog {
            id: log_id,
            farm_id,
            timestamp: input.timestamp,
            details,
            custom_fields: input.custom_fields,
            created_at: now,
            updated_at: now,
        };
        tx.activities.insert(log.id, log.clone());
        tx.commit();

        tracing::info!(
            activity_id = %log.id,
            farm_id = %farm_id,
            activity_type = %log.activity_type(),
            "Activity recorded"
        );
        Ok(log)
    }

    /// Update an activity's timestamp, custom fields and payload.
    ///
    /// The activity type itself can never change.
    pub fn update_activity(
        &self,
        farmer_id: Uuid,
        farm_id: Uuid,
        activity_id: Uuid,
        input: UpdateActivityInput,
    ) -> AppResult<ActivityLog> {
        let mut tx = self.store.begin()?;
        tx.owned_farm(farmer_id, farm_id)?;
        let existing = tx.activity_in_farm(farm_id, activity_id)?.clone();
        let kind = existing.activity_type();

        if let Some(raw) = &input.activity_type {
            if parse_activity_type(raw)? != kind {
                return Err(AppError::invalid(
                    "activity_type",
                    format!("Activity type cannot be changed from {}", kind),
                ));
            }
        }

        let now = Utc::now();
        let timestamp = input.timestamp.unwrap_or(existing.timestamp);
        let mut errors = FieldErrors::new();
        errors.check("timestamp", validate_not_in_future(timestamp, now));
        if let Some(fields) = &input.custom_fields {
            check_custom_fields(&mut errors, fields);
        }
        let details = match ActivityPayloadInput::from(&existing.details)
            .overlay(input.payload)
            .into_details(kind)
        {
            Ok(details) => Some(details),
            Err(payload_errors) => {
                errors.merge(payload_errors);
                None
            }
        };
        errors.into_result()?;
        let details = details.ok_or_else(|| AppError::Internal("payload missing".to_string()))?;

        let activity_date = timestamp.date_naive();

        match (&existing.details, &details) {
            (ActivityDetails::Preparation(_), ActivityDetails::Preparation(prep)) => {
                require_field(&tx, farm_id, prep.field_id)?;
            }
            (ActivityDetails::Planting(_), ActivityDetails::Planting(planting)) => {
                require_field(&tx, farm_id, planting.field_id)?;
                check_expected_harvest(planting, activity_date)?;

                if let Some(crop) = tx.crop_for_planting(activity_id).cloned() {
                    if crop.harvest_date.is_some_and(|harvested| harvested < activity_date) {
                        return Err(AppError::invalid(
                            "timestamp",
                            "Planting date cannot be after the crop's harvest date",
                        ));
                    }
                    let first_visit = tx
                        .maintenance_logs(crop.id)
                        .first()
                        .map(|log| log.timestamp.date_naive());
                    if first_visit.is_some_and(|visited| visited < activity_date) {
                        return Err(AppError::invalid(
                            "timestamp",
                            "Planting date cannot be after the crop's first maintenance visit",
                        ));
                    }
                    let updated = Crop {
                        field_id: planting.field_id,
                        crop_type: planting.crop_type.clone(),
                        planting_date: activity_date,
                        expected_harvest_date: planting.expected_harvest_date,
                        seed_variety: Some(planting.seed_variety.clone()),
                        ..crop
                    };
                    tx.crops.insert(updated.id, updated);
                }
            }
            (ActivityDetails::Maintenance(old), ActivityDetails::Maintenance(new)) => {
                let crop = if old.crop_id == new.crop_id {
                    crop_in_farm(&tx, farm_id, new.crop_id)?
                } else {
                    require_active_crop(&tx, farm_id, new.crop_id)?
                };
                check_not_before_planting(&crop, activity_date)?;
                if crop.harvest_date.is_some_and(|harvested| activity_date > harvested) {
                    return Err(AppError::invalid(
                        "timestamp",
                        "Maintenance date cannot be after the crop's harvest date",
                    ));
                }
            }
            (ActivityDetails::Harvesting(old), ActivityDetails::Harvesting(new)) => {
                if old.crop_id != new.crop_id {
                    let mut target = require_active_crop(&tx, farm_id, new.crop_id)?;
                    target
                        .mark_harvested(activity_date)
                        .map_err(|msg| AppError::invalid("timestamp", msg))?;
                    if let Some(previous) = tx.crops.get_mut(&old.crop_id) {
                        previous.revert_harvest();
                    }
                    tx.crops.insert(target.id, target);
                } else if let Some(crop) = tx.crops.get_mut(&new.crop_id) {
                    check_not_before_planting(crop, activity_date)?;
                    crop.harvest_date = Some(activity_date);
                }
            }
            (ActivityDetails::Other, ActivityDetails::Other) => {}
            _ => {
                return Err(AppError::Internal(
                    "activity payload changed variant during update".to_string(),
                ))
            }
        }

        let log = ActivityLog {
            timestamp,
            details,
            custom_fields: input.custom_fields.unwrap_or(existing.custom_fields),
            updated_at: now,
            ..existing
        };
        tx.activities.insert(log.id, log.clone());
        tx.commit();

        tracing::info!(activity_id = %log.id, activity_type = %kind, "Activity updated");
        Ok(log)
    }

    /// Delete an activity.
    ///
    /// Planting logs take their crop with them and are refused while the
    /// crop still has maintenance or harvest records. Removing a harvesting
    /// log returns its crop to the active state.
    pub fn delete_activity(
        &self,
        farmer_id: Uuid,
        farm_id: Uuid,
        activity_id: Uuid,
    ) -> AppResult<()> {
        let mut tx = self.store.begin()?;
        tx.owned_farm(farmer_id, farm_id)?;
        let log = tx.activity_in_farm(farm_id, activity_id)?.clone();

        match &log.details {
            ActivityDetails::Planting(_) => {
                if let Some(crop) = tx.crop_for_planting(activity_id).cloned() {
                    let dependents = tx.crop_dependents(crop.id);
                    if !dependents.is_empty() {
                        tracing::warn!(
                            activity_id = %activity_id,
                            crop_id = %crop.id,
                            maintenance = dependents.maintenance.len(),
                            harvested = dependents.harvest.is_some(),
                            "Refusing to delete planting log with dependent records"
                        );
                        let mut blockers = Vec::new();
                        if !dependents.maintenance.is_empty() {
                            blockers.push(format!(
                                "{} maintenance record(s)",
                                dependents.maintenance.len()
                            ));
                        }
                        if dependents.harvest.is_some() {
                            blockers.push("a harvest record".to_string());
                        }
                        return Err(AppError::DependencyConflict {
                            resource: "crop".to_string(),
                            message: format!(
                                "Crop {} still has {}; delete those first",
                                crop.crop_type,
                                blockers.join(" and ")
                            ),
                        });
                    }
                    tx.crops.remove(&crop.id);
                }
            }
            ActivityDetails::Harvesting(harvest) => {
                if let Some(crop) = tx.crops.get_mut(&harvest.crop_id) {
                    crop.revert_harvest();
                }
            }
            _ => {}
        }

        tx.activities.remove(&activity_id);
        tx.commit();

        tracing::info!(
            activity_id = %activity_id,
            activity_type = %log.activity_type(),
            "Activity deleted"
        );
        Ok(())
    }

    pub fn get_activity(
        &self,
        farmer_id: Uuid,
        farm_id: Uuid,
        activity_id: Uuid,
    ) -> AppResult<ActivityLog> {
        self.store.read(|t| -> AppResult<ActivityLog> {
            t.owned_farm(farmer_id, farm_id)?;
            t.activity_in_farm(farm_id, activity_id).cloned()
        })?
    }

    /// List a farm's activities, newest first
    pub fn list_activities(
        &self,
        farmer_id: Uuid,
        farm_id: Uuid,
        filter: &ActivityFilter,
        pagination: &Pagination,
    ) -> AppResult<PaginatedResponse<ActivityLog>> {
        tracing::debug!(farm_id = %farm_id, ?filter, "Listing activities");
        let mut logs = self.store.read(|t| -> AppResult<Vec<ActivityLog>> {
            t.owned_farm(farmer_id, farm_id)?;
            Ok(t
                .activities
                .values()
                .filter(|log| log.farm_id == farm_id)
                .filter(|log| filter.activity_type.map_or(true, |k| log.activity_type() == k))
                .filter(|log| {
                    filter
                        .date_range
                        .as_ref()
                        .map_or(true, |range| range.contains_timestamp(log.timestamp))
                })
                .cloned()
                .collect())
        })??;

        logs.sort_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then(b.created_at.cmp(&a.created_at))
        });
        Ok(pagination.paginate(logs))
    }

    /// Maintenance visits on a crop, oldest first
    pub fn maintenance_history(
        &self,
        farmer_id: Uuid,
        farm_id: Uuid,
        crop_id: Uuid,
    ) -> AppResult<Vec<MaintenanceRecord>> {
        self.store.read(|t| -> AppResult<Vec<MaintenanceRecord>> {
            t.owned_farm(farmer_id, farm_id)?;
            t.crop_in_farm(farm_id, crop_id)
                .ok_or_else(|| AppError::not_found("Crop"))?;
            Ok(t.maintenance_logs(crop_id)
                .into_iter()
                .filter_map(|log| {
                    log.maintenance().map(|m| MaintenanceRecord {
                        activity_id: log.id,
                        timestamp: log.timestamp,
                        amounts: m.amounts.clone(),
                    })
                })
                .collect())
        })?
    }
}
