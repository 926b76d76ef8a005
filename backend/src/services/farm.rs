//! Farm management service: farms, fields, condition snapshots and crops

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    validate_condition_readings, validate_positive, validate_required_text, ActivityDetails,
    ActivityLog, ConditionReadings, Crop, Farm, FarmCondition, Field, FieldErrors,
};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::store::{Store, Tables};

const RECENT_ACTIVITY_LIMIT: usize = 5;

/// Farm service scoped to the owning farmer
#[derive(Clone)]
pub struct FarmService {
    store: Store,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateFarmInput {
    pub name: String,
    pub location: String,
    pub size_hectares: Decimal,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateFarmInput {
    pub name: Option<String>,
    pub location: Option<String>,
    pub size_hectares: Option<Decimal>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateFieldInput {
    pub name: String,
    pub size_hectares: Decimal,
    pub location_within_farm: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateFieldInput {
    pub name: Option<String>,
    pub size_hectares: Option<Decimal>,
    pub location_within_farm: Option<String>,
}

/// Overview shown on a farm's detail page
#[derive(Debug, Clone, Serialize)]
pub struct FarmSummary {
    pub farm: Farm,
    pub condition: Option<FarmCondition>,
    pub field_count: usize,
    pub crop_count: usize,
    pub active_crop_count: usize,
    pub recent_activities: Vec<ActivityLog>,
}

fn check_farm_values(errors: &mut FieldErrors, name: &str, location: &str, size: Decimal) {
    errors.check("name", validate_required_text(name));
    errors.check("location", validate_required_text(location));
    errors.check("size_hectares", validate_positive(size));
}

fn check_field_values(errors: &mut FieldErrors, name: &str, size: Decimal) {
    errors.check("name", validate_required_text(name));
    errors.check("size_hectares", validate_positive(size));
}

/// Whether an activity references the field or one of the given crops
fn touches(log: &ActivityLog, field_id: Uuid, crop_ids: &[Uuid]) -> bool {
    match &log.details {
        ActivityDetails::Preparation(p) => p.field_id == field_id,
        ActivityDetails::Planting(p) => p.field_id == field_id,
        ActivityDetails::Maintenance(m) => crop_ids.contains(&m.crop_id),
        ActivityDetails::Harvesting(h) => crop_ids.contains(&h.crop_id),
        ActivityDetails::Other => false,
    }
}

fn owned_field(tables: &Tables, farmer_id: Uuid, field_id: Uuid) -> AppResult<Field> {
    let field = tables
        .fields
        .get(&field_id)
        .cloned()
        .ok_or_else(|| AppError::not_found("Field"))?;
    tables
        .owned_farm(farmer_id, field.farm_id)
        .map_err(|_| AppError::not_found("Field"))?;
    Ok(field)
}

impl FarmService {
    /// Create a new FarmService instance
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn create_farm(&self, farmer_id: Uuid, input: CreateFarmInput) -> AppResult<Farm> {
        let mut errors = FieldErrors::new();
        check_farm_values(&mut errors, &input.name, &input.location, input.size_hectares);
        errors.into_result()?;

        let mut tx = self.store.begin()?;
        if !tx.farmer_profiles.contains_key(&farmer_id) {
            return Err(AppError::not_found("Farmer profile"));
        }

        let now = Utc::now();
        let farm = Farm {
            id: Uuid::new_v4(),
            farmer_id,
            name: input.name.trim().to_string(),
            location: input.location.trim().to_string(),
            size_hectares: input.size_hectares,
            created_at: now,
            updated_at: now,
        };
        tx.farms.insert(farm.id, farm.clone());
        tx.commit();

        tracing::info!(farm_id = %farm.id, farmer_id = %farmer_id, "Farm created");
        Ok(farm)
    }

    pub fn get_farm(&self, farmer_id: Uuid, farm_id: Uuid) -> AppResult<Farm> {
        self.store
            .read(|t| t.owned_farm(farmer_id, farm_id).cloned())?
    }

    /// A farmer's farms, by name
    pub fn list_farms(&self, farmer_id: Uuid) -> AppResult<Vec<Farm>> {
        let mut farms: Vec<Farm> = self.store.read(|t| {
            t.farms
                .values()
                .filter(|f| f.farmer_id == farmer_id)
                .cloned()
                .collect()
        })?;
        farms.sort_by(|a, b| a.name.cmp(&b.name).then(a.created_at.cmp(&b.created_at)));
        Ok(farms)
    }

    pub fn update_farm(
        &self,
        farmer_id: Uuid,
        farm_id: Uuid,
        input: UpdateFarmInput,
    ) -> AppResult<Farm> {
        let mut tx = self.store.begin()?;
        let farm = tx.owned_farm(farmer_id, farm_id)?.clone();

        let updated = Farm {
            name: input.name.map(|n| n.trim().to_string()).unwrap_or(farm.name.clone()),
            location: input
                .location
                .map(|l| l.trim().to_string())
                .unwrap_or(farm.location.clone()),
            size_hectares: input.size_hectares.unwrap_or(farm.size_hectares),
            updated_at: Utc::now(),
            ..farm
        };

        let mut errors = FieldErrors::new();
        check_farm_values(&mut errors, &updated.name, &updated.location, updated.size_hectares);
        errors.into_result()?;

        tx.farms.insert(updated.id, updated.clone());
        tx.commit();

        tracing::info!(farm_id = %farm_id, "Farm updated");
        Ok(updated)
    }

    /// Delete a farm with its condition, fields, crops and activities
    pub fn delete_farm(&self, farmer_id: Uuid, farm_id: Uuid) -> AppResult<()> {
        let mut tx = self.store.begin()?;
        tx.owned_farm(farmer_id, farm_id)?;

        let activities = tx.remove_activities_where(|log| log.farm_id == farm_id);
        tx.crops.retain(|_, crop| crop.farm_id != farm_id);
        tx.fields.retain(|_, field| field.farm_id != farm_id);
        tx.conditions.remove(&farm_id);
        tx.farms.remove(&farm_id);
        tx.commit();

        tracing::info!(farm_id = %farm_id, activities, "Farm deleted");
        Ok(())
    }

    /// Create or replace the farm's environmental snapshot
    pub fn upsert_condition(
        &self,
        farmer_id: Uuid,
        farm_id: Uuid,
        readings: ConditionReadings,
    ) -> AppResult<FarmCondition> {
        validate_condition_readings(&readings)?;

        let mut tx = self.store.begin()?;
        tx.owned_farm(farmer_id, farm_id)?;

        let condition = FarmCondition {
            farm_id,
            readings,
            updated_at: Utc::now(),
        };
        tx.conditions.insert(farm_id, condition.clone());
        tx.commit();

        tracing::info!(
            farm_id = %farm_id,
            readings = condition.readings.populated_count(),
            "Farm condition updated"
        );
        Ok(condition)
    }

    pub fn get_condition(
        &self,
        farmer_id: Uuid,
        farm_id: Uuid,
    ) -> AppResult<Option<FarmCondition>> {
        self.store.read(|t| -> AppResult<_> {
            t.owned_farm(farmer_id, farm_id)?;
            Ok(t.conditions.get(&farm_id).cloned())
        })?
    }

    pub fn create_field(
        &self,
        farmer_id: Uuid,
        farm_id: Uuid,
        input: CreateFieldInput,
    ) -> AppResult<Field> {
        let mut errors = FieldErrors::new();
        check_field_values(&mut errors, &input.name, input.size_hectares);
        errors.into_result()?;

        let mut tx = self.store.begin()?;
        tx.owned_farm(farmer_id, farm_id)?;

        let field = Field {
            id: Uuid::new_v4(),
            farm_id,
            name: input.name.trim().to_string(),
            size_hectares: input.size_hectares,
            location_within_farm: input
                .location_within_farm
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty()),
            created_at: Utc::now(),
        };
        tx.fields.insert(field.id, field.clone());
        tx.commit();

        tracing::info!(field_id = %field.id, farm_id = %farm_id, "Field created");
        Ok(field)
    }

    pub fn list_fields(&self, farmer_id: Uuid, farm_id: Uuid) -> AppResult<Vec<Field>> {
        let mut fields = self.store.read(|t| -> AppResult<Vec<Field>> {
            t.owned_farm(farmer_id, farm_id)?;
            Ok(t.fields
                .values()
                .filter(|f| f.farm_id == farm_id)
                .cloned()
                .collect())
        })??;
        fields.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(fields)
    }

    pub fn update_field(
        &self,
        farmer_id: Uuid,
        field_id: Uuid,
        input: UpdateFieldInput,
    ) -> AppResult<Field> {
        let mut tx = self.store.begin()?;
        let field = owned_field(&tx, farmer_id, field_id)?;

        let updated = Field {
            name: input.name.map(|n| n.trim().to_string()).unwrap_or(field.name.clone()),
            size_hectares: input.size_hectares.unwrap_or(field.size_hectares),
            location_within_farm: match input.location_within_farm {
                Some(location) if location.trim().is_empty() => None,
                Some(location) => Some(location.trim().to_string()),
                None => field.location_within_farm.clone(),
            },
            ..field
        };

        let mut errors = FieldErrors::new();
        check_field_values(&mut errors, &updated.name, updated.size_hectares);
        errors.into_result()?;

        tx.fields.insert(updated.id, updated.clone());
        tx.commit();

        tracing::info!(field_id = %field_id, "Field updated");
        Ok(updated)
    }

    /// Delete a field, its crops and every activity that references them
    pub fn delete_field(&self, farmer_id: Uuid, field_id: Uuid) -> AppResult<()> {
        let mut tx = self.store.begin()?;
        owned_field(&tx, farmer_id, field_id)?;

        let crop_ids: Vec<Uuid> = tx
            .crops
            .values()
            .filter(|c| c.field_id == field_id)
            .map(|c| c.id)
            .collect();

        let activities = tx.remove_activities_where(|log| touches(log, field_id, &crop_ids));
        tx.crops.retain(|id, _| !crop_ids.contains(id));
        tx.fields.remove(&field_id);
        tx.commit();

        tracing::info!(
            field_id = %field_id,
            crops = crop_ids.len(),
            activities,
            "Field deleted"
        );
        Ok(())
    }

    /// Unharvested crops on a farm, optionally limited to one field
    pub fn active_crops(
        &self,
        farmer_id: Uuid,
        farm_id: Uuid,
        field_id: Option<Uuid>,
    ) -> AppResult<Vec<Crop>> {
        let mut crops = self.store.read(|t| -> AppResult<Vec<Crop>> {
            t.owned_farm(farmer_id, farm_id)?;
            Ok(t.crops
                .values()
                .filter(|c| c.farm_id == farm_id && c.is_active())
                .filter(|c| field_id.map_or(true, |id| c.field_id == id))
                .cloned()
                .collect())
        })??;
        crops.sort_by(|a, b| {
            a.planting_date
                .cmp(&b.planting_date)
                .then(a.crop_type.cmp(&b.crop_type))
        });
        Ok(crops)
    }

    /// Every crop on a farm, newest planting first
    pub fn list_crops(&self, farmer_id: Uuid, farm_id: Uuid) -> AppResult<Vec<Crop>> {
        let mut crops = self.store.read(|t| -> AppResult<Vec<Crop>> {
            t.owned_farm(farmer_id, farm_id)?;
            Ok(t.crops.values().filter(|c| c.farm_id == farm_id).cloned().collect())
        })??;
        crops.sort_by(|a, b| b.planting_date.cmp(&a.planting_date));
        Ok(crops)
    }

    pub fn farm_summary(&self, farmer_id: Uuid, farm_id: Uuid) -> AppResult<FarmSummary> {
        tracing::debug!(farm_id = %farm_id, "Building farm summary");
        self.store.read(|t| -> AppResult<FarmSummary> {
            let farm = t.owned_farm(farmer_id, farm_id)?.clone();

            let crops: Vec<&Crop> = t.crops.values().filter(|c| c.farm_id == farm_id).collect();
            let mut recent: Vec<ActivityLog> = t
                .activities
                .values()
                .filter(|log| log.farm_id == farm_id)
                .cloned()
                .collect();
            recent.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
            recent.truncate(RECENT_ACTIVITY_LIMIT);

            Ok(FarmSummary {
                condition: t.conditions.get(&farm_id).cloned(),
                field_count: t.fields.values().filter(|f| f.farm_id == farm_id).count(),
                crop_count: crops.len(),
                active_crop_count: crops.iter().filter(|c| c.is_active()).count(),
                recent_activities: recent,
                farm,
            })
        })?
    }
}
