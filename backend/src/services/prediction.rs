//! Harvest prediction service
//!
//! Gathers a crop's maintenance history and its farm's condition snapshot
//! from the store and runs the shared heuristic over them. Stored crops are
//! only visible to the farmer who owns their farm.

use chrono::NaiveDate;
use serde::Serialize;
use shared::{
    predict_harvest_with_floor, CropHistory, HarvestPrediction, MaintenanceAmounts,
    PredictionRequest,
};
use uuid::Uuid;

use crate::config::PredictionConfig;
use crate::error::{AppError, AppResult};
use crate::store::Store;

#[derive(Clone)]
pub struct PredictionService {
    store: Store,
    config: PredictionConfig,
}

/// Prediction for one active crop
#[derive(Debug, Clone, Serialize)]
pub struct CropPrediction {
    pub crop_id: Uuid,
    pub crop_type: String,
    pub field_id: Uuid,
    pub expected_harvest_date: Option<NaiveDate>,
    pub prediction: HarvestPrediction,
}

fn report_clamp(prediction: &HarvestPrediction, config: &PredictionConfig, crop_type: &str) {
    if prediction.clamped && config.clamp_warnings {
        tracing::warn!(
            crop_type = %crop_type,
            raw_days = prediction.unclamped_days(),
            applied_days = prediction.total_days,
            "Predicted growing period below minimum; clamped"
        );
    }
}

/// Evaluate a standalone request with the configured floor
pub fn evaluate(
    request: &PredictionRequest,
    today: NaiveDate,
    config: &PredictionConfig,
) -> HarvestPrediction {
    let prediction = request.evaluate_with_floor(today, config.min_growing_days);
    report_clamp(&prediction, config, &request.crop_type);
    prediction
}

impl PredictionService {
    pub fn new(store: Store, config: PredictionConfig) -> Self {
        Self { store, config }
    }

    /// Predict the harvest date of a crop as of `today`
    pub fn predict_for_crop(
        &self,
        farmer_id: Uuid,
        farm_id: Uuid,
        crop_id: Uuid,
        today: NaiveDate,
    ) -> AppResult<HarvestPrediction> {
        let (crop, maintenance, condition) = self.store.read(|t| -> AppResult<_> {
            t.owned_farm(farmer_id, farm_id)?;
            let crop = t
                .crop_in_farm(farm_id, crop_id)
                .cloned()
                .ok_or_else(|| AppError::not_found("Crop"))?;
            let maintenance: Vec<MaintenanceAmounts> = t
                .maintenance_logs(crop_id)
                .into_iter()
                .filter_map(|log| log.maintenance().map(|m| m.amounts.clone()))
                .collect();
            let condition = t.conditions.get(&farm_id).map(|c| c.readings.clone());
            Ok((crop, maintenance, condition))
        })??;

        let history = CropHistory::for_crop(&crop, &maintenance);
        let floor = self.config.min_growing_days;
        let prediction = predict_harvest_with_floor(&history, condition.as_ref(), today, floor);
        report_clamp(&prediction, &self.config, &crop.crop_type);

        tracing::debug!(
            crop_id = %crop_id,
            predicted = %prediction.predicted_date,
            confidence = prediction.confidence,
            "Harvest predicted"
        );
        Ok(prediction)
    }

    /// Predictions for every active crop on a farm, soonest harvest first
    pub fn predict_for_farm(
        &self,
        farmer_id: Uuid,
        farm_id: Uuid,
        today: NaiveDate,
    ) -> AppResult<Vec<CropPrediction>> {
        let crops = self.store.read(|t| -> AppResult<Vec<_>> {
            t.owned_farm(farmer_id, farm_id)?;
            Ok(t.crops
                .values()
                .filter(|c| c.farm_id == farm_id && c.is_active())
                .cloned()
                .collect())
        })??;

        let mut predictions = crops
            .into_iter()
            .map(|crop| {
                let prediction = self.predict_for_crop(farmer_id, farm_id, crop.id, today)?;
                Ok(CropPrediction {
                    crop_id: crop.id,
                    crop_type: crop.crop_type,
                    field_id: crop.field_id,
                    expected_harvest_date: crop.expected_harvest_date,
                    prediction,
                })
            })
            .collect::<AppResult<Vec<_>>>()?;

        predictions.sort_by_key(|p| (p.prediction.predicted_date, p.crop_id));
        Ok(predictions)
    }
}
