//! Crop models and the crop lifecycle

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A crop planted on a field.
///
/// Crops only come into existence through a planting activity and are
/// terminated by exactly one harvesting activity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Crop {
    pub id: Uuid,
    pub farm_id: Uuid,
    pub field_id: Uuid,
    pub crop_type: String,
    pub planting_date: NaiveDate,
    pub expected_harvest_date: Option<NaiveDate>,
    pub is_harvested: bool,
    pub harvest_date: Option<NaiveDate>,
    pub seed_variety: Option<String>,
    /// The planting activity that created this crop
    pub planting_log_id: Uuid,
}

/// Lifecycle state of an existing crop
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CropStatus {
    Active,
    Harvested,
}

impl std::fmt::Display for CropStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CropStatus::Active => write!(f, "Active"),
            CropStatus::Harvested => write!(f, "Harvested"),
        }
    }
}

impl Crop {
    pub fn status(&self) -> CropStatus {
        if self.is_harvested {
            CropStatus::Harvested
        } else {
            CropStatus::Active
        }
    }

    pub fn is_active(&self) -> bool {
        self.status() == CropStatus::Active
    }

    /// Active -> Harvested
    pub fn mark_harvested(&mut self, harvest_date: NaiveDate) -> Result<(), &'static str> {
        if self.is_harvested {
            return Err("Crop has already been harvested");
        }
        if harvest_date < self.planting_date {
            return Err("Harvest date cannot be before the planting date");
        }
        self.is_harvested = true;
        self.harvest_date = Some(harvest_date);
        Ok(())
    }

    /// Harvested -> Active, used when the harvesting record is removed
    pub fn revert_harvest(&mut self) {
        self.is_harvested = false;
        self.harvest_date = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn crop() -> Crop {
        Crop {
            id: Uuid::new_v4(),
            farm_id: Uuid::new_v4(),
            field_id: Uuid::new_v4(),
            crop_type: "Corn".to_string(),
            planting_date: date(2024, 1, 1),
            expected_harvest_date: None,
            is_harvested: false,
            harvest_date: None,
            seed_variety: None,
            planting_log_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn test_harvest_and_revert() {
        let mut crop = crop();
        assert_eq!(crop.status(), CropStatus::Active);

        crop.mark_harvested(date(2024, 4, 10)).unwrap();
        assert_eq!(crop.status(), CropStatus::Harvested);
        assert_eq!(crop.harvest_date, Some(date(2024, 4, 10)));

        crop.revert_harvest();
        assert!(crop.is_active());
        assert_eq!(crop.harvest_date, None);
    }

    #[test]
    fn test_cannot_harvest_twice() {
        let mut crop = crop();
        crop.mark_harvested(date(2024, 4, 10)).unwrap();
        assert!(crop.mark_harvested(date(2024, 4, 11)).is_err());
        assert_eq!(crop.harvest_date, Some(date(2024, 4, 10)));
    }

    #[test]
    fn test_cannot_harvest_before_planting() {
        let mut crop = crop();
        assert!(crop.mark_harvested(date(2023, 12, 31)).is_err());
        assert!(crop.is_active());
    }
}
