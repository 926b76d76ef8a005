//! Fixtures shared by the integration tests

#![allow(dead_code)]

use agritrace_backend::config::{AgriPayConfig, Config, LoggingConfig, PredictionConfig};
use agritrace_backend::services::activity::CreateActivityInput;
use agritrace_backend::services::farm::{CreateFarmInput, CreateFieldInput};
use agritrace_backend::services::profile::RegisterInput;
use agritrace_backend::AppState;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use shared::{ActivityLog, ActivityPayloadInput, Crop, HarvestQuality, UserRole};
use uuid::Uuid;

pub fn test_config() -> Config {
    Config {
        environment: "test".to_string(),
        logging: LoggingConfig::default(),
        prediction: PredictionConfig::default(),
        agripay: AgriPayConfig {
            api_url: "http://127.0.0.1:9/api".to_string(),
            api_token: None,
            timeout_secs: 1,
        },
    }
}

pub fn days_ago(days: i64) -> DateTime<Utc> {
    Utc::now() - Duration::days(days)
}

pub fn register(state: &AppState, username: &str, role: UserRole) -> Uuid {
    let input = RegisterInput {
        username: username.to_string(),
        email: format!("{}@example.com", username),
        phone_no: None,
        role,
        farm_name: Some(format!("{} farm", username)),
        location: Some("Yogyakarta".to_string()),
        default_shipping_address: None,
        shop_name: Some(format!("{} shop", username)),
        shop_description: None,
    };
    let (user, _) = state.profiles().register(input).unwrap();
    user.id
}

/// A registered farmer with one farm and one field
pub struct FarmFixture {
    pub state: AppState,
    pub farmer_id: Uuid,
    pub farm_id: Uuid,
    pub field_id: Uuid,
}

pub fn farm_fixture() -> FarmFixture {
    let state = AppState::new(test_config());
    let farmer_id = register(&state, "sari", UserRole::Farmer);
    let farm = state
        .farms()
        .create_farm(
            farmer_id,
            CreateFarmInput {
                name: "Green Valley".to_string(),
                location: "Malang".to_string(),
                size_hectares: Decimal::from(12),
            },
        )
        .unwrap();
    let field = state
        .farms()
        .create_field(
            farmer_id,
            farm.id,
            CreateFieldInput {
                name: "North Field".to_string(),
                size_hectares: Decimal::from(4),
                location_within_farm: Some("North corner".to_string()),
            },
        )
        .unwrap();

    FarmFixture {
        state,
        farmer_id,
        farm_id: farm.id,
        field_id: field.id,
    }
}

impl FarmFixture {
    pub fn planting_input(&self, crop_type: &str, timestamp: DateTime<Utc>) -> CreateActivityInput {
        CreateActivityInput {
            activity_type: "planting".to_string(),
            timestamp,
            custom_fields: vec![],
            payload: ActivityPayloadInput {
                field_id: Some(self.field_id),
                crop_type: Some(crop_type.to_string()),
                seed_quantity: Some(Decimal::from(25)),
                seed_variety: Some("Hybrid P21".to_string()),
                fertilizer_applied: Some(Decimal::from(10)),
                ..Default::default()
            },
        }
    }

    /// Plant a crop and return the log with the crop it created
    pub fn plant(&self, crop_type: &str, timestamp: DateTime<Utc>) -> (ActivityLog, Crop) {
        let input = self.planting_input(crop_type, timestamp);
        let log = self
            .state
            .activities()
            .create_activity(self.farmer_id, self.farm_id, input)
            .unwrap();
        let crop = self
            .crops()
            .into_iter()
            .find(|c| c.planting_log_id == log.id)
            .unwrap();
        (log, crop)
    }

    pub fn maintain(&self, crop_id: Uuid, timestamp: DateTime<Utc>) -> ActivityLog {
        self.state
            .activities()
            .create_activity(
                self.farmer_id, self.farm_id,
                CreateActivityInput {
                    activity_type: "maintenance".to_string(),
                    timestamp,
                    custom_fields: vec![],
                    payload: ActivityPayloadInput {
                        crop_id: Some(crop_id),
                        irrigation_amount: Some(Decimal::from(150)),
                        ..Default::default()
                    },
                },
            )
            .unwrap()
    }

    pub fn harvest_input(&self, crop_id: Uuid, timestamp: DateTime<Utc>) -> CreateActivityInput {
        CreateActivityInput {
            activity_type: "harvesting".to_string(),
            timestamp,
            custom_fields: vec![],
            payload: ActivityPayloadInput {
                crop_id: Some(crop_id),
                yield_amount: Some(Decimal::from(850)),
                harvest_quality: Some(HarvestQuality::Good),
                ..Default::default()
            },
        }
    }

    pub fn crops(&self) -> Vec<Crop> {
        self.state
            .farms()
            .list_crops(self.farmer_id, self.farm_id)
            .unwrap()
    }

    pub fn crop(&self, crop_id: Uuid) -> Option<Crop> {
        self.crops().into_iter().find(|c| c.id == crop_id)
    }
}
