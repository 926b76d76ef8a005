//! Farm, field and condition management tests

mod common;

use agritrace_backend::services::activity::CreateActivityInput;
use agritrace_backend::services::farm::{
    CreateFarmInput, CreateFieldInput, UpdateFarmInput, UpdateFieldInput,
};
use agritrace_backend::{AppError, AppState};
use common::{days_ago, farm_fixture, register, test_config};
use rust_decimal::Decimal;
use shared::{ActivityPayloadInput, ConditionReadings, UserRole};
use uuid::Uuid;

fn farm_input(name: &str) -> CreateFarmInput {
    CreateFarmInput {
        name: name.to_string(),
        location: "Kediri".to_string(),
        size_hectares: Decimal::from(5),
    }
}

// ============================================================================
// Farms
// ============================================================================

#[test]
fn test_only_farmers_can_own_farms() {
    let state = AppState::new(test_config());
    let buyer = register(&state, "dewi", UserRole::Buyer);

    let result = state.farms().create_farm(buyer, farm_input("Orchard"));
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[test]
fn test_farm_values_validated_together() {
    let fx = farm_fixture();
    let input = CreateFarmInput {
        name: "  ".to_string(),
        location: String::new(),
        size_hectares: Decimal::ZERO,
    };

    match fx.state.farms().create_farm(fx.farmer_id, input) {
        Err(AppError::Validation(errors)) => {
            assert!(errors.has("name"));
            assert!(errors.has("location"));
            assert!(errors.has("size_hectares"));
        }
        other => panic!("expected validation error, got {:?}", other),
    }
}

#[test]
fn test_farms_scoped_to_owner() {
    let fx = farm_fixture();
    let other = register(&fx.state, "agus", UserRole::Farmer);

    assert!(matches!(
        fx.state.farms().get_farm(other, fx.farm_id),
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        fx.state.farms().delete_farm(other, fx.farm_id),
        Err(AppError::NotFound(_))
    ));
    assert!(fx.state.farms().list_farms(other).unwrap().is_empty());
    assert_eq!(fx.state.farms().list_farms(fx.farmer_id).unwrap().len(), 1);
}

#[test]
fn test_update_farm_keeps_absent_values() {
    let fx = farm_fixture();
    let updated = fx
        .state
        .farms()
        .update_farm(
            fx.farmer_id,
            fx.farm_id,
            UpdateFarmInput {
                name: Some("Green Valley Estate".to_string()),
                ..Default::default()
            },
        )
        .unwrap();

    assert_eq!(updated.name, "Green Valley Estate");
    assert_eq!(updated.location, "Malang");
    assert_eq!(updated.size_hectares, Decimal::from(12));
}

#[test]
fn test_delete_farm_cascades() {
    let fx = farm_fixture();
    let (_, crop) = fx.plant("Corn", days_ago(30));
    fx.maintain(crop.id, days_ago(10));
    fx.state
        .farms()
        .upsert_condition(fx.farmer_id, fx.farm_id, ConditionReadings::default())
        .unwrap();

    fx.state.farms().delete_farm(fx.farmer_id, fx.farm_id).unwrap();

    let remaining = fx.state.store.read(|t| {
        (
            t.fields.len(),
            t.crops.len(),
            t.activities.len(),
            t.conditions.len(),
        )
    });
    assert_eq!(remaining.unwrap(), (0, 0, 0, 0));
}

// ============================================================================
// Conditions
// ============================================================================

#[test]
fn test_condition_out_of_range_rejected() {
    let fx = farm_fixture();
    let readings = ConditionReadings {
        soil_ph: Some(Decimal::from(15)),
        soil_moisture: Some(Decimal::from(101)),
        rainfall: Some(Decimal::from(-1)),
        max_daily_temp: Some(Decimal::from(61)),
        day_length: Some(Decimal::from(25)),
    };

    match fx.state.farms().upsert_condition(fx.farmer_id, fx.farm_id, readings) {
        Err(AppError::Validation(errors)) => assert_eq!(errors.len(), 5),
        other => panic!("expected validation error, got {:?}", other),
    }
    assert_eq!(fx.state.farms().get_condition(fx.farmer_id, fx.farm_id).unwrap(), None);
}

#[test]
fn test_condition_upsert_replaces_snapshot() {
    let fx = farm_fixture();
    let first = ConditionReadings {
        soil_ph: Some(Decimal::new(62, 1)),
        ..Default::default()
    };
    let second = ConditionReadings {
        rainfall: Some(Decimal::from(180)),
        ..Default::default()
    };

    fx.state.farms().upsert_condition(fx.farmer_id, fx.farm_id, first).unwrap();
    fx.state.farms().upsert_condition(fx.farmer_id, fx.farm_id, second.clone()).unwrap();

    let stored = fx
        .state
        .farms()
        .get_condition(fx.farmer_id, fx.farm_id)
        .unwrap()
        .unwrap();
    assert_eq!(stored.readings, second);
}

// ============================================================================
// Fields and crops
// ============================================================================

#[test]
fn test_field_update_clears_blank_location() {
    let fx = farm_fixture();
    let updated = fx
        .state
        .farms()
        .update_field(
            fx.farmer_id,
            fx.field_id,
            UpdateFieldInput {
                location_within_farm: Some(" ".to_string()),
                ..Default::default()
            },
        )
        .unwrap();

    assert_eq!(updated.name, "North Field");
    assert_eq!(updated.location_within_farm, None);
}

#[test]
fn test_delete_field_cascades_to_crops_and_logs() {
    let fx = farm_fixture();
    let south = fx
        .state
        .farms()
        .create_field(
            fx.farmer_id,
            fx.farm_id,
            CreateFieldInput {
                name: "South Field".to_string(),
                size_hectares: Decimal::from(3),
                location_within_farm: None,
            },
        )
        .unwrap();

    let (_, north_crop) = fx.plant("Corn", days_ago(30));
    fx.maintain(north_crop.id, days_ago(5));

    let mut south_planting = fx.planting_input("Rice", days_ago(30));
    south_planting.payload.field_id = Some(south.id);
    fx.state
        .activities()
        .create_activity(fx.farmer_id, fx.farm_id, south_planting)
        .unwrap();

    let prep = CreateActivityInput {
        activity_type: "preparation".to_string(),
        timestamp: days_ago(40),
        custom_fields: vec![],
        payload: ActivityPayloadInput {
            field_id: Some(fx.field_id),
            equipment_used: Some("Tractor".to_string()),
            description: Some("Ploughing".to_string()),
            ..Default::default()
        },
    };
    fx.state.activities().create_activity(fx.farmer_id, fx.farm_id, prep).unwrap();

    fx.state.farms().delete_field(fx.farmer_id, fx.field_id).unwrap();

    let crops = fx.crops();
    assert_eq!(crops.len(), 1);
    assert_eq!(crops[0].field_id, south.id);

    let logs = fx.state.store.read(|t| t.activities.len()).unwrap();
    assert_eq!(logs, 1);
}

#[test]
fn test_active_crops_filter_by_field() {
    let fx = farm_fixture();
    let (_, corn) = fx.plant("Corn", days_ago(90));
    let (_, chili) = fx.plant("Chili", days_ago(20));
    fx.state
        .activities()
        .create_activity(fx.farmer_id, fx.farm_id, fx.harvest_input(corn.id, days_ago(1)))
        .unwrap();

    let active = fx
        .state
        .farms()
        .active_crops(fx.farmer_id, fx.farm_id, Some(fx.field_id))
        .unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, chili.id);

    let none = fx
        .state
        .farms()
        .active_crops(fx.farmer_id, fx.farm_id, Some(Uuid::new_v4()))
        .unwrap();
    assert!(none.is_empty());
}

#[test]
fn test_summary_counts_and_recent_activity() {
    let fx = farm_fixture();
    let (_, crop) = fx.plant("Corn", days_ago(60));
    for day in [50, 40, 30, 20, 10, 5] {
        fx.maintain(crop.id, days_ago(day));
    }
    fx.state
        .farms()
        .upsert_condition(
            fx.farmer_id,
            fx.farm_id,
            ConditionReadings {
                soil_moisture: Some(Decimal::from(55)),
                ..Default::default()
            },
        )
        .unwrap();

    let summary = fx.state.farms().farm_summary(fx.farmer_id, fx.farm_id).unwrap();
    assert_eq!(summary.field_count, 1);
    assert_eq!(summary.crop_count, 1);
    assert_eq!(summary.active_crop_count, 1);
    assert!(summary.condition.is_some());
    assert_eq!(summary.recent_activities.len(), 5);
    assert_eq!(summary.recent_activities[0].activity_date(), days_ago(5).date_naive());
}
