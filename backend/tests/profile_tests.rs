//! Registration and role profile tests

mod common;

use agritrace_backend::services::profile::{BecomeSellerInput, RegisterInput};
use agritrace_backend::{AppError, AppState};
use common::{register, test_config};
use shared::UserRole;

fn input(username: &str, role: UserRole) -> RegisterInput {
    RegisterInput {
        username: username.to_string(),
        email: format!("{}@example.com", username),
        phone_no: None,
        role,
        farm_name: None,
        location: None,
        default_shipping_address: None,
        shop_name: None,
        shop_description: None,
    }
}

#[test]
fn test_farmer_requires_farm_name() {
    let state = AppState::new(test_config());

    match state.profiles().register(input("wayan", UserRole::Farmer)) {
        Err(AppError::Validation(errors)) => assert!(errors.has("farm_name")),
        other => panic!("expected validation error, got {:?}", other),
    }
}

#[test]
fn test_register_provisions_only_role_profile() {
    let state = AppState::new(test_config());
    let mut buyer = input("ayu", UserRole::Buyer);
    buyer.location = Some("Denpasar".to_string());
    buyer.phone_no = Some("+628123456789".to_string());

    let (user, profiles) = state.profiles().register(buyer).unwrap();
    assert!(profiles.is_buyer());
    assert!(!profiles.is_farmer());
    assert!(!profiles.is_seller());

    // lookups report missing profiles instead of creating them
    assert!(matches!(
        state.profiles().farmer_profile(user.id),
        Err(AppError::NotFound(_))
    ));
    assert!(state.profiles().profiles(user.id).unwrap().farmer.is_none());
}

#[test]
fn test_duplicate_username_and_email_rejected() {
    let state = AppState::new(test_config());
    register(&state, "putu", UserRole::Farmer);

    let mut same_name = input("PUTU", UserRole::Farmer);
    same_name.email = "other@example.com".to_string();
    same_name.farm_name = Some("Second".to_string());
    match state.profiles().register(same_name) {
        Err(AppError::Validation(errors)) => assert!(errors.has("username")),
        other => panic!("expected validation error, got {:?}", other),
    }

    let mut same_email = input("made", UserRole::Farmer);
    same_email.email = "Putu@Example.com".to_string();
    same_email.farm_name = Some("Third".to_string());
    match state.profiles().register(same_email) {
        Err(AppError::Validation(errors)) => assert!(errors.has("email")),
        other => panic!("expected validation error, got {:?}", other),
    }
}

#[test]
fn test_invalid_email_and_phone_rejected() {
    let state = AppState::new(test_config());
    let mut bad = input("kadek", UserRole::Seller);
    bad.email = "not-an-email".to_string();
    bad.shop_name = Some("Kadek Produce".to_string());

    assert!(matches!(
        state.profiles().register(bad),
        Err(AppError::Validation(_))
    ));

    let mut bad_phone = input("nyoman", UserRole::Seller);
    bad_phone.shop_name = Some("Nyoman Produce".to_string());
    bad_phone.phone_no = Some("12ab".to_string());
    match state.profiles().register(bad_phone) {
        Err(AppError::Validation(errors)) => assert!(errors.has("phone_no")),
        other => panic!("expected validation error, got {:?}", other),
    }
}

#[test]
fn test_buyer_can_become_seller_once() {
    let state = AppState::new(test_config());
    let buyer = register(&state, "ketut", UserRole::Buyer);
    let shop = || BecomeSellerInput {
        shop_name: "Ketut Greens".to_string(),
        shop_description: Some("Leafy vegetables".to_string()),
    };

    let profile = state.profiles().become_seller(buyer, shop()).unwrap();
    assert_eq!(profile.shop_name, "Ketut Greens");
    assert!(!profile.verified);

    let again = state.profiles().become_seller(buyer, shop());
    assert!(matches!(again, Err(AppError::InvalidStateTransition(_))));

    let profiles = state.profiles().profiles(buyer).unwrap();
    assert!(profiles.is_buyer() && profiles.is_seller());
}

#[test]
fn test_farmer_cannot_become_seller() {
    let state = AppState::new(test_config());
    let farmer = register(&state, "gede", UserRole::Farmer);

    let result = state.profiles().become_seller(
        farmer,
        BecomeSellerInput {
            shop_name: "Gede Farm Shop".to_string(),
            shop_description: None,
        },
    );
    assert!(matches!(result, Err(AppError::InvalidStateTransition(_))));
}

#[test]
fn test_link_wallet() {
    let state = AppState::new(test_config());
    let buyer = register(&state, "sinta", UserRole::Buyer);

    assert_eq!(state.profiles().wallet_token(buyer).unwrap(), None);
    let user = state.profiles().link_wallet(buyer, " tok-123 ").unwrap();

    assert!(user.has_agripay_wallet);
    assert_eq!(state.profiles().wallet_token(buyer).unwrap().as_deref(), Some("tok-123"));
    assert!(matches!(
        state.profiles().link_wallet(buyer, "  "),
        Err(AppError::Validation(_))
    ));
}
