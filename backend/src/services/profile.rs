//! User registration and role profiles
//!
//! Profiles are created explicitly when a user registers (or becomes a
//! seller). Lookups never create a missing profile; they report it.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{
    validate_phone_number, validate_positive, validate_required_text, BuyerProfile, FarmerProfile,
    FieldErrors, SellerProfile, User, UserProfiles, UserRole,
};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::external::{PaymentGateway, PurchaseRequest, TopUpRequest, WalletReceipt};
use crate::store::Store;

#[derive(Clone)]
pub struct ProfileService {
    store: Store,
}

/// Input for registering a user
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterInput {
    #[validate(length(min = 3, max = 150, message = "Username must be 3-150 characters"))]
    pub username: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(max = 15, message = "Phone number is too long"))]
    pub phone_no: Option<String>,
    pub role: UserRole,
    /// Required for farmers
    pub farm_name: Option<String>,
    /// Required for buyers
    pub location: Option<String>,
    pub default_shipping_address: Option<String>,
    /// Required for sellers
    pub shop_name: Option<String>,
    pub shop_description: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct BecomeSellerInput {
    #[validate(length(min = 1, max = 255, message = "Shop name is required"))]
    pub shop_name: String,
    pub shop_description: Option<String>,
}

fn required(errors: &mut FieldErrors, field: &str, value: &Option<String>) -> Option<String> {
    match value.as_deref().map(str::trim) {
        Some(text) if validate_required_text(text).is_ok() => Some(text.to_string()),
        _ => {
            errors.add(field, "This field is required");
            None
        }
    }
}

fn seller_profile(
    user_id: Uuid,
    shop_name: String,
    shop_description: Option<String>,
) -> SellerProfile {
    SellerProfile {
        user_id,
        shop_name,
        shop_description: shop_description.filter(|d| !d.trim().is_empty()),
        verified: false,
        rating: Decimal::ZERO,
        balance: Decimal::ZERO,
        created_at: Utc::now(),
    }
}

impl ProfileService {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Register a user and provision the profile for their role
    pub fn register(&self, input: RegisterInput) -> AppResult<(User, UserProfiles)> {
        input.validate()?;

        let mut errors = FieldErrors::new();
        if let Some(phone) = &input.phone_no {
            errors.check("phone_no", validate_phone_number(phone));
        }
        let farm_name = match input.role {
            UserRole::Farmer => required(&mut errors, "farm_name", &input.farm_name),
            _ => None,
        };
        let location = match input.role {
            UserRole::Buyer => required(&mut errors, "location", &input.location),
            _ => None,
        };
        let shop_name = match input.role {
            UserRole::Seller => required(&mut errors, "shop_name", &input.shop_name),
            _ => None,
        };
        errors.into_result()?;

        let mut tx = self.store.begin()?;
        let username = input.username.trim().to_string();
        let email = input.email.trim().to_lowercase();
        if tx.users.values().any(|u| u.username.eq_ignore_ascii_case(&username)) {
            return Err(AppError::invalid("username", "This username is already taken"));
        }
        if tx.users.values().any(|u| u.email == email) {
            return Err(AppError::invalid("email", "An account with this email already exists"));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            username,
            email,
            phone_no: input.phone_no.clone(),
            role: input.role,
            has_agripay_wallet: false,
            created_at: now,
        };

        let mut profiles = UserProfiles::default();
        match input.role {
            UserRole::Farmer => {
                let profile = FarmerProfile {
                    user_id: user.id,
                    farm_name: farm_name.unwrap_or_default(),
                    created_at: now,
                };
                tx.farmer_profiles.insert(user.id, profile.clone());
                profiles.farmer = Some(profile);
            }
            UserRole::Buyer => {
                let profile = BuyerProfile {
                    user_id: user.id,
                    location: location.unwrap_or_default(),
                    default_shipping_address: input.default_shipping_address.clone(),
                    phone_number: input.phone_no.clone(),
                    created_at: now,
                };
                tx.buyer_profiles.insert(user.id, profile.clone());
                profiles.buyer = Some(profile);
            }
            UserRole::Seller => {
                let profile = seller_profile(
                    user.id,
                    shop_name.unwrap_or_default(),
                    input.shop_description.clone(),
                );
                tx.seller_profiles.insert(user.id, profile.clone());
                profiles.seller = Some(profile);
            }
        }

        tx.users.insert(user.id, user.clone());
        tx.commit();

        tracing::info!(user_id = %user.id, role = %user.role, "User registered");
        Ok((user, profiles))
    }

    /// Open a shop for an existing buyer
    pub fn become_seller(
        &self,
        user_id: Uuid,
        input: BecomeSellerInput,
    ) -> AppResult<SellerProfile> {
        input.validate()?;

        let mut tx = self.store.begin()?;
        if !tx.users.contains_key(&user_id) {
            return Err(AppError::not_found("User"));
        }
        if tx.seller_profiles.contains_key(&user_id) {
            return Err(AppError::InvalidStateTransition(
                "User already has a seller profile".to_string(),
            ));
        }
        if !tx.buyer_profiles.contains_key(&user_id) {
            return Err(AppError::InvalidStateTransition(
                "Only buyers can open a shop".to_string(),
            ));
        }

        let shop_name = input.shop_name.trim().to_string();
        let profile = seller_profile(user_id, shop_name, input.shop_description);
        tx.seller_profiles.insert(user_id, profile.clone());
        tx.commit();

        tracing::info!(user_id = %user_id, shop = %profile.shop_name, "Seller profile created");
        Ok(profile)
    }

    /// Store the user's AgriPay token and mark the wallet as linked
    pub fn link_wallet(&self, user_id: Uuid, token: &str) -> AppResult<User> {
        validate_required_text(token).map_err(|msg| AppError::invalid("token", msg))?;

        let mut tx = self.store.begin()?;
        let user = tx
            .users
            .get_mut(&user_id)
            .ok_or_else(|| AppError::not_found("User"))?;
        user.has_agripay_wallet = true;
        let user = user.clone();
        tx.wallet_tokens.insert(user_id, token.trim().to_string());
        tx.commit();

        tracing::info!(user_id = %user_id, "AgriPay wallet linked");
        Ok(user)
    }

    pub fn wallet_token(&self, user_id: Uuid) -> AppResult<Option<String>> {
        self.store.read(|t| t.wallet_tokens.get(&user_id).cloned())
    }

    fn require_linked_wallet(&self, user_id: Uuid) -> AppResult<()> {
        let user = self.get_user(user_id)?;
        if !user.has_agripay_wallet {
            return Err(AppError::InsufficientPermissions(
                "You need to link your AgriPay wallet first".to_string(),
            ));
        }
        Ok(())
    }

    /// Add funds to the user's linked wallet
    pub async fn top_up_wallet<G: PaymentGateway + ?Sized>(
        &self,
        user_id: Uuid,
        amount: Decimal,
        gateway: &G,
    ) -> AppResult<WalletReceipt> {
        validate_positive(amount).map_err(|msg| AppError::invalid("amount", msg))?;
        self.require_linked_wallet(user_id)?;

        let request = TopUpRequest {
            amount,
            description: Some("AgriTrace wallet top-up".to_string()),
            reference: None,
        };
        let receipt = gateway.topup(request).await.map_err(|e| {
            tracing::warn!(user_id = %user_id, error = %e, "Wallet top-up failed");
            e
        })?;

        tracing::info!(user_id = %user_id, amount = %amount, "Wallet topped up");
        Ok(receipt)
    }

    /// Take funds out of the user's linked wallet
    pub async fn withdraw_from_wallet<G: PaymentGateway + ?Sized>(
        &self,
        user_id: Uuid,
        amount: Decimal,
        password: &str,
        gateway: &G,
    ) -> AppResult<WalletReceipt> {
        let mut errors = FieldErrors::new();
        errors.check("amount", validate_positive(amount));
        errors.check("password", validate_required_text(password));
        errors.into_result()?;
        self.require_linked_wallet(user_id)?;

        let request = PurchaseRequest {
            amount,
            password: password.to_string(),
            description: Some("AgriTrace wallet withdrawal".to_string()),
            reference: None,
        };
        let receipt = gateway.withdraw(request).await.map_err(|e| {
            tracing::warn!(user_id = %user_id, error = %e, "Wallet withdrawal failed");
            e
        })?;

        tracing::info!(user_id = %user_id, amount = %amount, "Wallet withdrawal made");
        Ok(receipt)
    }

    pub fn get_user(&self, user_id: Uuid) -> AppResult<User> {
        self.store
            .read(|t| t.users.get(&user_id).cloned())?
            .ok_or_else(|| AppError::not_found("User"))
    }

    pub fn profiles(&self, user_id: Uuid) -> AppResult<UserProfiles> {
        self.store.read(|t| -> AppResult<UserProfiles> {
            if !t.users.contains_key(&user_id) {
                return Err(AppError::not_found("User"));
            }
            Ok(UserProfiles {
                farmer: t.farmer_profiles.get(&user_id).cloned(),
                buyer: t.buyer_profiles.get(&user_id).cloned(),
                seller: t.seller_profiles.get(&user_id).cloned(),
            })
        })?
    }

    pub fn farmer_profile(&self, user_id: Uuid) -> AppResult<FarmerProfile> {
        self.store
            .read(|t| t.farmer_profiles.get(&user_id).cloned())?
            .ok_or_else(|| AppError::not_found("Farmer profile"))
    }

    pub fn buyer_profile(&self, user_id: Uuid) -> AppResult<BuyerProfile> {
        self.store
            .read(|t| t.buyer_profiles.get(&user_id).cloned())?
            .ok_or_else(|| AppError::not_found("Buyer profile"))
    }

    pub fn seller_profile(&self, user_id: Uuid) -> AppResult<SellerProfile> {
        self.store
            .read(|t| t.seller_profiles.get(&user_id).cloned())?
            .ok_or_else(|| AppError::not_found("Seller profile"))
    }
}
