//! User accounts and role profiles

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role chosen at registration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Farmer,
    Buyer,
    Seller,
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserRole::Farmer => write!(f, "farmer"),
            UserRole::Buyer => write!(f, "buyer"),
            UserRole::Seller => write!(f, "seller"),
        }
    }
}

/// A user account on the platform
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub phone_no: Option<String>,
    pub role: UserRole,
    pub has_agripay_wallet: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FarmerProfile {
    pub user_id: Uuid,
    pub farm_name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BuyerProfile {
    pub user_id: Uuid,
    pub location: String,
    pub default_shipping_address: Option<String>,
    pub phone_number: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SellerProfile {
    pub user_id: Uuid,
    pub shop_name: String,
    pub shop_description: Option<String>,
    pub verified: bool,
    /// Average review rating, 0.00 until the first review
    pub rating: Decimal,
    /// Proceeds credited from paid orders
    pub balance: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Every profile a user holds. A buyer may also hold a seller profile.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UserProfiles {
    pub farmer: Option<FarmerProfile>,
    pub buyer: Option<BuyerProfile>,
    pub seller: Option<SellerProfile>,
}

impl UserProfiles {
    pub fn is_farmer(&self) -> bool {
        self.farmer.is_some()
    }

    pub fn is_buyer(&self) -> bool {
        self.buyer.is_some()
    }

    pub fn is_seller(&self) -> bool {
        self.seller.is_some()
    }
}
