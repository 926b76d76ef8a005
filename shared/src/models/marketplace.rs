//! Marketplace models: products, orders and shipping

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A product listed by a seller
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub id: Uuid,
    pub seller_id: Uuid,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub stock: u32,
    /// Mean review rating, 0.00 until the first review
    #[serde(default)]
    pub average_rating: Decimal,
    pub created_at: DateTime<Utc>,
}

impl Product {
    pub fn in_stock(&self, quantity: u32) -> bool {
        quantity <= self.stock
    }
}

/// A delivery option offered at checkout
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShippingService {
    pub id: Uuid,
    pub name: String,
    pub base_price: Decimal,
    pub estimated_days: u32,
}

/// Order lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    /// A wallet charge is in flight; the order cannot be paid again or
    /// cancelled until it settles
    PaymentProcessing,
    Paid,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Orders that count towards seller sales
    pub fn is_completed_sale(&self) -> bool {
        matches!(
            self,
            OrderStatus::Paid | OrderStatus::Shipped | OrderStatus::Delivered
        )
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::Pending => write!(f, "pending"),
            OrderStatus::PaymentProcessing => write!(f, "payment processing"),
            OrderStatus::Paid => write!(f, "paid"),
            OrderStatus::Shipped => write!(f, "shipped"),
            OrderStatus::Delivered => write!(f, "delivered"),
            OrderStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Per-item shipping progress, updated by the seller
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ShippingStatus {
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl ShippingStatus {
    pub fn can_transition_to(&self, next: ShippingStatus) -> bool {
        use ShippingStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Pending, Shipped)
                | (Pending, Cancelled)
                | (Processing, Shipped)
                | (Processing, Cancelled)
                | (Shipped, Delivered)
        )
    }
}

impl std::fmt::Display for ShippingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShippingStatus::Pending => write!(f, "pending"),
            ShippingStatus::Processing => write!(f, "processing"),
            ShippingStatus::Shipped => write!(f, "shipped"),
            ShippingStatus::Delivered => write!(f, "delivered"),
            ShippingStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// One product line of an order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub seller_id: Uuid,
    pub shipping_service_id: Uuid,
    pub quantity: u32,
    /// Unit price captured at checkout
    pub price: Decimal,
    pub shipping_price: Decimal,
    pub shipping_status: ShippingStatus,
    pub estimated_delivery: Option<DateTime<Utc>>,
}

impl OrderItem {
    /// Price times quantity; `None` if it does not fit in a `Decimal`
    pub fn subtotal(&self) -> Option<Decimal> {
        self.price.checked_mul(Decimal::from(self.quantity))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: Uuid,
    pub buyer_id: Uuid,
    pub total_price: Decimal,
    pub shipping_address: String,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A quantity of a product the buyer wants to purchase
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CartLine {
    pub product_id: Uuid,
    pub quantity: u32,
}

/// Order total: item subtotals plus one shipping charge per seller.
/// `None` when the total does not fit in a `Decimal`.
pub fn order_total(lines: &[(Decimal, u32)], shipping_charges: &[Decimal]) -> Option<Decimal> {
    let items = lines.iter().try_fold(Decimal::ZERO, |sum, (price, qty)| {
        sum.checked_add(price.checked_mul(Decimal::from(*qty))?)
    })?;
    shipping_charges
        .iter()
        .try_fold(items, |sum, charge| sum.checked_add(*charge))
}

/// What a review is about
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ReviewTarget {
    Product(Uuid),
    Seller(Uuid),
}

/// A buyer's rating of a product or seller they bought from. One per
/// buyer and target; reviewing again edits it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Review {
    pub id: Uuid,
    pub buyer_id: Uuid,
    pub target: ReviewTarget,
    /// 1 to 5 stars
    pub rating: u8,
    pub review_text: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Mean of the ratings rounded to two decimals, zero when there are none
pub fn average_rating(ratings: impl IntoIterator<Item = u8>) -> Decimal {
    let (total, count) = ratings
        .into_iter()
        .fold((0u64, 0u64), |(total, count), r| (total + u64::from(r), count + 1));
    if count == 0 {
        return Decimal::ZERO;
    }
    (Decimal::from(total) / Decimal::from(count)).round_dp(2)
}

/// Sales figures for the seller dashboard
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SellerStats {
    /// Order items on paid, shipped or delivered orders
    pub total_sales: u64,
    /// The same, limited to orders placed in the last 30 days
    pub monthly_sales: u64,
    /// Sum of those items' subtotals, shipping excluded
    pub total_revenue: Decimal,
}

/// Order status implied by its items' shipping progress, if it changed.
///
/// All items delivered -> delivered; all shipped or delivered -> shipped.
/// Anything else leaves the order where it is.
pub fn aggregate_order_status(items: &[ShippingStatus]) -> Option<OrderStatus> {
    if items.is_empty() {
        return None;
    }
    if items.iter().all(|s| *s == ShippingStatus::Delivered) {
        Some(OrderStatus::Delivered)
    } else if items
        .iter()
        .all(|s| matches!(s, ShippingStatus::Shipped | ShippingStatus::Delivered))
    {
        Some(OrderStatus::Shipped)
    } else {
        None
    }
}
