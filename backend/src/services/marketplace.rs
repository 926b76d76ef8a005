//! Marketplace service: product listings, checkout, payment and shipping

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    aggregate_order_status, average_rating, order_total, validate_non_negative, validate_positive,
    validate_rating, validate_required_text, validate_review_text, CartLine, FieldErrors, Order,
    OrderItem, OrderStatus, PaginatedResponse, Pagination, Product, Review, ReviewTarget,
    SellerStats, ShippingService, ShippingStatus,
};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::external::{PaymentGateway, PurchaseRequest, WalletReceipt};
use crate::store::{Store, Tables};

/// Window for the seller dashboard's recent sales figure
const MONTHLY_SALES_DAYS: i64 = 30;

#[derive(Clone)]
pub struct MarketplaceService {
    store: Store,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateProductInput {
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub stock: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProductInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub stock: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutInput {
    pub lines: Vec<CartLine>,
    /// Shipping service chosen for each seller in the cart
    pub shipping: HashMap<Uuid, Uuid>,
    pub shipping_address: String,
}

/// An order together with its items
#[derive(Debug, Clone, Serialize)]
pub struct OrderReceipt {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewInput {
    pub rating: u8,
    pub review_text: String,
}

fn check_product_values(errors: &mut FieldErrors, name: &str, description: &str, price: Decimal) {
    errors.check("name", validate_required_text(name));
    errors.check("description", validate_required_text(description));
    errors.check("price", validate_positive(price));
}

impl MarketplaceService {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    // ========================================================================
    // Products
    // ========================================================================

    pub fn create_product(&self, seller_id: Uuid, input: CreateProductInput) -> AppResult<Product> {
        let mut errors = FieldErrors::new();
        check_product_values(&mut errors, &input.name, &input.description, input.price);
        errors.into_result()?;

        let mut tx = self.store.begin()?;
        if !tx.seller_profiles.contains_key(&seller_id) {
            return Err(AppError::not_found("Seller profile"));
        }

        let product = Product {
            id: Uuid::new_v4(),
            seller_id,
            name: input.name.trim().to_string(),
            description: input.description.trim().to_string(),
            price: input.price,
            stock: input.stock,
            average_rating: Decimal::ZERO,
            created_at: Utc::now(),
        };
        tx.products.insert(product.id, product.clone());
        tx.commit();

        tracing::info!(product_id = %product.id, seller_id = %seller_id, "Product listed");
        Ok(product)
    }

    pub fn update_product(
        &self,
        seller_id: Uuid,
        product_id: Uuid,
        input: UpdateProductInput,
    ) -> AppResult<Product> {
        let mut tx = self.store.begin()?;
        let product = tx
            .products
            .get(&product_id)
            .filter(|p| p.seller_id == seller_id)
            .cloned()
            .ok_or_else(|| AppError::not_found("Product"))?;

        let updated = Product {
            name: input.name.map(|n| n.trim().to_string()).unwrap_or(product.name.clone()),
            description: input
                .description
                .map(|d| d.trim().to_string())
                .unwrap_or(product.description.clone()),
            price: input.price.unwrap_or(product.price),
            stock: input.stock.unwrap_or(product.stock),
            ..product
        };

        let mut errors = FieldErrors::new();
        check_product_values(&mut errors, &updated.name, &updated.description, updated.price);
        errors.into_result()?;

        tx.products.insert(updated.id, updated.clone());
        tx.commit();

        tracing::info!(product_id = %product_id, "Product updated");
        Ok(updated)
    }

    pub fn delete_product(&self, seller_id: Uuid, product_id: Uuid) -> AppResult<()> {
        let mut tx = self.store.begin()?;
        let owned = tx
            .products
            .get(&product_id)
            .is_some_and(|p| p.seller_id == seller_id);
        if !owned {
            return Err(AppError::not_found("Product"));
        }
        tx.products.remove(&product_id);
        tx.commit();

        tracing::info!(product_id = %product_id, "Product removed");
        Ok(())
    }

    pub fn get_product(&self, product_id: Uuid) -> AppResult<Product> {
        self.store
            .read(|t| t.products.get(&product_id).cloned())?
            .ok_or_else(|| AppError::not_found("Product"))
    }

    /// Products whose name or description contains `search`, newest first
    pub fn list_products(
        &self,
        search: Option<&str>,
        pagination: &Pagination,
    ) -> AppResult<PaginatedResponse<Product>> {
        let needle = search.map(|s| s.trim().to_lowercase()).filter(|s| !s.is_empty());
        let mut products: Vec<Product> = self.store.read(|t| {
            t.products
                .values()
                .filter(|p| {
                    needle.as_ref().map_or(true, |n| {
                        p.name.to_lowercase().contains(n)
                            || p.description.to_lowercase().contains(n)
                    })
                })
                .cloned()
                .collect()
        })?;
        products.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.name.cmp(&b.name)));
        Ok(pagination.paginate(products))
    }

    // ========================================================================
    // Shipping services
    // ========================================================================

    pub fn add_shipping_service(
        &self,
        name: &str,
        base_price: Decimal,
        estimated_days: u32,
    ) -> AppResult<ShippingService> {
        let mut errors = FieldErrors::new();
        errors.check("name", validate_required_text(name));
        errors.check("base_price", validate_non_negative(base_price));
        errors.into_result()?;

        let service = ShippingService {
            id: Uuid::new_v4(),
            name: name.trim().to_string(),
            base_price,
            estimated_days,
        };
        let mut tx = self.store.begin()?;
        tx.shipping_services.insert(service.id, service.clone());
        tx.commit();
        Ok(service)
    }

    pub fn list_shipping_services(&self) -> AppResult<Vec<ShippingService>> {
        let mut services: Vec<ShippingService> =
            self.store.read(|t| t.shipping_services.values().cloned().collect())?;
        services.sort_by(|a, b| a.base_price.cmp(&b.base_price).then(a.name.cmp(&b.name)));
        Ok(services)
    }

    // ========================================================================
    // Orders
    // ========================================================================

    /// Turn cart lines into a pending order, reserving stock
    pub fn checkout(&self, buyer_id: Uuid, input: CheckoutInput) -> AppResult<OrderReceipt> {
        let mut errors = FieldErrors::new();
        errors.check("shipping_address", validate_required_text(&input.shipping_address));
        if input.lines.is_empty() {
            errors.add("lines", "The cart is empty");
        }
        if input.lines.iter().any(|l| l.quantity == 0) {
            errors.add("lines", "Quantities must be at least 1");
        }
        errors.into_result()?;

        let mut tx = self.store.begin()?;
        if !tx.buyer_profiles.contains_key(&buyer_id) {
            return Err(AppError::not_found("Buyer profile"));
        }

        // Merge repeated products so stock is checked against the full quantity
        let mut wanted: BTreeMap<Uuid, u32> = BTreeMap::new();
        for line in &input.lines {
            let quantity = wanted.entry(line.product_id).or_default();
            *quantity = quantity.checked_add(line.quantity).ok_or_else(|| {
                AppError::invalid("lines", "Requested quantity is too large")
            })?;
        }

        let mut products = Vec::with_capacity(wanted.len());
        for (product_id, quantity) in &wanted {
            let product = tx
                .products
                .get(product_id)
                .cloned()
                .ok_or_else(|| AppError::not_found("Product"))?;
            if !product.in_stock(*quantity) {
                return Err(AppError::InsufficientStock(format!(
                    "Only {} of \"{}\" left in stock",
                    product.stock, product.name
                )));
            }
            products.push((product, *quantity));
        }

        let mut shipping_by_seller: BTreeMap<Uuid, ShippingService> = BTreeMap::new();
        for (product, _) in &products {
            if shipping_by_seller.contains_key(&product.seller_id) {
                continue;
            }
            let service = input
                .shipping
                .get(&product.seller_id)
                .and_then(|id| tx.shipping_services.get(id))
                .cloned()
                .ok_or_else(|| {
                    AppError::invalid("shipping", "Please select a shipping option for each seller")
                })?;
            shipping_by_seller.insert(product.seller_id, service);
        }

        let lines: Vec<(Decimal, u32)> = products.iter().map(|(p, q)| (p.price, *q)).collect();
        let charges: Vec<Decimal> = shipping_by_seller.values().map(|s| s.base_price).collect();
        let total_price = order_total(&lines, &charges)
            .ok_or_else(|| AppError::invalid("lines", "Order total is too large"))?;

        let now = Utc::now();
        let order = Order {
            id: Uuid::new_v4(),
            buyer_id,
            total_price,
            shipping_address: input.shipping_address.trim().to_string(),
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
        };

        let mut items = Vec::with_capacity(products.len());
        for (product, quantity) in products {
            let service = &shipping_by_seller[&product.seller_id];
            let item = OrderItem {
                id: Uuid::new_v4(),
                order_id: order.id,
                product_id: product.id,
                seller_id: product.seller_id,
                shipping_service_id: service.id,
                quantity,
                price: product.price,
                shipping_price: service.base_price,
                shipping_status: ShippingStatus::Pending,
                estimated_delivery: Some(delivery_estimate(now, service.estimated_days)),
            };
            if let Some(stored) = tx.products.get_mut(&product.id) {
                stored.stock = stored.stock.saturating_sub(quantity);
            }
            tx.order_items.insert(item.id, item.clone());
            items.push(item);
        }
        tx.orders.insert(order.id, order.clone());
        tx.commit();

        tracing::info!(
            order_id = %order.id,
            buyer_id = %buyer_id,
            total = %order.total_price,
            items = items.len(),
            "Order placed"
        );
        Ok(OrderReceipt { order, items })
    }

    /// Charge a pending order through the payment gateway.
    ///
    /// The order is moved to `payment_processing` before the gateway is
    /// called, so a second request for the same order is refused instead of
    /// charging again. The store is not locked while the call is in flight.
    /// A failed payment puts the order back to pending.
    pub async fn pay_order<G: PaymentGateway + ?Sized>(
        &self,
        buyer_id: Uuid,
        order_id: Uuid,
        gateway: &G,
        password: &str,
    ) -> AppResult<(Order, WalletReceipt)> {
        let order = self.claim_for_payment(buyer_id, order_id)?;

        let request = PurchaseRequest {
            amount: order.total_price,
            password: password.to_string(),
            description: Some(format!("AgriTrace order {}", order.id)),
            reference: Some(order.id.to_string()),
        };
        let receipt = match gateway.purchase(request).await {
            Ok(receipt) => receipt,
            Err(e) => {
                tracing::warn!(order_id = %order_id, error = %e, "Payment failed");
                self.release_payment_claim(order_id)?;
                return Err(e);
            }
        };

        let paid = self.settle_payment(order_id, &receipt)?;
        tracing::info!(order_id = %order_id, total = %paid.total_price, "Order paid");
        Ok((paid, receipt))
    }

    /// Pending -> payment processing, atomically
    fn claim_for_payment(&self, buyer_id: Uuid, order_id: Uuid) -> AppResult<Order> {
        let mut tx = self.store.begin()?;
        let order = tx
            .orders
            .get(&order_id)
            .filter(|o| o.buyer_id == buyer_id)
            .cloned()
            .ok_or_else(|| AppError::not_found("Order"))?;
        if order.status != OrderStatus::Pending {
            return Err(AppError::InvalidStateTransition(format!(
                "Only pending orders can be paid (order is {})",
                order.status
            )));
        }

        let processing = Order {
            status: OrderStatus::PaymentProcessing,
            updated_at: Utc::now(),
            ..order
        };
        tx.orders.insert(order_id, processing.clone());
        tx.commit();
        Ok(processing)
    }

    fn release_payment_claim(&self, order_id: Uuid) -> AppResult<()> {
        let mut tx = self.store.begin()?;
        if let Some(order) = tx.orders.get_mut(&order_id) {
            if order.status == OrderStatus::PaymentProcessing {
                order.status = OrderStatus::Pending;
                order.updated_at = Utc::now();
            }
        }
        tx.commit();
        Ok(())
    }

    /// Mark a claimed order paid and credit each seller with their items
    fn settle_payment(&self, order_id: Uuid, receipt: &WalletReceipt) -> AppResult<Order> {
        let mut tx = self.store.begin()?;
        let current = tx
            .orders
            .get(&order_id)
            .cloned()
            .ok_or_else(|| AppError::not_found("Order"))?;
        if current.status != OrderStatus::PaymentProcessing {
            tracing::error!(
                order_id = %order_id,
                status = %current.status,
                transaction = ?receipt.transaction_id,
                "Order changed while payment was in flight"
            );
            return Err(AppError::InvalidStateTransition(format!(
                "Order is {} and can no longer be paid",
                current.status
            )));
        }

        let mut proceeds: HashMap<Uuid, Decimal> = HashMap::new();
        for item in tx.order_items.values().filter(|i| i.order_id == order_id) {
            let overflow = || AppError::Internal("Seller proceeds overflow".to_string());
            let subtotal = item.subtotal().ok_or_else(overflow)?;
            let share = proceeds.entry(item.seller_id).or_default();
            *share = share.checked_add(subtotal).ok_or_else(overflow)?;
        }
        for (seller_id, amount) in proceeds {
            if let Some(seller) = tx.seller_profiles.get_mut(&seller_id) {
                seller.balance = seller.balance.checked_add(amount).ok_or_else(|| {
                    AppError::Internal("Seller balance overflow".to_string())
                })?;
            }
        }

        let paid = Order {
            status: OrderStatus::Paid,
            updated_at: Utc::now(),
            ..current
        };
        tx.orders.insert(order_id, paid.clone());
        tx.commit();
        Ok(paid)
    }

    /// Cancel a pending order and return its stock
    pub fn cancel_order(&self, buyer_id: Uuid, order_id: Uuid) -> AppResult<Order> {
        let mut tx = self.store.begin()?;
        let order = tx
            .orders
            .get(&order_id)
            .filter(|o| o.buyer_id == buyer_id)
            .cloned()
            .ok_or_else(|| AppError::not_found("Order"))?;
        if order.status != OrderStatus::Pending {
            return Err(AppError::InvalidStateTransition(
                "Only pending orders can be cancelled".to_string(),
            ));
        }

        let item_ids: Vec<Uuid> = tx
            .order_items
            .values()
            .filter(|i| i.order_id == order_id)
            .map(|i| i.id)
            .collect();
        for item_id in item_ids {
            let Some(item) = tx.order_items.get_mut(&item_id) else {
                continue;
            };
            item.shipping_status = ShippingStatus::Cancelled;
            let (product_id, quantity) = (item.product_id, item.quantity);
            if let Some(product) = tx.products.get_mut(&product_id) {
                product.stock = product.stock.saturating_add(quantity);
            }
        }

        let cancelled = Order {
            status: OrderStatus::Cancelled,
            updated_at: Utc::now(),
            ..order
        };
        tx.orders.insert(order_id, cancelled.clone());
        tx.commit();

        tracing::info!(order_id = %order_id, "Order cancelled");
        Ok(cancelled)
    }

    /// Seller-side shipping update; rolls the order status forward when every
    /// item has been shipped or delivered.
    pub fn update_shipping_status(
        &self,
        seller_id: Uuid,
        item_id: Uuid,
        status: ShippingStatus,
    ) -> AppResult<OrderItem> {
        let mut tx = self.store.begin()?;
        let item = tx
            .order_items
            .get(&item_id)
            .filter(|i| i.seller_id == seller_id)
            .cloned()
            .ok_or_else(|| AppError::not_found("Order item"))?;
        let order = tx
            .orders
            .get(&item.order_id)
            .cloned()
            .ok_or_else(|| AppError::not_found("Order"))?;

        if !order.status.is_completed_sale() {
            return Err(AppError::InvalidStateTransition(format!(
                "Cannot ship items of a {} order",
                order.status
            )));
        }
        if !item.shipping_status.can_transition_to(status) {
            return Err(AppError::InvalidStateTransition(format!(
                "Cannot move item from {} to {}",
                item.shipping_status, status
            )));
        }

        let now = Utc::now();
        let mut updated = OrderItem {
            shipping_status: status,
            ..item
        };
        if status == ShippingStatus::Shipped {
            if let Some(service) = tx.shipping_services.get(&updated.shipping_service_id) {
                updated.estimated_delivery = Some(delivery_estimate(now, service.estimated_days));
            }
        }
        tx.order_items.insert(item_id, updated.clone());

        let statuses: Vec<ShippingStatus> = tx
            .order_items
            .values()
            .filter(|i| i.order_id == order.id)
            .map(|i| i.shipping_status)
            .collect();
        if let Some(next) = aggregate_order_status(&statuses) {
            if next != order.status {
                tracing::info!(order_id = %order.id, status = %next, "Order status advanced");
                tx.orders.insert(
                    order.id,
                    Order {
                        status: next,
                        updated_at: now,
                        ..order
                    },
                );
            }
        }
        tx.commit();

        tracing::info!(item_id = %item_id, status = %status, "Shipping status updated");
        Ok(updated)
    }

    fn order_for_buyer(&self, buyer_id: Uuid, order_id: Uuid) -> AppResult<Order> {
        self.store
            .read(|t| t.orders.get(&order_id).filter(|o| o.buyer_id == buyer_id).cloned())?
            .ok_or_else(|| AppError::not_found("Order"))
    }

    pub fn get_order(&self, buyer_id: Uuid, order_id: Uuid) -> AppResult<OrderReceipt> {
        let order = self.order_for_buyer(buyer_id, order_id)?;
        let mut items: Vec<OrderItem> = self.store.read(|t| {
            t.order_items
                .values()
                .filter(|i| i.order_id == order_id)
                .cloned()
                .collect()
        })?;
        items.sort_by_key(|i| i.id);
        Ok(OrderReceipt { order, items })
    }

    /// A buyer's orders, newest first
    pub fn orders_for_buyer(&self, buyer_id: Uuid) -> AppResult<Vec<Order>> {
        let mut orders: Vec<Order> = self.store.read(|t| {
            t.orders
                .values()
                .filter(|o| o.buyer_id == buyer_id)
                .cloned()
                .collect()
        })?;
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    /// Items a seller has to fulfil, optionally filtered by shipping status
    pub fn items_for_seller(
        &self,
        seller_id: Uuid,
        status: Option<ShippingStatus>,
    ) -> AppResult<Vec<OrderItem>> {
        self.store.read(|t| {
            t.order_items
                .values()
                .filter(|i| i.seller_id == seller_id)
                .filter(|i| status.map_or(true, |s| i.shipping_status == s))
                .filter(|i| {
                    t.orders.get(&i.order_id).is_some_and(|o| {
                        !matches!(o.status, OrderStatus::Pending | OrderStatus::PaymentProcessing)
                    })
                })
                .cloned()
                .collect()
        })
    }

    /// Dashboard figures over the seller's paid, shipped and delivered items
    pub fn seller_stats(&self, seller_id: Uuid, now: DateTime<Utc>) -> AppResult<SellerStats> {
        let since = now - Duration::days(MONTHLY_SALES_DAYS);
        self.store.read(|t| {
            if !t.seller_profiles.contains_key(&seller_id) {
                return Err(AppError::not_found("Seller profile"));
            }

            let mut stats = SellerStats::default();
            for item in t.order_items.values().filter(|i| i.seller_id == seller_id) {
                let Some(order) = t.orders.get(&item.order_id) else {
                    continue;
                };
                if !order.status.is_completed_sale() {
                    continue;
                }
                stats.total_sales += 1;
                if order.created_at >= since {
                    stats.monthly_sales += 1;
                }
                let overflow = || AppError::Internal("Seller revenue overflow".to_string());
                let subtotal = item.subtotal().ok_or_else(overflow)?;
                stats.total_revenue = stats
                    .total_revenue
                    .checked_add(subtotal)
                    .ok_or_else(overflow)?;
            }
            Ok(stats)
        })?
    }

    // ========================================================================
    // Reviews
    // ========================================================================

    /// Review a product the buyer has paid for; reviewing again edits the
    /// earlier review. Keeps the product's average rating current.
    pub fn review_product(
        &self,
        buyer_id: Uuid,
        product_id: Uuid,
        input: ReviewInput,
    ) -> AppResult<Review> {
        self.save_review(buyer_id, ReviewTarget::Product(product_id), input)
    }

    /// Review a seller the buyer has paid; keeps the seller's rating current
    pub fn review_seller(
        &self,
        buyer_id: Uuid,
        seller_id: Uuid,
        input: ReviewInput,
    ) -> AppResult<Review> {
        self.save_review(buyer_id, ReviewTarget::Seller(seller_id), input)
    }

    fn save_review(
        &self,
        buyer_id: Uuid,
        target: ReviewTarget,
        input: ReviewInput,
    ) -> AppResult<Review> {
        let mut errors = FieldErrors::new();
        errors.check("rating", validate_rating(input.rating));
        errors.check("review_text", validate_review_text(&input.review_text));
        errors.into_result()?;

        let mut tx = self.store.begin()?;
        if !tx.buyer_profiles.contains_key(&buyer_id) {
            return Err(AppError::not_found("Buyer profile"));
        }
        let (exists, resource, noun) = match target {
            ReviewTarget::Product(id) => (tx.products.contains_key(&id), "Product", "product"),
            ReviewTarget::Seller(id) => {
                (tx.seller_profiles.contains_key(&id), "Seller profile", "seller")
            }
        };
        if !exists {
            return Err(AppError::not_found(resource));
        }
        if !has_purchased(&tx, buyer_id, target) {
            return Err(AppError::InsufficientPermissions(format!(
                "You need to purchase from this {} before leaving a review",
                noun
            )));
        }

        let now = Utc::now();
        let existing = tx
            .reviews
            .values()
            .find(|r| r.buyer_id == buyer_id && r.target == target)
            .cloned();
        let review = match existing {
            Some(earlier) => Review {
                rating: input.rating,
                review_text: input.review_text.trim().to_string(),
                updated_at: now,
                ..earlier
            },
            None => Review {
                id: Uuid::new_v4(),
                buyer_id,
                target,
                rating: input.rating,
                review_text: input.review_text.trim().to_string(),
                created_at: now,
                updated_at: now,
            },
        };
        tx.reviews.insert(review.id, review.clone());

        let rating = average_rating(
            tx.reviews
                .values()
                .filter(|r| r.target == target)
                .map(|r| r.rating),
        );
        match target {
            ReviewTarget::Product(id) => {
                if let Some(product) = tx.products.get_mut(&id) {
                    product.average_rating = rating;
                }
            }
            ReviewTarget::Seller(id) => {
                if let Some(seller) = tx.seller_profiles.get_mut(&id) {
                    seller.rating = rating;
                }
            }
        }
        tx.commit();

        tracing::info!(
            review_id = %review.id,
            review_target = ?target,
            rating = %rating,
            "Review saved"
        );
        Ok(review)
    }

    /// Reviews of a product or seller, newest first
    pub fn reviews_for(&self, target: ReviewTarget) -> AppResult<Vec<Review>> {
        let mut reviews: Vec<Review> = self.store.read(|t| {
            t.reviews
                .values()
                .filter(|r| r.target == target)
                .cloned()
                .collect()
        })?;
        reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(reviews)
    }
}

fn delivery_estimate(from: DateTime<Utc>, estimated_days: u32) -> DateTime<Utc> {
    from + Duration::days(i64::from(estimated_days))
}

/// Whether the buyer has a paid, shipped or delivered order covering `target`
fn has_purchased(tables: &Tables, buyer_id: Uuid, target: ReviewTarget) -> bool {
    tables
        .order_items
        .values()
        .filter(|item| match target {
            ReviewTarget::Product(id) => item.product_id == id,
            ReviewTarget::Seller(id) => item.seller_id == id,
        })
        .any(|item| {
            tables
                .orders
                .get(&item.order_id)
                .is_some_and(|o| o.buyer_id == buyer_id && o.status.is_completed_sale())
        })
}
