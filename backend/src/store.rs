//! In-memory transactional record store
//!
//! All records live in one [`Tables`] value behind a mutex. A
//! [`Transaction`] holds the lock for its whole lifetime and mutates a
//! private copy; [`Transaction::commit`] publishes the copy, and dropping an
//! uncommitted transaction discards it.
//!
//! Each [`Table`] shares its map with the committed state until the first
//! write, so a transaction copies only the tables it actually changes.

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard};

use shared::{
    ActivityDetails, ActivityLog, BuyerProfile, Crop, Farm, FarmCondition, FarmerProfile, Field,
    Order, OrderItem, Product, Review, SellerProfile, ShippingService, User,
};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Records keyed by id, copied on first write
#[derive(Debug)]
pub struct Table<V>(Arc<HashMap<Uuid, V>>);

impl<V> Table<V> {
    #[cfg(test)]
    fn shares_storage_with(&self, other: &Table<V>) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl<V> Default for Table<V> {
    fn default() -> Self {
        Table(Arc::new(HashMap::new()))
    }
}

impl<V> Clone for Table<V> {
    fn clone(&self) -> Self {
        Table(Arc::clone(&self.0))
    }
}

impl<V> Deref for Table<V> {
    type Target = HashMap<Uuid, V>;

    fn deref(&self) -> &HashMap<Uuid, V> {
        &self.0
    }
}

impl<V: Clone> DerefMut for Table<V> {
    fn deref_mut(&mut self) -> &mut HashMap<Uuid, V> {
        Arc::make_mut(&mut self.0)
    }
}

/// Every record kept by the platform
#[derive(Debug, Clone, Default)]
pub struct Tables {
    pub users: Table<User>,
    /// AgriPay API tokens by user id
    pub wallet_tokens: Table<String>,
    pub farmer_profiles: Table<FarmerProfile>,
    pub buyer_profiles: Table<BuyerProfile>,
    pub seller_profiles: Table<SellerProfile>,

    pub farms: Table<Farm>,
    /// Keyed by farm id
    pub conditions: Table<FarmCondition>,
    pub fields: Table<Field>,
    pub crops: Table<Crop>,
    pub activities: Table<ActivityLog>,

    pub products: Table<Product>,
    pub shipping_services: Table<ShippingService>,
    pub orders: Table<Order>,
    pub order_items: Table<OrderItem>,
    pub reviews: Table<Review>,
}

/// Records that keep a crop from being deleted
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CropDependents {
    pub maintenance: Vec<Uuid>,
    pub harvest: Option<Uuid>,
}

impl CropDependents {
    pub fn is_empty(&self) -> bool {
        self.maintenance.is_empty() && self.harvest.is_none()
    }
}

impl Tables {
    pub fn farm(&self, farm_id: Uuid) -> AppResult<&Farm> {
        self.farms
            .get(&farm_id)
            .ok_or_else(|| AppError::not_found("Farm"))
    }

    /// Farm, provided it belongs to `farmer_id`
    pub fn owned_farm(&self, farmer_id: Uuid, farm_id: Uuid) -> AppResult<&Farm> {
        self.farm(farm_id)
            .ok()
            .filter(|farm| farm.farmer_id == farmer_id)
            .ok_or_else(|| AppError::not_found("Farm"))
    }

    pub fn field_in_farm(&self, farm_id: Uuid, field_id: Uuid) -> Option<&Field> {
        self.fields
            .get(&field_id)
            .filter(|field| field.farm_id == farm_id)
    }

    pub fn crop_in_farm(&self, farm_id: Uuid, crop_id: Uuid) -> Option<&Crop> {
        self.crops.get(&crop_id).filter(|crop| crop.farm_id == farm_id)
    }

    pub fn activity_in_farm(
        &self,
        farm_id: Uuid,
        activity_id: Uuid,
    ) -> AppResult<&ActivityLog> {
        self.activities
            .get(&activity_id)
            .filter(|log| log.farm_id == farm_id)
            .ok_or_else(|| AppError::not_found("Activity"))
    }

    /// Crop created by a planting log
    pub fn crop_for_planting(&self, planting_log_id: Uuid) -> Option<&Crop> {
        self.crops
            .values()
            .find(|crop| crop.planting_log_id == planting_log_id)
    }

    /// Maintenance logs targeting a crop, oldest first
    pub fn maintenance_logs(&self, crop_id: Uuid) -> Vec<&ActivityLog> {
        let mut logs: Vec<_> = self
            .activities
            .values()
            .filter(|log| {
                matches!(&log.details, ActivityDetails::Maintenance(m) if m.crop_id == crop_id)
            })
            .collect();
        logs.sort_by_key(|log| (log.timestamp, log.id));
        logs
    }

    pub fn harvest_log(&self, crop_id: Uuid) -> Option<&ActivityLog> {
        self.activities
            .values()
            .find(|log| {
                matches!(&log.details, ActivityDetails::Harvesting(h) if h.crop_id == crop_id)
            })
    }

    pub fn crop_dependents(&self, crop_id: Uuid) -> CropDependents {
        CropDependents {
            maintenance: self.maintenance_logs(crop_id).iter().map(|log| log.id).collect(),
            harvest: self.harvest_log(crop_id).map(|log| log.id),
        }
    }

    /// Remove every activity for which `pred` holds; returns how many went
    pub fn remove_activities_where(&mut self, pred: impl Fn(&ActivityLog) -> bool) -> usize {
        let before = self.activities.len();
        self.activities.retain(|_, log| !pred(log));
        before - self.activities.len()
    }
}

/// Shared handle to the record store
#[derive(Debug, Clone, Default)]
pub struct Store {
    inner: Arc<Mutex<Tables>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, Tables>> {
        self.inner
            .lock()
            .map_err(|_| AppError::Internal("record store lock poisoned".to_string()))
    }

    /// Start a transaction. Other callers block until it ends. The working
    /// copy shares every table with the committed state until written.
    pub fn begin(&self) -> AppResult<Transaction<'_>> {
        let guard = self.lock()?;
        let working = guard.clone();
        Ok(Transaction { guard, working })
    }

    /// Run a read-only query against the committed state
    pub fn read<T>(&self, query: impl FnOnce(&Tables) -> T) -> AppResult<T> {
        let guard = self.lock()?;
        Ok(query(&guard))
    }
}

/// Exclusive unit of work over the store
pub struct Transaction<'a> {
    guard: MutexGuard<'a, Tables>,
    working: Tables,
}

impl Transaction<'_> {
    /// Publish every change made through this transaction
    pub fn commit(self) {
        let Transaction { mut guard, working } = self;
        *guard = working;
    }
}

impl Deref for Transaction<'_> {
    type Target = Tables;

    fn deref(&self) -> &Tables {
        &self.working
    }
}

impl DerefMut for Transaction<'_> {
    fn deref_mut(&mut self) -> &mut Tables {
        &mut self.working
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn farm() -> Farm {
        Farm {
            id: Uuid::new_v4(),
            farmer_id: Uuid::new_v4(),
            name: "Sunrise".to_string(),
            location: "Bogor".to_string(),
            size_hectares: Decimal::from(3),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_commit_publishes_changes() {
        let store = Store::new();
        let farm = farm();
        let id = farm.id;

        let mut tx = store.begin().unwrap();
        tx.farms.insert(id, farm);
        tx.commit();

        assert!(store.read(|t| t.farms.contains_key(&id)).unwrap());
    }

    #[test]
    fn test_drop_rolls_back() {
        let store = Store::new();
        let farm = farm();
        let id = farm.id;

        {
            let mut tx = store.begin().unwrap();
            tx.farms.insert(id, farm);
        }

        assert!(!store.read(|t| t.farms.contains_key(&id)).unwrap());
    }

    #[test]
    fn test_only_written_tables_are_copied() {
        let store = Store::new();
        let farm = farm();
        let id = farm.id;

        let mut tx = store.begin().unwrap();
        assert!(tx.farms.shares_storage_with(&tx.guard.farms));
        tx.farms.insert(id, farm);
        assert!(!tx.farms.shares_storage_with(&tx.guard.farms));
        assert!(tx.users.shares_storage_with(&tx.guard.users));
        assert!(tx.guard.farms.is_empty());
        tx.commit();

        assert!(store.read(|t| t.farms.contains_key(&id)).unwrap());
    }

    #[test]
    fn test_owned_farm_hides_other_farmers() {
        let store = Store::new();
        let farm = farm();
        let (id, owner) = (farm.id, farm.farmer_id);
        let mut tx = store.begin().unwrap();
        tx.farms.insert(id, farm);
        tx.commit();

        store
            .read(|t| {
                assert!(t.owned_farm(owner, id).is_ok());
                assert!(matches!(
                    t.owned_farm(Uuid::new_v4(), id),
                    Err(AppError::NotFound(_))
                ));
            })
            .unwrap();
    }
}
