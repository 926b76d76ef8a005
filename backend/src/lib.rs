//! AgriTrace backend
//!
//! Farm record keeping, harvest prediction and a small marketplace on top of
//! a transactional in-memory store.

use std::sync::Arc;

pub mod config;
pub mod error;
pub mod external;
pub mod services;
pub mod store;
pub mod telemetry;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use store::Store;

use services::{ActivityService, FarmService, MarketplaceService, PredictionService, ProfileService};

/// Application state shared by every service
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            store: Store::new(),
            config: Arc::new(config),
        }
    }

    pub fn activities(&self) -> ActivityService {
        ActivityService::new(self.store.clone())
    }

    pub fn farms(&self) -> FarmService {
        FarmService::new(self.store.clone())
    }

    pub fn predictions(&self) -> PredictionService {
        PredictionService::new(self.store.clone(), self.config.prediction.clone())
    }

    pub fn profiles(&self) -> ProfileService {
        ProfileService::new(self.store.clone())
    }

    pub fn marketplace(&self) -> MarketplaceService {
        MarketplaceService::new(self.store.clone())
    }
}
