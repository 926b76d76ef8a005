//! Business logic services for the AgriTrace platform

pub mod activity;
pub mod farm;
pub mod marketplace;
pub mod prediction;
pub mod profile;

pub use activity::ActivityService;
pub use farm::FarmService;
pub use marketplace::MarketplaceService;
pub use prediction::PredictionService;
pub use profile::ProfileService;
