//! Domain models for the AgriTrace platform

mod activity;
mod crop;
mod farm;
mod marketplace;
mod user;

pub use activity::*;
pub use crop::*;
pub use farm::*;
pub use marketplace::*;
pub use user::*;
