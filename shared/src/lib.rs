//! Shared types and models for the AgriTrace farm-records platform
//!
//! This crate contains the domain model, validation rules and the harvest
//! prediction heuristic shared between the backend, the browser (via WASM)
//! and the command-line tools.

pub mod models;
pub mod prediction;
pub mod types;
pub mod validation;

pub use models::*;
pub use prediction::*;
pub use types::*;
pub use validation::*;
