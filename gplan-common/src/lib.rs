//! # GardenPlan Common Library
//!
//! Shared code for GardenPlan services including:
//! - Catalog record models (plant types, subcategories, varieties, dependents)
//! - Database bootstrap and schema creation
//! - Admin API authentication primitives
//! - Configuration loading
//! - Timestamp helpers

pub mod api;
pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod time;

pub use error::{Error, Result};
