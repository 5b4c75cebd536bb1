//! Database models and bootstrap

pub mod init;
pub mod models;

pub use init::*;
pub use models::*;
