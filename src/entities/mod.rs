//! SeaORM entity definitions for the ledger tables

pub mod prelude;

pub mod folder_configurations;
pub mod upload_failures;
pub mod uploads;
