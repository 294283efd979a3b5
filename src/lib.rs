//! Scheduled publishing of prepared media folders
//!
//! Each watched folder holds one sub-directory per item (a media file, a
//! metadata JSON file and an optional thumbnail). A per-folder cron trigger
//! picks the first pending item, publishes it through a rate-limited API
//! client with bounded retries, records the outcome in the ledger and
//! archives the item.

pub mod config;
pub mod database;
pub mod entities;
pub mod errors;
pub mod ledger;
pub mod models;
pub mod pipeline;
pub mod publisher;
pub mod scanner;
pub mod scheduler;
pub mod services;
pub mod utils;
pub mod web;
