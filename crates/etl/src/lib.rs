//! Data-sync engine: schema-driven ETL between the operational source
//! database and the analytics target, plus period-bucketed rollups.

pub mod config;
pub mod error;
pub mod jobs;
pub mod logging;
pub mod services;
pub mod settings;
