pub mod api;
pub mod config;
pub mod entities;
pub mod error;
pub mod metrics;
pub mod migrator;
pub mod notifications;
pub mod orchestrator;
pub mod results;
pub mod scoring;
pub mod storage;
pub mod telemetry;

pub use sea_orm;
pub use redis;
