pub mod api;
pub mod entities;
pub mod error;
pub mod geo;
pub mod ingest;
pub mod metrics;
pub mod migrator;
pub mod notifier;
pub mod proofs;
pub mod queries;
pub mod telemetry;

pub use sea_orm;
