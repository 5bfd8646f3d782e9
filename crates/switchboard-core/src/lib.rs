pub mod agents;
pub mod config;
pub mod memory;
pub mod models;
pub mod orchestration;
pub mod persistence;
pub mod registry;
pub mod session;
pub mod sqlite;
pub mod telemetry;
