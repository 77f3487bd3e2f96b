//! Headless runner support: inputs, a catalog-driven product, and SQLite
//! telemetry storage.

pub mod catalog;
pub mod inputs;
pub mod store;
