//! Infrastructure adapters for configuration, logging, and persisted state.

pub mod config;
pub mod logging;
pub mod store;
