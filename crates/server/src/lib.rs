//! HTTP service around the sideload download engine.

pub mod api;
pub mod metrics;
pub mod state;
