//! CLI command implementations

pub mod breaches;
pub mod export;
pub mod refresh;
pub mod status;
pub mod thresholds;
