//! Monitor agent: HTTP surface and configuration for a monitoring session

pub mod api;
pub mod config;
