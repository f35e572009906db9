//! Telemetry server: the `Edges` API over HTTP plus health and metrics endpoints

pub mod api;
pub mod config;
