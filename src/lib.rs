//! Smart-plug energy monitoring service.
//!
//! Polls a Tuya smart plug's electrical telemetry on a fixed cadence,
//! persists every sample to a local SQLite store, and serves REST
//! endpoints that aggregate the samples into usage and cost figures.

pub mod aggregation;
pub mod api;
pub mod collector;
pub mod config;
pub mod db;
pub mod reading_cache;
pub mod tuya;
