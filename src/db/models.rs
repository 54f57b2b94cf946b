use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One persisted telemetry sample. Immutable once inserted; `id` is
/// assigned by SQLite and increases monotonically across ticks.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct EnergyReading {
    pub id: i64,
    /// Collection time stamped by the collector, not device time.
    pub timestamp: DateTime<Utc>,
    /// Watts
    pub power: f64,
    /// Volts
    pub voltage: f64,
    /// Amperes
    pub current: f64,
    pub power_factor: f64,
}

/// Insert payload for a reading; the store assigns `id`.
#[derive(Debug, Clone)]
pub struct NewReading {
    pub timestamp: DateTime<Utc>,
    pub power: f64,
    pub voltage: f64,
    pub current: f64,
    pub power_factor: f64,
}

/// Mean power for one hour-of-day bucket ("00".."23") within a window.
#[derive(Debug, Clone, FromRow)]
pub struct HourlyAverage {
    pub hour: String,
    pub avg_power: f64,
}

/// Per-calendar-date aggregate over all stored readings.
#[derive(Debug, Clone, FromRow)]
pub struct DailyRollup {
    pub date: String,
    pub readings: i64,
    pub min_power: f64,
    pub max_power: f64,
    pub avg_power: f64,
    pub total_power: f64,
}
