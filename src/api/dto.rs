use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::aggregation::MonthlyCost;
use crate::db::models::{DailyRollup, EnergyReading, HourlyAverage};

/// Raw reading as served to clients; field names match the storage columns.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReadingDto {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    /// Watts
    pub power: f64,
    /// Volts
    pub voltage: f64,
    /// Amperes
    pub current: f64,
    pub power_factor: f64,
}

impl From<EnergyReading> for ReadingDto {
    fn from(r: EnergyReading) -> Self {
        Self {
            id: r.id,
            timestamp: r.timestamp,
            power: r.power,
            voltage: r.voltage,
            current: r.current,
            power_factor: r.power_factor,
        }
    }
}

/// `/current-data` payload. On an empty store the measurement fields are
/// zero and `id`/`timestamp` are omitted entirely.
#[derive(Debug, Serialize, ToSchema)]
pub struct CurrentDataDto {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    pub power: f64,
    pub voltage: f64,
    pub current: f64,
    pub power_factor: f64,
}

impl CurrentDataDto {
    pub fn zero() -> Self {
        Self {
            id: None,
            timestamp: None,
            power: 0.0,
            voltage: 0.0,
            current: 0.0,
            power_factor: 0.0,
        }
    }
}

impl From<EnergyReading> for CurrentDataDto {
    fn from(r: EnergyReading) -> Self {
        Self {
            id: Some(r.id),
            timestamp: Some(r.timestamp),
            power: r.power,
            voltage: r.voltage,
            current: r.current,
            power_factor: r.power_factor,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HourlyAverageDto {
    /// Hour of day, "00".."23"
    pub hour: String,
    pub avg_power: f64,
}

impl From<HourlyAverage> for HourlyAverageDto {
    fn from(h: HourlyAverage) -> Self {
        Self {
            hour: h.hour,
            avg_power: h.avg_power,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UsageDto {
    /// kWh, fixed three decimals
    pub usage: String,
    pub readings: usize,
}

impl UsageDto {
    pub fn new(usage_kwh: f64, readings: usize) -> Self {
        Self {
            usage: format!("{usage_kwh:.3}"),
            readings,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MonthlyUsageDto {
    /// kWh, fixed three decimals
    pub usage: String,
    /// Currency units, fixed two decimals
    pub cost: String,
    pub readings: usize,
}

impl MonthlyUsageDto {
    pub fn new(usage_kwh: f64, cost: f64, readings: usize) -> Self {
        Self {
            usage: format!("{usage_kwh:.3}"),
            cost: format!("{cost:.2}"),
            readings,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CostAnalysisDto {
    /// "01".."12"
    pub month: String,
    pub year: String,
    pub total_power: f64,
    /// Currency units, fixed two decimals
    pub total_cost: String,
}

impl From<MonthlyCost> for CostAnalysisDto {
    fn from(m: MonthlyCost) -> Self {
        Self {
            month: format!("{:02}", m.month),
            year: m.year.to_string(),
            total_power: m.total_power,
            total_cost: format!("{:.2}", m.cost),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DailyRollupDto {
    pub date: String,
    pub readings: i64,
    pub min_power: f64,
    pub max_power: f64,
    pub avg_power: f64,
    pub total_power: f64,
}

impl From<DailyRollup> for DailyRollupDto {
    fn from(d: DailyRollup) -> Self {
        Self {
            date: d.date,
            readings: d.readings,
            min_power: d.min_power,
            max_power: d.max_power,
            avg_power: d.avg_power,
            total_power: d.total_power,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatusDto {
    pub total_readings: i64,
    pub last_reading: Option<DateTime<Utc>>,
    pub error_count: i64,
    /// Seconds since process start
    pub uptime: f64,
    pub server_online: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ControlRequest {
    pub command: Option<CommandDto>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CommandDto {
    pub code: String,
    #[schema(value_type = Object)]
    pub value: serde_json::Value,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ControlResponse {
    pub success: bool,
    pub response: bool,
}
