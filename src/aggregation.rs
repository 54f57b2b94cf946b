//! Read-side math over stored readings.
//!
//! Energy is estimated by left-endpoint rectangle integration: each
//! consecutive pair of readings contributes the *later* sample's power
//! held over the time gap between them. With the dense (~1 s) sampling
//! cadence the rectangle error is negligible; the first reading of a
//! window has no prior point and contributes nothing.

use chrono::Datelike;

use crate::db::models::EnergyReading;

/// Total energy in kWh over `readings`, which must be ordered by
/// timestamp ascending. Zero or one reading yields 0.0.
pub fn energy_kwh(readings: &[EnergyReading]) -> f64 {
    readings
        .windows(2)
        .map(|pair| increment_kwh(&pair[0], &pair[1]))
        .sum()
}

/// kWh contributed by one consecutive pair: `(curr.power / 1000) * Δhours`.
fn increment_kwh(prev: &EnergyReading, curr: &EnergyReading) -> f64 {
    let delta_hours = (curr.timestamp - prev.timestamp).num_milliseconds() as f64 / 3_600_000.0;
    (curr.power / 1000.0) * delta_hours
}

/// Cost of `usage_kwh` at a flat tariff.
pub fn cost(usage_kwh: f64, unit_price: f64) -> f64 {
    usage_kwh * unit_price
}

/// One calendar month of the all-time cost breakdown.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyCost {
    pub year: i32,
    pub month: u32,
    /// Raw sum of the month's instantaneous power samples (diagnostic,
    /// not an energy figure).
    pub total_power: f64,
    pub usage_kwh: f64,
    pub cost: f64,
}

/// Group `readings` (ordered by timestamp ascending) by calendar month
/// and integrate each month independently: the first reading of a month
/// starts that month's integration, so no gap spanning a month boundary
/// is billed. Cost is always derived from the integrated kWh — the same
/// method the per-window usage figures use.
pub fn monthly_breakdown(readings: &[EnergyReading], unit_price: f64) -> Vec<MonthlyCost> {
    let mut months: Vec<MonthlyCost> = Vec::new();
    let mut prev: Option<&EnergyReading> = None;

    for reading in readings {
        let year = reading.timestamp.year();
        let month = reading.timestamp.month();

        let starts_new_month = months
            .last()
            .map_or(true, |m| m.year != year || m.month != month);

        if starts_new_month {
            months.push(MonthlyCost {
                year,
                month,
                total_power: reading.power,
                usage_kwh: 0.0,
                cost: 0.0,
            });
        } else if let Some(current) = months.last_mut() {
            current.total_power += reading.power;
            if let Some(prev) = prev {
                current.usage_kwh += increment_kwh(prev, reading);
            }
        }

        prev = Some(reading);
    }

    for m in &mut months {
        m.cost = cost(m.usage_kwh, unit_price);
    }

    months
}
