use chrono::{DateTime, NaiveDate, Utc};
use sqlx::SqlitePool;

use super::models::{DailyRollup, EnergyReading, HourlyAverage, NewReading};
use super::StoreError;

/// Sole owner of the three tables. The collector writes through it, the
/// API layer reads through it; nothing else touches the pool directly.
#[derive(Debug, Clone)]
pub struct EnergyStore {
    pool: SqlitePool,
}

impl EnergyStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    pub async fn insert_reading(&self, reading: &NewReading) -> Result<EnergyReading, StoreError> {
        let row = sqlx::query_as::<_, EnergyReading>(
            r#"
            INSERT INTO energy_data (timestamp, power, voltage, current, power_factor)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id, timestamp, power, voltage, current, power_factor
            "#,
        )
        .bind(reading.timestamp)
        .bind(reading.power)
        .bind(reading.voltage)
        .bind(reading.current)
        .bind(reading.power_factor)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn insert_command(
        &self,
        code: &str,
        value: &serde_json::Value,
        success: bool,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO device_commands (timestamp, command, value, success) VALUES (?, ?, ?, ?)",
        )
        .bind(Utc::now())
        .bind(code)
        .bind(value.to_string())
        .bind(success)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn insert_event(&self, event_type: &str, message: &str) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO system_events (timestamp, event_type, message) VALUES (?, ?, ?)")
            .bind(Utc::now())
            .bind(event_type)
            .bind(message)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub async fn latest_reading(&self) -> Result<Option<EnergyReading>, StoreError> {
        let row = sqlx::query_as::<_, EnergyReading>(
            "SELECT * FROM energy_data ORDER BY id DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn recent_readings(&self, limit: i64) -> Result<Vec<EnergyReading>, StoreError> {
        let rows = sqlx::query_as::<_, EnergyReading>(
            "SELECT * FROM energy_data ORDER BY id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Readings with `from <= timestamp <= to`, ascending.
    pub async fn readings_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<EnergyReading>, StoreError> {
        let rows = sqlx::query_as::<_, EnergyReading>(
            "SELECT * FROM energy_data WHERE timestamp BETWEEN ? AND ? ORDER BY timestamp",
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// All readings stamped on the given calendar date (UTC), ascending.
    pub async fn readings_on_date(&self, date: NaiveDate) -> Result<Vec<EnergyReading>, StoreError> {
        let rows = sqlx::query_as::<_, EnergyReading>(
            "SELECT * FROM energy_data WHERE date(timestamp) = ? ORDER BY timestamp",
        )
        .bind(date.format("%Y-%m-%d").to_string())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// All readings within one calendar month (UTC), ascending.
    pub async fn readings_in_month(
        &self,
        year: i32,
        month: u32,
    ) -> Result<Vec<EnergyReading>, StoreError> {
        let rows = sqlx::query_as::<_, EnergyReading>(
            "SELECT * FROM energy_data WHERE strftime('%Y-%m', timestamp) = ? ORDER BY timestamp",
        )
        .bind(format!("{year:04}-{month:02}"))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Every stored reading, oldest first. Feeds the all-time cost breakdown.
    pub async fn all_readings(&self) -> Result<Vec<EnergyReading>, StoreError> {
        let rows =
            sqlx::query_as::<_, EnergyReading>("SELECT * FROM energy_data ORDER BY timestamp")
                .fetch_all(&self.pool)
                .await?;

        Ok(rows)
    }

    /// Mean power per hour-of-day for readings stamped at or after `since`.
    ///
    /// Hours with no readings are absent from the result, not zero-filled.
    pub async fn hourly_averages(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<HourlyAverage>, StoreError> {
        let rows = sqlx::query_as::<_, HourlyAverage>(
            r#"
            SELECT strftime('%H', timestamp) AS hour, AVG(power) AS avg_power
            FROM energy_data
            WHERE timestamp >= ?
            GROUP BY hour
            ORDER BY hour
            "#,
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// COUNT/MIN/MAX/AVG/SUM of power per calendar date, most recent first.
    pub async fn daily_rollups(&self) -> Result<Vec<DailyRollup>, StoreError> {
        let rows = sqlx::query_as::<_, DailyRollup>(
            r#"
            SELECT date(timestamp) AS date,
                   COUNT(*)        AS readings,
                   MIN(power)      AS min_power,
                   MAX(power)      AS max_power,
                   AVG(power)      AS avg_power,
                   SUM(power)      AS total_power
            FROM energy_data
            GROUP BY date(timestamp)
            ORDER BY date DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn reading_count(&self) -> Result<i64, StoreError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM energy_data")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    pub async fn event_count(&self, event_type: &str) -> Result<i64, StoreError> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM system_events WHERE event_type = ?")
                .bind(event_type)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use sqlx::sqlite::SqlitePoolOptions;

    /// In-memory store; a single connection so every query sees the same DB.
    async fn memory_store() -> EnergyStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("connect to in-memory sqlite");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("run migrations");
        EnergyStore::new(pool)
    }

    fn new_reading(ts: DateTime<Utc>, power: f64) -> NewReading {
        NewReading {
            timestamp: ts,
            power,
            voltage: 230.0,
            current: power / 230.0,
            power_factor: 0.95,
        }
    }

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[tokio::test]
    async fn insert_assigns_monotonically_increasing_ids() {
        let store = memory_store().await;

        let a = store
            .insert_reading(&new_reading(at(2026, 8, 1, 10, 0, 0), 100.0))
            .await
            .unwrap();
        let b = store
            .insert_reading(&new_reading(at(2026, 8, 1, 10, 0, 1), 200.0))
            .await
            .unwrap();
        let c = store
            .insert_reading(&new_reading(at(2026, 8, 1, 10, 0, 2), 300.0))
            .await
            .unwrap();

        assert!(a.id < b.id && b.id < c.id);
        assert_eq!(store.reading_count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn latest_reading_is_highest_id() {
        let store = memory_store().await;
        assert!(store.latest_reading().await.unwrap().is_none());

        store
            .insert_reading(&new_reading(at(2026, 8, 1, 10, 0, 0), 100.0))
            .await
            .unwrap();
        let last = store
            .insert_reading(&new_reading(at(2026, 8, 1, 10, 0, 1), 250.0))
            .await
            .unwrap();

        let latest = store.latest_reading().await.unwrap().unwrap();
        assert_eq!(latest.id, last.id);
        assert_eq!(latest.power, 250.0);
    }

    #[tokio::test]
    async fn recent_readings_are_descending_and_limited() {
        let store = memory_store().await;
        for i in 0..12 {
            store
                .insert_reading(&new_reading(at(2026, 8, 1, 10, 0, i), i as f64))
                .await
                .unwrap();
        }

        let recent = store.recent_readings(10).await.unwrap();
        assert_eq!(recent.len(), 10);
        assert!(recent.windows(2).all(|w| w[0].id > w[1].id));
        assert_eq!(recent[0].power, 11.0);
    }

    #[tokio::test]
    async fn readings_between_is_inclusive_and_ascending() {
        let store = memory_store().await;
        for (d, p) in [(1, 10.0), (2, 20.0), (3, 30.0), (4, 40.0)] {
            store
                .insert_reading(&new_reading(at(2026, 8, d, 12, 0, 0), p))
                .await
                .unwrap();
        }

        let rows = store
            .readings_between(at(2026, 8, 2, 0, 0, 0), at(2026, 8, 3, 23, 59, 59))
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].power, 20.0);
        assert_eq!(rows[1].power, 30.0);
    }

    #[tokio::test]
    async fn readings_on_date_ignores_other_dates() {
        let store = memory_store().await;
        store
            .insert_reading(&new_reading(at(2026, 8, 1, 23, 59, 59), 10.0))
            .await
            .unwrap();
        store
            .insert_reading(&new_reading(at(2026, 8, 2, 0, 0, 0), 20.0))
            .await
            .unwrap();

        let date = NaiveDate::from_ymd_opt(2026, 8, 2).unwrap();
        let rows = store.readings_on_date(date).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].power, 20.0);

        let empty = store
            .readings_on_date(NaiveDate::from_ymd_opt(2026, 8, 3).unwrap())
            .await
            .unwrap();
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn readings_in_month_honors_calendar_boundaries() {
        let store = memory_store().await;
        store
            .insert_reading(&new_reading(at(2026, 7, 31, 23, 59, 59), 10.0))
            .await
            .unwrap();
        store
            .insert_reading(&new_reading(at(2026, 8, 1, 0, 0, 0), 20.0))
            .await
            .unwrap();
        store
            .insert_reading(&new_reading(at(2026, 8, 15, 12, 0, 0), 30.0))
            .await
            .unwrap();

        let rows = store.readings_in_month(2026, 8).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].power, 20.0);
    }

    #[tokio::test]
    async fn hourly_averages_skip_empty_hours() {
        let store = memory_store().await;
        // Two readings at hour 10, one at hour 12, nothing at hour 11.
        store
            .insert_reading(&new_reading(at(2026, 8, 1, 10, 0, 0), 100.0))
            .await
            .unwrap();
        store
            .insert_reading(&new_reading(at(2026, 8, 1, 10, 30, 0), 300.0))
            .await
            .unwrap();
        store
            .insert_reading(&new_reading(at(2026, 8, 1, 12, 0, 0), 500.0))
            .await
            .unwrap();

        let rows = store.hourly_averages(at(2026, 8, 1, 0, 0, 0)).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].hour, "10");
        assert_eq!(rows[0].avg_power, 200.0);
        assert_eq!(rows[1].hour, "12");
        assert_eq!(rows[1].avg_power, 500.0);
    }

    #[tokio::test]
    async fn hourly_averages_respect_window_start() {
        let store = memory_store().await;
        store
            .insert_reading(&new_reading(at(2026, 8, 1, 10, 0, 0), 100.0))
            .await
            .unwrap();
        store
            .insert_reading(&new_reading(at(2026, 8, 2, 10, 0, 0), 300.0))
            .await
            .unwrap();

        // Window starts after the first reading; only the second counts.
        let rows = store.hourly_averages(at(2026, 8, 2, 0, 0, 0)).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].avg_power, 300.0);
    }

    #[tokio::test]
    async fn daily_rollups_aggregate_per_date_descending() {
        let store = memory_store().await;
        store
            .insert_reading(&new_reading(at(2026, 8, 1, 10, 0, 0), 100.0))
            .await
            .unwrap();
        store
            .insert_reading(&new_reading(at(2026, 8, 1, 11, 0, 0), 300.0))
            .await
            .unwrap();
        store
            .insert_reading(&new_reading(at(2026, 8, 2, 10, 0, 0), 50.0))
            .await
            .unwrap();

        let rollups = store.daily_rollups().await.unwrap();
        assert_eq!(rollups.len(), 2);

        assert_eq!(rollups[0].date, "2026-08-02");
        assert_eq!(rollups[0].readings, 1);

        assert_eq!(rollups[1].date, "2026-08-01");
        assert_eq!(rollups[1].readings, 2);
        assert_eq!(rollups[1].min_power, 100.0);
        assert_eq!(rollups[1].max_power, 300.0);
        assert_eq!(rollups[1].avg_power, 200.0);
        assert_eq!(rollups[1].total_power, 400.0);
    }

    #[tokio::test]
    async fn event_counts_filter_by_type() {
        let store = memory_store().await;
        store.insert_event("ERROR", "poll failed").await.unwrap();
        store.insert_event("ERROR", "poll failed again").await.unwrap();
        store.insert_event("INFO", "started").await.unwrap();

        assert_eq!(store.event_count("ERROR").await.unwrap(), 2);
        assert_eq!(store.event_count("INFO").await.unwrap(), 1);
        assert_eq!(store.event_count("WARN").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn command_log_round_trip() {
        let store = memory_store().await;
        store
            .insert_command("switch_1", &serde_json::json!(true), true)
            .await
            .unwrap();
        store
            .insert_command("switch_1", &serde_json::json!(false), false)
            .await
            .unwrap();

        let ok: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM device_commands WHERE success = 1")
                .fetch_one(&store.pool)
                .await
                .unwrap();
        assert_eq!(ok, 1);
    }
}
