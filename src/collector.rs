use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use tokio::{sync::watch, time};
use tracing::{debug, error, info, warn};

use crate::{
    db::{models::NewReading, store::EnergyStore},
    reading_cache::ReadingCache,
    tuya::{models::DeviceProperty, TuyaClient, TuyaError},
};

/// DP codes the plug reports its electrical metrics under.
const DP_POWER: &str = "cur_power";
const DP_VOLTAGE: &str = "cur_voltage";
const DP_CURRENT: &str = "cur_current";
const DP_POWER_FACTOR: &str = "power_factor";

/// Source of device status snapshots.
///
/// The collector is generic over this seam so tests can drive individual
/// ticks against a canned stub instead of the Tuya cloud.
pub trait Telemetry: Clone + Send + Sync + 'static {
    fn fetch_status(
        &self,
        device_id: &str,
    ) -> impl Future<Output = Result<Vec<DeviceProperty>, TuyaError>> + Send;
}

impl Telemetry for TuyaClient {
    async fn fetch_status(&self, device_id: &str) -> Result<Vec<DeviceProperty>, TuyaError> {
        self.get_device_status(device_id).await
    }
}

/// Electrical metrics extracted from one status snapshot.
///
/// Values are persisted exactly as the device reports them; a missing DP
/// code yields 0.0 so every tick still produces a complete row.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PlugMetrics {
    pub power: f64,
    pub voltage: f64,
    pub current: f64,
    pub power_factor: f64,
}

impl PlugMetrics {
    pub fn from_status(status: &[DeviceProperty]) -> Self {
        let metric = |code: &str| {
            status
                .iter()
                .find(|dp| dp.code == code)
                .and_then(|dp| dp.value.as_f64())
                .unwrap_or(0.0)
        };

        Self {
            power: metric(DP_POWER),
            voltage: metric(DP_VOLTAGE),
            current: metric(DP_CURRENT),
            power_factor: metric(DP_POWER_FACTOR),
        }
    }
}

/// Recurring collection job: one tick, one reading row.
///
/// A failed fetch is logged as an ERROR system event and recorded as an
/// all-zero reading, keeping the time series contiguous for the usage
/// integration downstream. Nothing a tick does can take the process down.
#[derive(Clone)]
pub struct Collector<T> {
    store: EnergyStore,
    telemetry: T,
    cache: ReadingCache,
    device_id: String,
    interval: Duration,
}

impl<T: Telemetry> Collector<T> {
    pub fn new(
        store: EnergyStore,
        telemetry: T,
        cache: ReadingCache,
        device_id: impl Into<String>,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            telemetry,
            cache,
            device_id: device_id.into(),
            interval,
        }
    }

    /// Runs until `shutdown` flips to `true` (or its sender is dropped).
    ///
    /// Each tick is spawned as its own task: a Tuya call that overruns the
    /// interval delays nothing, and every scheduled tick still lands its
    /// own row. Spawn this via `tokio::spawn`.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.interval.as_secs(),
            device_id = %self.device_id,
            "Collector started"
        );
        let mut ticker = time::interval(self.interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let collector = self.clone();
                    tokio::spawn(async move { collector.tick().await });
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Collector stopped");
                        return;
                    }
                }
            }
        }
    }

    /// One collection pass. Always attempts exactly one reading insert.
    pub async fn tick(&self) {
        match self.telemetry.fetch_status(&self.device_id).await {
            Ok(status) => {
                self.persist(PlugMetrics::from_status(&status)).await;
            }
            Err(e) => {
                warn!(device_id = %self.device_id, error = %e, "Status fetch failed; recording zero reading");
                if let Err(log_err) = self
                    .store
                    .insert_event("ERROR", &format!("Tuya API error: {e}"))
                    .await
                {
                    error!(error = %log_err, "Failed to record system event");
                }
                self.persist(PlugMetrics::default()).await;
            }
        }
    }

    async fn persist(&self, metrics: PlugMetrics) {
        let reading = NewReading {
            timestamp: Utc::now(),
            power: metrics.power,
            voltage: metrics.voltage,
            current: metrics.current,
            power_factor: metrics.power_factor,
        };

        match self.store.insert_reading(&reading).await {
            Ok(saved) => {
                debug!(id = saved.id, power = saved.power, "Reading persisted");
                self.cache.update(saved).await;
            }
            Err(e) => {
                error!(error = %e, "Failed to save energy reading");
                if let Err(log_err) = self
                    .store
                    .insert_event("ERROR", &format!("Failed to save energy data: {e}"))
                    .await
                {
                    error!(error = %log_err, "Failed to record system event");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuya::models::DpValue;
    use sqlx::sqlite::SqlitePoolOptions;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

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

    /// Pops a canned response per tick; an empty queue means transport failure.
    #[derive(Clone, Default)]
    struct StubTelemetry {
        responses: Arc<Mutex<VecDeque<Result<Vec<DeviceProperty>, TuyaError>>>>,
    }

    impl StubTelemetry {
        fn push(&self, response: Result<Vec<DeviceProperty>, TuyaError>) {
            self.responses.lock().unwrap().push_back(response);
        }
    }

    impl Telemetry for StubTelemetry {
        async fn fetch_status(
            &self,
            _device_id: &str,
        ) -> Result<Vec<DeviceProperty>, TuyaError> {
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(TuyaError::MissingResult))
        }
    }

    fn dp(code: &str, value: DpValue) -> DeviceProperty {
        DeviceProperty {
            code: code.to_owned(),
            value,
        }
    }

    fn plug_status() -> Vec<DeviceProperty> {
        vec![
            dp("switch_1", DpValue::Bool(true)),
            dp(DP_POWER, DpValue::Integer(1234)),
            dp(DP_VOLTAGE, DpValue::Float(230.5)),
            dp(DP_CURRENT, DpValue::Integer(5)),
            dp(DP_POWER_FACTOR, DpValue::Float(0.92)),
        ]
    }

    fn collector(store: EnergyStore, stub: StubTelemetry) -> Collector<StubTelemetry> {
        Collector::new(
            store,
            stub,
            ReadingCache::new(),
            "plug-1",
            Duration::from_secs(1),
        )
    }

    #[test]
    fn metrics_default_to_zero_for_missing_codes() {
        let status = vec![dp(DP_POWER, DpValue::Integer(500))];
        let m = PlugMetrics::from_status(&status);
        assert_eq!(m.power, 500.0);
        assert_eq!(m.voltage, 0.0);
        assert_eq!(m.current, 0.0);
        assert_eq!(m.power_factor, 0.0);

        assert_eq!(PlugMetrics::from_status(&[]), PlugMetrics::default());
    }

    #[test]
    fn metrics_ignore_non_numeric_values() {
        // A boolean under a metric code must not decode as a number.
        let status = vec![dp(DP_POWER, DpValue::Bool(true))];
        assert_eq!(PlugMetrics::from_status(&status).power, 0.0);
    }

    #[tokio::test]
    async fn successful_tick_inserts_one_reading() {
        let store = memory_store().await;
        let stub = StubTelemetry::default();
        stub.push(Ok(plug_status()));

        let collector = collector(store.clone(), stub);
        collector.tick().await;

        assert_eq!(store.reading_count().await.unwrap(), 1);
        let reading = store.latest_reading().await.unwrap().unwrap();
        assert_eq!(reading.power, 1234.0);
        assert_eq!(reading.voltage, 230.5);
        assert_eq!(reading.current, 5.0);
        assert_eq!(reading.power_factor, 0.92);
        assert_eq!(store.event_count("ERROR").await.unwrap(), 0);

        // Cache follows the insert.
        let cached = collector.cache.latest().await.unwrap();
        assert_eq!(cached.id, reading.id);
    }

    #[tokio::test]
    async fn failed_tick_inserts_zero_reading_and_error_event() {
        let store = memory_store().await;
        let stub = StubTelemetry::default();
        stub.push(Err(TuyaError::Device {
            code: 1010,
            msg: "token invalid".to_owned(),
        }));

        collector(store.clone(), stub).tick().await;

        assert_eq!(store.reading_count().await.unwrap(), 1);
        let reading = store.latest_reading().await.unwrap().unwrap();
        assert_eq!(reading.power, 0.0);
        assert_eq!(reading.voltage, 0.0);
        assert_eq!(reading.current, 0.0);
        assert_eq!(reading.power_factor, 0.0);

        assert_eq!(store.event_count("ERROR").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn mixed_ticks_never_skip_a_row() {
        let store = memory_store().await;
        let stub = StubTelemetry::default();
        stub.push(Ok(plug_status()));
        stub.push(Err(TuyaError::MissingResult));
        stub.push(Ok(plug_status()));

        let collector = collector(store.clone(), stub);
        for _ in 0..3 {
            collector.tick().await;
        }

        assert_eq!(store.reading_count().await.unwrap(), 3);
        let recent = store.recent_readings(3).await.unwrap();
        // Ids strictly increase; the failed tick sits between the two good ones.
        assert!(recent.windows(2).all(|w| w[0].id > w[1].id));
        assert_eq!(recent[1].power, 0.0);
        assert_eq!(store.event_count("ERROR").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn run_stops_on_shutdown_signal() {
        let store = memory_store().await;
        let collector = collector(store, StubTelemetry::default());

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(collector.run(rx));

        tx.send(true).expect("collector still listening");
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("collector loop exits on shutdown")
            .expect("collector task not panicked");
    }
}
