use std::sync::Arc;

use tokio::sync::RwLock;

use crate::db::models::EnergyReading;

/// In-memory copy of the most recent reading.
///
/// The collector refreshes it after every insert; `/current-data` serves
/// from it without touching the store on the hot path. Wrapped in `Arc`
/// so it can be cheaply cloned and shared across tasks, with a
/// `tokio::sync::RwLock` so readers never block each other.
#[derive(Clone, Default)]
pub struct ReadingCache {
    inner: Arc<RwLock<Option<EnergyReading>>>,
}

impl ReadingCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the cached reading.
    pub async fn update(&self, reading: EnergyReading) {
        *self.inner.write().await = Some(reading);
    }

    /// Return the most recent reading, if any tick has completed yet.
    pub async fn latest(&self) -> Option<EnergyReading> {
        self.inner.read().await.clone()
    }
}
