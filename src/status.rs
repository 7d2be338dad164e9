use crate::types::current_timestamp;
use crate::worker::{shutdown_requested, WorkerState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, RwLock};

/// Health counters for one endpoint.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct EndpointStatus {
    pub url: String,
    pub state: WorkerState,
    pub frames_ok: u64,
    pub frames_rejected: u64,
    pub frames_dropped_text: u64,
    pub reconnects: u64,
    pub fps: f64,
    pub last_frame_ts: Option<f64>,
}

impl EndpointStatus {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            state: WorkerState::Disconnected,
            frames_ok: 0,
            frames_rejected: 0,
            frames_dropped_text: 0,
            reconnects: 0,
            fps: 0.0,
            last_frame_ts: None,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct LiveStatus {
    pub timestamp: f64,
    pub started_at: String,
    pub uptime_seconds: u64,
    pub endpoints: BTreeMap<String, EndpointStatus>,
}

impl LiveStatus {
    pub fn save(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

/// Shared per-endpoint counters. Diagnostics only, never read back into CSV output.
#[derive(Clone)]
pub struct StatusBoard {
    started: Instant,
    started_at: DateTime<Utc>,
    endpoints: Arc<RwLock<BTreeMap<String, EndpointStatus>>>,
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusBoard {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            started_at: Utc::now(),
            endpoints: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    pub async fn register(&self, name: &str, url: &str) {
        self.endpoints
            .write()
            .await
            .entry(name.to_string())
            .or_insert_with(|| EndpointStatus::new(url));
    }

    /// Apply `f` to a registered endpoint. Unknown names are ignored.
    pub async fn update(&self, name: &str, f: impl FnOnce(&mut EndpointStatus)) {
        if let Some(status) = self.endpoints.write().await.get_mut(name) {
            f(status);
        }
    }

    pub async fn get(&self, name: &str) -> Option<EndpointStatus> {
        self.endpoints.read().await.get(name).cloned()
    }

    pub async fn snapshot(&self) -> LiveStatus {
        LiveStatus {
            timestamp: current_timestamp(),
            started_at: self.started_at.to_rfc3339(),
            uptime_seconds: self.started.elapsed().as_secs(),
            endpoints: self.endpoints.read().await.clone(),
        }
    }
}

/// Rewrite `path` with a fresh snapshot every `every` until shutdown.
pub async fn run_status_writer(
    board: StatusBoard,
    path: PathBuf,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(every);
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown_requested(&mut shutdown) => break,
        }
        let snapshot = board.snapshot().await;
        let target = path.clone();
        match tokio::task::spawn_blocking(move || snapshot.save(target)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => log::warn!("Failed to write {}: {}", path.display(), e),
            Err(e) => log::warn!("Status save task failed: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_update_registered_only() {
        let board = StatusBoard::new();
        board.register("cam3", "ws://10.0.0.3:85").await;

        board.update("cam3", |s| s.frames_ok += 2).await;
        board.update("ghost", |s| s.frames_ok += 1).await;

        let snap = board.snapshot().await;
        assert_eq!(snap.endpoints.len(), 1);
        assert_eq!(snap.endpoints["cam3"].frames_ok, 2);
        assert_eq!(snap.endpoints["cam3"].url, "ws://10.0.0.3:85");
    }

    #[tokio::test]
    async fn test_register_keeps_existing_counters() {
        let board = StatusBoard::new();
        board.register("main", "ws://a").await;
        board.update("main", |s| s.reconnects = 3).await;
        board.register("main", "ws://a").await;
        assert_eq!(board.get("main").await.unwrap().reconnects, 3);
    }

    #[tokio::test]
    async fn test_status_writer_saves_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("live_status.json");
        let board = StatusBoard::new();
        board.register("cam4", "ws://10.0.0.4:86").await;

        let (tx, rx) = watch::channel(false);
        let writer = tokio::spawn(run_status_writer(
            board.clone(),
            path.clone(),
            Duration::from_millis(10),
            rx,
        ));

        // First tick fires immediately
        for _ in 0..100 {
            if path.exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        tx.send(true).unwrap();
        writer.await.unwrap();

        let saved: LiveStatus =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved.endpoints["cam4"].state, WorkerState::Disconnected);
    }
}
