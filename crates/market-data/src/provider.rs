use std::future::Future;
use std::path::{Path, PathBuf};

use chrono::{Duration, Utc};
use common::{Error, MarketSnapshot, Result};
use tracing::debug;

use crate::universe::normalize_symbol;

/// Source of per-ticker market snapshots.
///
/// Implementations own any retry or backoff; the scan only applies a
/// timeout around each call.
pub trait SnapshotProvider: Send + Sync + 'static {
    fn fetch(&self, symbol: &str) -> impl Future<Output = Result<MarketSnapshot>> + Send;
}

/// Reads `<dir>/<SYMBOL>.json` snapshots written by an external collector.
#[derive(Debug, Clone)]
pub struct FileSnapshotProvider {
    dir: PathBuf,
    max_age: Option<Duration>,
}

impl FileSnapshotProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            max_age: None,
        }
    }

    /// Reject snapshots older than `secs`. Zero disables the check.
    pub fn with_max_age_secs(mut self, secs: u64) -> Self {
        self.max_age = (secs > 0).then(|| Duration::seconds(secs as i64));
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("{}.json", symbol))
    }

    fn check(&self, symbol: &str, snapshot: &MarketSnapshot) -> Result<()> {
        if !snapshot.symbol.eq_ignore_ascii_case(symbol) {
            return Err(Error::unavailable(
                symbol,
                format!("snapshot file holds {}", snapshot.symbol),
            ));
        }
        if snapshot.term.is_empty() {
            return Err(Error::unavailable(symbol, "snapshot has no term structure"));
        }
        if let Some(max_age) = self.max_age {
            let age = Utc::now() - snapshot.as_of;
            if age > max_age {
                return Err(Error::unavailable(
                    symbol,
                    format!(
                        "stale snapshot from {} ({}s old, limit {}s)",
                        snapshot.as_of,
                        age.num_seconds(),
                        max_age.num_seconds()
                    ),
                ));
            }
        }
        Ok(())
    }
}

impl SnapshotProvider for FileSnapshotProvider {
    async fn fetch(&self, symbol: &str) -> Result<MarketSnapshot> {
        let symbol = normalize_symbol(symbol)
            .ok_or_else(|| Error::unavailable(symbol, "invalid ticker symbol"))?;
        let path = self.path_for(&symbol);

        let raw = tokio::fs::read_to_string(&path).await.map_err(|e| {
            Error::unavailable(&symbol, format!("cannot read {}: {}", path.display(), e))
        })?;
        let mut snapshot: MarketSnapshot = serde_json::from_str(&raw)
            .map_err(|e| Error::unavailable(&symbol, format!("malformed snapshot: {}", e)))?;

        self.check(&symbol, &snapshot)?;
        snapshot.symbol = symbol;
        debug!(
            "loaded {} snapshot: {} expiries, {} quotes",
            snapshot.symbol,
            snapshot.term.len(),
            snapshot.chain.len()
        );
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::testing::contango_snapshot;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("tg-snapshots-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write(dir: &Path, name: &str, snapshot: &MarketSnapshot) {
        let raw = serde_json::to_string(snapshot).unwrap();
        std::fs::write(dir.join(format!("{}.json", name)), raw).unwrap();
    }

    #[tokio::test]
    async fn test_fetch_reads_symbol_file() {
        let dir = temp_dir();
        write(&dir, "IWM", &contango_snapshot("IWM"));
        let provider = FileSnapshotProvider::new(&dir);
        let snap = provider.fetch(" iwm ").await.unwrap();
        assert_eq!(snap.symbol, "IWM");
        assert_eq!(snap.term.len(), 6);
        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn test_missing_file_is_unavailable() {
        let dir = temp_dir();
        let provider = FileSnapshotProvider::new(&dir);
        let err = provider.fetch("QQQ").await.unwrap_err();
        assert!(matches!(err, Error::DataUnavailable { ref symbol, .. } if symbol == "QQQ"));
        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn test_stale_snapshot_is_unavailable() {
        let dir = temp_dir();
        write(&dir, "IWM", &contango_snapshot("IWM"));
        let provider = FileSnapshotProvider::new(&dir).with_max_age_secs(60);
        let err = provider.fetch("IWM").await.unwrap_err();
        assert!(err.to_string().contains("stale snapshot"));
        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn test_mismatched_symbol_is_unavailable() {
        let dir = temp_dir();
        write(&dir, "SPY", &contango_snapshot("IWM"));
        let provider = FileSnapshotProvider::new(&dir);
        assert!(provider.fetch("SPY").await.is_err());
        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn test_symbol_cannot_leave_snapshot_dir() {
        let root = temp_dir();
        let inner = root.join("snapshots");
        std::fs::create_dir_all(&inner).unwrap();
        write(&root, "IWM", &contango_snapshot("IWM"));
        let provider = FileSnapshotProvider::new(&inner);
        let err = provider.fetch("../IWM").await.unwrap_err();
        assert!(err.to_string().contains("invalid ticker symbol"));
        std::fs::remove_dir_all(root).ok();
    }

    #[tokio::test]
    async fn test_malformed_json_is_unavailable() {
        let dir = temp_dir();
        std::fs::write(dir.join("TSLA.json"), "{not json").unwrap();
        let provider = FileSnapshotProvider::new(&dir);
        let err = provider.fetch("TSLA").await.unwrap_err();
        assert!(err.to_string().contains("malformed snapshot"));
        std::fs::remove_dir_all(dir).ok();
    }
}
