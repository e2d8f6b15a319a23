//! Append-only JSONL record of scans, one file per UTC day.

use std::fs::{create_dir_all, File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use chrono::{SecondsFormat, Utc};
use decision_engine::TickerResult;
use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use crate::scan::ScanReport;

pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn resolve_repo_root() -> Option<PathBuf> {
    let mut cursor = std::env::current_dir().ok()?;
    loop {
        if cursor.join(".git").is_dir() {
            return Some(cursor);
        }
        if !cursor.pop() {
            return None;
        }
    }
}

pub fn resolve_scans_dir() -> PathBuf {
    if let Ok(raw) = std::env::var("SCANS_DIR") {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
    }

    if let Some(root) = resolve_repo_root() {
        return root.join("SCANS").join("trade-guardian");
    }

    PathBuf::from("SCANS").join("trade-guardian")
}

pub struct ScanJournal {
    dir: PathBuf,
    /// Day key and handle of the file currently appended to.
    current: Option<(String, File)>,
}

impl ScanJournal {
    pub fn open(dir: PathBuf) -> std::io::Result<Self> {
        create_dir_all(&dir)?;
        let mut journal = Self { dir, current: None };
        journal.today_file()?;
        Ok(journal)
    }

    pub fn day_path(&self, day_key: &str) -> PathBuf {
        self.dir.join(format!("scans-{}.jsonl", day_key))
    }

    /// Handle for today's file, reopened when the UTC day changes.
    fn today_file(&mut self) -> std::io::Result<&mut File> {
        let today = Utc::now().format("%Y-%m-%d").to_string();
        let stale = self.current.as_ref().map_or(true, |(day, _)| *day != today);
        if stale {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(self.day_path(&today))?;
            self.current = Some((today, file));
        }
        match self.current.as_mut() {
            Some((_, file)) => Ok(file),
            None => Err(std::io::Error::other("journal file not open")),
        }
    }

    /// Write failures are logged and otherwise ignored.
    pub fn write_event(&mut self, event: serde_json::Value) {
        let line = match serde_json::to_string(&event) {
            Ok(line) => line,
            Err(e) => {
                warn!("Scan journal event not serializable: {}", e);
                return;
            }
        };
        let written = self
            .today_file()
            .and_then(|file| writeln!(file, "{}", line).and_then(|_| file.flush()));
        if let Err(e) = written {
            warn!("Scan journal write failed in {}: {}", self.dir.display(), e);
        }
    }

    pub fn scan_start(&mut self, scan_id: Uuid, tickers: &[String], config: &serde_json::Value) {
        self.write_event(json!({
            "event": "scan_start",
            "ts": now_iso(),
            "scan_id": scan_id,
            "tickers": tickers,
            "config": config,
        }));
    }

    pub fn ticker_result(&mut self, scan_id: Uuid, result: &TickerResult) {
        let result = serde_json::to_value(result).unwrap_or(serde_json::Value::Null);
        self.write_event(json!({
            "event": "ticker_result",
            "ts": now_iso(),
            "scan_id": scan_id,
            "result": result,
        }));
    }

    pub fn scan_summary(&mut self, report: &ScanReport) {
        let tags = report.tag_counts();
        self.write_event(json!({
            "event": "scan_summary",
            "ts": now_iso(),
            "scan_id": report.scan_id,
            "started_at": report.started_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            "tickers": report.results.len(),
            "tags": tags,
            "unavailable": report.unavailable,
            "invariant_violations": report.invariant_violations,
        }));
    }
}
