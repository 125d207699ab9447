use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs::{self, OpenOptions};
use std::io::{self, ErrorKind, Write as _};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use multipad_core::{EditorEvent, Observer, ObserverError};

/// One structured record of the durable audit trail.
/// 稽核軌跡中的一筆結構化紀錄。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub at_unix: i64,
    pub path: PathBuf,
    pub op: String,
}

/// Errors raised while reading the audit trail back.
/// 讀回稽核軌跡時可能出現的錯誤。
#[derive(Debug, Error)]
pub enum TrailError {
    #[error("audit trail IO error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid audit record: {0}")]
    InvalidRecord(#[from] serde_json::Error),
}

/// Durable audit trail: appends one JSON record per event.
/// 持久稽核軌跡：每個事件附加一筆 JSON 紀錄。
///
/// 停用期間事件直接丟棄，不會排隊補送。 / Events are simply dropped while
/// disabled, never queued for later delivery.
#[derive(Debug)]
pub struct LogObserver {
    trail_path: PathBuf,
    enabled: bool,
}

impl LogObserver {
    pub fn new(trail_path: impl AsRef<Path>) -> Self {
        Self {
            trail_path: trail_path.as_ref().to_path_buf(),
            enabled: true,
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Replays the recorded trail. A missing trail file yields an empty list.
    /// 重播已記錄的軌跡；軌跡檔不存在時回傳空清單。
    pub fn show(&self) -> Result<Vec<AuditRecord>, TrailError> {
        let contents = match fs::read_to_string(&self.trail_path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(TrailError::Io(err)),
        };
        let mut records = Vec::new();
        for line in contents.lines().filter(|line| !line.trim().is_empty()) {
            records.push(serde_json::from_str(line)?);
        }
        Ok(records)
    }

    fn append(&self, record: &AuditRecord) -> Result<(), ObserverError> {
        if let Some(parent) = self.trail_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string(record)
            .map_err(|err| ObserverError::Other(err.to_string()))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.trail_path)?;
        writeln!(file, "{json}")?;
        Ok(())
    }
}

impl Observer for LogObserver {
    fn name(&self) -> &str {
        "audit-log"
    }

    fn on_event(&mut self, event: &EditorEvent) -> Result<(), ObserverError> {
        if !self.enabled {
            return Ok(());
        }
        self.append(&AuditRecord {
            at_unix: event.at_unix,
            path: event.path.clone(),
            op: event.op.to_string(),
        })
    }
}

/// Aggregates per-operation counts and session timing.
/// 彙整每種操作的次數與工作階段時間。
#[derive(Debug)]
pub struct StatisticsObserver {
    session_start: Instant,
    started_at_unix: i64,
    counts: BTreeMap<String, u64>,
    total_events: u64,
    accumulated: Duration,
}

impl StatisticsObserver {
    /// 以明確的起始時刻建構，不依賴任何全域狀態。 / Constructed with an explicit session start; no ambient globals.
    pub fn new() -> Self {
        Self {
            session_start: Instant::now(),
            started_at_unix: current_timestamp(),
            counts: BTreeMap::new(),
            total_events: 0,
            accumulated: Duration::ZERO,
        }
    }

    pub fn total_events(&self) -> u64 {
        self.total_events
    }

    pub fn count_of(&self, op: &str) -> u64 {
        self.counts.get(op).copied().unwrap_or(0)
    }

    /// Renders a formatted usage summary.
    /// 輸出格式化的使用統計摘要。
    pub fn summary(&self) -> String {
        let elapsed = self.session_start.elapsed();
        let mut out = String::new();
        let _ = writeln!(
            out,
            "session started at unix {}, up {}s, {} events",
            self.started_at_unix,
            elapsed.as_secs(),
            self.total_events
        );
        let _ = writeln!(
            out,
            "accumulated event latency since session start: {}s",
            self.accumulated.as_secs()
        );
        for (op, count) in &self.counts {
            let _ = writeln!(out, "  {op:<8} {count}");
        }
        out
    }
}

impl Default for StatisticsObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl Observer for StatisticsObserver {
    fn name(&self) -> &str {
        "statistics"
    }

    fn on_event(&mut self, event: &EditorEvent) -> Result<(), ObserverError> {
        self.total_events += 1;
        self.accumulated += self.session_start.elapsed();
        *self.counts.entry(event.op.to_string()).or_insert(0) += 1;
        Ok(())
    }
}

fn current_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}
