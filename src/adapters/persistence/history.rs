//! History Logger - Append-only JSONL Simulation Records
//!
//! Persists round and settlement records to JSONL files under a per-run
//! directory named `<maker-kind>-<UTC timestamp>`. Each line is a
//! self-contained JSON object for easy parsing and streaming analysis.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use tracing::info;

use crate::domain::maker::MakerKind;
use crate::ports::history::{HistorySink, RoundRecord, SettlementRecord};

/// Append-only JSONL history logger with one directory per run.
///
/// Two files are produced:
/// - `rounds.jsonl` — one record per trading round
/// - `settlements.jsonl` — one record per market close
pub struct JsonlHistory {
    rounds_path: PathBuf,
    settlements_path: PathBuf,
}

impl JsonlHistory {
    /// Create a history logger rooted at `out_dir`, with a fresh run
    /// directory named after the maker kind and the current UTC time.
    pub fn new(out_dir: &str, kind: MakerKind) -> Result<Self> {
        let stamp = Utc::now().format("%Y%m%dT%H%M%SZ");
        let run_dir = Path::new(out_dir).join(format!("{kind}-{stamp}"));

        fs::create_dir_all(&run_dir)
            .with_context(|| format!("Failed to create run directory {}", run_dir.display()))?;

        info!(dir = %run_dir.display(), "History directory created");

        Ok(Self {
            rounds_path: run_dir.join("rounds.jsonl"),
            settlements_path: run_dir.join("settlements.jsonl"),
        })
    }

    fn append_line<T: Serialize>(path: &Path, record: &T) -> Result<()> {
        let mut json =
            serde_json::to_string(record).context("Failed to serialize history record")?;
        json.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open history file {}", path.display()))?;

        file.write_all(json.as_bytes())
            .with_context(|| format!("Failed to write history record to {}", path.display()))?;

        Ok(())
    }

    /// Check that the run directory is writable.
    pub fn is_healthy(&self) -> bool {
        let parent = match self.rounds_path.parent() {
            Some(dir) => dir,
            None => return false,
        };
        let probe = parent.join(".health_check");
        let result = File::create(&probe).and_then(|mut f| f.write_all(b"ok"));
        let _ = fs::remove_file(&probe);
        result.is_ok()
    }
}

impl HistorySink for JsonlHistory {
    fn record_round(&mut self, record: &RoundRecord) -> Result<()> {
        Self::append_line(&self.rounds_path, record)
    }

    fn record_settlement(&mut self, record: &SettlementRecord) -> Result<()> {
        Self::append_line(&self.settlements_path, record)
    }
}
