// src/data.rs - Per-tick session log with CSV export
use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use csv::Writer;
use serde::Serialize;

use crate::controller::{TickKind, TickReport};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickRecord {
    pub tick: u64,
    pub kind: TickKind,
    pub frame_id: i64,
    pub timestamp: f64,
    pub created: usize,
    pub updated: usize,
    pub destroyed: usize,
    pub skipped: usize,
    pub live_actors: usize,
    pub created_ids: String,
    pub destroyed_ids: String,
}

impl TickRecord {
    fn from_report(tick: u64, report: &TickReport) -> Self {
        let join = |ids: &[i32]| {
            ids.iter()
                .map(|id| id.to_string())
                .collect::<Vec<_>>()
                .join(";")
        };
        Self {
            tick,
            kind: report.kind,
            frame_id: report.frame_id,
            timestamp: report.timestamp,
            created: report.summary.created.len(),
            updated: report.summary.updated.len(),
            destroyed: report.summary.destroyed.len(),
            skipped: report.summary.skipped.len(),
            live_actors: report.live_actors,
            created_ids: join(report.summary.created.as_slice()),
            destroyed_ids: join(report.summary.destroyed.as_slice()),
        }
    }
}

/// Totals over a whole session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionTotals {
    pub graphics_ticks: usize,
    pub physics_ticks: usize,
    pub created: usize,
    pub destroyed: usize,
    pub peak_live_actors: usize,
}

pub struct SessionRecorder {
    output_dir: PathBuf,
    session_name: String,
    records: Vec<TickRecord>,
    next_tick: u64,
}

impl SessionRecorder {
    pub fn new(output_dir: impl AsRef<Path>, session_name: Option<String>) -> Self {
        let session_name = session_name.unwrap_or_else(|| {
            format!("session_{}", Local::now().format("%Y%m%d_%H%M%S"))
        });

        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            session_name,
            records: Vec::new(),
            next_tick: 0,
        }
    }

    pub fn session_name(&self) -> &str {
        &self.session_name
    }

    pub fn record(&mut self, report: &TickReport) {
        self.records.push(TickRecord::from_report(self.next_tick, report));
        self.next_tick += 1;
    }

    pub fn records(&self) -> &[TickRecord] {
        &self.records
    }

    pub fn totals(&self) -> SessionTotals {
        self.records.iter().fold(SessionTotals::default(), |mut totals, r| {
            match r.kind {
                TickKind::Graphics => totals.graphics_ticks += 1,
                TickKind::Physics => totals.physics_ticks += 1,
            }
            totals.created += r.created;
            totals.destroyed += r.destroyed;
            totals.peak_live_actors = totals.peak_live_actors.max(r.live_actors);
            totals
        })
    }

    pub fn export_csv(&self) -> Result<PathBuf> {
        let csv_path = self
            .output_dir
            .join(&self.session_name)
            .join("reconcile_log.csv");

        // Create directory if it doesn't exist
        if let Some(parent) = csv_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }

        let file = File::create(&csv_path)
            .with_context(|| format!("creating {}", csv_path.display()))?;
        let mut writer = Writer::from_writer(file);
        for record in &self.records {
            writer.serialize(record)?;
        }
        writer.flush()?;

        tracing::info!("wrote {} tick records to {}", self.records.len(), csv_path.display());
        Ok(csv_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::ReconcileSummary;
    use tempfile::TempDir;

    fn report(kind: TickKind, created: Vec<i32>, destroyed: Vec<i32>, live: usize) -> TickReport {
        TickReport {
            kind,
            frame_id: 3,
            timestamp: 0.05,
            summary: ReconcileSummary {
                created,
                destroyed,
                ..ReconcileSummary::default()
            },
            live_actors: live,
        }
    }

    #[test]
    fn totals_split_by_tick_kind() {
        let mut recorder = SessionRecorder::new("unused", Some("s".into()));
        recorder.record(&report(TickKind::Graphics, vec![1, 2], vec![], 2));
        recorder.record(&report(TickKind::Physics, vec![1], vec![], 1));
        recorder.record(&report(TickKind::Graphics, vec![], vec![2], 1));

        let totals = recorder.totals();
        assert_eq!(totals.graphics_ticks, 2);
        assert_eq!(totals.physics_ticks, 1);
        assert_eq!(totals.created, 3);
        assert_eq!(totals.destroyed, 1);
        assert_eq!(totals.peak_live_actors, 2);
        assert_eq!(recorder.records()[2].tick, 2);
    }

    #[test]
    fn export_writes_header_and_rows() {
        let dir = TempDir::new().unwrap();
        let mut recorder = SessionRecorder::new(dir.path(), Some("demo".into()));
        recorder.record(&report(TickKind::Graphics, vec![4, 7], vec![], 2));
        recorder.record(&report(TickKind::Physics, vec![], vec![4], 1));

        let path = recorder.export_csv().unwrap();

        assert_eq!(path, dir.path().join("demo").join("reconcile_log.csv"));
        let contents = std::fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("tick,kind,frame_id"));
        assert!(lines[1].contains("Graphics"));
        assert!(lines[1].ends_with("4;7,"));
        assert!(lines[2].ends_with(",4"));
    }

    #[test]
    fn default_session_name_is_timestamped() {
        let recorder = SessionRecorder::new("out", None);
        assert!(recorder.session_name().starts_with("session_"));
        assert_eq!(recorder.session_name().len(), "session_YYYYmmdd_HHMMSS".len());
    }
}
