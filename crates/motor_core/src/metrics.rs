use parking_lot::Mutex;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::controller::CycleReport;
use crate::state::{DriveCommand, ModeKind};

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct CycleRecord {
    pub cycle_id: u64,
    pub scheduler: &'static str,
    pub mode: ModeKind,
    pub count: i64,
    pub setpoint: Option<f64>,
    /// `drive`, `brake` or `none`.
    pub command: &'static str,
    pub output: Option<f64>,
    /// Turns per second.
    pub measured_speed: f64,
    pub lock_wait_ns: u64,
    pub lateness_ns: i64,
    pub deadline_met: bool,
}

impl CycleRecord {
    /// Row for a completed cycle that started `lateness` after its tick.
    pub fn from_report(
        cycle_id: u64,
        scheduler: &'static str,
        report: &CycleReport,
        lateness: Duration,
        period: Duration,
    ) -> Self {
        Self {
            cycle_id,
            scheduler,
            mode: report.output.mode,
            count: report.count,
            setpoint: report.output.setpoint,
            command: Self::command_label(report.output.command),
            output: report.output.pid_output,
            measured_speed: report.output.measured_speed,
            lock_wait_ns: report.lock_wait.as_nanos() as u64,
            lateness_ns: lateness.as_nanos() as i64,
            deadline_met: lateness < period,
        }
    }

    pub fn command_label(command: Option<DriveCommand>) -> &'static str {
        match command {
            Some(DriveCommand::Drive(_)) => "drive",
            Some(DriveCommand::Brake) => "brake",
            None => "none",
        }
    }
}

/// Cheap to clone; clones share the same rows.
#[derive(Clone, Default)]
pub struct CycleRecorder {
    results: Arc<Mutex<Vec<CycleRecord>>>,
}

impl CycleRecorder {
    pub fn new() -> Self {
        Self {
            results: Arc::new(Mutex::new(Vec::with_capacity(10_000))),
        }
    }

    pub fn record(&self, record: CycleRecord) {
        self.results.lock().push(record);
    }

    pub fn len(&self) -> usize {
        self.results.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get_results(&self) -> Vec<CycleRecord> {
        self.results.lock().clone()
    }

    pub fn save_to_csv(&self, path: impl AsRef<Path>) -> Result<usize, csv::Error> {
        let data = self.results.lock();
        let mut wtr = csv::Writer::from_path(path.as_ref())?;
        for record in data.iter() {
            wtr.serialize(record)?;
        }
        wtr.flush()?;
        tracing::info!(rows = data.len(), path = %path.as_ref().display(), "saved cycle records");
        Ok(data.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(cycle_id: u64) -> CycleRecord {
        CycleRecord {
            cycle_id,
            scheduler: "manual",
            mode: ModeKind::Position,
            count: 100,
            setpoint: Some(812.0),
            command: CycleRecord::command_label(Some(DriveCommand::Drive(0.5))),
            output: Some(0.5),
            measured_speed: 1.25,
            lock_wait_ns: 10,
            lateness_ns: 0,
            deadline_met: true,
        }
    }

    #[test]
    fn clones_share_rows() {
        let recorder = CycleRecorder::new();
        let other = recorder.clone();
        recorder.record(record(1));
        other.record(record(2));
        assert_eq!(recorder.len(), 2);
        assert_eq!(other.get_results()[1].cycle_id, 2);
    }

    #[test]
    fn writes_csv_with_header() {
        let recorder = CycleRecorder::new();
        recorder.record(record(7));
        let path = std::env::temp_dir().join(format!("motor_core_cycles_{}.csv", std::process::id()));
        assert_eq!(recorder.save_to_csv(&path).unwrap(), 1);

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert!(lines.next().unwrap().starts_with("cycle_id,scheduler,mode,count"));
        assert!(lines.next().unwrap().starts_with("7,manual,Position,100,812.0,drive"));
        let _ = std::fs::remove_file(&path);
    }
}
