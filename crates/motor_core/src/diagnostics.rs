use std::sync::atomic::{AtomicU64, Ordering};

/// Counters readable without the controller lock.
#[derive(Debug, Default)]
pub struct SharedDiagnostics {
    pub completed_cycles: AtomicU64,
    pub skipped_cycles: AtomicU64,
    pub late_cycles: AtomicU64,
    pub driver_failures: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiagnosticsSnapshot {
    pub completed_cycles: u64,
    pub skipped_cycles: u64,
    pub late_cycles: u64,
    pub driver_failures: u64,
}

impl SharedDiagnostics {
    pub fn record_completed(&self) {
        self.completed_cycles.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.skipped_cycles.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_late(&self) {
        self.late_cycles.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_driver_failure(&self) {
        self.driver_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            completed_cycles: self.completed_cycles.load(Ordering::Relaxed),
            skipped_cycles: self.skipped_cycles.load(Ordering::Relaxed),
            late_cycles: self.late_cycles.load(Ordering::Relaxed),
            driver_failures: self.driver_failures.load(Ordering::Relaxed),
        }
    }
}
