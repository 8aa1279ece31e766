use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use motor_core::{Controller, CycleRecord, CycleRecorder, Encoder, MotorDriver};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

const SUMMARY_EVERY: u64 = 50;

/// One cycle per interval tick until `shutdown` is set.
///
/// Ticks stay on the grid laid from `start_time`; an overrun skips to the
/// next grid point instead of bursting to catch up.
pub async fn run_control_task<D: MotorDriver, E: Encoder>(
    controller: Controller<D, E>,
    recorder: Option<CycleRecorder>,
    shutdown: Arc<AtomicBool>,
    start_time: Instant,
) {
    let period = controller.interval();
    let mut ticker = interval_at(start_time + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut cycle_id: u64 = 0;

    info!(period_ms = period.as_millis() as u64, "control task started");

    while !shutdown.load(Ordering::Relaxed) {
        let scheduled = ticker.tick().await;
        if shutdown.load(Ordering::Relaxed) {
            break;
        }

        let lateness = Instant::now().saturating_duration_since(scheduled);
        if lateness >= period {
            controller.record_late();
            warn!(
                cycle_id,
                lateness_us = lateness.as_micros() as u64,
                "control cycle late, resynchronised"
            );
        }

        if let Ok(report) = controller.run_cycle() {
            if let Some(rec) = &recorder {
                rec.record(CycleRecord::from_report(cycle_id, "async", &report, lateness, period));
            }
            if cycle_id % SUMMARY_EVERY == 0 {
                debug!(
                    cycle_id,
                    mode = ?report.output.mode,
                    count = report.count,
                    speed = report.output.measured_speed,
                    "control cycle"
                );
            }
        }

        cycle_id += 1;
    }

    info!(cycles = cycle_id, "control task stopped");
}

/// A [`Controller`] whose control cycle runs as a tokio task.
///
/// Must be spawned from within a runtime. Dropping it aborts the task;
/// [`AsyncController::shutdown`] stops it gracefully.
pub struct AsyncController<D, E> {
    controller: Controller<D, E>,
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl<D, E> AsyncController<D, E>
where
    D: MotorDriver + 'static,
    E: Encoder + 'static,
{
    pub fn spawn(controller: Controller<D, E>) -> Self {
        Self::spawn_with_recorder(controller, None)
    }

    pub fn spawn_with_recorder(controller: Controller<D, E>, recorder: Option<CycleRecorder>) -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));
        let handle = tokio::spawn(run_control_task(
            controller.clone(),
            recorder,
            shutdown.clone(),
            Instant::now(),
        ));
        Self {
            controller,
            shutdown,
            handle: Some(handle),
        }
    }

    pub fn controller(&self) -> &Controller<D, E> {
        &self.controller
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Let the current cycle finish, then stop the task.
    pub async fn shutdown(mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "control task ended abnormally");
            }
        }
    }
}

impl<D, E> Deref for AsyncController<D, E> {
    type Target = Controller<D, E>;

    fn deref(&self) -> &Self::Target {
        &self.controller
    }
}

impl<D, E> Drop for AsyncController<D, E> {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
