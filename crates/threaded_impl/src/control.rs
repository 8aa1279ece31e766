use std::io;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use motor_core::{Controller, CycleRecord, CycleRecorder, Encoder, MotorDriver};
use tracing::{debug, info, warn};

use crate::schedule::Ticker;

const SUMMARY_EVERY: u64 = 50;

/// Body of the control thread: one cycle per tick until `shutdown` is set.
pub fn run_control_thread<D: MotorDriver, E: Encoder>(
    controller: Controller<D, E>,
    recorder: Option<CycleRecorder>,
    shutdown_flag: Arc<AtomicBool>,
    start_time: Instant,
) {
    let period = controller.interval();
    let mut ticker = Ticker::new(start_time, period);
    let mut cycle_id = 0u64;

    info!(period_ms = period.as_millis() as u64, "control thread started");

    while !shutdown_flag.load(Ordering::Relaxed) {
        let tick = ticker.wait();
        if shutdown_flag.load(Ordering::Relaxed) {
            break;
        }

        if tick.missed > 0 {
            controller.record_late();
            warn!(
                cycle_id,
                missed = tick.missed,
                lateness_us = tick.lateness.as_micros() as u64,
                "control cycle late, resynchronised"
            );
        }

        // Failed cycles are counted and logged by the controller; the next
        // tick retries.
        if let Ok(report) = controller.run_cycle() {
            if let Some(rec) = &recorder {
                rec.record(CycleRecord::from_report(
                    cycle_id,
                    "threaded",
                    &report,
                    tick.lateness,
                    period,
                ));
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

    info!(cycles = cycle_id, "control thread stopped");
}

/// A [`Controller`] whose control cycle runs on its own thread.
///
/// Dereferences to the controller for the command surface. Dropping it
/// stops and joins the thread.
pub struct ThreadedController<D, E> {
    controller: Controller<D, E>,
    shutdown_flag: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl<D, E> ThreadedController<D, E>
where
    D: MotorDriver + 'static,
    E: Encoder + 'static,
{
    pub fn spawn(controller: Controller<D, E>) -> io::Result<Self> {
        Self::spawn_with_recorder(controller, None)
    }

    pub fn spawn_with_recorder(
        controller: Controller<D, E>,
        recorder: Option<CycleRecorder>,
    ) -> io::Result<Self> {
        let shutdown_flag = Arc::new(AtomicBool::new(false));
        let task_controller = controller.clone();
        let task_flag = shutdown_flag.clone();
        let start_time = Instant::now();

        let handle = thread::Builder::new()
            .name("motor-control".to_string())
            .spawn(move || run_control_thread(task_controller, recorder, task_flag, start_time))?;

        Ok(Self {
            controller,
            shutdown_flag,
            handle: Some(handle),
        })
    }

    pub fn controller(&self) -> &Controller<D, E> {
        &self.controller
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the control thread and wait for it.
    pub fn shutdown(mut self) {
        self.stop();
    }
}

impl<D, E> ThreadedController<D, E> {
    fn stop(&mut self) {
        self.shutdown_flag.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("control thread panicked");
            }
        }
    }
}

impl<D, E> Deref for ThreadedController<D, E> {
    type Target = Controller<D, E>;

    fn deref(&self) -> &Self::Target {
        &self.controller
    }
}

impl<D, E> Drop for ThreadedController<D, E> {
    fn drop(&mut self) {
        self.stop();
    }
}
