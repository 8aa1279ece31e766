use async_impl::AsyncController;
use criterion::{black_box, Criterion};
use motor_core::config::{ExperimentConfig, Scenario, SchedulerKind};
use motor_core::sim::{PlantModel, SimDriver, SimEncoder, SimulatedMotor};
use motor_core::{Controller, ControllerConfig, CycleRecord, CycleRecorder, DiagnosticsSnapshot};
use std::env;
use std::error::Error;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use threaded_impl::ThreadedController;
use tracing::info;
use tracing_subscriber::EnvFilter;

const MOTOR_RPM: f64 = 300.0;
const MOTOR_TIME_CONSTANT: f64 = 0.03;

fn analyze_results_detailed(results: &[CycleRecord], diagnostics: DiagnosticsSnapshot, name: &str) {
    if results.is_empty() {
        println!("{}: No results to analyze", name);
        return;
    }

    let total = results.len();
    let missed_deadlines = results.iter().filter(|r| !r.deadline_met).count();
    let deadline_rate = (1.0 - (missed_deadlines as f64 / total as f64)) * 100.0;

    let lock_waits: Vec<f64> = results
        .iter()
        .map(|r| r.lock_wait_ns as f64 / 1000.0) // Convert to μs
        .collect();

    let lateness_us: Vec<f64> = results
        .iter()
        .map(|r| r.lateness_ns as f64 / 1000.0)
        .collect();

    println!("\n=== {} Detailed Analysis ===", name);
    println!("Total cycles: {}", total);
    println!("Deadline compliance: {:.2}% ({} missed)", deadline_rate, missed_deadlines);
    println!(
        "Diagnostics: {} completed, {} skipped, {} late, {} driver failures",
        diagnostics.completed_cycles,
        diagnostics.skipped_cycles,
        diagnostics.late_cycles,
        diagnostics.driver_failures
    );

    let (avg, min, max) = summarize(&lock_waits);
    println!("Lock wait (μs): avg={:.2}, min={:.2}, max={:.2}", avg, min, max);

    let (avg, min, max) = summarize(&lateness_us);
    println!("Tick lateness (μs): avg={:.2}, min={:.2}, max={:.2}", avg, min, max);

    let brakes = results.iter().filter(|r| r.command == "brake").count();
    let drives = results.iter().filter(|r| r.command == "drive").count();
    println!("Commands: {} drive, {} brake", drives, brakes);

    if let Some(first_brake) = results.iter().find(|r| r.command == "brake") {
        println!(
            "Entered dead-band at cycle {} (count {})",
            first_brake.cycle_id, first_brake.count
        );
    }
    if let Some(last) = results.last() {
        println!(
            "Final: count={}, setpoint={:?}, speed={:.3} turns/s",
            last.count, last.setpoint, last.measured_speed
        );
    }
}

fn summarize(values: &[f64]) -> (f64, f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0, 0.0);
    }
    let avg = values.iter().sum::<f64>() / values.len() as f64;
    let min = values.iter().fold(f64::INFINITY, |a, &b| a.min(b));
    let max = values.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
    (avg, min, max)
}

fn simulated_board(
    config: &ControllerConfig,
) -> Result<(Controller<SimDriver, SimEncoder>, SimulatedMotor), Box<dyn Error>> {
    let model = PlantModel::from_rpm(MOTOR_RPM, config.scale().counts_per_turn(), MOTOR_TIME_CONSTANT);
    let motor = SimulatedMotor::realtime(model);
    let controller = Controller::new(motor.driver(), motor.encoder(), config)?;
    Ok((controller, motor))
}

fn apply_scenario(controller: &Controller<SimDriver, SimEncoder>, config: &ExperimentConfig) {
    match config.scenario {
        Scenario::Position => controller.rotate(config.target),
        Scenario::Speed => controller.set_speed(config.target),
    }
}

/// Busy threads competing with the control task for CPU time.
fn spawn_cpu_load(threads: usize, stop: Arc<AtomicBool>) -> Vec<thread::JoinHandle<()>> {
    (0..threads)
        .map(|_| {
            let stop = stop.clone();
            thread::spawn(move || {
                let mut x = 0u64;
                while !stop.load(Ordering::Relaxed) {
                    x = black_box(x.wrapping_mul(6364136223846793005).wrapping_add(1));
                }
            })
        })
        .collect()
}

fn run_threaded(config: &ExperimentConfig) -> Result<(CycleRecorder, DiagnosticsSnapshot), Box<dyn Error>> {
    let recorder = CycleRecorder::new();
    let (controller, _motor) = simulated_board(&config.controller)?;
    let task = ThreadedController::spawn_with_recorder(controller, Some(recorder.clone()))?;
    apply_scenario(&task, config);
    thread::sleep(Duration::from_secs(config.duration_secs));
    let diagnostics = task.diagnostics();
    task.shutdown();
    Ok((recorder, diagnostics))
}

fn run_async(config: &ExperimentConfig) -> Result<(CycleRecorder, DiagnosticsSnapshot), Box<dyn Error>> {
    let recorder = CycleRecorder::new();
    let rt = tokio::runtime::Runtime::new()?;
    let diagnostics = rt.block_on(async {
        let (controller, _motor) = simulated_board(&config.controller)?;
        let task = AsyncController::spawn_with_recorder(controller, Some(recorder.clone()));
        apply_scenario(&task, config);
        tokio::time::sleep(Duration::from_secs(config.duration_secs)).await;
        let diagnostics = task.diagnostics();
        task.shutdown().await;
        Ok::<_, Box<dyn Error>>(diagnostics)
    })?;
    Ok((recorder, diagnostics))
}

fn benchmark_control_cycle(c: &mut Criterion, config: &ControllerConfig) {
    let motor = SimulatedMotor::new(PlantModel::from_rpm(MOTOR_RPM, config.scale().counts_per_turn(), 0.0));
    let controller = match Controller::new(motor.driver(), motor.encoder(), config) {
        Ok(controller) => controller,
        Err(e) => {
            eprintln!("Invalid controller config: {}", e);
            return;
        }
    };

    controller.rotate(1_000.0);
    c.bench_function("control_cycle_position", |b| {
        b.iter(|| {
            motor.advance(controller.interval());
            black_box(controller.run_cycle().ok());
        });
    });

    controller.set_speed(2.0);
    c.bench_function("control_cycle_speed", |b| {
        b.iter(|| {
            motor.advance(controller.interval());
            black_box(controller.run_cycle().ok());
        });
    });

    c.bench_function("rotate_command", |b| {
        b.iter(|| controller.rotate(black_box(0.001)));
    });

    c.bench_function("get_speed", |b| {
        b.iter(|| black_box(controller.get_speed()));
    });
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: benchmark_runner <config_file> [threaded|async|both] [--criterion]");
        eprintln!("Example: benchmark_runner configs/experiment_baseline.toml both");
        eprintln!("Example: benchmark_runner configs/experiment_baseline.toml both --criterion");
        std::process::exit(1);
    }

    let config_path = &args[1];
    let use_criterion = args.contains(&"--criterion".to_string());

    let mut config = match ExperimentConfig::from_file(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config {}: {}", config_path, e);
            std::process::exit(1);
        }
    };
    match args.get(2).map(|s| s.as_str()) {
        Some("threaded") => config.scheduler = SchedulerKind::Threaded,
        Some("async") => config.scheduler = SchedulerKind::Async,
        Some("both") => config.scheduler = SchedulerKind::Both,
        _ => {}
    }
    if let Err(e) = config.controller.validate() {
        eprintln!("Invalid controller config: {}", e);
        std::process::exit(1);
    }

    println!("========================================");
    println!("Gear-Motor Control Loop Benchmark");
    println!("========================================");
    println!("Config: {}", config_path);
    println!("Experiment: {}", config.experiment_name);
    println!("Duration: {} seconds", config.duration_secs);
    println!("Control interval: {} ms", config.controller.interval_ms);
    println!("Scenario: {:?} (target {})", config.scenario, config.target);
    println!("Scheduler: {:?}", config.scheduler);
    println!("CPU load threads: {}", config.cpu_load_threads);
    if use_criterion {
        println!("Using Criterion for statistical analysis");
    }
    println!("========================================\n");

    if use_criterion {
        let mut criterion = Criterion::default()
            .sample_size(50)
            .measurement_time(Duration::from_secs(5));
        benchmark_control_cycle(&mut criterion, &config.controller);

        println!("\n========================================");
        println!("Criterion statistical analysis complete!");
        println!("Check the target/criterion directory for detailed HTML reports.");
        println!("========================================");
        return;
    }

    let stop_load = Arc::new(AtomicBool::new(false));
    let load = spawn_cpu_load(config.cpu_load_threads, stop_load.clone());
    info!(threads = load.len(), "cpu load started");

    let mut runs: Vec<(&str, fn(&ExperimentConfig) -> Result<(CycleRecorder, DiagnosticsSnapshot), Box<dyn Error>>)> =
        Vec::new();
    if matches!(config.scheduler, SchedulerKind::Threaded | SchedulerKind::Both) {
        runs.push(("threaded", run_threaded));
    }
    if matches!(config.scheduler, SchedulerKind::Async | SchedulerKind::Both) {
        runs.push(("async", run_async));
    }

    for (name, run) in runs {
        println!("Running {} control task...", name.to_uppercase());
        let start = Instant::now();
        match run(&config) {
            Ok((recorder, diagnostics)) => {
                println!("{} run completed in {:.2} seconds", name, start.elapsed().as_secs_f64());
                analyze_results_detailed(&recorder.get_results(), diagnostics, &name.to_uppercase());

                let filename = format!("{}_{}.csv", config.output_prefix, name);
                match recorder.save_to_csv(&filename) {
                    Ok(rows) => println!("Saved {} records to {}", rows, filename),
                    Err(e) => eprintln!("Failed to save {}: {}", filename, e),
                }
            }
            Err(e) => eprintln!("{} run failed: {}", name, e),
        }
        println!();
    }

    stop_load.store(true, Ordering::Relaxed);
    for handle in load {
        let _ = handle.join();
    }

    println!("========================================");
    println!("Benchmark complete!");
    println!("========================================");
}
