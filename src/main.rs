mod menu;

use std::error::Error;
use std::thread;
use std::time::{Duration, Instant};

use async_impl::AsyncController;
use motor_core::sim::{PlantModel, SimDriver, SimEncoder, SimulatedMotor};
use motor_core::{Controller, ControllerConfig, CycleRecord, CycleRecorder};
use threaded_impl::ThreadedController;
use tracing::warn;
use tracing_subscriber::EnvFilter;

const CONFIG_PATH: &str = "configs/gearmotor.toml";
const MOTOR_RPM: f64 = 300.0;
const MOTOR_TIME_CONSTANT: f64 = 0.03;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("===========================================");
    println!("Welcome to the Gear-Motor Controller Demo");
    println!("===========================================");

    loop {
        menu::show_menu();

        let outcome = match menu::get_user_choice() {
            Ok(1) => run_position_demo(),
            Ok(2) => run_speed_demo(),
            Ok(3) => run_scheduler_comparison(),
            Ok(4) => {
                println!("Goodbye!");
                break;
            }
            _ => {
                println!("Invalid choice. Please select 1-4.");
                continue;
            }
        };

        if let Err(e) = outcome {
            println!("Demo failed: {e}");
        }
        menu::wait_for_enter();
    }
}

fn load_controller_config() -> ControllerConfig {
    match ControllerConfig::from_file(CONFIG_PATH) {
        Ok(config) => config,
        Err(e) => {
            warn!(path = CONFIG_PATH, error = %e, "using built-in controller defaults");
            ControllerConfig::default()
                .with_position_pid(motor_core::PidGains::new(0.005, 0.0, 0.0))
                .with_speed_pid(motor_core::PidGains::new(0.01, 0.2, 0.0))
        }
    }
}

fn simulated_board(
    config: &ControllerConfig,
) -> Result<(Controller<SimDriver, SimEncoder>, SimulatedMotor), Box<dyn Error>> {
    let model = PlantModel::from_rpm(MOTOR_RPM, config.scale().counts_per_turn(), MOTOR_TIME_CONSTANT);
    let motor = SimulatedMotor::realtime(model);
    let controller = Controller::new(motor.driver(), motor.encoder(), config)?;
    Ok((controller, motor))
}

/// Two boards taking turns: one rotates +1/4, the other -1/4.
fn run_position_demo() -> Result<(), Box<dyn Error>> {
    println!("\n=== Set-Position Demo (threaded) ===");
    let config = load_controller_config();
    println!(
        "Configuration: {} counts/turn, {} ms interval, dead-band {} counts",
        config.scale().counts_per_turn(),
        config.interval_ms,
        config.deadband_counts
    );

    let (ctl1, _motor1) = simulated_board(&config)?;
    let (ctl2, _motor2) = simulated_board(&config)?;
    let board1 = ThreadedController::spawn(ctl1)?;
    let board2 = ThreadedController::spawn(ctl2)?;

    println!("{:>10}\t{:>10}", "board1", "board2");
    let mut turn_board1 = true;
    for _ in 0..8 {
        for _ in 0..50 {
            println!("{:>10.3}\t{:>10.3}", board1.get_position(), board2.get_position());
            thread::sleep(Duration::from_millis(10));
        }
        if turn_board1 {
            board1.rotate(0.25);
        } else {
            board2.rotate(-0.25);
        }
        turn_board1 = !turn_board1;
    }

    println!("Final positions: board1 {:.3} turns, board2 {:.3} turns", board1.get_position(), board2.get_position());
    print_diagnostics("board1", board1.controller());
    print_diagnostics("board2", board2.controller());
    Ok(())
}

/// Two boards spinning in opposite directions.
fn run_speed_demo() -> Result<(), Box<dyn Error>> {
    println!("\n=== Set-Speed Demo (async) ===");
    let config = load_controller_config();
    let rt = tokio::runtime::Runtime::new()?;

    rt.block_on(async {
        let (ctl1, _motor1) = simulated_board(&config)?;
        let (ctl2, _motor2) = simulated_board(&config)?;
        let board1 = AsyncController::spawn(ctl1);
        let board2 = AsyncController::spawn(ctl2);

        board1.set_speed(2.0);
        board2.set_speed(-2.0);

        println!("{:>10}\t{:>10}", "board1", "board2");
        for _ in 0..300 {
            println!("{:>10.3}\t{:>10.3}", board1.get_speed(), board2.get_speed());
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        board1.brake();
        board2.brake();
        print_diagnostics("board1", board1.controller());
        print_diagnostics("board2", board2.controller());
        board1.shutdown().await;
        board2.shutdown().await;
        Ok::<(), Box<dyn Error>>(())
    })
}

fn run_scheduler_comparison() -> Result<(), Box<dyn Error>> {
    println!("\n=== Scheduler Comparison (threaded vs async) ===");
    let config = load_controller_config();
    let duration = Duration::from_secs(3);

    println!("\n--- Running THREADED control task ---");
    let recorder = CycleRecorder::new();
    let (ctl, _motor) = simulated_board(&config)?;
    let task = ThreadedController::spawn_with_recorder(ctl, Some(recorder.clone()))?;
    task.rotate(2.0);
    let started = Instant::now();
    thread::sleep(duration);
    task.shutdown();
    println!("Ran for {:.2}s", started.elapsed().as_secs_f64());
    let threaded = recorder.get_results();
    display_results(&threaded);

    println!("\n--- Running ASYNC control task ---");
    let recorder = CycleRecorder::new();
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let (ctl, _motor) = simulated_board(&config)?;
        let task = AsyncController::spawn_with_recorder(ctl, Some(recorder.clone()));
        task.rotate(2.0);
        tokio::time::sleep(duration).await;
        task.shutdown().await;
        Ok::<(), Box<dyn Error>>(())
    })?;
    let asynchronous = recorder.get_results();
    display_results(&asynchronous);

    println!("\n=== Comparison Summary ===");
    println!("- Threaded compliance: {:.1}%", compliance(&threaded));
    println!("- Async compliance: {:.1}%", compliance(&asynchronous));
    Ok(())
}

fn compliance(results: &[CycleRecord]) -> f64 {
    if results.is_empty() {
        return 0.0;
    }
    let met = results.iter().filter(|r| r.deadline_met).count();
    met as f64 / results.len() as f64 * 100.0
}

fn display_results(results: &[CycleRecord]) {
    if results.is_empty() {
        println!("No results to display.");
        return;
    }

    let missed = results.iter().filter(|r| !r.deadline_met).count();
    let brakes = results.iter().filter(|r| r.command == "brake").count();
    let max_lock_wait = results.iter().map(|r| r.lock_wait_ns).max().unwrap_or(0);

    println!("Total Cycles: {}", results.len());
    println!("Deadline Compliance: {:.2}% ({} missed)", compliance(results), missed);
    println!("Cycles holding position (brake): {}", brakes);
    println!("Max lock wait: {} ns", max_lock_wait);
    if let Some(last) = results.last() {
        println!("Final count: {} ({:?})", last.count, last.mode);
    }
}

fn print_diagnostics<D, E>(name: &str, controller: &Controller<D, E>)
where
    D: motor_core::MotorDriver,
    E: motor_core::Encoder,
{
    let d = controller.diagnostics();
    println!(
        "{name}: {} cycles, {} skipped, {} late, {} driver failures",
        d.completed_cycles, d.skipped_cycles, d.late_cycles, d.driver_failures
    );
}
