//! Closed-loop behaviour of the controller against the simulated gear-motor,
//! stepping the plant and the control cycle in lock-step.

use motor_core::sim::{PlantModel, RecordingDriver, ScriptedEncoder, SimDriver, SimEncoder, SimulatedMotor};
use motor_core::{ControlMode, Controller, ControllerConfig, DriveCommand, PidGains};
use std::time::Duration;

const INTERVAL: Duration = Duration::from_millis(20);

fn config() -> ControllerConfig {
    ControllerConfig::new(29.0)
        .with_counts_per_rev(28.0)
        .with_interval(INTERVAL)
        .with_position_pid(PidGains::new(0.005, 0.0, 0.0))
        .with_speed_pid(PidGains::new(0.01, 0.2, 0.0))
}

fn simulated(time_constant: f64) -> (Controller<SimDriver, SimEncoder>, SimulatedMotor) {
    let motor = SimulatedMotor::new(PlantModel::from_rpm(300.0, 812.0, time_constant));
    let ctl = Controller::new(motor.driver(), motor.encoder(), &config()).unwrap();
    (ctl, motor)
}

fn tick(ctl: &Controller<SimDriver, SimEncoder>, motor: &SimulatedMotor) -> Option<DriveCommand> {
    motor.advance(INTERVAL);
    ctl.run_cycle().unwrap().output.command
}

// ============================================================================
// POSITION MODE
// ============================================================================

#[test]
fn one_turn_settles_at_812_and_brakes() {
    let (ctl, motor) = simulated(0.0);
    ctl.rotate(1.0);
    assert_eq!(ctl.mode(), ControlMode::Position { target: 812 });

    let mut settled_at = None;
    for cycle in 0..100 {
        if tick(&ctl, &motor) == Some(DriveCommand::Brake) {
            settled_at = Some(cycle);
            break;
        }
    }
    assert!(settled_at.is_some(), "never entered the dead-band");

    for _ in 0..50 {
        assert_eq!(tick(&ctl, &motor), Some(DriveCommand::Brake));
    }
    let count = (ctl.get_position() * 812.0).round() as i64;
    assert!((count - 812).abs() <= 1, "settled at {count}");
}

#[test]
fn settles_with_motor_lag() {
    let (ctl, motor) = simulated(0.05);
    ctl.rotate_deg(360.0);
    for _ in 0..150 {
        tick(&ctl, &motor);
    }
    assert_eq!(tick(&ctl, &motor), Some(DriveCommand::Brake));
    assert!((ctl.get_position() - 1.0).abs() <= 1.5 / 812.0);
}

#[test]
fn disturbance_outside_band_is_corrected() {
    let (ctl, motor) = simulated(0.0);
    ctl.rotate(0.5);
    for _ in 0..100 {
        tick(&ctl, &motor);
    }
    motor.displace(-60.0);
    assert!(matches!(tick(&ctl, &motor), Some(DriveCommand::Drive(duty)) if duty > 0.0));
    for _ in 0..100 {
        tick(&ctl, &motor);
    }
    assert_eq!(tick(&ctl, &motor), Some(DriveCommand::Brake));
}

#[test]
fn queued_rotations_add_up_while_moving() {
    let (ctl, motor) = simulated(0.0);
    ctl.rotate(0.25);
    for _ in 0..3 {
        tick(&ctl, &motor);
    }
    ctl.rotate(0.25);
    assert_eq!(ctl.mode(), ControlMode::Position { target: 406 });
    for _ in 0..150 {
        tick(&ctl, &motor);
    }
    assert!((ctl.get_position() - 0.5).abs() <= 1.5 / 812.0);
}

#[test]
fn drive_discards_goal_and_rotate_restarts_from_present() {
    let (ctl, motor) = simulated(0.0);
    ctl.rotate(2.0);
    for _ in 0..5 {
        tick(&ctl, &motor);
    }
    ctl.drive(0.0);
    assert_eq!(ctl.mode(), ControlMode::Idle);

    let here = (ctl.get_position() * 812.0).round() as i64;
    assert!(here > 0 && here < 1624);
    ctl.rotate(0.25);
    assert_eq!(ctl.mode(), ControlMode::Position { target: here + 203 });
}

// ============================================================================
// SPEED MODE
// ============================================================================

#[test]
fn tracks_two_turns_per_second() {
    for lag in [0.0, 0.05] {
        let (ctl, motor) = simulated(lag);
        ctl.set_speed(2.0);
        for _ in 0..400 {
            assert!(matches!(tick(&ctl, &motor), Some(DriveCommand::Drive(_))));
        }
        let speed = ctl.get_speed();
        assert!((speed - 2.0).abs() < 0.05, "lag {lag}: {speed} turns/s");
        assert!((ctl.get_speed_rpm() - 120.0).abs() < 3.0);
    }
}

#[test]
fn reverse_speed_spins_backwards() {
    let (ctl, motor) = simulated(0.0);
    ctl.set_speed(-2.0);
    for _ in 0..300 {
        tick(&ctl, &motor);
    }
    assert!(ctl.get_position() < -1.0);
    assert!((ctl.get_speed() + 2.0).abs() < 0.05);
}

#[test]
fn brake_overrides_speed_goal() {
    let (ctl, motor) = simulated(0.0);
    ctl.set_speed(1.0);
    for _ in 0..50 {
        tick(&ctl, &motor);
    }
    ctl.brake();
    assert!(motor.is_braking());
    for _ in 0..20 {
        assert_eq!(tick(&ctl, &motor), None);
    }
    assert_eq!(ctl.get_speed(), 0.0);
}

// ============================================================================
// MODE SWITCHING
// ============================================================================

#[test]
fn first_output_after_switch_is_proportional() {
    let driver = RecordingDriver::new();
    let encoder = ScriptedEncoder::new(0);
    let config = config()
        .with_position_pid(PidGains::new(0.001, 1.0, 0.0))
        .with_speed_pid(PidGains::new(0.001, 1.0, 0.0));
    let ctl = Controller::new(driver.clone(), encoder.clone(), &config).unwrap();

    // build up integrator on the speed unit while the shaft is stalled
    ctl.set_speed(1.0);
    for _ in 0..10 {
        ctl.run_cycle().unwrap();
    }

    ctl.rotate(0.5);
    let report = ctl.run_cycle().unwrap();
    assert!(report.output.mode_changed);
    assert_eq!(report.output.pid_output, Some(0.001 * 406.0));
    assert_eq!(driver.last(), Some(DriveCommand::Drive(0.001 * 406.0)));

    // and back again: the speed unit starts from scratch too
    ctl.set_speed(1.0);
    let report = ctl.run_cycle().unwrap();
    let cpi = 812.0 * 0.02;
    let expected = 0.001 * (cpi - 0.0);
    assert!((report.output.pid_output.unwrap() - expected).abs() < 1e-12);
}
