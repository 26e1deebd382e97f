//! Unit tests for configuration validation.

use stepper_lookahead::config::{validate_config, AxisConfig, MachineConfig, Millimeters, MmPerSec};
use stepper_lookahead::error::{ConfigError, Error};

fn machine() -> MachineConfig {
    MachineConfig::with_axes(&[
        AxisConfig::new(80.0, 6000.0, 500.0),
        AxisConfig::new(80.0, 6000.0, 500.0),
    ])
}

/// Test validation of a valid configuration.
#[test]
fn test_valid_config_passes_validation() {
    assert!(validate_config(&machine()).is_ok());
}

#[test]
fn test_no_axes() {
    let config = MachineConfig::with_axes(&[]);
    assert!(matches!(
        validate_config(&config),
        Err(Error::Config(ConfigError::NoAxes))
    ));
}

#[test]
fn test_zero_acceleration() {
    let mut config = machine();
    config.axes[1] = AxisConfig::new(80.0, 6000.0, 0.0);
    assert!(matches!(
        validate_config(&config),
        Err(Error::Config(ConfigError::InvalidAcceleration { axis: 1, .. }))
    ));
}

#[test]
fn test_nan_rate() {
    let mut config = machine();
    config.axes[0] = AxisConfig::new(80.0, f32::NAN, 500.0);
    assert!(matches!(
        validate_config(&config),
        Err(Error::Config(ConfigError::InvalidMaxRate { axis: 0, .. }))
    ));
}

#[test]
fn test_negative_junction_deviation() {
    let mut config = machine();
    config.junction.deviation = Millimeters(-0.1);
    assert!(matches!(
        validate_config(&config),
        Err(Error::Config(ConfigError::InvalidJunctionDeviation(_)))
    ));
}

#[test]
fn test_negative_minimum_speed() {
    let mut config = machine();
    config.junction.minimum_speed = MmPerSec(-1.0);
    assert!(matches!(
        validate_config(&config),
        Err(Error::Config(ConfigError::InvalidMinimumSpeed(_)))
    ));
}

#[test]
fn test_straight_cos_range() {
    let mut config = machine();
    config.junction.straight_cos = 1.0;
    assert!(matches!(
        validate_config(&config),
        Err(Error::Config(ConfigError::InvalidStraightCos(_)))
    ));
}

#[test]
fn test_zero_tick_rate() {
    let mut config = machine();
    config.stepper.tick_hz = 0;
    assert!(matches!(
        validate_config(&config),
        Err(Error::Config(ConfigError::InvalidTickRate(0)))
    ));
}

#[test]
fn test_pulses_per_tick_range() {
    let mut config = machine();
    config.stepper.max_pulses_per_tick = 9;
    assert!(matches!(
        validate_config(&config),
        Err(Error::Config(ConfigError::InvalidPulsesPerTick(9)))
    ));
}

#[test]
fn test_pulse_width_must_fit_tick() {
    let mut config = machine();
    // 30 kHz with 4 pulses leaves ~8.3 µs per pulse
    config.stepper.pulse_width_ns = 9_000;
    assert!(matches!(
        validate_config(&config),
        Err(Error::Config(ConfigError::PulseWidthTooLong { .. }))
    ));
}

#[test]
fn test_error_display() {
    let mut config = machine();
    config.stepper.tick_hz = 0;
    let message = validate_config(&config).unwrap_err().to_string();
    assert!(!message.is_empty());
}
