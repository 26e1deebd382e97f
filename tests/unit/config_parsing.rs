//! Unit tests for TOML configuration parsing.

use stepper_lookahead::config::{MachineConstraints, MAX_AXES};
use stepper_lookahead::error::{ConfigError, Error};
use stepper_lookahead::parse_config;

const THREE_AXIS: &str = r#"
homing_required = true
auto_start = true

[junction]
deviation_mm = 0.02
minimum_speed_mm_per_sec = 0.5
straight_cos = 0.9

[stepper]
tick_hz = 40000
max_pulses_per_tick = 4
pulse_width_ns = 1500
minimum_step_rate = 20.0

[[axes]]
steps_per_mm = 80.0
max_rate_mm_per_min = 9000.0
acceleration_mm_per_sec2 = 800.0

[[axes]]
steps_per_mm = 80.0
max_rate_mm_per_min = 9000.0
acceleration_mm_per_sec2 = 800.0
invert_direction = true

[[axes]]
steps_per_mm = 400.0
max_rate_mm_per_min = 600.0
acceleration_mm_per_sec2 = 50.0
"#;

#[test]
fn test_parse_full_machine() {
    let config = parse_config(THREE_AXIS).expect("valid configuration");

    assert_eq!(config.axis_count(), 3);
    assert_eq!(config.stepper.tick_hz, 40_000);
    assert_eq!(config.stepper.pulse_width_ns, 1500);
    assert!((config.junction.deviation.value() - 0.02).abs() < 1e-6);
    assert!(config.axes[1].invert_direction);
    assert!(!config.axes[2].invert_direction);
}

#[test]
fn test_constraints_from_parsed_config() {
    let config = parse_config(THREE_AXIS).unwrap();
    let constraints = MachineConstraints::<3>::from_config(&config).unwrap();

    // 9000 mm/min is 150 mm/s
    assert!((constraints.axes[0].max_rate - 150.0).abs() < 1e-4);
    assert!((constraints.axes[2].max_rate - 10.0).abs() < 1e-4);
    assert!((constraints.minimum_speed_sqr - 0.25).abs() < 1e-6);
    assert_eq!(constraints.tick_period_ns, 25_000);
    assert_eq!(constraints.invert_mask(), 0b010);
}

#[test]
fn test_defaults_apply() {
    let toml = r#"
[[axes]]
steps_per_mm = 100.0
max_rate_mm_per_min = 3000.0
acceleration_mm_per_sec2 = 200.0
"#;
    let config = parse_config(toml).unwrap();

    assert_eq!(config.stepper.tick_hz, 30_000);
    assert_eq!(config.stepper.max_pulses_per_tick, 4);
    assert!((config.junction.deviation.value() - 0.05).abs() < 1e-6);
    assert!((config.junction.straight_cos - 0.95).abs() < 1e-6);
    assert!(config.homing_required);
    assert!(config.auto_start);
}

#[test]
fn test_malformed_toml_is_parse_error() {
    let result = parse_config("[[axes]\nsteps_per_mm = ");
    assert!(matches!(result, Err(Error::Config(ConfigError::ParseError(_)))));
}

#[test]
fn test_missing_axis_field_is_parse_error() {
    let toml = r#"
[[axes]]
steps_per_mm = 100.0
"#;
    let result = parse_config(toml);
    assert!(matches!(result, Err(Error::Config(ConfigError::ParseError(_)))));
}

#[test]
fn test_axis_count_must_match() {
    let config = parse_config(THREE_AXIS).unwrap();
    let result = MachineConstraints::<2>::from_config(&config);
    assert!(matches!(
        result,
        Err(Error::Config(ConfigError::AxisCountMismatch {
            expected: 2,
            found: 3
        }))
    ));
}

#[test]
fn test_axis_limit() {
    assert_eq!(MAX_AXES, 6);
}
