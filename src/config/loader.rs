//! Machine description files.
//!
//! A machine file is TOML. Every axis gets one `[[axes]]` table, in axis
//! order; the other tables are optional and fall back to their defaults.
//!
//! ```toml
//! homing_required = true          # start in POSITION_LOST until homed
//! auto_start = true               # leave IDLE as soon as a block is queued
//!
//! [junction]
//! deviation_mm = 0.05             # cornering tolerance
//! minimum_speed_mm_per_sec = 0.0  # floor for junction speeds
//! straight_cos = 0.95             # cosine cutoff for reversals and straight joints
//!
//! [stepper]
//! tick_hz = 30000                 # step timer rate
//! max_pulses_per_tick = 4
//! pulse_width_ns = 2000
//! minimum_step_rate = 13.3        # steps/s, keeps ramps from stalling
//!
//! [[axes]]
//! steps_per_mm = 80.0
//! max_rate_mm_per_min = 9000.0
//! acceleration_mm_per_sec2 = 800.0
//! invert_direction = false
//! ```

use std::fs;
use std::path::Path;

use crate::error::{ConfigError, Error, Result};

use super::MachineConfig;

/// Read and validate a machine file.
///
/// # Errors
///
/// [`ConfigError::IoError`] when the file cannot be read, otherwise
/// whatever [`parse_config`] reports.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<MachineConfig> {
    let content = fs::read_to_string(path.as_ref())
        .map_err(|e| Error::Config(ConfigError::IoError(message(&e.to_string()))))?;

    parse_config(&content)
}

/// Parse and validate a machine description.
///
/// # Errors
///
/// [`ConfigError::ParseError`] for malformed TOML or unknown value types,
/// or the first rule broken by [`validate_config`](super::validate_config).
pub fn parse_config(content: &str) -> Result<MachineConfig> {
    let config: MachineConfig = toml::from_str(content)
        .map_err(|e| Error::Config(ConfigError::ParseError(message(e.message()))))?;

    super::validation::validate_config(&config)?;

    Ok(config)
}

/// Fit a message into the error's fixed buffer, cut on a char boundary.
fn message(text: &str) -> heapless::String<128> {
    let mut out = heapless::String::new();
    for c in text.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_config() {
        let toml = r#"
[[axes]]
steps_per_mm = 80.0
max_rate_mm_per_min = 6000.0
acceleration_mm_per_sec2 = 500.0
"#;

        let config = parse_config(toml).unwrap();
        assert_eq!(config.axis_count(), 1);
        assert!(config.homing_required);
    }

    #[test]
    fn test_parse_junction_and_stepper() {
        let toml = r#"
homing_required = false
auto_start = false

[junction]
deviation_mm = 0.02
minimum_speed_mm_per_sec = 1.0

[stepper]
tick_hz = 40000
max_pulses_per_tick = 8

[[axes]]
steps_per_mm = 80.0
max_rate_mm_per_min = 6000.0
acceleration_mm_per_sec2 = 500.0

[[axes]]
steps_per_mm = 400.0
max_rate_mm_per_min = 600.0
acceleration_mm_per_sec2 = 50.0
invert_direction = true
"#;

        let config = parse_config(toml).unwrap();
        assert_eq!(config.axis_count(), 2);
        assert!(!config.homing_required);
        assert!(!config.auto_start);
        assert!((config.junction.deviation.value() - 0.02).abs() < 1e-6);
        assert!((config.junction.straight_cos - 0.95).abs() < 1e-6);
        assert_eq!(config.stepper.tick_hz, 40_000);
        assert_eq!(config.stepper.max_pulses_per_tick, 8);
        assert!(config.axis(1).unwrap().invert_direction);
    }

    #[test]
    fn test_parse_rejects_invalid_values() {
        let toml = r#"
[[axes]]
steps_per_mm = 80.0
max_rate_mm_per_min = 0.0
acceleration_mm_per_sec2 = 500.0
"#;

        assert!(matches!(
            parse_config(toml),
            Err(Error::Config(ConfigError::InvalidMaxRate { axis: 0, .. }))
        ));
    }

    #[test]
    fn test_long_messages_keep_their_prefix() {
        let text = "é".repeat(100);
        let msg = message(&text);
        assert_eq!(msg.len(), 128);
        assert!(text.starts_with(msg.as_str()));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        assert!(matches!(
            load_config("/nonexistent/machine.toml"),
            Err(Error::Config(ConfigError::IoError(_)))
        ));
    }
}
