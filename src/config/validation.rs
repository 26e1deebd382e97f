//! Configuration validation.

use crate::error::{ConfigError, Error, Result};

use super::machine::MachineConfig;
use super::AxisConfig;

/// Validate a machine configuration.
///
/// Checks:
/// - At least one axis is configured
/// - Axis resolutions, rates and accelerations are positive
/// - Junction parameters are in range
/// - The step timer can emit every axis' maximum step rate
/// - A step pulse fits inside one timer tick
pub fn validate_config(config: &MachineConfig) -> Result<()> {
    if config.axes.is_empty() {
        return Err(Error::Config(ConfigError::NoAxes));
    }

    validate_stepper(config)?;

    let available =
        config.stepper.tick_hz as f32 * config.stepper.max_pulses_per_tick as f32;
    for (index, axis) in config.axes.iter().enumerate() {
        validate_axis(index, axis, available)?;
    }

    let junction = &config.junction;
    if !(junction.deviation.value() >= 0.0) {
        return Err(Error::Config(ConfigError::InvalidJunctionDeviation(
            junction.deviation.value(),
        )));
    }
    if !(junction.minimum_speed.value() >= 0.0) {
        return Err(Error::Config(ConfigError::InvalidMinimumSpeed(
            junction.minimum_speed.value(),
        )));
    }
    if !(junction.straight_cos > 0.0 && junction.straight_cos < 1.0) {
        return Err(Error::Config(ConfigError::InvalidStraightCos(
            junction.straight_cos,
        )));
    }

    Ok(())
}

fn validate_stepper(config: &MachineConfig) -> Result<()> {
    let stepper = &config.stepper;

    if stepper.tick_hz == 0 {
        return Err(Error::Config(ConfigError::InvalidTickRate(stepper.tick_hz)));
    }

    if stepper.max_pulses_per_tick == 0 || stepper.max_pulses_per_tick > 8 {
        return Err(Error::Config(ConfigError::InvalidPulsesPerTick(
            stepper.max_pulses_per_tick,
        )));
    }

    if !(stepper.minimum_step_rate > 0.0) {
        return Err(Error::Config(ConfigError::InvalidMinimumStepRate(
            stepper.minimum_step_rate,
        )));
    }

    // Every pulse in a fully packed tick needs its own high and low time
    let tick_period_ns = config.tick_period_ns();
    let slot_ns = tick_period_ns / stepper.max_pulses_per_tick as u32;
    if stepper.pulse_width_ns >= slot_ns {
        return Err(Error::Config(ConfigError::PulseWidthTooLong {
            pulse_width_ns: stepper.pulse_width_ns,
            tick_period_ns,
        }));
    }

    Ok(())
}

fn validate_axis(index: usize, axis: &AxisConfig, available_step_rate: f32) -> Result<()> {
    // NaN fails every comparison, so test for the valid range
    if !(axis.steps_per_mm.value() > 0.0) {
        return Err(Error::Config(ConfigError::InvalidStepsPerMm {
            axis: index,
            value: axis.steps_per_mm.value(),
        }));
    }

    if !(axis.max_rate.value() > 0.0) {
        return Err(Error::Config(ConfigError::InvalidMaxRate {
            axis: index,
            value: axis.max_rate.value(),
        }));
    }

    if !(axis.acceleration.value() > 0.0) {
        return Err(Error::Config(ConfigError::InvalidAcceleration {
            axis: index,
            value: axis.acceleration.value(),
        }));
    }

    let required = axis.max_step_rate();
    if required > available_step_rate {
        return Err(Error::Config(ConfigError::StepRateTooHigh {
            axis: index,
            required,
            available: available_step_rate,
        }));
    }

    Ok(())
}
