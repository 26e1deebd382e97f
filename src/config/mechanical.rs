//! Mechanical constraints derived from machine configuration.

use crate::error::{ConfigError, Result};

use super::axis::AxisConfig;
use super::machine::MachineConfig;
use super::units::{Millimeters, Steps, StepsPerMm};
use super::validation::validate_config;

/// Per-axis limits in planner units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisConstraints {
    /// Steps per millimeter.
    pub steps_per_mm: StepsPerMm,

    /// Maximum rate in millimeters per second.
    pub max_rate: f32,

    /// Maximum acceleration in millimeters per second squared.
    pub acceleration: f32,

    /// Whether direction pin logic is inverted.
    pub invert_direction: bool,
}

impl AxisConstraints {
    /// Derive planner limits from one axis configuration.
    pub fn from_config(config: &AxisConfig) -> Self {
        Self {
            steps_per_mm: config.steps_per_mm,
            max_rate: config.max_rate.per_sec().value(),
            acceleration: config.acceleration.value(),
            invert_direction: config.invert_direction,
        }
    }
}

/// Derived machine parameters computed from configuration.
///
/// These are computed once at initialization and read by both the planner
/// and the step engine; nothing here changes at runtime.
#[derive(Debug, Clone, Copy)]
pub struct MachineConstraints<const AXES: usize> {
    /// Per-axis limits.
    pub axes: [AxisConstraints; AXES],

    /// Junction deviation in millimeters.
    pub junction_deviation: f32,

    /// Squared minimum junction speed (mm²/s²).
    pub minimum_speed_sqr: f32,

    /// Cosine guard for the junction formula.
    pub straight_cos: f32,

    /// Step timer cadence in Hz.
    pub tick_hz: u32,

    /// Length of one step timer tick in nanoseconds.
    pub tick_period_ns: u32,

    /// Smoothing ceiling (pulses per tick).
    pub max_pulses_per_tick: u8,

    /// Step pulse width in nanoseconds.
    pub pulse_width_ns: u32,

    /// Floor on the executed step rate in steps per second.
    pub minimum_step_rate: f32,

    /// Untrusted resets stay in POSITION_LOST.
    pub homing_required: bool,

    /// RUN starts as soon as blocks are buffered.
    pub auto_start: bool,
}

impl<const AXES: usize> MachineConstraints<AXES> {
    /// Validate a configuration and compute constraints for `AXES` axes.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails or the configured axis count
    /// differs from `AXES`.
    pub fn from_config(config: &MachineConfig) -> Result<Self> {
        validate_config(config)?;

        if config.axis_count() != AXES {
            return Err(ConfigError::AxisCountMismatch {
                expected: AXES,
                found: config.axis_count(),
            }
            .into());
        }

        let axes = core::array::from_fn(|i| AxisConstraints::from_config(&config.axes[i]));

        Ok(Self {
            axes,
            junction_deviation: config.junction.deviation.value(),
            minimum_speed_sqr: config.junction.minimum_speed.squared(),
            straight_cos: config.junction.straight_cos,
            tick_hz: config.stepper.tick_hz,
            tick_period_ns: config.tick_period_ns(),
            max_pulses_per_tick: config.stepper.max_pulses_per_tick,
            pulse_width_ns: config.stepper.pulse_width_ns,
            minimum_step_rate: config.stepper.minimum_step_rate,
            homing_required: config.homing_required,
            auto_start: config.auto_start,
        })
    }

    /// Convert a machine position in millimeters to the nearest steps.
    ///
    /// Returns `None` if any axis is not finite or out of step range.
    pub fn mm_to_steps(&self, position: &[f32; AXES]) -> Option<[i32; AXES]> {
        let mut steps = [0i32; AXES];
        for (i, (out, axis)) in steps.iter_mut().zip(self.axes.iter()).enumerate() {
            *out = Steps::from_mm(Millimeters(position[i]), axis.steps_per_mm)?.value();
        }
        Some(steps)
    }

    /// Convert a machine position in steps to millimeters.
    #[inline]
    pub fn steps_to_mm(&self, steps: &[i32; AXES]) -> [f64; AXES] {
        core::array::from_fn(|i| steps[i] as f64 / self.axes[i].steps_per_mm.value() as f64)
    }

    /// Direction mask with the configured inversions applied.
    #[inline]
    pub fn invert_mask(&self) -> u8 {
        self.axes
            .iter()
            .enumerate()
            .filter(|(_, a)| a.invert_direction)
            .fold(0u8, |mask, (i, _)| mask | (1 << i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_test_config() -> MachineConfig {
        let mut z = AxisConfig::new(400.0, 600.0, 50.0);
        z.invert_direction = true;
        MachineConfig::with_axes(&[
            AxisConfig::new(80.0, 6000.0, 500.0),
            AxisConfig::new(80.0, 6000.0, 500.0),
            z,
        ])
    }

    #[test]
    fn test_rates_per_second() {
        let constraints = MachineConstraints::<3>::from_config(&make_test_config()).unwrap();

        // 6000 mm/min = 100 mm/s
        assert!((constraints.axes[0].max_rate - 100.0).abs() < 1e-4);
        assert!((constraints.axes[2].max_rate - 10.0).abs() < 1e-4);
        assert_eq!(constraints.tick_period_ns, 33_333);
    }

    #[test]
    fn test_axis_count_mismatch() {
        let result = MachineConstraints::<2>::from_config(&make_test_config());
        assert!(matches!(
            result,
            Err(crate::Error::Config(ConfigError::AxisCountMismatch { expected: 2, found: 3 }))
        ));
    }

    #[test]
    fn test_position_conversion() {
        let constraints = MachineConstraints::<3>::from_config(&make_test_config()).unwrap();
        let steps = constraints.mm_to_steps(&[10.0, -2.5, 1.0]).unwrap();
        assert_eq!(steps, [800, -200, 400]);
        assert_eq!(constraints.mm_to_steps(&[10.0, f32::NAN, 1.0]), None);

        let mm = constraints.steps_to_mm(&steps);
        assert!((mm[1] + 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_invert_mask() {
        let constraints = MachineConstraints::<3>::from_config(&make_test_config()).unwrap();
        assert_eq!(constraints.invert_mask(), 0b100);
    }
}
