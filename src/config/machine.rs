//! Machine configuration - root configuration structure.

use heapless::Vec;
use serde::Deserialize;

use super::axis::AxisConfig;
use super::units::{Millimeters, MmPerSec};

/// Upper bound on configured axes (direction and pulse masks are one byte).
pub const MAX_AXES: usize = 6;

/// Cornering parameters used to derive junction speeds.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct JunctionConfig {
    /// Maximum allowed deviation from the programmed corner in millimeters.
    #[serde(default = "default_deviation", rename = "deviation_mm")]
    pub deviation: Millimeters,

    /// Speed every junction and every buffer end may always drop to.
    #[serde(default, rename = "minimum_speed_mm_per_sec")]
    pub minimum_speed: MmPerSec,

    /// Cosine guard: corners straighter than this keep the lower nominal
    /// speed, reversals sharper than this stop at the minimum speed.
    #[serde(default = "default_straight_cos")]
    pub straight_cos: f32,
}

fn default_deviation() -> Millimeters {
    Millimeters(0.05)
}

fn default_straight_cos() -> f32 {
    0.95
}

impl Default for JunctionConfig {
    fn default() -> Self {
        Self {
            deviation: default_deviation(),
            minimum_speed: MmPerSec(0.0),
            straight_cos: default_straight_cos(),
        }
    }
}

/// Step timer parameters.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct StepperConfig {
    /// Fixed cadence of the step timer in Hz.
    #[serde(default = "default_tick_hz")]
    pub tick_hz: u32,

    /// Most step pulses the smoothing stage may pack into one tick.
    #[serde(default = "default_max_pulses_per_tick")]
    pub max_pulses_per_tick: u8,

    /// Width of the step pulse in nanoseconds.
    #[serde(default = "default_pulse_width_ns")]
    pub pulse_width_ns: u32,

    /// Floor on the step rate (steps/s) so a block starting from rest
    /// still produces its first step.
    #[serde(default = "default_minimum_step_rate")]
    pub minimum_step_rate: f32,
}

fn default_tick_hz() -> u32 {
    30_000
}

fn default_max_pulses_per_tick() -> u8 {
    4
}

fn default_pulse_width_ns() -> u32 {
    2_000
}

fn default_minimum_step_rate() -> f32 {
    800.0 / 60.0
}

impl Default for StepperConfig {
    fn default() -> Self {
        Self {
            tick_hz: default_tick_hz(),
            max_pulses_per_tick: default_max_pulses_per_tick(),
            pulse_width_ns: default_pulse_width_ns(),
            minimum_step_rate: default_minimum_step_rate(),
        }
    }
}

/// Root configuration structure from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct MachineConfig {
    /// Per-axis settings, in axis order.
    pub axes: Vec<AxisConfig, MAX_AXES>,

    /// Cornering settings.
    #[serde(default)]
    pub junction: JunctionConfig,

    /// Step timer settings.
    #[serde(default)]
    pub stepper: StepperConfig,

    /// Keep the machine in POSITION_LOST after an untrusted reset until it
    /// is homed or explicitly zeroed. When false such a reset lands in IDLE.
    #[serde(default = "default_true")]
    pub homing_required: bool,

    /// Enter RUN as soon as a block is buffered. When false RUN waits for
    /// an explicit cycle start.
    #[serde(default = "default_true")]
    pub auto_start: bool,
}

fn default_true() -> bool {
    true
}

impl MachineConfig {
    /// Configuration with the given axes and default everything else.
    pub fn with_axes(axes: &[AxisConfig]) -> Self {
        let mut list = Vec::new();
        for axis in axes.iter().take(MAX_AXES) {
            // Capacity checked by take()
            let _ = list.push(axis.clone());
        }
        Self {
            axes: list,
            junction: JunctionConfig::default(),
            stepper: StepperConfig::default(),
            homing_required: true,
            auto_start: true,
        }
    }

    /// Get an axis configuration by index.
    pub fn axis(&self, index: usize) -> Option<&AxisConfig> {
        self.axes.get(index)
    }

    /// Number of configured axes.
    pub fn axis_count(&self) -> usize {
        self.axes.len()
    }

    /// Length of one step timer tick in nanoseconds.
    pub fn tick_period_ns(&self) -> u32 {
        if self.stepper.tick_hz == 0 {
            u32::MAX
        } else {
            1_000_000_000 / self.stepper.tick_hz
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_axes_defaults() {
        let config = MachineConfig::with_axes(&[
            AxisConfig::new(80.0, 6000.0, 500.0),
            AxisConfig::new(80.0, 6000.0, 500.0),
        ]);
        assert_eq!(config.axis_count(), 2);
        assert!(config.homing_required);
        assert!(config.auto_start);
        assert_eq!(config.stepper.tick_hz, 30_000);
        assert!((config.junction.deviation.value() - 0.05).abs() < 1e-6);
    }

    #[test]
    fn test_tick_period() {
        let mut config = MachineConfig::with_axes(&[AxisConfig::new(80.0, 6000.0, 500.0)]);
        config.stepper.tick_hz = 50_000;
        assert_eq!(config.tick_period_ns(), 20_000);
    }
}
