//! Axis configuration from TOML.

use serde::Deserialize;

use super::units::{MmPerMin, MmPerSec2, StepsPerMm};

/// Configuration of one linear axis.
#[derive(Debug, Clone, Deserialize)]
pub struct AxisConfig {
    /// Steps per millimeter of travel (microstepping and drive train included).
    pub steps_per_mm: StepsPerMm,

    /// Maximum rate in millimeters per minute (also the rapid rate).
    #[serde(rename = "max_rate_mm_per_min")]
    pub max_rate: MmPerMin,

    /// Maximum acceleration in millimeters per second squared.
    #[serde(rename = "acceleration_mm_per_sec2")]
    pub acceleration: MmPerSec2,

    /// Invert direction pin logic.
    #[serde(default)]
    pub invert_direction: bool,
}

impl AxisConfig {
    /// Create an axis configuration without direction inversion.
    pub fn new(steps_per_mm: f32, max_rate_mm_per_min: f32, acceleration_mm_per_sec2: f32) -> Self {
        Self {
            steps_per_mm: StepsPerMm(steps_per_mm),
            max_rate: MmPerMin(max_rate_mm_per_min),
            acceleration: MmPerSec2(acceleration_mm_per_sec2),
            invert_direction: false,
        }
    }

    /// Maximum step events per second this axis can demand.
    pub fn max_step_rate(&self) -> f32 {
        self.max_rate.per_sec().value() * self.steps_per_mm.value()
    }
}
