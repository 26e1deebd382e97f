//! Unit types for physical quantities.
//!
//! Keep millimeters, feed rates and accelerations apart at compile time.
//! Rates in configuration are per minute (machine convention); the planner
//! works per second.

use serde::Deserialize;

/// Linear distance in millimeters.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Deserialize)]
#[serde(transparent)]
pub struct Millimeters(pub f32);

impl Millimeters {
    /// Create a new Millimeters value.
    #[inline]
    pub const fn new(value: f32) -> Self {
        Self(value)
    }

    /// Get the raw value.
    #[inline]
    pub const fn value(self) -> f32 {
        self.0
    }
}

/// Feed rate in millimeters per minute.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Deserialize)]
#[serde(transparent)]
pub struct MmPerMin(pub f32);

impl MmPerMin {
    /// Create a new MmPerMin value.
    #[inline]
    pub const fn new(value: f32) -> Self {
        Self(value)
    }

    /// Get the raw value.
    #[inline]
    pub const fn value(self) -> f32 {
        self.0
    }

    /// Convert to millimeters per second.
    #[inline]
    pub fn per_sec(self) -> MmPerSec {
        MmPerSec(self.0 / 60.0)
    }
}

/// Speed in millimeters per second.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Deserialize)]
#[serde(transparent)]
pub struct MmPerSec(pub f32);

impl MmPerSec {
    /// Create a new MmPerSec value.
    #[inline]
    pub const fn new(value: f32) -> Self {
        Self(value)
    }

    /// Get the raw value.
    #[inline]
    pub const fn value(self) -> f32 {
        self.0
    }

    /// Squared speed, the planner's working quantity.
    #[inline]
    pub fn squared(self) -> f32 {
        self.0 * self.0
    }
}

/// Acceleration in millimeters per second squared.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Deserialize)]
#[serde(transparent)]
pub struct MmPerSec2(pub f32);

impl MmPerSec2 {
    /// Create a new MmPerSec2 value.
    #[inline]
    pub const fn new(value: f32) -> Self {
        Self(value)
    }

    /// Get the raw value.
    #[inline]
    pub const fn value(self) -> f32 {
        self.0
    }
}

/// Axis resolution in steps per millimeter.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Deserialize)]
#[serde(transparent)]
pub struct StepsPerMm(pub f32);

impl StepsPerMm {
    /// Create a new StepsPerMm value.
    #[inline]
    pub const fn new(value: f32) -> Self {
        Self(value)
    }

    /// Get the raw value.
    #[inline]
    pub const fn value(self) -> f32 {
        self.0
    }
}

/// Axis position in steps (absolute from machine origin).
///
/// `i32` so the whole value fits one atomic word on 32-bit targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Steps(pub i32);

impl Steps {
    /// Create a new Steps value.
    #[inline]
    pub const fn new(value: i32) -> Self {
        Self(value)
    }

    /// Get the raw value.
    #[inline]
    pub const fn value(self) -> i32 {
        self.0
    }

    /// Convert to millimeters.
    #[inline]
    pub fn to_mm(self, steps_per_mm: StepsPerMm) -> Millimeters {
        Millimeters(self.0 as f32 / steps_per_mm.0)
    }

    /// Nearest step to a position in millimeters.
    ///
    /// Returns `None` when the position is not finite or lies outside the
    /// `i32` step range.
    #[inline]
    pub fn from_mm(mm: Millimeters, steps_per_mm: StepsPerMm) -> Option<Self> {
        let steps = libm::roundf(mm.0 * steps_per_mm.0);
        // i32::MAX is not representable in f32; 2^31 is the first value past it
        if steps.is_finite() && steps >= i32::MIN as f32 && steps < 2_147_483_648.0 {
            Some(Self(steps as i32))
        } else {
            None
        }
    }
}
