//! Motion blocks and their step-domain speed profiles.

use libm::{ceilf, floorf, sqrtf};

use crate::error::PlannerError;

/// Relative slack allowed when comparing planned speeds.
const SPEED_TOLERANCE: f32 = 1e-4;

/// Whether `speed_sqr` is above `limit_sqr` by more than rounding noise.
#[inline]
pub(crate) fn exceeds(speed_sqr: f32, limit_sqr: f32) -> bool {
    speed_sqr > limit_sqr * (1.0 + SPEED_TOLERANCE) + SPEED_TOLERANCE
}

/// Phase of a block's speed profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
    /// Speeding up toward the nominal rate.
    Accelerate,
    /// Holding the nominal rate.
    Plateau,
    /// Slowing toward the exit rate.
    Decelerate,
}

/// Step-domain trapezoid of one block.
///
/// Rates are in step events per second along the dominant axis,
/// acceleration in step events per second squared.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Trapezoid {
    /// Rate at the first step event.
    pub initial_rate: f32,
    /// Cruise rate.
    pub nominal_rate: f32,
    /// Rate at the last step event.
    pub final_rate: f32,
    /// Acceleration along the dominant axis.
    pub acceleration: f32,
    /// Step events spent accelerating.
    pub accelerate_until: u32,
    /// Step event after which deceleration starts.
    pub decelerate_after: u32,
}

impl Trapezoid {
    /// Compute the profile for a block running from `entry_sqr` to
    /// `exit_sqr` (mm²/s²) with cruise speed `nominal_sqr`.
    ///
    /// When the block is too short to reach nominal speed the plateau
    /// collapses and acceleration meets deceleration where both curves
    /// intersect.
    pub fn plan(
        step_event_count: u32,
        millimeters: f32,
        acceleration: f32,
        entry_sqr: f32,
        nominal_sqr: f32,
        exit_sqr: f32,
    ) -> Self {
        let steps_per_mm = step_event_count as f32 / millimeters;
        // (v1² - v0²) / 2a, expressed in step events
        let to_steps = steps_per_mm / (2.0 * acceleration);
        let count = step_event_count as f32;

        let accelerate_steps = ceilf((nominal_sqr - entry_sqr) * to_steps).max(0.0);
        let decelerate_steps = floorf((nominal_sqr - exit_sqr) * to_steps).max(0.0);

        let (accelerate_until, plateau) = if accelerate_steps + decelerate_steps <= count {
            let plateau = count - accelerate_steps - decelerate_steps;
            (accelerate_steps as u32, plateau as u32)
        } else {
            let intersection = ceilf(((exit_sqr - entry_sqr) * to_steps + count) / 2.0);
            (intersection.clamp(0.0, count) as u32, 0)
        };

        Self {
            initial_rate: sqrtf(entry_sqr) * steps_per_mm,
            nominal_rate: sqrtf(nominal_sqr) * steps_per_mm,
            final_rate: sqrtf(exit_sqr) * steps_per_mm,
            acceleration: acceleration * steps_per_mm,
            accelerate_until,
            decelerate_after: accelerate_until + plateau,
        }
    }

    /// Whether the profile cruises at nominal rate for at least one step.
    #[inline]
    pub fn has_plateau(&self) -> bool {
        self.decelerate_after > self.accelerate_until
    }

    /// Phase at a given number of completed step events.
    #[inline]
    pub fn phase_at(&self, completed: u32) -> Phase {
        if completed < self.accelerate_until {
            Phase::Accelerate
        } else if completed < self.decelerate_after {
            Phase::Plateau
        } else {
            Phase::Decelerate
        }
    }
}

/// Execution flags, written by the step engine only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecFlags {
    /// Loaded by the engine; entry speed is frozen.
    pub busy: bool,
    /// Deceleration has begun; exit speed is frozen.
    pub decelerating: bool,
    /// Every step event has been emitted.
    pub complete: bool,
}

/// One planned linear move.
///
/// Speeds are stored squared (mm²/s²) so the planner passes need no square
/// roots; only the trapezoid conversion takes them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Block<const AXES: usize> {
    /// Unsigned step count per axis.
    pub steps: [u32; AXES],
    /// Bit `i` set when axis `i` moves in the negative direction.
    pub direction_bits: u8,
    /// Largest per-axis step count; bounds the execution loop.
    pub step_event_count: u32,
    /// Path length in millimeters.
    pub millimeters: f32,
    /// Acceleration along the path in mm/s².
    pub acceleration: f32,
    /// Squared cruise speed.
    pub nominal_speed_sqr: f32,
    /// Squared cornering limit at the entry junction.
    pub junction_speed_sqr: f32,
    /// Squared entry limit from the backward pass.
    pub max_entry_speed_sqr: f32,
    /// Squared planned entry speed from the forward pass.
    pub entry_speed_sqr: f32,
    /// Squared planned exit speed (the next block's entry).
    pub exit_speed_sqr: f32,
    /// Long enough to reach nominal speed from rest.
    pub nominal_length: bool,
    /// Dirty flag for the planner.
    pub recalculate: bool,
    /// Step-domain profile for the engine.
    pub trapezoid: Trapezoid,
    /// Engine-owned execution flags.
    pub exec: ExecFlags,
}

impl<const AXES: usize> Block<AXES> {
    /// An unused slot.
    pub const fn empty() -> Self {
        Self {
            steps: [0; AXES],
            direction_bits: 0,
            step_event_count: 0,
            millimeters: 0.0,
            acceleration: 0.0,
            nominal_speed_sqr: 0.0,
            junction_speed_sqr: 0.0,
            max_entry_speed_sqr: 0.0,
            entry_speed_sqr: 0.0,
            exit_speed_sqr: 0.0,
            nominal_length: false,
            recalculate: false,
            trapezoid: Trapezoid {
                initial_rate: 0.0,
                nominal_rate: 0.0,
                final_rate: 0.0,
                acceleration: 0.0,
                accelerate_until: 0,
                decelerate_after: 0,
            },
            exec: ExecFlags {
                busy: false,
                decelerating: false,
                complete: false,
            },
        }
    }

    /// Millimeters travelled per step event.
    #[inline]
    pub fn mm_per_step(&self) -> f32 {
        self.millimeters / self.step_event_count as f32
    }

    /// Cruise speed in mm/s.
    #[inline]
    pub fn nominal_speed(&self) -> f32 {
        sqrtf(self.nominal_speed_sqr)
    }

    /// Planned entry speed in mm/s.
    #[inline]
    pub fn entry_speed(&self) -> f32 {
        sqrtf(self.entry_speed_sqr)
    }

    /// Planned exit speed in mm/s.
    #[inline]
    pub fn exit_speed(&self) -> f32 {
        sqrtf(self.exit_speed_sqr)
    }

    /// Squared speed gained by accelerating over the whole block from its
    /// entry speed.
    #[inline]
    pub fn reachable_exit_sqr(&self) -> f32 {
        self.entry_speed_sqr + 2.0 * self.acceleration * self.millimeters
    }

    /// Highest squared entry speed that can still slow to `exit_sqr`
    /// within this block.
    #[inline]
    pub fn decelerable_entry_sqr(&self, exit_sqr: f32) -> f32 {
        exit_sqr + 2.0 * self.acceleration * self.millimeters
    }

    /// Recompute the trapezoid for the current entry speed and `exit_sqr`.
    pub fn plan_exit(&mut self, exit_sqr: f32) {
        self.exit_speed_sqr = exit_sqr;
        self.trapezoid = Trapezoid::plan(
            self.step_event_count,
            self.millimeters,
            self.acceleration,
            self.entry_speed_sqr,
            self.nominal_speed_sqr,
            exit_sqr,
        );
    }

    /// Check `0 <= entry <= max entry <= nominal` and that the exit is
    /// reachable without decelerating harder than the block allows.
    pub fn check(&self, slot: usize) -> Result<(), PlannerError> {
        let speeds = [
            self.entry_speed_sqr,
            self.max_entry_speed_sqr,
            self.nominal_speed_sqr,
            self.exit_speed_sqr,
        ];
        if speeds.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(PlannerError::NonFinite { slot });
        }

        for (speed_sqr, limit_sqr) in [
            (self.entry_speed_sqr, self.max_entry_speed_sqr),
            (self.max_entry_speed_sqr, self.nominal_speed_sqr),
            (self.entry_speed_sqr, self.decelerable_entry_sqr(self.exit_speed_sqr)),
        ] {
            if exceeds(speed_sqr, limit_sqr) {
                return Err(PlannerError::InvariantViolation {
                    slot,
                    speed_sqr,
                    limit_sqr,
                });
            }
        }

        Ok(())
    }
}
