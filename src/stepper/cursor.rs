//! Execution cursor: the engine's private view of the block it is running.

use crate::planner::{Block, Phase, Trapezoid};

/// Progress through one block.
///
/// Built when a block is loaded and dropped when it completes or motion is
/// aborted. Nothing outside the step engine reads or writes it.
#[derive(Debug, Clone)]
pub struct ExecutionCursor<const AXES: usize> {
    steps: [u32; AXES],
    direction_bits: u8,
    step_event_count: u32,
    /// Bresenham error terms, one per axis.
    counters: [i64; AXES],
    completed: u32,
    /// Current step event rate in steps per second.
    rate: f32,
    /// Time since the last step event.
    elapsed_ns: u32,
    trapezoid: Trapezoid,
    /// The trapezoid has been latched for deceleration.
    decelerating: bool,
}

impl<const AXES: usize> ExecutionCursor<AXES> {
    /// Start executing `block` at its planned entry rate.
    pub fn load(block: &Block<AXES>, minimum_rate: f32) -> Self {
        let half = -((block.step_event_count >> 1) as i64);
        Self {
            steps: block.steps,
            direction_bits: block.direction_bits,
            step_event_count: block.step_event_count,
            counters: [half; AXES],
            completed: 0,
            rate: block.trapezoid.initial_rate.max(minimum_rate),
            elapsed_ns: 0,
            trapezoid: block.trapezoid,
            decelerating: block.exec.decelerating,
        }
    }

    /// Direction bits of the running block.
    #[inline]
    pub fn direction_bits(&self) -> u8 {
        self.direction_bits
    }

    /// Step events emitted so far.
    #[inline]
    pub fn completed(&self) -> u32 {
        self.completed
    }

    /// Whether every step event of the block has been emitted.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.completed >= self.step_event_count
    }

    /// Current rate in step events per second.
    #[inline]
    pub fn rate(&self) -> f32 {
        self.rate
    }

    /// Current profile phase.
    #[inline]
    pub fn phase(&self) -> Phase {
        self.trapezoid.phase_at(self.completed)
    }

    /// Whether the deceleration trapezoid is latched.
    #[inline]
    pub fn is_decelerating(&self) -> bool {
        self.decelerating
    }

    /// Interval between step events at the current rate.
    #[inline]
    pub fn interval_ns(&self) -> u32 {
        (1.0e9 / self.rate) as u32
    }

    /// Take the planner's latest trapezoid. Ignored once deceleration is
    /// latched.
    pub(crate) fn refresh(&mut self, trapezoid: Trapezoid, decelerating: bool) {
        if !self.decelerating {
            self.trapezoid = trapezoid;
            self.decelerating = decelerating;
        }
    }

    /// Add one tick of time and update the rate for the current phase.
    pub(crate) fn advance_time(&mut self, tick_period_ns: u32, minimum_rate: f32) {
        self.elapsed_ns = self.elapsed_ns.saturating_add(tick_period_ns);

        let t = &self.trapezoid;
        let delta = t.acceleration * tick_period_ns as f32 * 1.0e-9;
        self.rate = match self.phase() {
            Phase::Accelerate => (self.rate + delta).min(t.nominal_rate),
            Phase::Plateau => t.nominal_rate,
            Phase::Decelerate => {
                if self.rate > t.final_rate {
                    (self.rate - delta).max(t.final_rate)
                } else {
                    self.rate
                }
            }
        }
        .max(minimum_rate);
    }

    /// Whether enough time has passed for the next step event.
    #[inline]
    pub(crate) fn step_due(&self) -> bool {
        !self.is_complete() && self.elapsed_ns >= self.interval_ns()
    }

    /// Emit one step event: returns the mask of axes that pulse.
    ///
    /// Over a whole block every axis pulses exactly its step count.
    pub(crate) fn step_event(&mut self) -> u8 {
        let interval = self.interval_ns();
        self.elapsed_ns = self.elapsed_ns.saturating_sub(interval);

        let count = self.step_event_count as i64;
        let mut mask = 0u8;
        for (i, counter) in self.counters.iter_mut().enumerate() {
            *counter += self.steps[i] as i64;
            if *counter > 0 {
                *counter -= count;
                mask |= 1 << i;
            }
        }
        self.completed += 1;
        mask
    }

    /// Drop timing debt beyond one interval, when the tick could not carry
    /// every due step.
    pub(crate) fn cap_lag(&mut self) {
        let interval = self.interval_ns();
        if self.elapsed_ns > interval {
            self.elapsed_ns = interval;
        }
    }

    /// Signed position change of a pulse mask.
    pub(crate) fn displacement(&self, mask: u8) -> [i32; AXES] {
        core::array::from_fn(|i| {
            if mask & (1 << i) == 0 {
                0
            } else if self.direction_bits & (1 << i) != 0 {
                -1
            } else {
                1
            }
        })
    }
}
