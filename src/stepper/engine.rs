//! Timer-driven step engine.
//!
//! [`StepperEngine::tick`] is called from the step timer interrupt at a
//! fixed cadence. Each call does a bounded amount of work: poll the request
//! flags, refresh the running block's trapezoid, advance the rate by one
//! tick, and emit up to `max_pulses_per_tick` step events.

use heapless::Vec;

use crate::config::MachineConstraints;
use crate::planner::Consumer;
use crate::system::{request, SharedState};

use super::cursor::ExecutionCursor;
use super::smoothing::{smoothing_level, sub_interval_ns, MAX_PULSES_PER_TICK};

/// Step events produced by one tick.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TickOutput {
    /// Direction bits for every pulse in this tick (bit set: negative).
    pub direction_bits: u8,
    /// Axis masks of the step events, in order.
    pub pulses: Vec<u8, MAX_PULSES_PER_TICK>,
    /// Spacing between consecutive pulses inside the tick.
    pub spacing_ns: u32,
}

impl TickOutput {
    /// Whether the tick emits nothing.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pulses.is_empty()
    }
}

/// Consumer of the block ring, run from the step timer.
pub struct StepperEngine<'a, const AXES: usize, const N: usize> {
    ring: Consumer<'a, AXES, N>,
    shared: &'a SharedState<AXES>,
    cursor: Option<ExecutionCursor<AXES>>,
    tick_period_ns: u32,
    max_pulses_per_tick: u8,
    minimum_step_rate: f32,
}

impl<'a, const AXES: usize, const N: usize> StepperEngine<'a, AXES, N> {
    /// Create an idle engine.
    pub fn new(
        ring: Consumer<'a, AXES, N>,
        shared: &'a SharedState<AXES>,
        constraints: &MachineConstraints<AXES>,
    ) -> Self {
        Self {
            ring,
            shared,
            cursor: None,
            tick_period_ns: constraints.tick_period_ns,
            max_pulses_per_tick: constraints.max_pulses_per_tick,
            minimum_step_rate: constraints.minimum_step_rate,
        }
    }

    /// The block being executed, if any.
    #[inline]
    pub fn cursor(&self) -> Option<&ExecutionCursor<AXES>> {
        self.cursor.as_ref()
    }

    /// Timer period in nanoseconds.
    #[inline]
    pub fn tick_period_ns(&self) -> u32 {
        self.tick_period_ns
    }

    /// Run one timer tick.
    pub fn tick(&mut self) -> TickOutput {
        let requests = self.shared.requests();

        // Uncontrolled stop: drop the block where it stands
        if requests & (request::ABORT | request::HARD_STOP | request::HOMING_HIT) != 0 {
            if self.cursor.take().is_some() {
                // A block frozen by a hold was already at rest
                let moving = requests & request::HOLD == 0 && self.shared.state().allows_motion();
                if moving {
                    self.shared.mark_stopped_mid_block();
                }
                debug!("step engine stopped mid-block");
            }
            self.shared.set_engine_active(false);
            return TickOutput::default();
        }

        // Frozen: no pulses, cursor kept as is
        if requests & request::HOLD != 0 || !self.shared.state().allows_motion() {
            return TickOutput::default();
        }

        if self.cursor.is_none() && !self.load_next() {
            return TickOutput::default();
        }

        let mut output = TickOutput::default();
        let mut displacement = [0i32; AXES];
        let mut finished = false;

        if let Some(cursor) = self.cursor.as_mut() {
            if !cursor.is_decelerating() {
                let completed = cursor.completed();
                let latest = self.ring.with_head(|block| {
                    if completed >= block.trapezoid.decelerate_after {
                        block.exec.decelerating = true;
                    }
                    (block.trapezoid, block.exec.decelerating)
                });
                if let Ok((trapezoid, decelerating)) = latest {
                    cursor.refresh(trapezoid, decelerating);
                }
            }

            cursor.advance_time(self.tick_period_ns, self.minimum_step_rate);

            let level = smoothing_level(
                self.tick_period_ns,
                cursor.interval_ns(),
                self.max_pulses_per_tick,
            );
            output.direction_bits = cursor.direction_bits();
            output.spacing_ns = sub_interval_ns(self.tick_period_ns, level);

            while output.pulses.len() < level as usize && cursor.step_due() {
                let mask = cursor.step_event();
                for (total, delta) in displacement.iter_mut().zip(cursor.displacement(mask)) {
                    *total += delta;
                }
                // Capacity is MAX_PULSES_PER_TICK and level never exceeds it
                let _ = output.pulses.push(mask);
            }
            cursor.cap_lag();
            finished = cursor.is_complete();
        }

        if !output.pulses.is_empty() {
            self.shared.position().add(&displacement);
        }

        if finished {
            self.retire();
        }

        output
    }

    /// Load the head block if there is one.
    fn load_next(&mut self) -> bool {
        match self.ring.start_head() {
            Ok(block) => {
                trace!("loading block of {} step events", block.step_event_count);
                self.cursor = Some(ExecutionCursor::load(&block, self.minimum_step_rate));
                self.shared.set_engine_active(true);
                true
            }
            Err(_) => false,
        }
    }

    /// Retire the finished block and move on to the next one.
    fn retire(&mut self) {
        self.cursor = None;
        if self.ring.complete_head().is_ok() {
            let _ = self.ring.pop_head();
        }
        if !self.load_next() {
            self.shared.set_engine_active(false);
            self.shared.signal_cycle_complete();
            trace!("cycle complete");
        }
    }
}
