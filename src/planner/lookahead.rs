//! Look-ahead velocity planner.
//!
//! Every accepted move becomes a [`Block`] at the ring tail. After each
//! push the planner runs two passes over the resident blocks:
//!
//! 1. **Backward**, newest to oldest: each block's maximum entry speed is
//!    the lower of its junction limit and the speed from which it can still
//!    slow down to the next block's limit over its own length. The pass
//!    stops at the first block whose limit did not change.
//! 2. **Forward**, from the oldest changed block: each entry speed is the
//!    lower of its maximum and what the previous block can accelerate to.
//!    The previous block's trapezoid is rebuilt for its new exit speed.
//!
//! The head block's entry speed is never touched. Once the engine latches
//! a block's deceleration its exit speed is frozen too and the next block
//! must enter at exactly that speed.

use libm::sqrtf;

use crate::config::MachineConstraints;
use crate::error::{EnqueueError, PlannerError, Result};

use super::block::{exceeds, Block};
use super::buffer::{BlockRing, Producer};
use super::request::MotionRequest;

type Ring<const AXES: usize, const N: usize> = BlockRing<AXES, N>;

/// A validated move, not yet in the buffer.
struct Prepared<const AXES: usize> {
    block: Block<AXES>,
    target: [i32; AXES],
    unit: [f32; AXES],
}

/// Velocity planner, owning the producer side of the block ring.
pub struct Planner<'a, const AXES: usize, const N: usize> {
    ring: Producer<'a, AXES, N>,
    constraints: MachineConstraints<AXES>,
    /// Planned position in steps: the end of the newest accepted move.
    position: [i32; AXES],
    previous_unit: [f32; AXES],
    previous_nominal_sqr: f32,
}

impl<'a, const AXES: usize, const N: usize> Planner<'a, AXES, N> {
    /// Create a planner at the origin over an empty ring.
    pub fn new(ring: Producer<'a, AXES, N>, constraints: MachineConstraints<AXES>) -> Self {
        Self {
            ring,
            constraints,
            position: [0; AXES],
            previous_unit: [0.0; AXES],
            previous_nominal_sqr: 0.0,
        }
    }

    /// Machine limits the planner works with.
    #[inline]
    pub fn constraints(&self) -> &MachineConstraints<AXES> {
        &self.constraints
    }

    /// Planned position in steps.
    #[inline]
    pub fn position(&self) -> [i32; AXES] {
        self.position
    }

    /// Re-seed the planned position, after a reset or homing.
    pub fn sync_position(&mut self, steps: [i32; AXES]) {
        self.position = steps;
    }

    /// Number of buffered blocks.
    #[inline]
    pub fn count(&self) -> usize {
        self.ring.count()
    }

    /// Whether no block is buffered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Whether the buffer is at capacity.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.ring.is_full()
    }

    /// Copies of the buffered blocks, oldest first.
    pub fn blocks(&self) -> heapless::Vec<Block<AXES>, N> {
        let mut blocks = heapless::Vec::new();
        let tail = self.ring.tail_index();
        let mut index = self.ring.head_index();
        while index != tail {
            // Occupancy never exceeds N
            let _ = blocks.push(self.ring.get(index));
            index = Ring::<AXES, N>::next_index(index);
        }
        blocks
    }

    /// Accept a move, append it and replan the buffer.
    ///
    /// # Errors
    ///
    /// - `Enqueue` errors reject the move and leave every buffered block,
    ///   the planned position and the junction history untouched.
    /// - `Planner` errors mean the move was accepted but the resulting plan
    ///   broke a speed invariant; the caller must stop dispatching.
    pub fn plan_line(&mut self, request: &MotionRequest<AXES>) -> Result<()> {
        if self.ring.is_full() {
            return Err(EnqueueError::BufferFull.into());
        }

        let Prepared {
            mut block,
            target,
            unit,
        } = self.prepare(request)?;

        let minimum_sqr = self.constraints.minimum_speed_sqr;
        block.junction_speed_sqr = self.junction_speed_sqr(&unit, &block);
        block.max_entry_speed_sqr = block
            .junction_speed_sqr
            .min(block.decelerable_entry_sqr(minimum_sqr));
        // Enter no faster than the previous block can currently end; the
        // passes below raise this once the junction is planned.
        block.entry_speed_sqr = block.max_entry_speed_sqr.min(minimum_sqr);
        block.recalculate = true;
        block.plan_exit(minimum_sqr);

        self.ring
            .push(block)
            .map_err(|_| EnqueueError::BufferFull)?;

        self.position = target;
        self.previous_unit = unit;
        self.previous_nominal_sqr = block.nominal_speed_sqr;

        trace!(
            "planned block: {} steps over {} mm",
            block.step_event_count,
            block.millimeters
        );

        self.recalculate()?;
        Ok(())
    }

    /// Validate a move and advance the planned position without buffering
    /// anything. Used in check mode.
    pub fn check_line(&mut self, request: &MotionRequest<AXES>) -> core::result::Result<(), EnqueueError> {
        let prepared = self.prepare(request)?;
        self.position = prepared.target;
        Ok(())
    }

    /// Drop every buffered block and forget the junction history.
    ///
    /// The step engine must not hold a block.
    pub fn reset(&mut self) {
        self.ring.flush();
        self.previous_unit = [0.0; AXES];
        self.previous_nominal_sqr = 0.0;
    }

    /// Run the backward and forward passes, then check the plan.
    ///
    /// Running it again without a buffer change leaves every block as is.
    pub fn recalculate(&mut self) -> core::result::Result<(), PlannerError> {
        let head = self.ring.head_index();
        let tail = self.ring.tail_index();
        if head == tail {
            return Ok(());
        }
        let last = Ring::<AXES, N>::prev_index(tail);
        let minimum_sqr = self.constraints.minimum_speed_sqr;

        let mut first_changed = None;
        let mut next_max_sqr = minimum_sqr;
        let mut index = last;
        while index != head {
            let converged = self.ring.with(index, |block| {
                let max_entry = block
                    .junction_speed_sqr
                    .min(block.decelerable_entry_sqr(next_max_sqr));
                if max_entry == block.max_entry_speed_sqr && !block.recalculate {
                    return true;
                }
                block.max_entry_speed_sqr = max_entry;
                block.recalculate = true;
                next_max_sqr = max_entry;
                false
            });
            if converged {
                break;
            }
            first_changed = Some(index);
            index = Ring::<AXES, N>::prev_index(index);
        }

        if let Some(start) = first_changed {
            let mut index = start;
            while index != tail {
                let previous = Ring::<AXES, N>::prev_index(index);
                let slot = Ring::<AXES, N>::slot(index);
                self.ring
                    .with_pair(previous, index, |prev, current| forward_step(prev, current, slot))?;
                index = Ring::<AXES, N>::next_index(index);
            }
        }

        // The newest block always plans to stop
        self.ring.with(last, |block| {
            if !block.exec.decelerating {
                block.plan_exit(minimum_sqr);
            }
            block.recalculate = false;
        });

        self.verify()
    }

    /// Check every buffered block and the speed continuity between them.
    pub fn verify(&self) -> core::result::Result<(), PlannerError> {
        let tail = self.ring.tail_index();
        let mut index = self.ring.head_index();
        let mut previous_exit_sqr = None;
        while index != tail {
            let slot = Ring::<AXES, N>::slot(index);
            let block = self.ring.get(index);
            index = Ring::<AXES, N>::next_index(index);

            if block.exec.complete {
                // Retired while we were looking
                previous_exit_sqr = None;
                continue;
            }
            block.check(slot)?;

            if let Some(exit_sqr) = previous_exit_sqr {
                if exceeds(block.entry_speed_sqr, exit_sqr) || exceeds(exit_sqr, block.entry_speed_sqr) {
                    return Err(PlannerError::InvariantViolation {
                        slot,
                        speed_sqr: block.entry_speed_sqr,
                        limit_sqr: exit_sqr,
                    });
                }
            }
            previous_exit_sqr = Some(block.exit_speed_sqr);
        }
        Ok(())
    }

    /// Turn a request into a block with step counts, length, nominal speed
    /// and acceleration. Nothing is mutated.
    fn prepare(&self, request: &MotionRequest<AXES>) -> core::result::Result<Prepared<AXES>, EnqueueError> {
        let target = self
            .constraints
            .mm_to_steps(&request.target)
            .ok_or(EnqueueError::TargetOutOfRange)?;

        let mut block = Block::empty();
        let mut delta_mm = [0.0f32; AXES];
        for (i, axis) in self.constraints.axes.iter().enumerate() {
            let delta = target[i]
                .checked_sub(self.position[i])
                .ok_or(EnqueueError::TargetOutOfRange)?;
            block.steps[i] = delta.unsigned_abs();
            if delta < 0 {
                block.direction_bits |= 1 << i;
            }
            block.step_event_count = block.step_event_count.max(block.steps[i]);
            delta_mm[i] = delta as f32 / axis.steps_per_mm.value();
        }
        if block.step_event_count == 0 {
            return Err(EnqueueError::DegenerateMove);
        }

        let millimeters = sqrtf(delta_mm.iter().map(|d| d * d).sum());
        if !(millimeters > 0.0 && millimeters.is_finite()) {
            return Err(EnqueueError::DegenerateMove);
        }

        let requested = request
            .feed
            .speed(millimeters)
            .ok_or(EnqueueError::InvalidFeedRate(request.feed.value()))?;

        // Each axis caps the path speed and acceleration by its share of
        // the direction vector.
        let inverse_mm = 1.0 / millimeters;
        let mut unit = [0.0f32; AXES];
        let mut nominal = requested;
        let mut acceleration = f32::INFINITY;
        for (i, axis) in self.constraints.axes.iter().enumerate() {
            unit[i] = delta_mm[i] * inverse_mm;
            let share = unit[i].abs();
            if share > 0.0 {
                nominal = nominal.min(axis.max_rate / share);
                acceleration = acceleration.min(axis.acceleration / share);
            }
        }

        block.millimeters = millimeters;
        block.acceleration = acceleration;
        // Every block can run at least at the speed a junction may fall to
        block.nominal_speed_sqr = (nominal * nominal).max(self.constraints.minimum_speed_sqr);
        block.nominal_length = block.nominal_speed_sqr <= 2.0 * acceleration * millimeters;

        Ok(Prepared {
            block,
            target,
            unit,
        })
    }

    /// Squared cornering limit between the newest buffered block and a new
    /// block heading along `unit`.
    ///
    /// The corner is treated as an arc that deviates at most
    /// `junction_deviation` from the sharp corner; the limit is the speed at
    /// which centripetal acceleration on that arc equals the block's
    /// acceleration.
    fn junction_speed_sqr(&self, unit: &[f32; AXES], block: &Block<AXES>) -> f32 {
        let c = &self.constraints;
        let mut limit_sqr = c.minimum_speed_sqr;

        if !self.ring.is_empty() && self.previous_nominal_sqr > 0.0 {
            let cos_theta: f32 = -self
                .previous_unit
                .iter()
                .zip(unit.iter())
                .map(|(a, b)| a * b)
                .sum::<f32>();

            // Near reversals keep the minimum speed
            if cos_theta < c.straight_cos {
                limit_sqr = self.previous_nominal_sqr.min(block.nominal_speed_sqr);
                // Near-straight junctions are not limited by cornering
                if cos_theta > -c.straight_cos {
                    let sin_half = sqrtf(0.5 * (1.0 - cos_theta));
                    let cornering_sqr =
                        block.acceleration * c.junction_deviation * sin_half / (1.0 - sin_half);
                    limit_sqr = limit_sqr.min(cornering_sqr);
                }
            }
        }

        limit_sqr
            .max(c.minimum_speed_sqr)
            .min(block.nominal_speed_sqr)
    }
}

/// Forward pass over one junction: plan `current`'s entry and rebuild
/// `previous`'s trapezoid for it.
fn forward_step<const AXES: usize>(
    previous: &mut Block<AXES>,
    current: &mut Block<AXES>,
    slot: usize,
) -> core::result::Result<(), PlannerError> {
    if current.exec.busy {
        return Ok(());
    }

    if previous.exec.decelerating {
        let locked_sqr = previous.exit_speed_sqr;
        if exceeds(locked_sqr, current.max_entry_speed_sqr) {
            return Err(PlannerError::InvariantViolation {
                slot,
                speed_sqr: locked_sqr,
                limit_sqr: current.max_entry_speed_sqr,
            });
        }
        current.entry_speed_sqr = locked_sqr.min(current.max_entry_speed_sqr);
    } else {
        current.entry_speed_sqr = current
            .max_entry_speed_sqr
            .min(previous.reachable_exit_sqr());
        previous.plan_exit(current.entry_speed_sqr);
    }

    current.recalculate = false;
    Ok(())
}
