//! Foreground side of the motion core.
//!
//! [`MotionController`] is what the command layer talks to: it enqueues
//! moves, polls asynchronous requests and runs the reset routine.
//! [`MotionCore`] owns the storage both execution contexts share and hands
//! out the controller and the step engine.

use crate::config::{MachineConfig, MachineConstraints};
use crate::error::{EnqueueError, Error, Result, StateError};
use crate::planner::{Block, BlockRing, MotionRequest, Planner};
use crate::stepper::StepperEngine;

use super::shared::{request, LimitTrigger, SharedState};
use super::state::MachineState;

/// Storage shared by the foreground loop and the step timer.
///
/// Typically a `static` on embedded targets; split once at start-up.
pub struct MotionCore<const AXES: usize, const N: usize> {
    ring: BlockRing<AXES, N>,
    shared: SharedState<AXES>,
}

impl<const AXES: usize, const N: usize> MotionCore<AXES, N> {
    /// Cold-start storage: empty ring, POSITION_LOST, reset pending.
    pub fn new() -> Self {
        Self {
            ring: BlockRing::new(),
            shared: SharedState::new(),
        }
    }

    /// Shared state, for limit switch wiring and status reads.
    pub fn shared(&self) -> &SharedState<AXES> {
        &self.shared
    }

    /// Validate `config` and split into the foreground controller and the
    /// step engine.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if validation fails or the axis count
    /// differs from `AXES`.
    pub fn split(
        &mut self,
        config: &MachineConfig,
    ) -> Result<(MotionController<'_, AXES, N>, StepperEngine<'_, AXES, N>)> {
        let constraints = MachineConstraints::from_config(config)?;
        let (producer, consumer) = self.ring.split();
        let shared = &self.shared;

        let controller = MotionController::new(Planner::new(producer, constraints), shared);
        let engine = StepperEngine::new(consumer, shared, &constraints);
        Ok((controller, engine))
    }
}

impl<const AXES: usize, const N: usize> Default for MotionCore<AXES, N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Foreground facade over the planner and the shared machine state.
pub struct MotionController<'a, const AXES: usize, const N: usize> {
    planner: Planner<'a, AXES, N>,
    shared: &'a SharedState<AXES>,
    /// Machine position matches the physical axes.
    position_trusted: bool,
}

impl<'a, const AXES: usize, const N: usize> MotionController<'a, AXES, N> {
    /// Create a controller. The position is untrusted until homed or set.
    pub fn new(planner: Planner<'a, AXES, N>, shared: &'a SharedState<AXES>) -> Self {
        Self {
            planner,
            shared,
            position_trusted: false,
        }
    }

    /// Accept a move.
    ///
    /// In CHECK mode the move is validated and tracked but never executed.
    /// A planner fault after acceptance raises ALARM; the buffer is kept for
    /// inspection.
    ///
    /// # Errors
    ///
    /// - `BufferFull`, `DegenerateMove`, `InvalidFeedRate`: rejected, nothing
    ///   changed, the caller may retry.
    /// - `Locked`: dispatch is halted (ALARM, POSITION_LOST, reset pending).
    pub fn enqueue(&mut self, motion: &MotionRequest<AXES>) -> core::result::Result<(), EnqueueError> {
        let state = self.shared.state();
        if !state.accepts_requests() || self.shared.requests() & request::ABORT != 0 {
            return Err(EnqueueError::Locked(state));
        }

        if state == MachineState::Check {
            return self.planner.check_line(motion);
        }

        match self.planner.plan_line(motion) {
            Ok(()) => {}
            Err(Error::Enqueue(rejected)) => return Err(rejected),
            Err(fault) => {
                error!("planner fault: {}", fault);
                self.raise_alarm();
                return Ok(());
            }
        }

        if state == MachineState::Idle && self.planner.constraints().auto_start {
            // A concurrent limit trip may have moved us out of IDLE
            let _ = self.shared.transition(MachineState::Idle, MachineState::Run);
        }
        Ok(())
    }

    /// Poll pending requests and act on them, highest priority first.
    ///
    /// Call from the foreground loop between commands. Returns the state
    /// after processing.
    pub fn execute_runtime(&mut self) -> MachineState {
        let requests = self.shared.requests();

        if requests & request::ABORT != 0 {
            // Retried on the next poll until the engine has parked
            let _ = self.reset();
            return self.shared.state();
        }

        if requests & request::HARD_STOP != 0 {
            // Stays pending until an abort; the engine stays parked
            self.position_trusted = false;
            let state = self.shared.state();
            if !matches!(state, MachineState::PositionLost | MachineState::Alarm) {
                let _ = self.shared.transition(state, MachineState::PositionLost);
            }
            return self.shared.state();
        }

        if requests & request::HOMING_HIT != 0 && !self.shared.engine_active() {
            debug!("homing switch reached, dropping remaining moves");
            self.planner.reset();
            self.planner.sync_position(self.shared.position_steps());
            self.shared.clear(request::HOMING_HIT);
        }

        if requests & request::HOLD != 0 {
            if self.shared.state() == MachineState::Run {
                let _ = self.shared.transition(MachineState::Run, MachineState::Hold);
                debug!("feed hold");
            }
            self.shared.clear(request::HOLD);
        }

        if requests & (request::RESUME | request::CYCLE_START) != 0 {
            let pending = !self.planner.is_empty() || self.shared.engine_active();
            match self.shared.state() {
                MachineState::Hold => {
                    let next = if pending {
                        MachineState::Run
                    } else {
                        MachineState::Idle
                    };
                    let _ = self.shared.transition(MachineState::Hold, next);
                }
                MachineState::Idle if pending && requests & request::CYCLE_START != 0 => {
                    let _ = self.shared.transition(MachineState::Idle, MachineState::Run);
                }
                _ => {}
            }
            self.shared.clear(request::RESUME | request::CYCLE_START);
        }

        if self.shared.take_cycle_complete()
            && self.shared.state() == MachineState::Run
            && self.planner.is_empty()
        {
            let _ = self.shared.transition(MachineState::Run, MachineState::Idle);
        }

        self.shared.state()
    }

    /// Abort motion and bring planner and machine position back in step.
    ///
    /// Flushes the buffer, forgets the junction history, re-seeds the
    /// planner from the machine position and settles in IDLE, or in
    /// POSITION_LOST when the position is no longer trusted and homing is
    /// required.
    ///
    /// # Errors
    ///
    /// `StateError::Busy` while the step engine still holds a block; the
    /// abort request stays raised and the engine parks on its next tick.
    pub fn reset(&mut self) -> core::result::Result<MachineState, StateError> {
        self.shared.request_abort();
        if self.shared.engine_active() {
            return Err(StateError::Busy);
        }
        let observed = self.shared.requests();

        let state = self.shared.state();
        match state {
            // Homing unfinished, faulted, or never established
            MachineState::Homing | MachineState::Alarm | MachineState::PositionLost => {
                self.position_trusted = false
            }
            MachineState::Idle | MachineState::Run | MachineState::Hold | MachineState::Check => {}
        }
        // Steps skipped without deceleration
        if self.shared.take_stopped_mid_block() || observed & request::HARD_STOP != 0 {
            self.position_trusted = false;
        }

        self.planner.reset();
        self.planner.sync_position(self.shared.position_steps());
        let _ = self.shared.take_cycle_complete();

        if state == MachineState::Alarm {
            let _ = self
                .shared
                .transition(MachineState::Alarm, MachineState::PositionLost);
        }
        let next = if !self.position_trusted && self.planner.constraints().homing_required {
            MachineState::PositionLost
        } else {
            MachineState::Idle
        };
        if self.shared.state() != next {
            self.shared.transition_to(next)?;
        }

        // Last, so the engine stays parked until the buffer is consistent
        self.shared.clear(observed);
        info!("reset: {}", next);
        Ok(next)
    }

    /// Start a homing cycle. Homing moves are then enqueued as usual and a
    /// limit trip ends them instead of faulting.
    pub fn begin_homing(&mut self) -> core::result::Result<(), StateError> {
        self.ensure_parked()?;
        let state = self.shared.state();
        if !matches!(state, MachineState::Idle | MachineState::PositionLost) {
            return Err(StateError::InvalidTransition {
                from: state,
                to: MachineState::Homing,
            });
        }
        self.shared.transition(state, MachineState::Homing)
    }

    /// End a homing cycle with the machine at `position` (mm).
    pub fn finish_homing(&mut self, position: [f32; AXES]) -> core::result::Result<(), StateError> {
        let state = self.shared.state();
        if state != MachineState::Homing {
            return Err(StateError::InvalidTransition {
                from: state,
                to: MachineState::Idle,
            });
        }
        if self.shared.engine_active() {
            return Err(StateError::Busy);
        }
        let steps = self.to_steps(&position)?;
        self.planner.reset();
        self.establish(steps);
        self.shared.clear(request::HOMING_HIT);
        self.shared.transition(MachineState::Homing, MachineState::Idle)
    }

    /// Declare the machine to be at `position` (mm), making it trusted.
    pub fn set_position(&mut self, position: [f32; AXES]) -> core::result::Result<(), StateError> {
        self.ensure_parked()?;
        let steps = self.to_steps(&position)?;
        let state = self.shared.state();
        match state {
            MachineState::Idle => {}
            MachineState::PositionLost => {
                self.shared.transition(state, MachineState::Idle)?;
            }
            _ => {
                return Err(StateError::InvalidTransition {
                    from: state,
                    to: MachineState::Idle,
                })
            }
        }
        self.establish(steps);
        Ok(())
    }

    /// Enter dry-run mode.
    pub fn enter_check_mode(&mut self) -> core::result::Result<(), StateError> {
        self.ensure_parked()?;
        self.shared.transition(MachineState::Idle, MachineState::Check)
    }

    /// Leave dry-run mode. Runs the reset routine so the planner forgets
    /// the positions it tracked while checking.
    pub fn exit_check_mode(&mut self) -> core::result::Result<MachineState, StateError> {
        let state = self.shared.state();
        if state != MachineState::Check {
            return Err(StateError::InvalidTransition {
                from: state,
                to: MachineState::Idle,
            });
        }
        self.reset()
    }

    /// Current machine state.
    #[inline]
    pub fn current_state(&self) -> MachineState {
        self.shared.state()
    }

    /// Machine position in millimeters.
    pub fn current_position(&self) -> [f64; AXES] {
        self.planner
            .constraints()
            .steps_to_mm(&self.shared.position_steps())
    }

    /// Machine position in steps.
    #[inline]
    pub fn current_position_steps(&self) -> [i32; AXES] {
        self.shared.position_steps()
    }

    /// Whether the machine position is trusted.
    #[inline]
    pub fn position_trusted(&self) -> bool {
        self.position_trusted
    }

    /// True when the buffer is empty and the engine holds no block.
    #[inline]
    pub fn cycle_complete(&self) -> bool {
        self.planner.is_empty() && !self.shared.engine_active()
    }

    /// Number of buffered blocks.
    #[inline]
    pub fn buffered(&self) -> usize {
        self.planner.count()
    }

    /// Copies of the buffered blocks, oldest first.
    pub fn blocks(&self) -> heapless::Vec<Block<AXES>, N> {
        self.planner.blocks()
    }

    /// Ask for a feed-hold.
    pub fn request_hold(&self) {
        self.shared.request_hold();
    }

    /// Ask to leave feed-hold.
    pub fn request_resume(&self) {
        self.shared.request_resume();
    }

    /// Ask for an abort; the next [`execute_runtime`](Self::execute_runtime)
    /// runs the reset routine.
    pub fn request_abort(&self) {
        self.shared.request_abort();
    }

    /// Ask to start executing buffered blocks.
    pub fn request_cycle_start(&self) {
        self.shared.request_cycle_start();
    }

    /// Limit switch handle for the input interrupt.
    pub fn limit_trigger(&self) -> LimitTrigger<'a, AXES> {
        LimitTrigger::new(self.shared)
    }

    fn ensure_parked(&self) -> core::result::Result<(), StateError> {
        let blocked = request::ABORT | request::HARD_STOP | request::HOMING_HIT;
        if self.shared.engine_active()
            || !self.planner.is_empty()
            || self.shared.requests() & blocked != 0
        {
            return Err(StateError::Busy);
        }
        Ok(())
    }

    fn to_steps(&self, position: &[f32; AXES]) -> core::result::Result<[i32; AXES], StateError> {
        self.planner
            .constraints()
            .mm_to_steps(position)
            .ok_or(StateError::InvalidPosition)
    }

    /// Store a known machine position. The engine must hold no block.
    fn establish(&mut self, steps: [i32; AXES]) {
        self.shared.position().store(&steps);
        self.planner.sync_position(steps);
        let _ = self.shared.take_stopped_mid_block();
        self.position_trusted = true;
    }

    fn raise_alarm(&mut self) {
        if let Ok(from) = self.shared.transition_to(MachineState::Alarm) {
            warn!("alarm raised in {}", from);
        }
    }
}
