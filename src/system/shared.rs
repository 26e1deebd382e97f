//! State shared between the foreground loop and the step timer.
//!
//! Every field is an atomic word with a documented writer:
//!
//! | field      | written by                                          |
//! |------------|-----------------------------------------------------|
//! | `state`    | foreground transitions (CAS); limit trigger stores `PositionLost` |
//! | `requests` | any context sets bits; only the foreground clears them |
//! | `engine`   | step engine; foreground clears `STOPPED_MID_BLOCK` while the engine is parked |
//! | `position` | step engine; foreground only while the engine holds no block |
//!
//! Readers get snapshots, never references into live state.

use core::sync::atomic::{fence, AtomicI32, AtomicU32, AtomicU8, Ordering};

use crate::error::StateError;

use super::state::MachineState;

/// Asynchronous request bits, polled by the step timer and the foreground.
pub mod request {
    /// Freeze execution.
    pub const HOLD: u8 = 1 << 0;
    /// Leave feed-hold.
    pub const RESUME: u8 = 1 << 1;
    /// Stop everything and run the reset routine.
    pub const ABORT: u8 = 1 << 2;
    /// Start executing buffered blocks.
    pub const CYCLE_START: u8 = 1 << 3;
    /// Hard limit tripped outside homing.
    pub const HARD_STOP: u8 = 1 << 4;
    /// Homing switch reached.
    pub const HOMING_HIT: u8 = 1 << 5;
}

/// Step engine status bits.
mod engine {
    /// The engine holds a loaded block.
    pub const ACTIVE: u8 = 1 << 0;
    /// The buffer ran dry while running.
    pub const CYCLE_COMPLETE: u8 = 1 << 1;
    /// A moving block was dropped before its last step.
    pub const STOPPED_MID_BLOCK: u8 = 1 << 2;
}

/// Multi-axis step position readable without tearing.
///
/// A sequence counter brackets every update; readers retry while an update
/// is in flight, so a snapshot is always entirely before or after it.
/// Only one context may write at a time.
#[derive(Debug)]
pub struct PositionCell<const AXES: usize> {
    seq: AtomicU32,
    steps: [AtomicI32; AXES],
}

impl<const AXES: usize> PositionCell<AXES> {
    /// Create a cell at the origin.
    pub fn new() -> Self {
        Self {
            seq: AtomicU32::new(0),
            steps: core::array::from_fn(|_| AtomicI32::new(0)),
        }
    }

    /// Consistent snapshot of every axis.
    pub fn load(&self) -> [i32; AXES] {
        loop {
            let before = self.seq.load(Ordering::Acquire);
            if before & 1 == 0 {
                let snapshot = core::array::from_fn(|i| self.steps[i].load(Ordering::Relaxed));
                fence(Ordering::Acquire);
                if self.seq.load(Ordering::Relaxed) == before {
                    return snapshot;
                }
            }
            core::hint::spin_loop();
        }
    }

    /// Overwrite every axis.
    pub(crate) fn store(&self, steps: &[i32; AXES]) {
        self.update(|i, _| steps[i]);
    }

    /// Add a signed step delta to every axis.
    pub(crate) fn add(&self, delta: &[i32; AXES]) {
        self.update(|i, current| current.wrapping_add(delta[i]));
    }

    fn update(&self, f: impl Fn(usize, i32) -> i32) {
        let seq = self.seq.load(Ordering::Relaxed);
        self.seq.store(seq.wrapping_add(1), Ordering::Relaxed);
        fence(Ordering::Release);
        for (i, axis) in self.steps.iter().enumerate() {
            axis.store(f(i, axis.load(Ordering::Relaxed)), Ordering::Relaxed);
        }
        self.seq.store(seq.wrapping_add(2), Ordering::Release);
    }
}

impl<const AXES: usize> Default for PositionCell<AXES> {
    fn default() -> Self {
        Self::new()
    }
}

/// Machine state, requests, engine status and position.
#[derive(Debug)]
pub struct SharedState<const AXES: usize> {
    state: AtomicU8,
    requests: AtomicU8,
    engine: AtomicU8,
    position: PositionCell<AXES>,
}

impl<const AXES: usize> SharedState<AXES> {
    /// Cold-start state: POSITION_LOST with an abort pending, so the first
    /// foreground pass runs the reset routine.
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(MachineState::default() as u8),
            requests: AtomicU8::new(request::ABORT),
            engine: AtomicU8::new(0),
            position: PositionCell::new(),
        }
    }

    /// Current machine state.
    #[inline]
    pub fn state(&self) -> MachineState {
        // Only valid discriminants are ever stored
        MachineState::from_u8(self.state.load(Ordering::Acquire)).unwrap_or(MachineState::Alarm)
    }

    /// Move from `from` to `to` if the machine is still in `from`.
    pub(crate) fn transition(&self, from: MachineState, to: MachineState) -> Result<(), StateError> {
        if !from.can_transition_to(to) {
            return Err(StateError::InvalidTransition { from, to });
        }
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|actual| StateError::InvalidTransition {
                from: MachineState::from_u8(actual).unwrap_or(MachineState::Alarm),
                to,
            })
    }

    /// Move to `to` from whatever the current state is, if allowed.
    pub(crate) fn transition_to(&self, to: MachineState) -> Result<MachineState, StateError> {
        loop {
            let from = self.state();
            match self.transition(from, to) {
                Ok(()) => return Ok(from),
                Err(StateError::InvalidTransition { from: actual, .. }) if actual != from => {
                    continue
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Pending request bits.
    #[inline]
    pub(crate) fn requests(&self) -> u8 {
        self.requests.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn raise(&self, bits: u8) {
        self.requests.fetch_or(bits, Ordering::AcqRel);
    }

    #[inline]
    pub(crate) fn clear(&self, bits: u8) {
        self.requests.fetch_and(!bits, Ordering::AcqRel);
    }

    /// Ask for a feed-hold. Idempotent.
    pub fn request_hold(&self) {
        self.raise(request::HOLD);
    }

    /// Ask to leave feed-hold. Idempotent.
    pub fn request_resume(&self) {
        self.raise(request::RESUME);
    }

    /// Ask for an abort and reset. Idempotent.
    pub fn request_abort(&self) {
        self.raise(request::ABORT);
    }

    /// Ask to start executing buffered blocks. Idempotent.
    pub fn request_cycle_start(&self) {
        self.raise(request::CYCLE_START);
    }

    /// Limit switch or hard stop input.
    ///
    /// Outside homing this halts pulse emission on the next timer tick and
    /// marks the position as lost; the buffer is left for inspection until
    /// an abort. During homing it ends the homing move instead. In ALARM
    /// only the stop is requested; the state stays until reset.
    pub fn trip_limit(&self) {
        if self.state() == MachineState::Homing {
            self.raise(request::HOMING_HIT);
            return;
        }

        // Engine polls the request before it looks at the state
        self.raise(request::HARD_STOP);
        loop {
            let state = self.state();
            if matches!(state, MachineState::PositionLost | MachineState::Alarm) {
                break;
            }
            if self.transition(state, MachineState::PositionLost).is_ok() {
                break;
            }
        }
    }

    /// Whether the engine currently holds a loaded block.
    #[inline]
    pub fn engine_active(&self) -> bool {
        self.engine.load(Ordering::Acquire) & engine::ACTIVE != 0
    }

    #[inline]
    pub(crate) fn set_engine_active(&self, active: bool) {
        if active {
            self.engine.fetch_or(engine::ACTIVE, Ordering::AcqRel);
        } else {
            self.engine.fetch_and(!engine::ACTIVE, Ordering::AcqRel);
        }
    }

    #[inline]
    pub(crate) fn signal_cycle_complete(&self) {
        self.engine.fetch_or(engine::CYCLE_COMPLETE, Ordering::AcqRel);
    }

    #[inline]
    pub(crate) fn mark_stopped_mid_block(&self) {
        self.engine.fetch_or(engine::STOPPED_MID_BLOCK, Ordering::AcqRel);
    }

    /// Consume the mid-block stop mark. Only while the engine is parked.
    #[inline]
    pub(crate) fn take_stopped_mid_block(&self) -> bool {
        self.engine.fetch_and(!engine::STOPPED_MID_BLOCK, Ordering::AcqRel)
            & engine::STOPPED_MID_BLOCK
            != 0
    }

    /// Consume the cycle-complete signal.
    #[inline]
    pub(crate) fn take_cycle_complete(&self) -> bool {
        self.engine.fetch_and(!engine::CYCLE_COMPLETE, Ordering::AcqRel) & engine::CYCLE_COMPLETE
            != 0
    }

    /// Machine position snapshot in steps.
    #[inline]
    pub fn position_steps(&self) -> [i32; AXES] {
        self.position.load()
    }

    #[inline]
    pub(crate) fn position(&self) -> &PositionCell<AXES> {
        &self.position
    }
}

impl<const AXES: usize> Default for SharedState<AXES> {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle given to the limit switch interrupt.
#[derive(Debug, Clone, Copy)]
pub struct LimitTrigger<'a, const AXES: usize> {
    shared: &'a SharedState<AXES>,
}

impl<'a, const AXES: usize> LimitTrigger<'a, AXES> {
    /// Create a trigger for the given shared state.
    pub fn new(shared: &'a SharedState<AXES>) -> Self {
        Self { shared }
    }

    /// Report a tripped limit switch.
    pub fn trip(&self) {
        warn!("limit switch tripped");
        self.shared.trip_limit();
    }
}
