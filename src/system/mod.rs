//! System state machine and the foreground controller.
//!
//! - [`MachineState`]: the machine's mode and its legal transitions
//! - [`SharedState`]: atomics shared with the step timer (state, requests,
//!   engine status, machine position)
//! - [`MotionController`] / [`MotionCore`]: the surface the command layer uses

mod controller;
mod shared;
mod state;

pub use controller::{MotionController, MotionCore};
pub use shared::{request, LimitTrigger, PositionCell, SharedState};
pub use state::MachineState;
