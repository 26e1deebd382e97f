//! Real-time step execution.
//!
//! - [`StepperEngine`]: consumes the ring head from the step timer
//! - [`ExecutionCursor`]: Bresenham and trapezoid state of the running block
//! - [`StepOutput`]: STEP/DIR pin driver over embedded-hal

mod cursor;
mod engine;
mod output;
mod smoothing;

pub use cursor::ExecutionCursor;
pub use engine::{StepperEngine, TickOutput};
pub use output::StepOutput;
pub use smoothing::{smoothing_level, sub_interval_ns, MAX_PULSES_PER_TICK};
