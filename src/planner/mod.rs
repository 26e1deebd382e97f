//! Block buffer and look-ahead velocity planning.
//!
//! - [`BlockRing`]: fixed-capacity ring split into planner and engine handles
//! - [`Planner`]: turns motion requests into blocks and keeps their speed
//!   profiles consistent across junctions
//! - [`Block`] / [`Trapezoid`]: one planned move and its step-domain profile

mod block;
mod buffer;
mod lookahead;
mod request;

pub use block::{Block, ExecFlags, Phase, Trapezoid};
pub use buffer::{BlockRing, Consumer, Producer};
pub use lookahead::Planner;
pub use request::{Feed, MotionRequest};
