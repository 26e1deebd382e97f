//! # stepper-lookahead
//!
//! Look-ahead velocity planning and real-time step generation for
//! multi-axis stepper machines, with embedded-hal 1.0 support.
//!
//! ## Features
//!
//! - **Look-ahead planning**: junction speeds from the cornering angle,
//!   backward/forward passes over a fixed ring of blocks
//! - **Timer-driven execution**: bounded work per tick, Bresenham step
//!   distribution, adaptive multi-pulse smoothing
//! - **System state machine**: idle, run, hold, homing, alarm,
//!   position-lost and check modes with an explicit transition table
//! - **no_std compatible**: fixed capacities, no allocation, no `unsafe`
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use stepper_lookahead::{MotionCore, MotionRequest};
//!
//! let config = stepper_lookahead::load_config("machine.toml")?;
//! let mut core = MotionCore::<3, 18>::new();
//! let (mut controller, mut engine) = core.split(&config)?;
//!
//! // Foreground loop
//! controller.execute_runtime();
//! controller.enqueue(&MotionRequest::new([10.0, 5.0, 0.0], 1200.0))?;
//!
//! // Step timer interrupt
//! let pulses = engine.tick();
//! output.apply(&pulses)?;
//! ```
//!
//! ## Feature Flags
//!
//! - `std` (default): Enables file I/O and TOML parsing
//! - `defmt`: Enables defmt logging for embedded targets

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]
// Allow large error types - necessary for no_std with heapless strings
#![allow(clippy::result_large_err)]

// Logging shims first so every module sees the macros
#[macro_use]
mod fmt;

// Core modules
pub mod config;
pub mod error;
pub mod planner;
pub mod stepper;
pub mod system;

// Re-exports for ergonomic API
pub use config::{validate_config, AxisConfig, JunctionConfig, MachineConfig, StepperConfig};
pub use error::{Error, Result};
pub use planner::{Block, Feed, MotionRequest, Planner};
pub use stepper::{StepOutput, StepperEngine, TickOutput};
pub use system::{LimitTrigger, MachineState, MotionController, MotionCore, SharedState};

// Configuration loading (std only)
#[cfg(feature = "std")]
pub use config::{load_config, parse_config};

/// Axis count of the default machine (X, Y, Z).
pub const DEFAULT_AXES: usize = 3;

/// Block ring capacity of the default machine.
pub const DEFAULT_BUFFER_SIZE: usize = 18;

/// Motion core sized for the default machine.
pub type DefaultMotionCore = MotionCore<DEFAULT_AXES, DEFAULT_BUFFER_SIZE>;
