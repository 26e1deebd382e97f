//! Configuration module for stepper-lookahead.
//!
//! Axis, junction and step timer settings, supplied once at initialization
//! from TOML files (with `std` feature) or built in code.

mod axis;
mod machine;
mod mechanical;
pub mod units;
#[cfg(feature = "std")]
mod loader;
mod validation;

pub use axis::AxisConfig;
pub use machine::{JunctionConfig, MachineConfig, StepperConfig, MAX_AXES};
pub use mechanical::{AxisConstraints, MachineConstraints};
pub use validation::validate_config;

#[cfg(feature = "std")]
pub use loader::{load_config, parse_config};

// Re-export unit types at config level
pub use units::{Millimeters, MmPerMin, MmPerSec, MmPerSec2, Steps, StepsPerMm};
