//! Error types for stepper-lookahead.
//!
//! Synchronous rejections surface at the call boundary; fatal and hardware
//! faults surface through the machine state instead.

use core::fmt;

use crate::system::MachineState;

/// Result type alias using the library's Error type.
pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for all stepper-lookahead operations.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Configuration parsing or validation error
    Config(ConfigError),
    /// Motion request rejected before entering the buffer
    Enqueue(EnqueueError),
    /// Block buffer operation error
    Buffer(BufferError),
    /// Fatal planner invariant violation
    Planner(PlannerError),
    /// Foreground command issued in the wrong machine state
    State(StateError),
    /// Step/direction output error
    Output(OutputError),
}

/// Configuration-related errors.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Failed to parse TOML configuration
    ParseError(heapless::String<128>),
    /// No axis configured
    NoAxes,
    /// Configured axis count does not match the compiled axis count
    AxisCountMismatch {
        /// Axis count the machine was built for
        expected: usize,
        /// Axis count found in the configuration
        found: usize,
    },
    /// Steps per millimeter must be > 0
    InvalidStepsPerMm {
        /// Axis index
        axis: usize,
        /// Offending value
        value: f32,
    },
    /// Maximum rate must be > 0
    InvalidMaxRate {
        /// Axis index
        axis: usize,
        /// Offending value
        value: f32,
    },
    /// Acceleration must be > 0
    InvalidAcceleration {
        /// Axis index
        axis: usize,
        /// Offending value
        value: f32,
    },
    /// Axis maximum rate needs more step events than the timer can emit
    StepRateTooHigh {
        /// Axis index
        axis: usize,
        /// Required step events per second
        required: f32,
        /// Step events per second the timer can emit
        available: f32,
    },
    /// Junction deviation must be >= 0
    InvalidJunctionDeviation(f32),
    /// Minimum junction speed must be >= 0
    InvalidMinimumSpeed(f32),
    /// Junction cosine guard must lie in (0, 1)
    InvalidStraightCos(f32),
    /// Timer cadence must be > 0
    InvalidTickRate(u32),
    /// Pulses per tick must be 1-8
    InvalidPulsesPerTick(u8),
    /// Minimum step rate must be > 0
    InvalidMinimumStepRate(f32),
    /// Step pulse does not fit inside one timer tick
    PulseWidthTooLong {
        /// Configured pulse width
        pulse_width_ns: u32,
        /// Length of one timer tick
        tick_period_ns: u32,
    },
    /// File I/O error (std only)
    #[cfg(feature = "std")]
    IoError(heapless::String<128>),
}

/// Reasons a motion request is rejected by `enqueue`.
///
/// No state is mutated when one of these is returned.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EnqueueError {
    /// Every buffer slot is occupied
    BufferFull,
    /// The move has no length or no step on any axis
    DegenerateMove,
    /// Feed rate is zero, negative or not finite
    InvalidFeedRate(f32),
    /// Target is not finite or lies outside the step range of an axis
    TargetOutOfRange,
    /// Motion dispatch is halted in this state
    Locked(MachineState),
}

/// Block buffer errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BufferError {
    /// Ring is at capacity
    Full,
    /// Ring holds no block
    Empty,
    /// Head block has not finished executing
    NotComplete,
}

/// Fatal planner conditions. Any of these forces ALARM.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PlannerError {
    /// A planned speed broke the entry <= max-entry <= nominal ordering,
    /// or would demand more deceleration than the block allows
    InvariantViolation {
        /// Slot index of the offending block
        slot: usize,
        /// Offending squared speed (mm²/s²)
        speed_sqr: f32,
        /// Squared limit it exceeded (mm²/s²)
        limit_sqr: f32,
    },
    /// A computed speed was negative, NaN or infinite
    NonFinite {
        /// Slot index of the offending block
        slot: usize,
    },
}

/// Foreground command errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StateError {
    /// The transition is not part of the state machine
    InvalidTransition {
        /// State at the time of the request
        from: MachineState,
        /// Requested state
        to: MachineState,
    },
    /// Motion is still buffered or executing
    Busy,
    /// Position is not finite or lies outside the step range of an axis
    InvalidPosition,
}

/// Step/direction output errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OutputError {
    /// Pin operation failed
    Pin,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(e) => write!(f, "Configuration error: {}", e),
            Error::Enqueue(e) => write!(f, "Enqueue error: {}", e),
            Error::Buffer(e) => write!(f, "Buffer error: {}", e),
            Error::Planner(e) => write!(f, "Planner error: {}", e),
            Error::State(e) => write!(f, "State error: {}", e),
            Error::Output(e) => write!(f, "Output error: {}", e),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            ConfigError::NoAxes => write!(f, "At least one axis must be configured"),
            ConfigError::AxisCountMismatch { expected, found } => {
                write!(f, "Expected {} axes, configuration has {}", expected, found)
            }
            ConfigError::InvalidStepsPerMm { axis, value } => {
                write!(f, "Axis {}: invalid steps/mm {}. Must be > 0", axis, value)
            }
            ConfigError::InvalidMaxRate { axis, value } => {
                write!(f, "Axis {}: invalid max rate {}. Must be > 0", axis, value)
            }
            ConfigError::InvalidAcceleration { axis, value } => {
                write!(f, "Axis {}: invalid acceleration {}. Must be > 0", axis, value)
            }
            ConfigError::StepRateTooHigh { axis, required, available } => write!(
                f,
                "Axis {}: max rate needs {} steps/s, timer emits at most {}",
                axis, required, available
            ),
            ConfigError::InvalidJunctionDeviation(v) => {
                write!(f, "Invalid junction deviation: {}. Must be >= 0", v)
            }
            ConfigError::InvalidMinimumSpeed(v) => {
                write!(f, "Invalid minimum junction speed: {}. Must be >= 0", v)
            }
            ConfigError::InvalidStraightCos(v) => {
                write!(f, "Invalid junction cosine guard: {}. Must be in (0, 1)", v)
            }
            ConfigError::InvalidTickRate(v) => write!(f, "Invalid tick rate: {}. Must be > 0", v),
            ConfigError::InvalidPulsesPerTick(v) => {
                write!(f, "Invalid pulses per tick: {}. Must be 1-8", v)
            }
            ConfigError::InvalidMinimumStepRate(v) => {
                write!(f, "Invalid minimum step rate: {}. Must be > 0", v)
            }
            ConfigError::PulseWidthTooLong { pulse_width_ns, tick_period_ns } => write!(
                f,
                "Pulse width {} ns does not fit in a {} ns tick",
                pulse_width_ns, tick_period_ns
            ),
            #[cfg(feature = "std")]
            ConfigError::IoError(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl fmt::Display for EnqueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnqueueError::BufferFull => write!(f, "Block buffer full"),
            EnqueueError::DegenerateMove => write!(f, "Move has zero length"),
            EnqueueError::InvalidFeedRate(v) => write!(f, "Invalid feed rate: {}", v),
            EnqueueError::TargetOutOfRange => write!(f, "Target outside machine step range"),
            EnqueueError::Locked(state) => write!(f, "Motion locked in state {}", state.name()),
        }
    }
}

impl fmt::Display for BufferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BufferError::Full => write!(f, "Buffer full"),
            BufferError::Empty => write!(f, "Buffer empty"),
            BufferError::NotComplete => write!(f, "Head block not complete"),
        }
    }
}

impl fmt::Display for PlannerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlannerError::InvariantViolation { slot, speed_sqr, limit_sqr } => write!(
                f,
                "Block {}: squared speed {} exceeds limit {}",
                slot, speed_sqr, limit_sqr
            ),
            PlannerError::NonFinite { slot } => write!(f, "Block {}: speed not finite", slot),
        }
    }
}

impl fmt::Display for StateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateError::InvalidTransition { from, to } => {
                write!(f, "Cannot go from {} to {}", from.name(), to.name())
            }
            StateError::Busy => write!(f, "Motion still in progress"),
            StateError::InvalidPosition => write!(f, "Position outside machine step range"),
        }
    }
}

impl fmt::Display for OutputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputError::Pin => write!(f, "GPIO pin operation failed"),
        }
    }
}

// Conversion impls
impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

impl From<EnqueueError> for Error {
    fn from(e: EnqueueError) -> Self {
        Error::Enqueue(e)
    }
}

impl From<BufferError> for Error {
    fn from(e: BufferError) -> Self {
        Error::Buffer(e)
    }
}

impl From<PlannerError> for Error {
    fn from(e: PlannerError) -> Self {
        Error::Planner(e)
    }
}

impl From<StateError> for Error {
    fn from(e: StateError) -> Self {
        Error::State(e)
    }
}

impl From<OutputError> for Error {
    fn from(e: OutputError) -> Self {
        Error::Output(e)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

#[cfg(feature = "std")]
impl std::error::Error for ConfigError {}

#[cfg(feature = "std")]
impl std::error::Error for EnqueueError {}

#[cfg(feature = "std")]
impl std::error::Error for BufferError {}

#[cfg(feature = "std")]
impl std::error::Error for PlannerError {}

#[cfg(feature = "std")]
impl std::error::Error for StateError {}

#[cfg(feature = "std")]
impl std::error::Error for OutputError {}
