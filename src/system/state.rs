//! Machine states and the transitions allowed between them.

/// Machine state, shared between the foreground loop and the step timer.
///
/// `#[repr(u8)]` so the state fits one atomic byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum MachineState {
    /// Ready, nothing executing.
    Idle = 0,
    /// Executing buffered blocks.
    Run = 1,
    /// Feed-hold: execution frozen, buffer kept.
    Hold = 2,
    /// Homing cycle in progress.
    Homing = 3,
    /// Fatal fault; only a reset leaves this state.
    Alarm = 4,
    /// Machine position is not trusted.
    PositionLost = 5,
    /// Dry-run: requests are validated but nothing moves.
    Check = 6,
}

impl MachineState {
    /// Convert from raw `u8`. Returns `None` for invalid values.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Idle),
            1 => Some(Self::Run),
            2 => Some(Self::Hold),
            3 => Some(Self::Homing),
            4 => Some(Self::Alarm),
            5 => Some(Self::PositionLost),
            6 => Some(Self::Check),
            _ => None,
        }
    }

    /// State name for display/debugging.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Run => "Run",
            Self::Hold => "Hold",
            Self::Homing => "Homing",
            Self::Alarm => "Alarm",
            Self::PositionLost => "PositionLost",
            Self::Check => "Check",
        }
    }

    /// Whether the step engine may begin or continue a step interval.
    #[inline]
    pub const fn allows_motion(self) -> bool {
        matches!(self, Self::Run | Self::Homing)
    }

    /// Whether new motion requests are accepted.
    #[inline]
    pub const fn accepts_requests(self) -> bool {
        match self {
            Self::Idle | Self::Run | Self::Hold | Self::Homing | Self::Check => true,
            Self::Alarm | Self::PositionLost => false,
        }
    }

    /// Whether `self -> next` is a legal transition.
    ///
    /// Every state is matched explicitly so adding a state forces this
    /// table to be revisited.
    pub const fn can_transition_to(self, next: Self) -> bool {
        use MachineState::*;

        match self {
            Idle => matches!(next, Run | Homing | Check | Alarm | PositionLost),
            Run => matches!(next, Idle | Hold | Alarm | PositionLost),
            Hold => matches!(next, Run | Idle | Alarm | PositionLost),
            Homing => matches!(next, Idle | Alarm | PositionLost),
            Alarm => matches!(next, PositionLost),
            PositionLost => matches!(next, Idle | Homing | Alarm),
            Check => matches!(next, Idle | Alarm | PositionLost),
        }
    }
}

impl Default for MachineState {
    /// Cold start: position unknown.
    fn default() -> Self {
        Self::PositionLost
    }
}
