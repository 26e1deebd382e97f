//! Adaptive multi-axis step smoothing.
//!
//! The timer runs at a fixed cadence. When the step interval drops below
//! one tick the engine emits several step events in the same tick and the
//! output layer spaces them evenly inside it. The logical trapezoid is
//! unchanged; only the pulse timing grain gets finer.

/// Hard ceiling on step events per tick.
pub const MAX_PULSES_PER_TICK: usize = 8;

/// Number of step events a tick must be able to carry at `interval_ns`.
///
/// At least 1, at most `max_pulses` (itself capped at
/// [`MAX_PULSES_PER_TICK`]).
#[inline]
pub fn smoothing_level(tick_period_ns: u32, interval_ns: u32, max_pulses: u8) -> u8 {
    let ceiling = max_pulses.clamp(1, MAX_PULSES_PER_TICK as u8);
    if interval_ns == 0 {
        return ceiling;
    }
    let level = (tick_period_ns as u64 + interval_ns as u64 - 1) / interval_ns as u64;
    level.clamp(1, ceiling as u64) as u8
}

/// Spacing between the step pulses of one tick.
#[inline]
pub fn sub_interval_ns(tick_period_ns: u32, level: u8) -> u32 {
    tick_period_ns / level.max(1) as u32
}
