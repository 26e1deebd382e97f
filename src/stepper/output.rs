//! Step and direction pin output over embedded-hal.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

use crate::config::MachineConstraints;
use crate::error::OutputError;

use super::engine::TickOutput;

/// Drives STEP/DIR pins from the engine's tick output.
///
/// Generic over:
/// - `STEP`: STEP pin type (must implement `OutputPin`)
/// - `DIR`: DIR pin type (must implement `OutputPin`)
/// - `DELAY`: Delay provider for pulse width and spacing (must implement `DelayNs`)
pub struct StepOutput<STEP, DIR, DELAY, const AXES: usize>
where
    STEP: OutputPin,
    DIR: OutputPin,
    DELAY: DelayNs,
{
    step_pins: [STEP; AXES],
    dir_pins: [DIR; AXES],
    delay: DELAY,
    /// Axes whose direction pin logic is inverted.
    invert_mask: u8,
    pulse_width_ns: u32,
    /// Last direction bits written (cached to avoid unnecessary pin writes).
    current_direction: Option<u8>,
}

impl<STEP, DIR, DELAY, const AXES: usize> StepOutput<STEP, DIR, DELAY, AXES>
where
    STEP: OutputPin,
    DIR: OutputPin,
    DELAY: DelayNs,
{
    /// Create an output stage with pulse width and direction inversion from
    /// `constraints`.
    pub fn new(
        step_pins: [STEP; AXES],
        dir_pins: [DIR; AXES],
        delay: DELAY,
        constraints: &MachineConstraints<AXES>,
    ) -> Self {
        Self {
            step_pins,
            dir_pins,
            delay,
            invert_mask: constraints.invert_mask(),
            pulse_width_ns: constraints.pulse_width_ns,
            current_direction: None,
        }
    }

    /// Emit the pulses of one tick.
    ///
    /// Direction pins are written first, then each pulse raises the step
    /// pins of its mask for the pulse width. Pulses after the first start
    /// `spacing_ns` after the previous one.
    pub fn apply(&mut self, output: &TickOutput) -> Result<(), OutputError> {
        if output.is_empty() {
            return Ok(());
        }

        self.set_direction(output.direction_bits)?;

        let gap_ns = output.spacing_ns.saturating_sub(self.pulse_width_ns);
        for (n, &mask) in output.pulses.iter().enumerate() {
            if n > 0 && gap_ns > 0 {
                self.delay.delay_ns(gap_ns);
            }
            self.pulse(mask)?;
        }
        Ok(())
    }

    /// Release the pins and delay provider.
    pub fn release(self) -> ([STEP; AXES], [DIR; AXES], DELAY) {
        (self.step_pins, self.dir_pins, self.delay)
    }

    fn set_direction(&mut self, direction_bits: u8) -> Result<(), OutputError> {
        if self.current_direction == Some(direction_bits) {
            return Ok(());
        }

        // Pin high means positive travel unless inverted
        let levels = direction_bits ^ self.invert_mask;
        for (i, pin) in self.dir_pins.iter_mut().enumerate() {
            if levels & (1 << i) == 0 {
                pin.set_high().map_err(|_| OutputError::Pin)?;
            } else {
                pin.set_low().map_err(|_| OutputError::Pin)?;
            }
        }
        self.current_direction = Some(direction_bits);
        Ok(())
    }

    fn pulse(&mut self, mask: u8) -> Result<(), OutputError> {
        for (i, pin) in self.step_pins.iter_mut().enumerate() {
            if mask & (1 << i) != 0 {
                pin.set_high().map_err(|_| OutputError::Pin)?;
            }
        }
        self.delay.delay_ns(self.pulse_width_ns);
        for (i, pin) in self.step_pins.iter_mut().enumerate() {
            if mask & (1 << i) != 0 {
                pin.set_low().map_err(|_| OutputError::Pin)?;
            }
        }
        Ok(())
    }
}
