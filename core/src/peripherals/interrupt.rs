//! Priority-encoded, vectored interrupt controller.
//!
//! Unlike a bitmask/bank interrupt controller, acknowledgement here is
//! atomic with vector supply: exactly one pending flag — the
//! highest-priority one — is cleared per acknowledge, and the output level
//! is always the maximum priority of whatever remains pending.

/// Interrupt source identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    PhaseTick,
    Uart,
}

/// Fixed priority of each source (0 = idle, 7 = non-maskable).
fn priority(source: Source) -> u8 {
    match source {
        Source::PhaseTick => 5,
        Source::Uart => 2,
    }
}

/// Vector number returned when nothing is pending.
pub const SPURIOUS_VECTOR: u8 = 0x18;

/// Fixed vector for the phase-tick source (see design notes: 255, not 0x55).
pub const PHASE_TICK_VECTOR: u8 = 255;

#[derive(Debug, Clone)]
struct Pending {
    phase_tick: bool,
    uart: bool,
}

/// Priority-encoded interrupt controller.
#[derive(Debug, Clone)]
pub struct InterruptController {
    pending: Pending,
    /// Vector returned for the UART source; settable via the UART's own
    /// interrupt-vector register (IVR).
    uart_vector: u8,
}

impl InterruptController {
    pub fn new() -> Self {
        Self {
            pending: Pending {
                phase_tick: false,
                uart: false,
            },
            uart_vector: 0x0F,
        }
    }

    pub fn reset(&mut self) {
        self.pending.phase_tick = false;
        self.pending.uart = false;
        self.uart_vector = 0x0F;
    }

    /// Mark a source pending.
    pub fn set_pending(&mut self, source: Source) {
        match source {
            Source::PhaseTick => self.pending.phase_tick = true,
            Source::Uart => self.pending.uart = true,
        }
    }

    /// Update the vector the UART source returns on acknowledge (mirrors the
    /// UART device's own IVR register).
    pub fn set_uart_vector(&mut self, vector: u8) {
        self.uart_vector = vector;
    }

    /// Current interrupt level presented to the CPU: the maximum priority of
    /// any pending source, or 0 if nothing is pending.
    pub fn level(&self) -> u8 {
        let mut max = 0;
        if self.pending.phase_tick {
            max = max.max(priority(Source::PhaseTick));
        }
        if self.pending.uart {
            max = max.max(priority(Source::Uart));
        }
        max
    }

    pub fn irq_pending(&self) -> bool {
        self.level() > 0
    }

    /// Acknowledge the highest-priority pending source: return its vector
    /// and clear it. Returns [`SPURIOUS_VECTOR`] if nothing is pending.
    pub fn acknowledge(&mut self) -> u8 {
        if self.pending.phase_tick
            && priority(Source::PhaseTick)
                >= self.pending_uart_priority_or_zero()
        {
            self.pending.phase_tick = false;
            return PHASE_TICK_VECTOR;
        }
        if self.pending.uart {
            self.pending.uart = false;
            return self.uart_vector;
        }
        SPURIOUS_VECTOR
    }

    fn pending_uart_priority_or_zero(&self) -> u8 {
        if self.pending.uart {
            priority(Source::Uart)
        } else {
            0
        }
    }
}

impl Default for InterruptController {
    fn default() -> Self {
        Self::new()
    }
}
