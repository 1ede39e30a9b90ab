//! Memory-mapped peripheral aggregate: UART, phase/ADC front-end, and the
//! interrupt controller they both feed.

pub mod datatrak;
pub mod interrupt;
pub mod phase;
pub mod uart;

use log::warn;

use interrupt::{InterruptController, Source};
use phase::PhaseFrontEnd;
use uart::{ChannelId, Uart};

use crate::bus::UnimplementedPolicy;
use crate::transport::Transport;

pub(crate) const UART_BASE: u32 = 0x240300;
pub(crate) const UART_END: u32 = 0x240400;
const PHASE_LOW: u32 = 0x240200;
const PHASE_HIGH: u32 = 0x240201;
const ADC_LOW: u32 = 0x240000;
const ADC_HIGH: u32 = 0x240001;
const OUTPUT_PORT_LOW: u32 = 0x240700;
const OUTPUT_PORT_HIGH: u32 = 0x240701;
const EEPROM_READ_BASE: u32 = 0x240100;
const EEPROM_READ_END: u32 = 0x240200;
const EEPROM_WRITE_BASE: u32 = 0x240800;
const EEPROM_WRITE_END: u32 = 0x240900;

/// ASIC-block peripherals, addressed in the `0x24xxxx` window.
pub struct Peripherals {
    pub uart: Uart,
    pub phase: PhaseFrontEnd,
    pub interrupts: InterruptController,
    /// Mirrors the last value written to output port 1 (freqsel/adsel),
    /// readable back for debug tooling even though the real port is
    /// write-only from the firmware's perspective.
    output_port_shadow: u8,
}

impl Peripherals {
    pub fn new(phase: PhaseFrontEnd, unimplemented: UnimplementedPolicy) -> Self {
        Self {
            uart: Uart::new(unimplemented),
            phase,
            interrupts: InterruptController::new(),
            output_port_shadow: 0,
        }
    }

    /// Whether `addr` falls in the UART's byte-wide register window. Used by
    /// the bus to refuse non-byte-sized accesses instead of letting them
    /// decompose into byte ops that would double-apply register side
    /// effects.
    pub(crate) fn is_uart_address(addr: u32) -> bool {
        (UART_BASE..UART_END).contains(&addr)
    }

    pub fn attach_uart_transport(&mut self, channel: ChannelId, transport: Box<dyn Transport>) {
        self.uart.attach(channel, transport);
    }

    pub fn reset(&mut self) {
        self.uart.reset();
        self.phase.reset();
        self.interrupts.reset();
        self.output_port_shadow = 0;
    }

    /// Advance time-driven state by one millisecond tick and raise the
    /// phase-tick interrupt. The bus fabric calls this once per emulated
    /// millisecond, independent of any particular register access.
    pub fn phase_tick(&mut self) {
        self.interrupts.set_pending(Source::PhaseTick);
    }

    /// Read an 8-bit value from the ASIC window. Returns `None` if `addr`
    /// falls outside every modelled device, leaving the caller to apply the
    /// unimplemented-value policy.
    pub fn read_u8(&mut self, addr: u32) -> Option<u8> {
        match addr {
            PHASE_HIGH => Some(self.phase.read_phase_high()),
            PHASE_LOW => Some(self.phase.read_phase_low()),
            ADC_LOW | ADC_HIGH => Some(self.phase.read_adc().unwrap_or(0)),
            a if (UART_BASE..UART_END).contains(&a) => {
                Some(self.uart.read((a - UART_BASE) / 2))
            }
            OUTPUT_PORT_LOW | OUTPUT_PORT_HIGH => None,
            a if (EEPROM_READ_BASE..EEPROM_READ_END).contains(&a) => Some(0xFF),
            _ => None,
        }
    }

    /// Read a 16-bit value from the ASIC window (used for the phase
    /// register's word-wide FIFO read and aligned UART accesses).
    pub fn read_u16(&mut self, addr: u32) -> Option<u16> {
        if addr == PHASE_LOW {
            return Some(self.phase.read_phase_word());
        }
        None
    }

    /// Write an 8-bit value into the ASIC window. Returns `false` if `addr`
    /// isn't claimed by any modelled device.
    pub fn write_u8(&mut self, addr: u32, value: u8) -> bool {
        match addr {
            a if (UART_BASE..UART_END).contains(&a) => {
                self.uart
                    .write((a - UART_BASE) / 2, value, &mut self.interrupts);
                true
            }
            OUTPUT_PORT_LOW | OUTPUT_PORT_HIGH => {
                self.output_port_shadow = value;
                self.phase.write_output_port(value);
                true
            }
            a if (EEPROM_WRITE_BASE..EEPROM_WRITE_END).contains(&a) => true,
            PHASE_LOW | PHASE_HIGH | ADC_LOW | ADC_HIGH => {
                warn!("write to read-only ASIC register 0x{addr:06X} dropped");
                true
            }
            a if (EEPROM_READ_BASE..EEPROM_READ_END).contains(&a) => true,
            _ => false,
        }
    }

    pub fn output_port_shadow(&self) -> u8 {
        self.output_port_shadow
    }

    /// Release UART transport resources on an orderly shutdown.
    pub fn shutdown(&mut self) {
        self.uart.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peripherals::datatrak::{DatatrakGenerator, DatatrakMode};

    fn peripherals() -> Peripherals {
        let generator = DatatrakGenerator::new(DatatrakMode::EightSlot).unwrap();
        Peripherals::new(PhaseFrontEnd::new(generator), UnimplementedPolicy::Zeros)
    }

    #[test]
    fn uart_window_routes_to_uart() {
        let mut p = peripherals();
        assert!(p.write_u8(0x240300 + 2 * 5, 0x01)); // interrupt mask index 5
        assert!(p.interrupts.irq_pending());
    }

    #[test]
    fn phase_high_then_low_matches_fifo_order() {
        let mut p = peripherals();
        let _high = p.read_u8(PHASE_HIGH).unwrap();
        let _low = p.read_u8(PHASE_LOW).unwrap();
    }

    #[test]
    fn output_port_write_updates_freqsel() {
        let mut p = peripherals();
        assert!(p.write_u8(OUTPUT_PORT_LOW, 0x01));
        assert_eq!(p.output_port_shadow(), 0x01);
    }

    #[test]
    fn adc_read_returns_some_by_default() {
        let mut p = peripherals();
        assert!(p.read_u8(ADC_LOW).is_some());
    }

    #[test]
    fn eeprom_read_window_returns_ff() {
        let mut p = peripherals();
        assert_eq!(p.read_u8(EEPROM_READ_BASE), Some(0xFF));
    }

    #[test]
    fn eeprom_write_window_accepted_and_dropped() {
        let mut p = peripherals();
        assert!(p.write_u8(EEPROM_WRITE_BASE, 0x42));
    }

    #[test]
    fn unclaimed_address_returns_none() {
        let mut p = peripherals();
        assert_eq!(p.read_u8(0x241234), None);
        assert!(!p.write_u8(0x241234, 0));
    }

    #[test]
    fn phase_tick_raises_interrupt() {
        let mut p = peripherals();
        p.phase_tick();
        assert!(p.interrupts.irq_pending());
        assert_eq!(p.interrupts.acknowledge(), interrupt::PHASE_TICK_VECTOR);
    }

    #[test]
    fn reset_clears_interrupts_and_output_port() {
        let mut p = peripherals();
        p.write_u8(OUTPUT_PORT_LOW, 0xFF);
        p.phase_tick();
        p.reset();
        assert_eq!(p.output_port_shadow(), 0);
        assert!(!p.interrupts.irq_pending());
    }
}
