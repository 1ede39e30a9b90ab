//! CPU engine seam.
//!
//! The instruction interpreter for the emulated CISC core is an external
//! collaborator; this module only defines the callback contract it is
//! driven through ([`CpuEngine`]/[`BusAccess`]) and ships [`TickEngine`], a
//! bring-up implementation that exercises the contract without decoding
//! real machine code.

use crate::bus::Bus;

/// The six bus operations a CPU engine needs, plus the disassembly-only
/// read pair and interrupt acknowledgement. Implemented by [`Bus`]; no
/// other coupling exists between a [`CpuEngine`] and the rest of the
/// crate.
pub trait BusAccess {
    fn read_u8(&mut self, addr: u32) -> u8;
    fn read_u16(&mut self, addr: u32) -> u16;
    fn read_u32(&mut self, addr: u32) -> u32;
    fn write_u8(&mut self, addr: u32, value: u8);
    fn write_u16(&mut self, addr: u32, value: u16);
    fn write_u32(&mut self, addr: u32, value: u32);

    /// Side-effect-free read restricted to ROM/RAM, for disassembly.
    fn disasm_read_u16(&self, addr: u32) -> u16;

    /// Current interrupt level in `[0, 7]`.
    fn irq_level(&self) -> u8;

    /// Acknowledge the highest-priority pending interrupt, returning its
    /// vector.
    fn irq_acknowledge(&mut self) -> u8;
}

impl BusAccess for Bus {
    fn read_u8(&mut self, addr: u32) -> u8 {
        self.read_byte(addr)
    }

    fn read_u16(&mut self, addr: u32) -> u16 {
        self.read_word(addr)
    }

    fn read_u32(&mut self, addr: u32) -> u32 {
        self.read_dword(addr)
    }

    fn write_u8(&mut self, addr: u32, value: u8) {
        self.write_byte(addr, value)
    }

    fn write_u16(&mut self, addr: u32, value: u16) {
        self.write_word(addr, value)
    }

    fn write_u32(&mut self, addr: u32, value: u32) {
        self.write_dword(addr, value)
    }

    fn disasm_read_u16(&self, addr: u32) -> u16 {
        self.disasm_read_word(addr)
    }

    fn irq_level(&self) -> u8 {
        self.peripherals.interrupts.level()
    }

    fn irq_acknowledge(&mut self) -> u8 {
        self.peripherals.interrupts.acknowledge()
    }
}

/// The seam through which a real CISC instruction interpreter would be
/// substituted.
pub trait CpuEngine {
    /// Execute roughly one tick's worth of work against `bus`, returning
    /// the number of bus-visible cycles actually consumed.
    fn step(&mut self, bus: &mut dyn BusAccess) -> u32;

    fn reset(&mut self);
}

/// Test/bring-up `CpuEngine`: issues a deterministic pattern of bus
/// operations (ROM fetch, RAM round-trip, interrupt acknowledgement on a
/// pending line) without decoding real machine code. Enough to drive the
/// tick loop and exercise the bus contract end to end.
pub struct TickEngine {
    cycles_per_step: u32,
    pc: u32,
    scratch: u32,
}

impl TickEngine {
    pub fn new(cycles_per_step: u32) -> Self {
        Self {
            cycles_per_step,
            pc: 0,
            scratch: 0x200000,
        }
    }
}

impl Default for TickEngine {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl CpuEngine for TickEngine {
    fn step(&mut self, bus: &mut dyn BusAccess) -> u32 {
        // Fetch from ROM, advancing a fake program counter that wraps at
        // the ROM size boundary.
        let _ = bus.read_u16(self.pc);
        self.pc = (self.pc + 2) % crate::memory::addr::ROM_SIZE as u32;

        // Round-trip a RAM scratch cell.
        bus.write_u8(self.scratch, (self.scratch as u8).wrapping_add(1));
        let _ = bus.read_u8(self.scratch);

        // Service a pending interrupt, if any, same as a real vectored
        // acknowledge cycle would.
        if bus.irq_level() > 0 {
            let _ = bus.irq_acknowledge();
        }

        self.cycles_per_step
    }

    fn reset(&mut self) {
        self.pc = 0;
        self.scratch = 0x200000;
    }
}
