//! System bus for the Datatrak receiver emulator.
//!
//! The bus provides address decoding and routes memory accesses to ROM,
//! RAM, or the ASIC peripheral block.
//!
//! Memory map (24-bit address space):
//! ```text
//! 0x000000 - 0x03FFFF : ROM (256 KiB, read-only)
//! 0x200000 - 0x23FFFF : RAM (256 KiB)
//! 0x240000 - 0x2400FF : ADC
//! 0x240100 - 0x2401FF : EEPROM read data
//! 0x240200 - 0x2402FF : RF phase register
//! 0x240300 - 0x2403FF : UART (dual channel)
//! 0x240700 - 0x2407FF : Digital output port 1
//! 0x240800 - 0x2408FF : EEPROM write I/O
//! other 0x24xxxx      : unimplemented, logged
//! ```
//!
//! All multi-byte accesses are big-endian (Motorola order), matching the
//! 68000-family bus this emulates.

use log::warn;

use crate::memory::{addr, Ram, Rom};
use crate::peripherals::Peripherals;

/// Memory region an address maps to, at the top level of decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryRegion {
    Rom,
    Ram,
    Asic,
    Unmapped,
}

/// Policy for the constant returned when a read targets an unimplemented
/// region: either all-zero or all-one bits, masked to the access width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnimplementedPolicy {
    Zeros,
    Ones,
}

impl UnimplementedPolicy {
    pub(crate) fn byte(self) -> u8 {
        match self {
            Self::Zeros => 0x00,
            Self::Ones => 0xFF,
        }
    }

    fn word(self) -> u16 {
        let b = self.byte() as u16;
        (b << 8) | b
    }
}

/// System bus connecting the CPU engine to ROM, RAM, and the ASIC
/// peripheral block.
pub struct Bus {
    pub rom: Rom,
    pub ram: Ram,
    pub peripherals: Peripherals,
    unimplemented: UnimplementedPolicy,
    cycles: u64,
}

impl Bus {
    pub fn new(peripherals: Peripherals, unimplemented: UnimplementedPolicy) -> Self {
        Self {
            rom: Rom::new(),
            ram: Ram::new(),
            peripherals,
            unimplemented,
            cycles: 0,
        }
    }

    pub fn decode_address(addr: u32) -> MemoryRegion {
        let addr = addr & addr::ADDR_MASK;
        if addr < addr::ROM_END {
            MemoryRegion::Rom
        } else if (addr::RAM_START..addr::RAM_END).contains(&addr) {
            MemoryRegion::Ram
        } else if addr >> 16 == 0x24 {
            MemoryRegion::Asic
        } else {
            MemoryRegion::Unmapped
        }
    }

    fn unimplemented_read(&mut self, addr: u32) -> u8 {
        warn!("read from unimplemented bus region 0x{addr:06X}");
        self.unimplemented.byte()
    }

    pub fn read_byte(&mut self, addr: u32) -> u8 {
        let addr = addr & addr::ADDR_MASK;
        self.cycles += 1;
        match Self::decode_address(addr) {
            MemoryRegion::Rom => self.rom.read(addr - addr::ROM_START),
            MemoryRegion::Ram => self.ram.read(addr - addr::RAM_START),
            MemoryRegion::Asic => self
                .peripherals
                .read_u8(addr)
                .unwrap_or_else(|| self.unimplemented.byte()),
            MemoryRegion::Unmapped => self.unimplemented_read(addr),
        }
    }

    pub fn write_byte(&mut self, addr: u32, value: u8) {
        let addr = addr & addr::ADDR_MASK;
        self.cycles += 1;
        match Self::decode_address(addr) {
            MemoryRegion::Rom => {
                warn!("write to ROM at 0x{addr:06X} discarded");
            }
            MemoryRegion::Ram => self.ram.write(addr - addr::RAM_START, value),
            MemoryRegion::Asic => {
                if !self.peripherals.write_u8(addr, value) {
                    warn!("write to unimplemented ASIC register 0x{addr:06X}");
                }
            }
            MemoryRegion::Unmapped => {
                warn!("write to unimplemented bus region 0x{addr:06X} dropped");
            }
        }
    }

    /// Read a big-endian 16-bit word. The phase register and UART are
    /// byte-wide; the phase register additionally supports a dedicated
    /// word-wide FIFO read (§4.4). A non-byte-sized access into the UART
    /// window is refused rather than decomposed into byte ops, since
    /// `(addr - UART_BASE) / 2` would land both halves on the same register
    /// index and double-apply its side effects.
    pub fn read_word(&mut self, addr: u32) -> u16 {
        let masked = addr & addr::ADDR_MASK;
        if Self::decode_address(masked) == MemoryRegion::Asic {
            if let Some(word) = self.peripherals.read_u16(masked) {
                self.cycles += 1;
                return word;
            }
            if crate::peripherals::Peripherals::is_uart_address(masked) {
                warn!("16-bit read from byte-wide UART register 0x{masked:06X} refused");
                self.cycles += 1;
                return self.unimplemented.word();
            }
        }
        let hi = self.read_byte(addr) as u16;
        let lo = self.read_byte(addr.wrapping_add(1)) as u16;
        (hi << 8) | lo
    }

    pub fn write_word(&mut self, addr: u32, value: u16) {
        let masked = addr & addr::ADDR_MASK;
        if Self::decode_address(masked) == MemoryRegion::Asic
            && crate::peripherals::Peripherals::is_uart_address(masked)
        {
            warn!("16-bit write to byte-wide UART register 0x{masked:06X} refused");
            self.cycles += 1;
            return;
        }
        self.write_byte(addr, (value >> 8) as u8);
        self.write_byte(addr.wrapping_add(1), value as u8);
    }

    pub fn read_dword(&mut self, addr: u32) -> u32 {
        let hi = self.read_word(addr) as u32;
        let lo = self.read_word(addr.wrapping_add(2)) as u32;
        (hi << 16) | lo
    }

    pub fn write_dword(&mut self, addr: u32, value: u32) {
        self.write_word(addr, (value >> 16) as u16);
        self.write_word(addr.wrapping_add(2), value as u16);
    }

    /// Read a byte for disassembly: restricted to ROM/RAM so that stepping
    /// through code for a trace or debugger cannot have side effects on
    /// live devices (§4.1).
    pub fn disasm_read_byte(&self, addr: u32) -> u8 {
        let addr = addr & addr::ADDR_MASK;
        match Self::decode_address(addr) {
            MemoryRegion::Rom => self.rom.read(addr - addr::ROM_START),
            MemoryRegion::Ram => self.ram.read(addr - addr::RAM_START),
            _ => self.unimplemented.byte(),
        }
    }

    pub fn disasm_read_word(&self, addr: u32) -> u16 {
        let hi = self.disasm_read_byte(addr) as u16;
        let lo = self.disasm_read_byte(addr.wrapping_add(1)) as u16;
        (hi << 8) | lo
    }

    /// Peek a byte with no side effects and no cycle cost (debug tooling).
    pub fn peek_byte(&self, addr: u32) -> u8 {
        self.disasm_read_byte(addr)
    }

    /// Poke a byte directly into ROM or RAM, bypassing the write-protect on
    /// ROM (debug/save-state restore only).
    pub fn poke_byte(&mut self, addr: u32, value: u8) {
        let addr = addr & addr::ADDR_MASK;
        match Self::decode_address(addr) {
            MemoryRegion::Ram => self.ram.write(addr - addr::RAM_START, value),
            _ => {}
        }
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn reset_cycles(&mut self) {
        self.cycles = 0;
    }

    pub fn reset(&mut self) {
        self.ram.reset();
        self.peripherals.reset();
        self.cycles = 0;
    }
}
