//! Datatrak LF navigation receiver emulator core.
//!
//! A CISC CPU core (driven through an external [`cpu::CpuEngine`]
//! implementation), interleaved dual-image ROM, RAM, a dual-channel UART,
//! and a custom ASIC block with a phase-tracking register fed by a
//! Datatrak LF signal generator, all tied together by [`machine::Machine`].
//!
//! # Memory map (24-bit address space, big-endian)
//!
//! | Address range        | Region                     |
//! |-----------------------|----------------------------|
//! | 0x000000 - 0x03FFFF  | ROM (256 KiB, interleaved) |
//! | 0x200000 - 0x23FFFF  | RAM (256 KiB)              |
//! | 0x240000 - 0x2400FF  | ADC                        |
//! | 0x240100 - 0x2401FF  | EEPROM read data           |
//! | 0x240200 - 0x2402FF  | RF phase register          |
//! | 0x240300 - 0x2403FF  | UART (dual channel)        |
//! | 0x240700 - 0x2407FF  | Digital output port 1      |
//! | 0x240800 - 0x2408FF  | EEPROM write I/O           |
//! | other 0x24xxxx       | unimplemented, logged      |

pub mod bus;
pub mod config;
pub mod cpu;
#[cfg(feature = "dumps")]
pub mod dump;
pub mod error;
pub mod machine;
pub mod memory;
pub mod peripherals;
pub mod transport;

pub use bus::Bus;
pub use config::Config;
pub use cpu::{CpuEngine, TickEngine};
pub use error::MachineError;
pub use machine::Machine;
