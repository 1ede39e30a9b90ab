//! Machine orchestrator: owns the bus, the CPU engine, and the tick driver.
//!
//! This replaces the scattering of process-wide globals the original
//! firmware emulator kept (ROM array, RAM array, UART struct, generator
//! context, pending flags) with a single value that owns all emulator
//! state; every operation is a method on it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::info;

use crate::bus::{Bus, UnimplementedPolicy};
use crate::cpu::{CpuEngine, TickEngine};
use crate::error::MachineError;
use crate::peripherals::datatrak::{DatatrakGenerator, DatatrakMode};
use crate::peripherals::phase::PhaseFrontEnd;
use crate::peripherals::uart::ChannelId;
use crate::peripherals::Peripherals;
use crate::transport::TcpTransport;

/// Bus-visible cycles executed per tick at 20 MHz / 1 kHz.
pub const CYCLES_PER_TICK: u32 = 20_000;

/// Reason the tick driver stopped a bounded run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    TicksComplete,
    RomNotLoaded,
}

/// Owns the bus and CPU engine and drives emulated time forward one tick
/// (1 ms of firmware-visible time) at a time.
pub struct Machine {
    bus: Bus,
    engine: Box<dyn CpuEngine>,
    rom_loaded: bool,
    total_ticks: u64,
    stop: Arc<AtomicBool>,
}

impl Machine {
    /// `tick_budget` is the number of bus-visible cycles the CPU engine
    /// executes per tick (the configured [`Config::tick_budget`]); defaults
    /// to [`CYCLES_PER_TICK`] when built directly rather than from config.
    pub fn new(unimplemented: UnimplementedPolicy, tick_budget: u32) -> Result<Self, MachineError> {
        let generator = DatatrakGenerator::new(DatatrakMode::EightSlot)?;
        let peripherals = Peripherals::new(PhaseFrontEnd::new(generator), unimplemented);
        Ok(Self {
            bus: Bus::new(peripherals, unimplemented),
            engine: Box::new(TickEngine::new(tick_budget)),
            rom_loaded: false,
            total_ticks: 0,
            stop: Arc::new(AtomicBool::new(false)),
        })
    }

    /// A clone of the stop flag the run loop polls. Store `true` into it
    /// (e.g. from a `Ctrl-C` handler) to make [`Machine::run_forever`]
    /// return on the next tick boundary instead of looping forever.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    /// Whether a stop has been requested via the handle returned by
    /// [`Machine::stop_handle`].
    pub fn should_stop(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    /// Substitute a real CPU engine for the bring-up [`TickEngine`].
    pub fn with_engine(mut self, engine: Box<dyn CpuEngine>) -> Self {
        self.engine = engine;
        self
    }

    /// Interleave two half-images (`odd[k] -> rom[2k]`, `even[k] ->
    /// rom[2k+1]`) and load the result as ROM.
    pub fn load_rom_interleaved(&mut self, odd: &[u8], even: &[u8]) {
        self.bus.rom.load_interleaved(odd, even);
        self.rom_loaded = true;
        self.reset();
    }

    pub fn connect_uart_transports(&mut self, base_port: u16) {
        self.bus
            .peripherals
            .attach_uart_transport(ChannelId::A, Box::new(TcpTransport::connect(base_port)));
        self.bus.peripherals.attach_uart_transport(
            ChannelId::B,
            Box::new(TcpTransport::connect(base_port + 1)),
        );
    }

    pub fn reset(&mut self) {
        self.engine.reset();
        self.bus.reset();
        self.total_ticks = 0;
    }

    /// Advance by exactly one tick: run the CPU engine for its configured
    /// cycle budget, then raise the phase-tick interrupt.
    pub fn tick(&mut self) {
        self.engine.step(&mut self.bus);
        self.bus.peripherals.phase_tick();
        self.total_ticks += 1;
    }

    /// Run `ticks` ticks, or until the ROM is missing.
    pub fn run_ticks(&mut self, ticks: u64, realtime: bool) -> StopReason {
        if !self.rom_loaded {
            return StopReason::RomNotLoaded;
        }
        for _ in 0..ticks {
            self.tick();
            if realtime {
                thread::sleep(Duration::from_millis(1));
            }
        }
        StopReason::TicksComplete
    }

    /// Run until the process is interrupted (the stop flag from
    /// [`Machine::stop_handle`] is set) or an error occurs. Intended for the
    /// CLI driver binary.
    pub fn run_forever(&mut self, realtime: bool) -> Result<(), MachineError> {
        if !self.rom_loaded {
            return Err(MachineError::Config("no ROM loaded".into()));
        }
        info!("starting tick driver, realtime={realtime}");
        while !self.should_stop() {
            self.tick();
            if realtime {
                thread::sleep(Duration::from_millis(1));
            }
        }
        info!("tick driver stopped");
        Ok(())
    }

    /// Release background resources (UART reader threads) on an orderly
    /// shutdown. Not called automatically on drop: the driver binary calls
    /// it explicitly on every exit path, including error paths.
    pub fn shutdown(&mut self) {
        self.bus.peripherals.shutdown();
    }

    pub fn total_ticks(&self) -> u64 {
        self.total_ticks
    }

    pub fn peek_byte(&self, addr: u32) -> u8 {
        self.bus.peek_byte(addr)
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut Bus {
        &mut self.bus
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rom_halves(len: usize) -> (Vec<u8>, Vec<u8>) {
        (vec![0xAA; len], vec![0xBB; len])
    }

    #[test]
    fn run_without_rom_reports_not_loaded() {
        let mut m = Machine::new(UnimplementedPolicy::Zeros, CYCLES_PER_TICK).unwrap();
        assert_eq!(m.run_ticks(10, false), StopReason::RomNotLoaded);
        assert_eq!(m.total_ticks(), 0);
    }

    #[test]
    fn load_rom_interleaves_and_resets() {
        let mut m = Machine::new(UnimplementedPolicy::Zeros, CYCLES_PER_TICK).unwrap();
        let (odd, even) = rom_halves(4);
        m.load_rom_interleaved(&odd, &even);
        assert_eq!(m.peek_byte(0), 0xAA);
        assert_eq!(m.peek_byte(1), 0xBB);
    }

    #[test]
    fn run_ticks_advances_total_ticks() {
        let mut m = Machine::new(UnimplementedPolicy::Zeros, CYCLES_PER_TICK).unwrap();
        let (odd, even) = rom_halves(8);
        m.load_rom_interleaved(&odd, &even);
        let reason = m.run_ticks(5, false);
        assert_eq!(reason, StopReason::TicksComplete);
        assert_eq!(m.total_ticks(), 5);
    }

    #[test]
    fn tick_raises_phase_interrupt_each_call() {
        let mut m = Machine::new(UnimplementedPolicy::Zeros, CYCLES_PER_TICK).unwrap();
        let (odd, even) = rom_halves(8);
        m.load_rom_interleaved(&odd, &even);
        // TickEngine acknowledges the interrupt it raised on the previous
        // tick as part of its own step, so the level right after a tick is
        // whatever the *next* tick has not yet raised: just confirm ticking
        // doesn't panic and increments the counter, which is the externally
        // observable contract here.
        m.tick();
        assert_eq!(m.total_ticks(), 1);
    }

    #[test]
    fn reset_clears_total_ticks() {
        let mut m = Machine::new(UnimplementedPolicy::Zeros, CYCLES_PER_TICK).unwrap();
        let (odd, even) = rom_halves(8);
        m.load_rom_interleaved(&odd, &even);
        m.run_ticks(3, false);
        m.reset();
        assert_eq!(m.total_ticks(), 0);
    }

    #[test]
    fn shutdown_with_no_transports_attached_is_harmless() {
        let mut m = Machine::new(UnimplementedPolicy::Zeros, CYCLES_PER_TICK).unwrap();
        m.shutdown();
    }

    #[test]
    fn stop_handle_makes_run_forever_return() {
        let mut m = Machine::new(UnimplementedPolicy::Zeros, CYCLES_PER_TICK).unwrap();
        let (odd, even) = rom_halves(8);
        m.load_rom_interleaved(&odd, &even);
        let stop = m.stop_handle();
        stop.store(true, Ordering::Relaxed);
        assert!(m.run_forever(false).is_ok());
    }

    #[test]
    fn tick_budget_is_reported_as_cycle_count() {
        let mut m = Machine::new(UnimplementedPolicy::Zeros, 42).unwrap();
        let (odd, even) = rom_halves(8);
        m.load_rom_interleaved(&odd, &even);
        // TickEngine reports its configured cycles_per_step, proving the
        // supplied tick budget reached the engine rather than the hardcoded
        // default.
        assert_eq!(m.engine.step(&mut m.bus), 42);
    }
}
