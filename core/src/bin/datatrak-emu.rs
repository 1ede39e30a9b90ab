//! CLI driver: loads a config, builds a `Machine`, and runs it forever.

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use log::{error, info, warn};

use datatrak_core::config::Cli;
use datatrak_core::error::MachineError;
use datatrak_core::machine::Machine;
use datatrak_core::memory::addr::ROM_HALF_SIZE;

#[cfg(feature = "dumps")]
use datatrak_core::dump::{ModulatedAudioDumpWriter, RawPhaseDumpWriter};

fn load_rom_half(path: &Path) -> Result<Vec<u8>, MachineError> {
    let data = std::fs::read(path).map_err(|e| MachineError::Rom {
        path: path.to_path_buf(),
        source: e,
    })?;
    if data.len() != ROM_HALF_SIZE {
        return Err(MachineError::RomSize {
            path: path.to_path_buf(),
            actual: data.len(),
            expected: ROM_HALF_SIZE,
        });
    }
    Ok(data)
}

fn run() -> Result<(), MachineError> {
    let cli = Cli::parse();
    let config = cli.resolve()?;

    let odd = load_rom_half(&config.ic1)?;
    let even = load_rom_half(&config.ic2)?;

    let tick_budget = u32::try_from(config.tick_budget).unwrap_or(u32::MAX);
    let mut machine = Machine::new(config.unimplemented_policy.into(), tick_budget)?;
    machine.load_rom_interleaved(&odd, &even);
    machine.connect_uart_transports(config.uart_port);

    let stop = machine.stop_handle();
    if let Err(e) = ctrlc::set_handler(move || {
        stop.store(true, std::sync::atomic::Ordering::SeqCst);
    }) {
        warn!("failed to install Ctrl-C handler: {e}");
    }

    let result = drive(&mut machine, &config);
    // Release the UART reader threads on every exit path, success, error, or
    // Ctrl-C.
    machine.shutdown();
    result
}

#[cfg(not(feature = "dumps"))]
fn drive(machine: &mut Machine, config: &datatrak_core::Config) -> Result<(), MachineError> {
    info!("ROM loaded, starting machine");
    machine.run_forever(config.realtime)
}

#[cfg(feature = "dumps")]
fn drive(machine: &mut Machine, config: &datatrak_core::Config) -> Result<(), MachineError> {
    use datatrak_core::machine::StopReason;

    info!("ROM loaded, starting machine");

    let mut raw_dump = config
        .raw_phase_dump
        .as_deref()
        .map(RawPhaseDumpWriter::create)
        .transpose()
        .map_err(|e| MachineError::Config(format!("raw phase dump: {e}")))?;
    let mut modulated_dump = config
        .modulated_audio_dump
        .as_deref()
        .map(ModulatedAudioDumpWriter::create)
        .transpose()
        .map_err(|e| MachineError::Config(format!("modulated audio dump: {e}")))?;

    if raw_dump.is_none() && modulated_dump.is_none() {
        return machine.run_forever(config.realtime);
    }

    // Dump once per completed navigation cycle, not once per tick: the
    // frame only changes when the phase-register cursor wraps.
    let cycle_len = machine.bus().peripherals.phase.current_frame().f1_phase.len() as u64;
    loop {
        let reason = machine.run_ticks(cycle_len, config.realtime);
        if reason == StopReason::RomNotLoaded {
            return Err(MachineError::Config("ROM unloaded mid-run".into()));
        }
        let frame = machine.bus().peripherals.phase.current_frame();
        if let Some(writer) = raw_dump.as_mut() {
            let _ = writer.write_frame(frame);
        }
        if let Some(writer) = modulated_dump.as_mut() {
            let _ = writer.write_frame(frame);
        }
        if machine.should_stop() {
            return Ok(());
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}
