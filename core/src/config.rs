//! Configuration: CLI flags, optionally merged with an on-disk config file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::bus::UnimplementedPolicy;
use crate::error::MachineError;
use crate::machine::CYCLES_PER_TICK;

/// Default loopback base port for the UART's two channels.
pub const DEFAULT_UART_PORT: u16 = 7000;

/// Default CPU-engine cycle budget per tick, matching
/// [`crate::machine::CYCLES_PER_TICK`].
pub const DEFAULT_TICK_BUDGET: u64 = CYCLES_PER_TICK as u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnimplementedValuePolicy {
    Zero,
    AllOnes,
}

impl From<UnimplementedValuePolicy> for UnimplementedPolicy {
    fn from(policy: UnimplementedValuePolicy) -> Self {
        match policy {
            UnimplementedValuePolicy::Zero => UnimplementedPolicy::Zeros,
            UnimplementedValuePolicy::AllOnes => UnimplementedPolicy::Ones,
        }
    }
}

/// Emulator configuration, independent of whether it arrived via CLI flags
/// or a config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// ROM image carrying odd physical addresses.
    pub ic1: PathBuf,
    /// ROM image carrying even physical addresses.
    pub ic2: PathBuf,
    #[serde(default = "default_policy")]
    pub unimplemented_policy: UnimplementedValuePolicy,
    #[serde(default = "default_uart_port")]
    pub uart_port: u16,
    #[serde(default)]
    pub realtime: bool,
    #[serde(default = "default_tick_budget")]
    pub tick_budget: u64,
    #[cfg(feature = "dumps")]
    #[serde(default)]
    pub raw_phase_dump: Option<PathBuf>,
    #[cfg(feature = "dumps")]
    #[serde(default)]
    pub modulated_audio_dump: Option<PathBuf>,
}

fn default_policy() -> UnimplementedValuePolicy {
    UnimplementedValuePolicy::Zero
}

fn default_uart_port() -> u16 {
    DEFAULT_UART_PORT
}

fn default_tick_budget() -> u64 {
    DEFAULT_TICK_BUDGET
}

impl Config {
    /// Load and deserialize a YAML config file.
    pub fn from_file(path: &Path) -> Result<Self, MachineError> {
        let text = std::fs::read_to_string(path).map_err(|e| MachineError::Rom {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_yaml::from_str(&text).map_err(|e| MachineError::Config(e.to_string()))
    }
}

/// CLI argument surface, parsed with `clap` and converted into a [`Config`].
#[cfg(feature = "cli")]
#[derive(Debug, clap::Parser)]
#[command(name = "datatrak-emu", about = "Datatrak LF receiver emulator")]
pub struct Cli {
    /// ROM image carrying odd physical addresses.
    #[arg(long)]
    pub ic1: Option<PathBuf>,

    /// ROM image carrying even physical addresses.
    #[arg(long)]
    pub ic2: Option<PathBuf>,

    /// Optional YAML config file; CLI flags override its values.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Return all-ones instead of zero for unimplemented bus reads.
    #[arg(long)]
    pub unimplemented_all_ones: bool,

    /// Base port for the UART loopback transports.
    #[arg(long)]
    pub uart_port: Option<u16>,

    /// Pace the tick driver toward wall-clock 1 kHz.
    #[arg(long)]
    pub realtime: bool,

    /// CPU-engine cycle budget per tick, overriding the config file/default.
    #[arg(long)]
    pub tick_budget: Option<u64>,

    #[cfg(feature = "dumps")]
    #[arg(long)]
    pub raw_phase_dump: Option<PathBuf>,

    #[cfg(feature = "dumps")]
    #[arg(long)]
    pub modulated_audio_dump: Option<PathBuf>,
}

#[cfg(feature = "cli")]
impl Cli {
    /// Merge CLI flags over an optional config file, CLI taking priority.
    pub fn resolve(self) -> Result<Config, MachineError> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config {
                ic1: PathBuf::new(),
                ic2: PathBuf::new(),
                unimplemented_policy: default_policy(),
                uart_port: default_uart_port(),
                realtime: false,
                tick_budget: default_tick_budget(),
                #[cfg(feature = "dumps")]
                raw_phase_dump: None,
                #[cfg(feature = "dumps")]
                modulated_audio_dump: None,
            },
        };

        if let Some(ic1) = self.ic1 {
            config.ic1 = ic1;
        }
        if let Some(ic2) = self.ic2 {
            config.ic2 = ic2;
        }
        if self.unimplemented_all_ones {
            config.unimplemented_policy = UnimplementedValuePolicy::AllOnes;
        }
        if let Some(port) = self.uart_port {
            config.uart_port = port;
        }
        if self.realtime {
            config.realtime = true;
        }
        if let Some(tick_budget) = self.tick_budget {
            config.tick_budget = tick_budget;
        }
        #[cfg(feature = "dumps")]
        {
            if self.raw_phase_dump.is_some() {
                config.raw_phase_dump = self.raw_phase_dump;
            }
            if self.modulated_audio_dump.is_some() {
                config.modulated_audio_dump = self.modulated_audio_dump;
            }
        }

        if config.ic1.as_os_str().is_empty() || config.ic2.as_os_str().is_empty() {
            return Err(MachineError::Config(
                "both --ic1 and --ic2 ROM paths are required".into(),
            ));
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unimplemented_policy_maps_to_bus_policy() {
        assert_eq!(
            UnimplementedPolicy::from(UnimplementedValuePolicy::Zero),
            UnimplementedPolicy::Zeros
        );
        assert_eq!(
            UnimplementedPolicy::from(UnimplementedValuePolicy::AllOnes),
            UnimplementedPolicy::Ones
        );
    }

    #[test]
    fn config_round_trips_through_yaml() {
        let config = Config {
            ic1: PathBuf::from("ic1.bin"),
            ic2: PathBuf::from("ic2.bin"),
            unimplemented_policy: UnimplementedValuePolicy::AllOnes,
            uart_port: 7100,
            realtime: true,
            tick_budget: 5,
            #[cfg(feature = "dumps")]
            raw_phase_dump: None,
            #[cfg(feature = "dumps")]
            modulated_audio_dump: None,
        };
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.ic1, config.ic1);
        assert_eq!(parsed.unimplemented_policy, config.unimplemented_policy);
        assert_eq!(parsed.uart_port, config.uart_port);
    }

    #[test]
    fn defaults_fill_in_missing_yaml_keys() {
        let yaml = "ic1: a.bin\nic2: b.bin\n";
        let parsed: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(parsed.uart_port, DEFAULT_UART_PORT);
        assert_eq!(parsed.unimplemented_policy, UnimplementedValuePolicy::Zero);
        assert!(!parsed.realtime);
    }
}
