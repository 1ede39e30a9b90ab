//! Error types surfaced to the driver binary.
//!
//! Everything in here is fatal at startup; transient conditions (an
//! unconnected UART transport, a read of an unimplemented bus region) are
//! logged and answered with a synthetic value instead of propagating here.

use std::io;
use std::path::PathBuf;

use crate::peripherals::datatrak::DatatrakMode;

/// Errors that can abort emulator startup or a hard reload.
#[derive(Debug, thiserror::Error)]
pub enum MachineError {
    #[error("failed to read ROM image {path}: {source}")]
    Rom {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("ROM image {path} is {actual} bytes, expected {expected}")]
    RomSize {
        path: PathBuf,
        actual: usize,
        expected: usize,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("unsupported Datatrak mode {0:?}; only EightSlot is implemented")]
    UnsupportedMode(DatatrakMode),
}
