//! UART channel transports.
//!
//! A channel's byte sink/source is abstracted behind [`Transport`] so tests
//! can substitute an in-memory loopback pair instead of real sockets. The
//! concrete [`TcpTransport`] connects to a loopback endpoint; if nobody is
//! listening, the channel is simply absent — this is logged once and never
//! treated as fatal.

use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use log::warn;

/// Depth of the bounded queue fed by a transport's background reader
/// thread.
const RX_QUEUE_DEPTH: usize = 256;

/// A UART channel's byte sink/source.
pub trait Transport: Send {
    /// Send one byte. Best-effort; failures are logged, not propagated.
    fn send(&mut self, byte: u8);

    /// Pop one received byte if available, without blocking.
    fn try_recv(&mut self) -> Option<u8>;

    /// Release any background resources (sockets, reader threads) on an
    /// orderly shutdown. Default no-op for transports with nothing to
    /// release.
    fn shutdown(&mut self) {}
}

/// TCP-loopback transport: connects once at construction, then reads
/// continuously on a background thread into a bounded SPSC channel so the
/// emulator thread never blocks on socket I/O.
pub struct TcpTransport {
    stream: Option<TcpStream>,
    rx: Receiver<u8>,
    _reader: Option<thread::JoinHandle<()>>,
}

impl TcpTransport {
    /// Attempt to connect to `127.0.0.1:port`. On failure, returns a
    /// transport whose channel is permanently absent.
    pub fn connect(port: u16) -> Self {
        match TcpStream::connect(("127.0.0.1", port)) {
            Ok(stream) => {
                let read_stream = match stream.try_clone() {
                    Ok(s) => s,
                    Err(e) => {
                        warn!("UART transport on port {port}: failed to clone socket: {e}");
                        return Self::absent();
                    }
                };
                let (tx, rx) = crossbeam_channel::bounded(RX_QUEUE_DEPTH);
                let reader = thread::spawn(move || Self::reader_loop(read_stream, tx));
                Self {
                    stream: Some(stream),
                    rx,
                    _reader: Some(reader),
                }
            }
            Err(e) => {
                warn!("UART transport on port {port} not connected: {e}");
                Self::absent()
            }
        }
    }

    fn absent() -> Self {
        let (_tx, rx) = crossbeam_channel::bounded(0);
        Self {
            stream: None,
            rx,
            _reader: None,
        }
    }

    fn reader_loop(mut stream: TcpStream, tx: Sender<u8>) {
        let mut byte = [0u8; 1];
        loop {
            match stream.read(&mut byte) {
                Ok(0) => break,
                Ok(_) => {
                    if tx.send(byte[0]).is_err() {
                        break;
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(_) => {
                    thread::sleep(Duration::from_millis(10));
                }
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }
}

impl Transport for TcpTransport {
    fn send(&mut self, byte: u8) {
        if let Some(stream) = &mut self.stream {
            if let Err(e) = stream.write_all(&[byte]) {
                warn!("UART transport write failed: {e}");
            }
        }
    }

    fn try_recv(&mut self) -> Option<u8> {
        match self.rx.try_recv() {
            Ok(b) => Some(b),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Shut down the socket (unblocking the reader thread's `read` call)
    /// and join it, so a `Machine::shutdown` leaves no detached threads
    /// behind.
    fn shutdown(&mut self) {
        if let Some(stream) = &self.stream {
            let _ = stream.shutdown(Shutdown::Both);
        }
        if let Some(reader) = self._reader.take() {
            let _ = reader.join();
        }
    }
}

/// In-memory loopback pair for tests: bytes sent on one end arrive on the
/// other.
pub struct LoopbackTransport {
    out: Sender<u8>,
    inbound: Receiver<u8>,
}

impl LoopbackTransport {
    pub fn pair() -> (Self, Self) {
        let (tx_a, rx_a) = crossbeam_channel::unbounded();
        let (tx_b, rx_b) = crossbeam_channel::unbounded();
        (
            Self {
                out: tx_a,
                inbound: rx_b,
            },
            Self {
                out: tx_b,
                inbound: rx_a,
            },
        )
    }
}

impl Transport for LoopbackTransport {
    fn send(&mut self, byte: u8) {
        let _ = self.out.send(byte);
    }

    fn try_recv(&mut self) -> Option<u8> {
        self.inbound.try_recv().ok()
    }
}
