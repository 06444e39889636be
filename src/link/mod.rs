//! Host side of the serial link: byte transport and connection handshake

mod handshake;

use anyhow::{Context, Result};
use serialport::SerialPort;
use std::io::{self, ErrorKind, Read, Write};
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::LinkConfig;

pub use handshake::{Handshake, HandshakePoll};

/// Logical state of the link with the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connected,
}

/// Bidirectional byte channel to the host
pub trait ByteLink {
    /// Copy bytes that have already arrived into `buf`, never waiting for more.
    ///
    /// Returns 0 when nothing is pending.
    fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Send `bytes` and flush them out
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()>;
}

/// Serial port carrying the host link
pub struct SerialLink {
    port: Box<dyn SerialPort>,
    name: String,
}

impl SerialLink {
    pub fn open(config: &LinkConfig) -> Result<Self> {
        let mut port = serialport::new(&config.port, config.baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .timeout(Duration::from_millis(10))
            .open()
            .with_context(|| format!("Failed to open link port {}", config.port))?;

        if let Err(e) = port.write_data_terminal_ready(true) {
            warn!("Failed to set DTR on {}: {}", config.port, e);
        }

        // Drop whatever the host sent before we were listening
        thread::sleep(Duration::from_millis(100));
        port.clear(serialport::ClearBuffer::Input).ok();

        info!("Opened link {} @ {} baud", config.port, config.baud_rate);

        Ok(SerialLink {
            port,
            name: config.port.clone(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl ByteLink for SerialLink {
    fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let pending = self.port.bytes_to_read()? as usize;
        if pending == 0 || buf.is_empty() {
            return Ok(0);
        }

        let want = pending.min(buf.len());
        match self.port.read(&mut buf[..want]) {
            Ok(n) => Ok(n),
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                ) =>
            {
                Ok(0)
            }
            Err(e) => Err(e),
        }
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        Write::write_all(&mut self.port, bytes)?;
        self.port.flush()
    }
}

/// In-memory link: scripted reads, captured writes
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryLink {
    incoming: std::collections::VecDeque<Vec<u8>>,
    pub written: Vec<u8>,
}

#[cfg(test)]
impl MemoryLink {
    /// Queue `bytes` to be returned by a single future read
    pub fn push_read(&mut self, bytes: &[u8]) {
        self.incoming.push_back(bytes.to_vec());
    }

    pub fn take_written(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.written)
    }
}

#[cfg(test)]
impl ByteLink for MemoryLink {
    fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let Some(mut chunk) = self.incoming.pop_front() else {
            return Ok(0);
        };
        let n = chunk.len().min(buf.len());
        buf[..n].copy_from_slice(&chunk[..n]);
        if n < chunk.len() {
            self.incoming.push_front(chunk.split_off(n));
        }
        Ok(n)
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.written.extend_from_slice(bytes);
        Ok(())
    }
}
