use anyhow::{Context, Result};
use serialport::SerialPort;
use std::io::Write;
use std::thread;
use std::time::Duration;
use tracing::{debug, enabled, info, trace, warn, Level};

use crate::config::OutputConfig;
use crate::frame::BYTES_PER_PIXEL;
use crate::pixel_format::{encode_frame, Pixel};

/// Anything that can put a whole frame on the LEDs.
///
/// `show` is synchronous; showing the same frame twice looks the same as
/// showing it once.
pub trait StripSink {
    fn show(&mut self, frame: &[Pixel]) -> Result<()>;

    /// Turn every LED off
    fn blank(&mut self, led_count: usize) -> Result<()> {
        self.show(&vec![Pixel::BLACK; led_count])
    }
}

/// Forwards frames to a serial LED controller (Adalight or AWA framing)
pub struct SerialStripSink {
    port: Box<dyn SerialPort>,
    config: OutputConfig,
    /// Pixel bytes in the strip's channel order
    ordered: Vec<u8>,
    /// Complete protocol frame
    wire: Vec<u8>,
    frames_sent: u64,
}

impl SerialStripSink {
    pub fn open(config: OutputConfig, led_count: usize) -> Result<Self> {
        let mut port = serialport::new(&config.port, config.baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .open()
            .with_context(|| format!("Failed to open strip port {}", config.port))?;

        // Writes give up after one second
        port.set_timeout(Duration::from_millis(1000))
            .context("Failed to set strip port timeout")?;

        if let Err(e) = port.write_data_terminal_ready(true) {
            warn!("Failed to set DTR on {}: {}", config.port, e);
        }

        // Allow controller to initialize
        thread::sleep(Duration::from_millis(100));

        info!(
            "Opened strip {} ({:?} @ {} baud, {} LEDs, {:?})",
            config.port, config.protocol, config.baud_rate, led_count, config.pixel_format
        );

        let payload = led_count * BYTES_PER_PIXEL;
        Ok(SerialStripSink {
            port,
            config,
            ordered: Vec::with_capacity(payload),
            wire: Vec::with_capacity(payload + 9),
            frames_sent: 0,
        })
    }
}

impl Drop for SerialStripSink {
    fn drop(&mut self) {
        debug!("Closing {} after {} frames", self.config.port, self.frames_sent);
    }
}

impl StripSink for SerialStripSink {
    fn show(&mut self, frame: &[Pixel]) -> Result<()> {
        encode_frame(frame, self.config.pixel_format, &mut self.ordered);
        self.config.protocol.write_frame(&self.ordered, &mut self.wire);

        if enabled!(Level::TRACE) {
            let hex: String = self
                .wire
                .iter()
                .map(|b| format!("{:02x}", b))
                .collect::<Vec<_>>()
                .join(" ");
            trace!("[{}] Sending {} bytes: {}", self.config.port, self.wire.len(), hex);
        }

        self.port
            .write_all(&self.wire)
            .with_context(|| format!("Serial error on {}", self.config.port))?;
        self.port
            .flush()
            .with_context(|| format!("Failed to flush {}", self.config.port))?;

        self.frames_sent += 1;
        Ok(())
    }
}

/// Dry-run sink for running without a strip attached
#[derive(Debug, Default)]
pub struct LogSink {
    frames: u64,
}

impl StripSink for LogSink {
    fn show(&mut self, frame: &[Pixel]) -> Result<()> {
        self.frames += 1;
        debug!(
            "Frame {}: {} pixels, first {:?}",
            self.frames,
            frame.len(),
            frame.first()
        );
        Ok(())
    }
}

/// Keeps a copy of every frame shown
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub frames: Vec<Vec<Pixel>>,
}

#[cfg(test)]
impl StripSink for RecordingSink {
    fn show(&mut self, frame: &[Pixel]) -> Result<()> {
        self.frames.push(frame.to_vec());
        Ok(())
    }
}

/// Fails the first `failures_left` shows, then records like `RecordingSink`
#[cfg(test)]
#[derive(Debug, Default)]
pub struct FailingSink {
    pub failures_left: usize,
    pub frames: Vec<Vec<Pixel>>,
}

#[cfg(test)]
impl FailingSink {
    pub fn new(failures: usize) -> Self {
        FailingSink {
            failures_left: failures,
            frames: Vec::new(),
        }
    }
}

#[cfg(test)]
impl StripSink for FailingSink {
    fn show(&mut self, frame: &[Pixel]) -> Result<()> {
        if self.failures_left > 0 {
            self.failures_left -= 1;
            anyhow::bail!("strip unplugged");
        }
        self.frames.push(frame.to_vec());
        Ok(())
    }
}
