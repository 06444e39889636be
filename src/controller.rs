use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::frame::{AssemblerStats, FrameAssembler};
use crate::link::{ByteLink, ConnectionState, Handshake, HandshakePoll};
use crate::output::StripSink;

const READ_BUFFER_SIZE: usize = 4096;
const STATS_INTERVAL: Duration = Duration::from_secs(5);

/// Link counters kept by the controller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    pub bytes_received: u64,
    pub connects: u64,
    pub stalls: u64,
    pub link_errors: u64,
    pub sink_errors: u64,
}

/// Single-threaded control loop tying the handshake, the assembler and the
/// stall watchdog together.
///
/// Owns the connection state. Each [`Controller::poll_once`] does a bounded
/// amount of work and returns.
pub struct Controller {
    state: ConnectionState,
    handshake: Handshake,
    assembler: FrameAssembler,
    stall_timeout: Duration,
    last_rx: Instant,
    read_buf: Box<[u8]>,
    stats: LinkStats,
    running: Arc<AtomicBool>,
    poll_interval: Duration,
    report_stats: bool,
    /// Set after a link error until the next successful connect
    link_failing: bool,
    /// Set after a sink error until the next frame is shown
    sink_failing: bool,
}

impl Controller {
    pub fn new(config: &Config, report_stats: bool) -> Self {
        Controller {
            state: ConnectionState::Disconnected,
            handshake: Handshake::new(&config.handshake),
            assembler: FrameAssembler::new(config.strip.led_count, &config.framing),
            stall_timeout: config.framing.stall_timeout(),
            last_rx: Instant::now(),
            read_buf: vec![0u8; READ_BUFFER_SIZE].into_boxed_slice(),
            stats: LinkStats::default(),
            running: Arc::new(AtomicBool::new(true)),
            poll_interval: config.poll_interval(),
            report_stats,
            link_failing: false,
            sink_failing: false,
        }
    }

    /// Get a clone of the running flag for signal handlers
    pub fn get_running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    #[cfg(test)]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    #[cfg(test)]
    pub fn stats(&self) -> LinkStats {
        self.stats
    }

    #[cfg(test)]
    pub fn assembler(&self) -> &FrameAssembler {
        &self.assembler
    }

    /// Run until the running flag is cleared
    pub fn run<L, S>(&mut self, link: &mut L, sink: &mut S)
    where
        L: ByteLink + ?Sized,
        S: StripSink + ?Sized,
    {
        info!("Waiting for host handshake...");

        let mut reporter = StatsReporter::new(Instant::now());

        while self.running.load(Ordering::Relaxed) {
            let now = Instant::now();
            self.poll_once(now, link, sink);

            if self.report_stats {
                reporter.maybe_report(now, self.stats, self.assembler.stats());
            }

            thread::sleep(self.poll_interval);
        }
    }

    /// One loop iteration: drain pending input, then handshake or assemble.
    ///
    /// Never fails. Link errors drop the connection and restart the
    /// handshake; sink errors lose the frame being shown.
    pub fn poll_once<L, S>(&mut self, now: Instant, link: &mut L, sink: &mut S)
    where
        L: ByteLink + ?Sized,
        S: StripSink + ?Sized,
    {
        let n = match link.read_available(&mut self.read_buf) {
            Ok(n) => n,
            Err(e) => {
                self.drop_link("Failed to read from host link", &e);
                return;
            }
        };
        let mut input = &self.read_buf[..n];

        if n > 0 {
            self.last_rx = now;
            self.stats.bytes_received += n as u64;
        }

        if self.state == ConnectionState::Disconnected {
            match self.handshake.poll(now, input, link) {
                Ok(HandshakePoll::Waiting) => return,
                Ok(HandshakePoll::Connected { consumed }) => {
                    self.state = ConnectionState::Connected;
                    self.last_rx = now;
                    self.stats.connects += 1;
                    self.link_failing = false;
                    info!("Host connected");
                    input = &self.read_buf[consumed..n];
                }
                Err(e) => {
                    self.drop_link("Failed to write handshake marker", &e);
                    return;
                }
            }
        }

        if !input.is_empty() {
            match self.assembler.feed(input, sink) {
                Ok(shown) if shown > 0 => self.sink_failing = false,
                Ok(_) => {}
                Err(e) => {
                    self.stats.sink_errors += 1;
                    if self.sink_failing {
                        debug!("Strip still failing: {:#}", e);
                    } else {
                        warn!("Failed to show frame: {:#}", e);
                        self.sink_failing = true;
                    }
                }
            }
        } else if now.saturating_duration_since(self.last_rx) >= self.stall_timeout {
            self.stats.stalls += 1;
            info!(
                "No data from host for {:?}, reconnecting",
                self.stall_timeout
            );
            self.disconnect();
        }
    }

    /// Treat a link error as a disconnect; warns once per failure streak
    fn drop_link(&mut self, what: &str, err: &io::Error) {
        self.stats.link_errors += 1;
        if self.link_failing {
            debug!("{}: {}", what, err);
        } else {
            warn!("{}: {}", what, err);
            self.link_failing = true;
        }
        if self.state == ConnectionState::Connected {
            info!("Host link lost, reconnecting");
        }
        self.disconnect();
    }

    fn disconnect(&mut self) {
        self.state = ConnectionState::Disconnected;
        self.assembler.reset();
        self.handshake.restart();
    }

    /// Turn the strip off before exit
    pub fn shutdown<S: StripSink + ?Sized>(&mut self, sink: &mut S) {
        debug!("Turning off LEDs...");
        if let Err(e) = sink.blank(self.assembler.led_count()) {
            debug!("Could not blank strip: {:#}", e);
        }
    }
}

/// Periodic throughput summary, logged at info
struct StatsReporter {
    last_at: Instant,
    last_link: LinkStats,
    last_frames: AssemblerStats,
}

impl StatsReporter {
    fn new(now: Instant) -> Self {
        StatsReporter {
            last_at: now,
            last_link: LinkStats::default(),
            last_frames: AssemblerStats::default(),
        }
    }

    fn maybe_report(&mut self, now: Instant, link: LinkStats, frames: AssemblerStats) {
        let elapsed = now.saturating_duration_since(self.last_at);
        if elapsed < STATS_INTERVAL {
            return;
        }
        let secs = elapsed.as_secs_f64();

        info!(
            "[Stats] Shown: {:.1} fps, Decoded: {:.0} px/s, Received: {:.0} B/s, desyncs: {}, discarded: {}, connects: {}, stalls: {}, link errors: {}, sink errors: {}",
            (frames.frames_shown - self.last_frames.frames_shown) as f64 / secs,
            (frames.pixels_decoded - self.last_frames.pixels_decoded) as f64 / secs,
            (link.bytes_received - self.last_link.bytes_received) as f64 / secs,
            frames.desyncs - self.last_frames.desyncs,
            frames.partial_frames_discarded - self.last_frames.partial_frames_discarded,
            link.connects,
            link.stalls,
            link.link_errors,
            link.sink_errors,
        );

        self.last_at = now;
        self.last_link = link;
        self.last_frames = frames;
    }
}
