use std::io;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

use super::ByteLink;
use crate::config::HandshakeConfig;

/// Outcome of one [`Handshake::poll`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakePoll {
    Waiting,
    /// The ready marker was found; `consumed` input bytes belong to the
    /// handshake and the rest is frame data.
    Connected { consumed: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Waiting,
    Connected,
}

/// Non-blocking ready/proceed exchange with the host.
///
/// While waiting, the ready marker goes out once per retry interval. The host
/// answers with the same marker; the device then sends the proceed marker once
/// and is connected. Anything else received while waiting is ignored.
#[derive(Debug, Clone)]
pub struct Handshake {
    ready: u8,
    proceed: u8,
    retry_interval: Duration,
    state: State,
    next_ready_at: Option<Instant>,
}

impl Handshake {
    pub fn new(config: &HandshakeConfig) -> Self {
        Handshake {
            ready: config.ready_byte(),
            proceed: config.proceed_byte(),
            retry_interval: config.retry_interval(),
            state: State::Waiting,
            next_ready_at: None,
        }
    }

    /// Advance the handshake with the bytes read this iteration.
    ///
    /// Inert once connected until [`Handshake::restart`] is called.
    pub fn poll<L: ByteLink + ?Sized>(
        &mut self,
        now: Instant,
        input: &[u8],
        link: &mut L,
    ) -> io::Result<HandshakePoll> {
        if self.state == State::Connected {
            return Ok(HandshakePoll::Connected { consumed: 0 });
        }

        if let Some(index) = input.iter().position(|&b| b == self.ready) {
            if index > 0 {
                trace!("Ignored {} bytes while waiting for host", index);
            }
            link.write_all(&[self.proceed])?;
            self.state = State::Connected;
            self.next_ready_at = None;
            debug!("Handshake complete");
            return Ok(HandshakePoll::Connected { consumed: index + 1 });
        }

        if !input.is_empty() {
            trace!("Ignored {} bytes while waiting for host", input.len());
        }

        if self.next_ready_at.map_or(true, |at| now >= at) {
            link.write_all(&[self.ready])?;
            self.next_ready_at = Some(now + self.retry_interval);
        }

        Ok(HandshakePoll::Waiting)
    }

    /// Go back to waiting; the next poll emits the ready marker immediately
    pub fn restart(&mut self) {
        self.state = State::Waiting;
        self.next_ready_at = None;
    }

    #[cfg(test)]
    pub fn is_connected(&self) -> bool {
        self.state == State::Connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::MemoryLink;

    fn handshake() -> Handshake {
        Handshake::new(&HandshakeConfig::default())
    }

    #[test]
    fn test_ready_marker_emitted_on_interval() {
        let mut hs = handshake();
        let mut link = MemoryLink::default();
        let t0 = Instant::now();

        assert_eq!(hs.poll(t0, &[], &mut link).unwrap(), HandshakePoll::Waiting);
        assert_eq!(link.take_written(), b"R");

        hs.poll(t0 + Duration::from_millis(100), &[], &mut link).unwrap();
        hs.poll(t0 + Duration::from_millis(499), &[], &mut link).unwrap();
        assert!(link.written.is_empty());

        hs.poll(t0 + Duration::from_millis(500), &[], &mut link).unwrap();
        assert_eq!(link.take_written(), b"R");
    }

    #[test]
    fn test_noise_keeps_waiting() {
        let mut hs = handshake();
        let mut link = MemoryLink::default();
        let t0 = Instant::now();

        let chunks: [&[u8]; 4] = [b"xyz", b"F", b"\n\n", &[0, 255, 17]];
        for (i, chunk) in chunks.iter().enumerate() {
            let now = t0 + Duration::from_millis(i as u64);
            assert_eq!(hs.poll(now, chunk, &mut link).unwrap(), HandshakePoll::Waiting);
        }

        assert!(!hs.is_connected());
        assert!(!link.written.contains(&b'F'));
    }

    #[test]
    fn test_single_ready_connects_once() {
        let mut hs = handshake();
        let mut link = MemoryLink::default();
        let t0 = Instant::now();

        hs.poll(t0, &[], &mut link).unwrap();
        link.take_written();

        let result = hs.poll(t0, b"??R1 2 3;", &mut link).unwrap();
        assert_eq!(result, HandshakePoll::Connected { consumed: 3 });
        assert_eq!(link.take_written(), b"F");
        assert!(hs.is_connected());

        // Inert afterwards, even when the marker shows up again
        let result = hs.poll(t0 + Duration::from_secs(5), b"R", &mut link).unwrap();
        assert_eq!(result, HandshakePoll::Connected { consumed: 0 });
        assert!(link.written.is_empty());
    }

    #[test]
    fn test_restart_starts_clean() {
        let mut hs = handshake();
        let mut link = MemoryLink::default();
        let t0 = Instant::now();

        hs.poll(t0, b"R", &mut link).unwrap();
        link.take_written();

        hs.restart();
        assert!(!hs.is_connected());
        assert_eq!(hs.poll(t0, &[], &mut link).unwrap(), HandshakePoll::Waiting);
        assert_eq!(link.take_written(), b"R");

        assert_eq!(
            hs.poll(t0, b"R", &mut link).unwrap(),
            HandshakePoll::Connected { consumed: 1 }
        );
        assert_eq!(link.take_written(), b"F");
    }
}
