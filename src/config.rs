use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::frame::{is_channel_delimiter, ACCUMULATOR_CAPACITY};
use crate::pixel_format::ChannelOrder;
use crate::protocol::StripProtocol;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub link: LinkConfig,
    #[serde(default)]
    pub handshake: HandshakeConfig,
    #[serde(default)]
    pub framing: FramingConfig,
    pub strip: StripConfig,
    /// Sleep between control loop iterations
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

/// Serial port the host talks to
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LinkConfig {
    pub port: String,
    pub baud_rate: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HandshakeConfig {
    pub ready_marker: char,
    pub proceed_marker: char,
    pub retry_interval_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FramingStrategy {
    /// Decimal `r g b;` records, frames ended by `frame_terminator`
    #[default]
    Ascii,
    /// Three raw bytes per pixel, frames delimited by count only
    Raw,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FramingConfig {
    pub strategy: FramingStrategy,
    /// Order of the channels as the host sends them
    pub channel_order: ChannelOrder,
    /// Quiet time after which the host is considered gone
    pub stall_timeout_ms: u64,
    /// Digits allowed in one ASCII channel value
    pub max_accumulator: usize,
    pub pixel_terminator: char,
    pub frame_terminator: char,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripConfig {
    pub led_count: usize,
    /// Downstream LED controller. Frames are only logged when absent.
    pub output: Option<OutputConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    pub port: String,
    pub protocol: StripProtocol,
    pub baud_rate: u32,
    /// Channel order the strip expects
    #[serde(default)]
    pub pixel_format: ChannelOrder,
}

/// Configuration rejected by [`Config::validate`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("strip.led_count must be at least 1")]
    EmptyStrip,
    #[error("{name} {value:?} is not a single-byte ASCII character")]
    NotAscii { name: &'static str, value: char },
    #[error("{first} and {second} are both {value:?}")]
    Collision {
        first: &'static str,
        second: &'static str,
        value: char,
    },
    #[error("{name} {value:?} is reserved for ASCII pixel data")]
    Reserved { name: &'static str, value: char },
    #[error("framing.max_accumulator must be between 3 and {max}, got {value}")]
    AccumulatorLimit { value: usize, max: usize },
    #[error("{0} must be greater than zero")]
    ZeroInterval(&'static str),
}

fn default_poll_interval_ms() -> u64 {
    1
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        HandshakeConfig {
            ready_marker: 'R',
            proceed_marker: 'F',
            retry_interval_ms: 500,
        }
    }
}

impl Default for FramingConfig {
    fn default() -> Self {
        FramingConfig {
            strategy: FramingStrategy::Ascii,
            channel_order: ChannelOrder::Rgb,
            stall_timeout_ms: 2000,
            max_accumulator: 3,
            pixel_terminator: ';',
            frame_terminator: '\n',
        }
    }
}

impl HandshakeConfig {
    pub fn ready_byte(&self) -> u8 {
        self.ready_marker as u8
    }

    pub fn proceed_byte(&self) -> u8 {
        self.proceed_marker as u8
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }
}

impl FramingConfig {
    pub fn pixel_terminator_byte(&self) -> u8 {
        self.pixel_terminator as u8
    }

    pub fn frame_terminator_byte(&self) -> u8 {
        self.frame_terminator as u8
    }

    pub fn stall_timeout(&self) -> Duration {
        Duration::from_millis(self.stall_timeout_ms)
    }
}

impl Config {
    /// Read, parse and validate a JSON configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let config_data = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = serde_json::from_str(&config_data)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.strip.led_count == 0 {
            return Err(ConfigError::EmptyStrip);
        }
        if self.handshake.retry_interval_ms == 0 {
            return Err(ConfigError::ZeroInterval("handshake.retry_interval_ms"));
        }
        if self.framing.stall_timeout_ms == 0 {
            return Err(ConfigError::ZeroInterval("framing.stall_timeout_ms"));
        }

        let mut reserved = vec![
            ("handshake.ready_marker", self.handshake.ready_marker),
            ("handshake.proceed_marker", self.handshake.proceed_marker),
        ];

        // Raw framing treats every byte as data, so only the markers matter
        if self.framing.strategy == FramingStrategy::Ascii {
            let max = ACCUMULATOR_CAPACITY;
            if !(3..=max).contains(&self.framing.max_accumulator) {
                return Err(ConfigError::AccumulatorLimit {
                    value: self.framing.max_accumulator,
                    max,
                });
            }
            reserved.push(("framing.pixel_terminator", self.framing.pixel_terminator));
            reserved.push(("framing.frame_terminator", self.framing.frame_terminator));
        }

        for &(name, value) in &reserved {
            if !value.is_ascii() {
                return Err(ConfigError::NotAscii { name, value });
            }
            let byte = value as u8;
            if self.framing.strategy == FramingStrategy::Ascii
                && (byte.is_ascii_digit() || is_channel_delimiter(byte))
            {
                return Err(ConfigError::Reserved { name, value });
            }
        }

        for (i, &(first, value)) in reserved.iter().enumerate() {
            if let Some(&(second, _)) = reserved[i + 1..].iter().find(|(_, v)| *v == value) {
                return Err(ConfigError::Collision { first, second, value });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"{
        "link": { "port": "/dev/ttyACM0", "baud_rate": 115200 },
        "strip": { "led_count": 60 }
    }"#;

    fn minimal() -> Config {
        serde_json::from_str(MINIMAL).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = minimal();
        assert_eq!(config.handshake.ready_byte(), b'R');
        assert_eq!(config.handshake.proceed_byte(), b'F');
        assert_eq!(config.handshake.retry_interval(), Duration::from_millis(500));
        assert_eq!(config.framing.strategy, FramingStrategy::Ascii);
        assert_eq!(config.framing.frame_terminator_byte(), b'\n');
        assert_eq!(config.poll_interval_ms, 1);
        assert!(config.strip.output.is_none());
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn test_full_config() {
        let config: Config = serde_json::from_str(
            r#"{
                "link": { "port": "COM3", "baud_rate": 230400 },
                "handshake": { "ready_marker": "S", "proceed_marker": "G", "retry_interval_ms": 250 },
                "framing": { "strategy": "raw", "channel_order": "GRB", "stall_timeout_ms": 500 },
                "strip": {
                    "led_count": 30,
                    "output": { "port": "/dev/ttyUSB0", "protocol": "awa", "baud_rate": 2000000 }
                },
                "poll_interval_ms": 5
            }"#,
        )
        .unwrap();

        assert_eq!(config.framing.strategy, FramingStrategy::Raw);
        assert_eq!(config.framing.channel_order, ChannelOrder::Grb);
        assert_eq!(config.framing.max_accumulator, 3);
        let output = config.strip.output.as_ref().unwrap();
        assert_eq!(output.protocol, StripProtocol::Awa);
        assert_eq!(output.pixel_format, ChannelOrder::Rgb);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn test_empty_strip_rejected() {
        let mut config = minimal();
        config.strip.led_count = 0;
        assert_eq!(config.validate(), Err(ConfigError::EmptyStrip));
    }

    #[test]
    fn test_markers_must_differ() {
        let mut config = minimal();
        config.handshake.proceed_marker = 'R';
        assert!(matches!(config.validate(), Err(ConfigError::Collision { .. })));
    }

    #[test]
    fn test_ascii_reserves_digits_and_delimiters() {
        let mut config = minimal();
        config.handshake.ready_marker = '7';
        assert!(matches!(config.validate(), Err(ConfigError::Reserved { .. })));

        let mut config = minimal();
        config.framing.pixel_terminator = ',';
        assert!(matches!(config.validate(), Err(ConfigError::Reserved { .. })));
    }

    #[test]
    fn test_marker_may_not_be_terminator() {
        let mut config = minimal();
        config.handshake.ready_marker = ';';
        assert_eq!(
            config.validate(),
            Err(ConfigError::Collision {
                first: "handshake.ready_marker",
                second: "framing.pixel_terminator",
                value: ';',
            })
        );
    }

    #[test]
    fn test_raw_allows_digit_markers() {
        let mut config = minimal();
        config.framing.strategy = FramingStrategy::Raw;
        config.handshake.ready_marker = '1';
        config.handshake.proceed_marker = '2';
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn test_non_ascii_marker_rejected() {
        let mut config = minimal();
        config.handshake.ready_marker = 'é';
        assert!(matches!(config.validate(), Err(ConfigError::NotAscii { .. })));
    }

    #[test]
    fn test_accumulator_limit() {
        let mut config = minimal();
        config.framing.max_accumulator = 2;
        assert!(matches!(config.validate(), Err(ConfigError::AccumulatorLimit { .. })));
        config.framing.max_accumulator = ACCUMULATOR_CAPACITY;
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn test_zero_intervals_rejected() {
        let mut config = minimal();
        config.framing.stall_timeout_ms = 0;
        assert_eq!(
            config.validate(),
            Err(ConfigError::ZeroInterval("framing.stall_timeout_ms"))
        );
    }
}
