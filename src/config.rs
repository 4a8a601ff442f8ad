//! Configuration loading for the PTY session core.
//!
//! Follows the teacher's `daemon::config::DaemonConfig` shape: a plain
//! struct with a `Default` impl and a `validate()` pass, loaded here from
//! environment variables rather than a TOML file since the core has no
//! on-disk config of its own (that belongs to the external transport).

use crate::error::{Error, Result};

/// Default terminal width, in columns.
pub const DEFAULT_COLS: u16 = 80;
/// Default terminal height, in rows.
pub const DEFAULT_ROWS: u16 = 16 + 8;
/// Default scrollback cap, in lines.
pub const DEFAULT_SCROLLBACK_LINES: usize = 5000;
/// Default ingestion ring capacity, in bytes.
pub const DEFAULT_RING_CAPACITY: usize = 1024 * 1024;

/// Tunable knobs for the PTY session core, sourced from the process
/// environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Quiescence window, in milliseconds, used by every collecting
    /// operation (`run`/`send_input`/`send_control`/`send_password`) to
    /// decide the PTY has gone silent. `QUIESCENCE_MS` env var, default 1000.
    pub quiescence_ms: u64,
    /// Default PTY dimensions for newly-spawned sessions.
    pub default_cols: u16,
    pub default_rows: u16,
    /// On-disk root for transcripts and session metadata. `PILOTY_HOME` env
    /// var, default `~/.piloty`.
    pub root: std::path::PathBuf,
    /// Scrollback cap, in lines.
    pub scrollback_lines: usize,
    /// Ingestion ring capacity, in bytes.
    pub ring_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            quiescence_ms: 1000,
            default_cols: DEFAULT_COLS,
            default_rows: DEFAULT_ROWS,
            root: default_root(),
            scrollback_lines: DEFAULT_SCROLLBACK_LINES,
            ring_capacity: DEFAULT_RING_CAPACITY,
        }
    }
}

fn default_root() -> std::path::PathBuf {
    if let Ok(over) = std::env::var("PILOTY_HOME") {
        return std::path::PathBuf::from(over);
    }
    dirs::home_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join(".piloty")
}

impl Config {
    /// Load configuration from the process environment, falling back to
    /// defaults for anything unset or unparsable.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(raw) = std::env::var("QUIESCENCE_MS") {
            config.quiescence_ms = raw
                .parse()
                .map_err(|_| Error::InvalidArgument(format!("QUIESCENCE_MS: invalid value {raw:?}")))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration, rejecting degenerate dimensions and
    /// windows.
    pub fn validate(&self) -> Result<()> {
        if self.default_cols < 1 || self.default_rows < 1 {
            return Err(Error::InvalidArgument(
                "terminal dimensions must be at least 1x1".into(),
            ));
        }
        if self.quiescence_ms == 0 {
            return Err(Error::InvalidArgument("quiescence_ms must be > 0".into()));
        }
        if self.ring_capacity == 0 {
            return Err(Error::InvalidArgument("ring_capacity must be > 0".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_cols, 80);
        assert_eq!(config.default_rows, 24);
    }

    #[test]
    fn rejects_zero_quiescence() {
        let mut config = Config::default();
        config.quiescence_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_degenerate_dimensions() {
        let mut config = Config::default();
        config.default_cols = 0;
        assert!(config.validate().is_err());
    }
}
