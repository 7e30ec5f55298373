//! # Driver Configuration
//!
//! Process-wide configuration, read once from the environment at startup and
//! passed by reference into every component. Nothing in the library mutates
//! it afterwards.
//!
//! ## Environment Variables
//!
//! | Variable | Meaning | Default |
//! |----------|---------|---------|
//! | `SUBLIMA_DEBUG` | verbosity: 0 quiet, 1 debug, 2 wire hex dumps | 0 |
//! | `SUBLIMA_MAX_XFER_SIZE` | maximum bytes per bulk write | 65536 |
//! | `SUBLIMA_XFER_TIMEOUT` | per-transfer timeout, milliseconds | 5000 |
//! | `SUBLIMA_EXTRA_VID` | hex vendor id to match in addition to the tables | — |
//! | `SUBLIMA_EXTRA_PID` | hex product id for the override entry | — |
//! | `SUBLIMA_EXTRA_TYPE` | printer type tag for the override entry | — |
//! | `SUBLIMA_TEST_MODE` | 1 = parse and schedule jobs but skip the device | 0 |
//! | `SUBLIMA_OLD_URI_SCHEME` | 1 = legacy query-string discovery URIs | 0 |
//! | `SUBLIMA_BACKEND` | restrict probing to one backend by name | — |
//! | `SUBLIMA_SERIAL` | restrict probing to one printer serial | — |

use std::env;
use std::time::Duration;

use crate::printer::PrinterType;

/// Default maximum bytes handed to a single bulk write.
pub const DEFAULT_MAX_XFER_SIZE: usize = 64 * 1024;

/// Default per-transfer timeout.
pub const DEFAULT_XFER_TIMEOUT_MS: u64 = 5000;

/// A forced vendor/product match injected from the environment, used to
/// drive an unlisted printer that speaks a known protocol.
#[derive(Debug, Clone, Copy)]
pub struct ExtraDevice {
    pub vid: u16,
    pub pid: u16,
    pub printer_type: PrinterType,
}

/// Immutable process-wide configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Verbosity: 0 quiet, 1 debug logging, 2 adds wire hex dumps.
    pub debug: u8,
    /// Maximum bytes per bulk write; larger payloads are chunked.
    pub max_xfer_size: usize,
    /// Timeout applied to each individual USB transfer.
    pub xfer_timeout: Duration,
    /// Forced extra device-table entry, if any.
    pub extra_device: Option<ExtraDevice>,
    /// When set, jobs are parsed and scheduled but never sent to hardware.
    pub test_mode: bool,
    /// Emit legacy query-string discovery URIs instead of path-style ones.
    pub old_uri_scheme: bool,
    /// Restrict probing to the named backend.
    pub backend_filter: Option<String>,
    /// Restrict probing to the printer with this serial number.
    pub serial_filter: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debug: 0,
            max_xfer_size: DEFAULT_MAX_XFER_SIZE,
            xfer_timeout: Duration::from_millis(DEFAULT_XFER_TIMEOUT_MS),
            extra_device: None,
            test_mode: false,
            old_uri_scheme: false,
            backend_filter: None,
            serial_filter: None,
        }
    }
}

impl Config {
    /// Build the configuration from the process environment.
    ///
    /// Unparseable values fall back to the defaults with a warning rather
    /// than aborting; a half-configured override (VID without PID or type)
    /// is ignored entirely.
    pub fn from_env() -> Self {
        let mut config = Config::default();

        if let Some(level) = env_number("SUBLIMA_DEBUG") {
            config.debug = level.min(u8::MAX as u64) as u8;
        }
        if let Some(size) = env_number("SUBLIMA_MAX_XFER_SIZE") {
            if size > 0 {
                config.max_xfer_size = size as usize;
            } else {
                log::warn!("SUBLIMA_MAX_XFER_SIZE must be nonzero, using default");
            }
        }
        if let Some(ms) = env_number("SUBLIMA_XFER_TIMEOUT") {
            config.xfer_timeout = Duration::from_millis(ms);
        }

        config.extra_device = parse_extra_device();

        config.test_mode = env_number("SUBLIMA_TEST_MODE").unwrap_or(0) != 0;
        config.old_uri_scheme = env_number("SUBLIMA_OLD_URI_SCHEME").unwrap_or(0) != 0;

        config.backend_filter = env_string("SUBLIMA_BACKEND");
        config.serial_filter = env_string("SUBLIMA_SERIAL");

        config
    }

    /// Whether wire-level hex dumps are enabled.
    #[inline]
    pub fn dump_traffic(&self) -> bool {
        self.debug >= 2
    }
}

/// Read a non-empty environment string.
fn env_string(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => None,
    }
}

/// Read a decimal number from the environment.
fn env_number(key: &str) -> Option<u64> {
    let raw = env_string(key)?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            log::warn!("ignoring unparseable {}={:?}", key, raw);
            None
        }
    }
}

/// Read a hex number (with or without an `0x` prefix).
fn env_hex(key: &str) -> Option<u16> {
    let raw = env_string(key)?;
    let digits = raw.trim_start_matches("0x").trim_start_matches("0X");
    match u16::from_str_radix(digits, 16) {
        Ok(v) => Some(v),
        Err(_) => {
            log::warn!("ignoring unparseable {}={:?}", key, raw);
            None
        }
    }
}

/// Assemble the forced device entry; all three parts must be present.
fn parse_extra_device() -> Option<ExtraDevice> {
    let vid = env_hex("SUBLIMA_EXTRA_VID");
    let pid = env_hex("SUBLIMA_EXTRA_PID");
    let type_name = env_string("SUBLIMA_EXTRA_TYPE");

    match (vid, pid, type_name) {
        (Some(vid), Some(pid), Some(name)) => match PrinterType::from_name(&name) {
            Some(printer_type) => Some(ExtraDevice {
                vid,
                pid,
                printer_type,
            }),
            None => {
                log::warn!("unknown SUBLIMA_EXTRA_TYPE {:?}, override ignored", name);
                None
            }
        },
        (None, None, None) => None,
        _ => {
            log::warn!(
                "SUBLIMA_EXTRA_VID/PID/TYPE must all be set for an override, ignoring"
            );
            None
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
