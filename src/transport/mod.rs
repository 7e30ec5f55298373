//! # Printer Transport Layer
//!
//! Byte-level communication with the printer. The protocol layer and the
//! print engine only ever see the [`Transport`] trait, so they can be
//! exercised against the scripted in-memory transport in tests.
//!
//! ## Available Transports
//!
//! - [`usb`]: bulk-endpoint USB transfers (the production path)
//! - [`mock`]: scripted transport for unit and integration tests
//!
//! ## Contract
//!
//! - `send` must deliver the whole buffer or fail; chunking and partial-write
//!   retries are the transport's problem.
//! - `recv` must never return stale bytes from a previous call. The wire
//!   carries no out-of-band length, so a reused buffer would silently corrupt
//!   short responses.
//! - No retry policy lives here. Busy/buffer-full handling belongs to the
//!   print engine, which is the only layer that understands the decoded
//!   status codes.

pub mod usb;

#[doc(hidden)]
pub mod mock;

pub use usb::UsbTransport;

use crate::error::TransportError;

/// Byte transport to one printer.
pub trait Transport {
    /// Send the whole buffer to the device.
    fn send(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// Receive up to `max_len` bytes. Returns however many bytes the device
    /// produced within the timeout; an empty wire is an error, not `Ok(vec![])`.
    fn recv(&mut self, max_len: usize) -> Result<Vec<u8>, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        (**self).send(data)
    }

    fn recv(&mut self, max_len: usize) -> Result<Vec<u8>, TransportError> {
        (**self).recv(max_len)
    }
}

/// Format a buffer as an offset-prefixed hex dump for wire tracing.
///
/// ```text
/// 0000  1b 40 01 00 10 27        .@....
/// ```
pub fn hex_dump(data: &[u8]) -> String {
    let mut out = String::new();
    for (i, row) in data.chunks(16).enumerate() {
        let hex: Vec<String> = row.iter().map(|b| format!("{:02x}", b)).collect();
        let ascii: String = row
            .iter()
            .map(|&b| if (0x20..0x7f).contains(&b) { b as char } else { '.' })
            .collect();
        out.push_str(&format!("{:04x}  {:<47}  {}\n", i * 16, hex.join(" "), ascii));
    }
    out
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_dump_single_row() {
        let dump = hex_dump(&[0x1B, 0x40, 0x41]);
        assert!(dump.starts_with("0000  1b 40 41"));
        assert!(dump.trim_end().ends_with(".@A"));
    }

    #[test]
    fn test_hex_dump_multiple_rows() {
        let data: Vec<u8> = (0..20).collect();
        let dump = hex_dump(&data);
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("0010"));
    }

    #[test]
    fn test_hex_dump_empty() {
        assert_eq!(hex_dump(&[]), "");
    }
}
