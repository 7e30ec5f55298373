//! # USB Bulk Transport
//!
//! Framed read/write over a claimed bulk endpoint pair, using synchronous
//! `rusb` transfers with a per-call timeout.
//!
//! ## Chunked Writes
//!
//! Payloads larger than the configured maximum transfer size are written in
//! chunks; a partial bulk write (the host controller accepted fewer bytes
//! than offered) advances the cursor and retries until the buffer is flushed
//! or the stack reports an error.
//!
//! ## Reads
//!
//! Every `recv` allocates a fresh buffer. The protocols served by this
//! driver never announce response lengths out of band, so a reused buffer
//! could leak bytes of a previous (longer) response into a short one.
//!
//! ## Tracing
//!
//! With debug level 2 the full traffic is hex dumped through the `log`
//! facade. This is a diagnostic aid only, never part of the contract.

use std::time::Duration;

use rusb::{Context, DeviceHandle};

use crate::error::TransportError;
use crate::transport::{hex_dump, Transport};

/// Bulk USB transport over an already-claimed interface.
///
/// Owns the device handle for the lifetime of the backend instance. The
/// claimed interface is released and the handle closed on drop, so every
/// exit path — including early error returns — tears the device down
/// exactly once.
pub struct UsbTransport {
    handle: DeviceHandle<Context>,
    iface: u8,
    ep_in: u8,
    ep_out: u8,
    timeout: Duration,
    max_xfer_size: usize,
    dump_traffic: bool,
}

impl UsbTransport {
    /// Wrap a claimed handle and its endpoint pair.
    pub fn new(
        handle: DeviceHandle<Context>,
        iface: u8,
        ep_in: u8,
        ep_out: u8,
        timeout: Duration,
        max_xfer_size: usize,
        dump_traffic: bool,
    ) -> Self {
        Self {
            handle,
            iface,
            ep_in,
            ep_out,
            timeout,
            max_xfer_size,
            dump_traffic,
        }
    }

    /// The underlying handle, for control transfers during discovery.
    pub fn handle(&self) -> &DeviceHandle<Context> {
        &self.handle
    }

    /// Bulk IN endpoint address.
    pub fn ep_in(&self) -> u8 {
        self.ep_in
    }

    /// Bulk OUT endpoint address.
    pub fn ep_out(&self) -> u8 {
        self.ep_out
    }

    fn map_usb_error(err: rusb::Error) -> TransportError {
        match err {
            rusb::Error::Timeout => TransportError::Timeout,
            other => TransportError::Io(other.to_string()),
        }
    }
}

impl Transport for UsbTransport {
    fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        if self.dump_traffic {
            log::debug!("USB TX {} bytes:\n{}", data.len(), hex_dump(data));
        }

        for chunk in data.chunks(self.max_xfer_size) {
            let mut offset = 0;
            while offset < chunk.len() {
                let written = self
                    .handle
                    .write_bulk(self.ep_out, &chunk[offset..], self.timeout)
                    .map_err(Self::map_usb_error)?;
                if written == 0 {
                    return Err(TransportError::Io("bulk write made no progress".into()));
                }
                offset += written;
            }
        }
        Ok(())
    }

    fn recv(&mut self, max_len: usize) -> Result<Vec<u8>, TransportError> {
        // Fresh buffer per call: stale bytes must not leak across reads.
        let mut buf = vec![0u8; max_len];
        let got = self
            .handle
            .read_bulk(self.ep_in, &mut buf, self.timeout)
            .map_err(Self::map_usb_error)?;
        buf.truncate(got);

        if self.dump_traffic {
            log::debug!("USB RX {} bytes:\n{}", buf.len(), hex_dump(&buf));
        }
        Ok(buf)
    }
}

impl Drop for UsbTransport {
    fn drop(&mut self) {
        if let Err(e) = self.handle.release_interface(self.iface) {
            log::debug!("release_interface({}) failed: {}", self.iface, e);
        }
    }
}
