//! # Protocol Client
//!
//! The request/response engine shared by every command: frame the request,
//! collect the response, decode the status header, and turn a non-success
//! result into a typed failure carrying the backend's decoded error text.

use crate::error::ProtocolError;
use crate::protocol::wire::{self, StatusHeader, STATUS_HEADER_LEN};
use crate::transport::Transport;

/// Resolves a printer `(major, minor)` error pair to a display string.
/// Supplied by the active backend, since the pairs vary per model family.
pub type ErrorTextFn = fn(major: u8, minor: u8) -> &'static str;

/// Command/response client over a byte transport.
pub struct ProtocolClient<T: Transport> {
    transport: T,
    error_text: ErrorTextFn,
}

impl<T: Transport> ProtocolClient<T> {
    pub fn new(transport: T, error_text: ErrorTextFn) -> Self {
        Self {
            transport,
            error_text,
        }
    }

    /// Direct access to the transport, for streaming pixel data after a
    /// print command has been accepted.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Execute one command round-trip.
    ///
    /// Sends `cmd` with `payload`, then reads a response of `expected_len`
    /// bytes (status header included). Rules, in order:
    ///
    /// 1. A response shorter than a status header is a [`ProtocolError::ShortRead`].
    /// 2. A header whose `result` is not success becomes
    ///    [`ProtocolError::Device`] with the `(major, minor)` pair resolved
    ///    through the backend table — the device may legitimately answer
    ///    with a bare header in this case, so this check precedes the
    ///    length check.
    /// 3. A successful but truncated response is a `ShortRead`.
    ///
    /// On success returns the decoded header and the payload bytes that
    /// followed it.
    pub fn execute(
        &mut self,
        cmd: u16,
        payload: &[u8],
        expected_len: usize,
    ) -> Result<(StatusHeader, Vec<u8>), ProtocolError> {
        let frame = wire::encode_request(cmd, payload);
        self.transport.send(&frame)?;

        let resp = self.transport.recv(expected_len)?;
        let header = StatusHeader::decode(&resp).ok_or(ProtocolError::ShortRead {
            got: resp.len(),
            want: STATUS_HEADER_LEN,
        })?;

        if !header.succeeded() {
            return Err(ProtocolError::Device {
                status: header.status,
                error: header.error,
                major: header.printer_major,
                minor: header.printer_minor,
                text: (self.error_text)(header.printer_major, header.printer_minor),
            });
        }

        if resp.len() < expected_len {
            return Err(ProtocolError::ShortRead {
                got: resp.len(),
                want: expected_len,
            });
        }

        Ok((header, resp[STATUS_HEADER_LEN..].to_vec()))
    }

    /// Execute a command whose response length is only known from its own
    /// header (e.g. the media report, whose entry count varies by what is
    /// loaded).
    ///
    /// Reads up to `max_len` bytes and returns exactly the
    /// `header.payload_len` bytes the device declared; declaring more than
    /// arrived is a [`ProtocolError::ShortRead`].
    pub fn execute_max(
        &mut self,
        cmd: u16,
        payload: &[u8],
        max_len: usize,
    ) -> Result<(StatusHeader, Vec<u8>), ProtocolError> {
        let frame = wire::encode_request(cmd, payload);
        self.transport.send(&frame)?;

        let resp = self.transport.recv(max_len)?;
        let header = StatusHeader::decode(&resp).ok_or(ProtocolError::ShortRead {
            got: resp.len(),
            want: STATUS_HEADER_LEN,
        })?;

        if !header.succeeded() {
            return Err(ProtocolError::Device {
                status: header.status,
                error: header.error,
                major: header.printer_major,
                minor: header.printer_minor,
                text: (self.error_text)(header.printer_major, header.printer_minor),
            });
        }

        let want = STATUS_HEADER_LEN + header.payload_len as usize;
        if resp.len() < want {
            return Err(ProtocolError::ShortRead {
                got: resp.len(),
                want,
            });
        }

        Ok((header, resp[STATUS_HEADER_LEN..want].to_vec()))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::protocol::wire::{
        CMD_GET_STATUS, ERROR_BUFFER_FULL, ERROR_NONE, ERROR_PRINTER, RESULT_FAIL,
        RESULT_SUCCESS, STATUS_IDLE,
    };
    use crate::transport::mock::ScriptedTransport;

    fn test_error_text(major: u8, minor: u8) -> &'static str {
        match (major, minor) {
            (0x63, 0x01) => "paper jam in feed path",
            _ => "unknown error",
        }
    }

    fn ok_response(payload: &[u8]) -> Vec<u8> {
        let hdr = StatusHeader {
            result: RESULT_SUCCESS,
            error: ERROR_NONE,
            printer_major: 0,
            printer_minor: 0,
            status: STATUS_IDLE,
            payload_len: payload.len() as u16,
        };
        let mut resp = hdr.encode().to_vec();
        resp.extend_from_slice(payload);
        resp
    }

    #[test]
    fn test_execute_frames_request() {
        let mut transport = ScriptedTransport::new();
        transport.push_reply(ok_response(&[]));
        let mut client = ProtocolClient::new(transport, test_error_text);

        client.execute(CMD_GET_STATUS, &[], STATUS_HEADER_LEN).unwrap();

        let sent = &client.transport_mut().sent;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0], vec![0x01, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_execute_returns_payload() {
        let mut transport = ScriptedTransport::new();
        transport.push_reply(ok_response(&[0xDE, 0xAD]));
        let mut client = ProtocolClient::new(transport, test_error_text);

        let (header, payload) = client
            .execute(CMD_GET_STATUS, &[], STATUS_HEADER_LEN + 2)
            .unwrap();
        assert!(header.succeeded());
        assert_eq!(payload, vec![0xDE, 0xAD]);
    }

    #[test]
    fn test_execute_short_read() {
        let mut transport = ScriptedTransport::new();
        transport.push_reply(ok_response(&[0x01])); // 11 bytes, want 14
        let mut client = ProtocolClient::new(transport, test_error_text);

        let err = client
            .execute(CMD_GET_STATUS, &[], STATUS_HEADER_LEN + 4)
            .unwrap_err();
        assert!(matches!(err, ProtocolError::ShortRead { got: 11, want: 14 }));
    }

    #[test]
    fn test_execute_header_fragment_is_short_read() {
        let mut transport = ScriptedTransport::new();
        transport.push_reply(vec![0x01, 0x00, 0x00]);
        let mut client = ProtocolClient::new(transport, test_error_text);

        let err = client
            .execute(CMD_GET_STATUS, &[], STATUS_HEADER_LEN)
            .unwrap_err();
        assert!(matches!(err, ProtocolError::ShortRead { got: 3, want: 10 }));
    }

    #[test]
    fn test_execute_decodes_device_error() {
        let hdr = StatusHeader {
            result: RESULT_FAIL,
            error: ERROR_PRINTER,
            printer_major: 0x63,
            printer_minor: 0x01,
            status: 0xFF,
            payload_len: 0,
        };
        let mut transport = ScriptedTransport::new();
        transport.push_reply(hdr.encode().to_vec());
        let mut client = ProtocolClient::new(transport, test_error_text);

        let err = client
            .execute(CMD_GET_STATUS, &[], STATUS_HEADER_LEN + 32)
            .unwrap_err();
        match err {
            ProtocolError::Device {
                major, minor, text, ..
            } => {
                assert_eq!((major, minor), (0x63, 0x01));
                assert_eq!(text, "paper jam in feed path");
            }
            other => panic!("expected Device error, got {:?}", other),
        }
    }

    #[test]
    fn test_failed_header_beats_length_check() {
        // A bare failure header must decode as Device even when the caller
        // expected a longer response.
        let hdr = StatusHeader {
            result: RESULT_FAIL,
            error: ERROR_BUFFER_FULL,
            printer_major: 0,
            printer_minor: 0,
            status: STATUS_IDLE,
            payload_len: 0,
        };
        let mut transport = ScriptedTransport::new();
        transport.push_reply(hdr.encode().to_vec());
        let mut client = ProtocolClient::new(transport, test_error_text);

        let err = client
            .execute(CMD_GET_STATUS, &[], STATUS_HEADER_LEN + 16)
            .unwrap_err();
        assert!(err.is_busy());
    }

    #[test]
    fn test_execute_max_uses_declared_length() {
        let mut transport = ScriptedTransport::new();
        let mut resp = ok_response(&[0xAA, 0xBB, 0xCC]);
        resp.extend_from_slice(&[0x00; 5]); // bus padding past the declared payload
        transport.push_reply(resp);
        let mut client = ProtocolClient::new(transport, test_error_text);

        let (header, payload) = client.execute_max(CMD_GET_STATUS, &[], 64).unwrap();
        assert_eq!(header.payload_len, 3);
        assert_eq!(payload, vec![0xAA, 0xBB, 0xCC]);
    }

    #[test]
    fn test_execute_max_declared_more_than_arrived() {
        let hdr = StatusHeader {
            result: RESULT_SUCCESS,
            error: ERROR_NONE,
            printer_major: 0,
            printer_minor: 0,
            status: STATUS_IDLE,
            payload_len: 8,
        };
        let mut transport = ScriptedTransport::new();
        transport.push_reply(hdr.encode().to_vec()); // header only, payload missing
        let mut client = ProtocolClient::new(transport, test_error_text);

        let err = client.execute_max(CMD_GET_STATUS, &[], 64).unwrap_err();
        assert!(matches!(err, ProtocolError::ShortRead { got: 10, want: 18 }));
    }

    #[test]
    fn test_transport_error_propagates() {
        let mut transport = ScriptedTransport::new();
        transport.push_error(TransportError::Timeout);
        let mut client = ProtocolClient::new(transport, test_error_text);

        let err = client
            .execute(CMD_GET_STATUS, &[], STATUS_HEADER_LEN)
            .unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::Transport(TransportError::Timeout)
        ));
    }
}
