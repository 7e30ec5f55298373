//! # Error Types
//!
//! This module defines the error taxonomy used throughout the sublima driver,
//! plus the spooler-facing exit codes.
//!
//! ## Taxonomy
//!
//! | Type | Layer |
//! |------|-------|
//! | [`TransportError`] | byte-level USB I/O |
//! | [`ProtocolError`] | wire framing and decoded device status |
//! | [`DiscoveryError`] | device matching, identification, claiming |
//! | [`JobError`] | job parsing, combining, splitting |
//!
//! Transport and protocol errors bubble up undecorated; the print engine is
//! the only layer that turns a decoded device status into retry-vs-fail.

use thiserror::Error;

/// Byte-level transport failures.
///
/// The transport itself never retries; callers own the retry policy.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The transfer did not complete within the configured timeout.
    #[error("transfer timed out")]
    Timeout,

    /// The device returned fewer bytes than the caller required.
    #[error("short read: got {got} of {want} bytes")]
    ShortRead { got: usize, want: usize },

    /// Hard I/O failure from the USB stack.
    #[error("USB I/O error: {0}")]
    Io(String),
}

/// Failures at the command/response framing layer.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The response was shorter than the command's defined response length.
    #[error("short response: got {got} of {want} bytes")]
    ShortRead { got: usize, want: usize },

    /// The printer answered, but its status header reported a failure.
    ///
    /// `text` is resolved through the backend's `(major, minor)` table.
    #[error("printer error: status {status:#04x} error {error:#04x} ({major:#04x}/{minor:#04x}): {text}")]
    Device {
        status: u8,
        error: u8,
        major: u8,
        minor: u8,
        text: &'static str,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl ProtocolError {
    /// Whether this error is one of the transient "try again shortly"
    /// conditions (printer buffer full, device busy). Everything else is
    /// fatal for the job.
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            ProtocolError::Device {
                error: crate::protocol::wire::ERROR_BUFFER_FULL | crate::protocol::wire::ERROR_BUSY,
                ..
            }
        )
    }
}

/// Failures while locating and opening a printer.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// No attached device matched any backend's table (or the filters).
    #[error("no supported printer found")]
    NoDevice,

    /// A device matched but its serial did not match the requested one.
    #[error("serial number mismatch: wanted {wanted}, found {found}")]
    SerialMismatch { wanted: String, found: String },

    /// The interface could not be claimed (still busy after retries).
    #[error("failed to claim interface: {0}")]
    Claim(String),

    /// Any other USB-stack failure during enumeration or open.
    #[error("USB error: {0}")]
    Usb(String),
}

/// Failures while parsing or scheduling a print job.
#[derive(Debug, Error)]
pub enum JobError {
    /// The spool header was malformed.
    #[error("bad job header: {0}")]
    BadHeader(String),

    /// The job's media/size/method is not supported by this printer.
    #[error("unsupported job parameters: {0}")]
    Unsupported(String),

    /// The image is too long even for a panorama split.
    #[error("image of {rows} rows exceeds the {limit}-row panorama limit")]
    TooLong { rows: u32, limit: u32 },

    /// The job list is at capacity; the batch must be flushed first.
    #[error("job list is full")]
    ListFull,
}

/// Top-level driver error.
#[derive(Debug, Error)]
pub enum Error {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("discovery error: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error("job error: {0}")]
    Job(#[from] JobError),

    /// The job was cancelled by an external signal.
    #[error("cancelled")]
    Cancelled,
}

/// Result codes surfaced to the spooler as the process exit status.
///
/// These mirror the CUPS backend exit-code contract: the spooler reacts to
/// the numeric value, so the discriminants are part of the interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Job printed successfully.
    Ok = 0,
    /// Fatal failure; the spooler must not retry.
    Failed = 1,
    /// The printer cannot service this job's parameters; hold the job for
    /// operator intervention.
    Hold = 3,
    /// Stop the whole queue.
    Stop = 4,
    /// Abandon this job.
    Cancel = 5,
    /// Retry the job from the start.
    Retry = 6,
    /// Retry immediately without re-reading the input.
    RetryCurrent = 7,
}

impl Error {
    /// Map a failure to the spooler exit code.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            // Claim contention is transient: another process may release the
            // interface, so ask the spooler to retry the job.
            Error::Discovery(DiscoveryError::Claim(_)) => ExitCode::Retry,
            Error::Discovery(_) => ExitCode::Failed,
            // Parameter problems need an operator (wrong media loaded etc.).
            Error::Job(JobError::Unsupported(_)) => ExitCode::Hold,
            Error::Job(_) => ExitCode::Failed,
            Error::Transport(_) | Error::Protocol(_) => ExitCode::Failed,
            Error::Cancelled => ExitCode::Cancel,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_values() {
        assert_eq!(ExitCode::Ok as i32, 0);
        assert_eq!(ExitCode::Failed as i32, 1);
        assert_eq!(ExitCode::Hold as i32, 3);
        assert_eq!(ExitCode::Stop as i32, 4);
        assert_eq!(ExitCode::Cancel as i32, 5);
        assert_eq!(ExitCode::Retry as i32, 6);
        assert_eq!(ExitCode::RetryCurrent as i32, 7);
    }

    #[test]
    fn test_claim_contention_maps_to_retry() {
        let err = Error::Discovery(DiscoveryError::Claim("busy".into()));
        assert_eq!(err.exit_code(), ExitCode::Retry);
    }

    #[test]
    fn test_unsupported_job_maps_to_hold() {
        let err = Error::Job(JobError::Unsupported("5x7 media not loaded".into()));
        assert_eq!(err.exit_code(), ExitCode::Hold);
    }

    #[test]
    fn test_cancelled_maps_to_cancel() {
        assert_eq!(Error::Cancelled.exit_code(), ExitCode::Cancel);
    }

    #[test]
    fn test_device_error_display_includes_text() {
        let err = ProtocolError::Device {
            status: 0xFF,
            error: 0x11,
            major: 0x02,
            minor: 0x01,
            text: "paper jam",
        };
        let msg = err.to_string();
        assert!(msg.contains("paper jam"));
        assert!(msg.contains("0x11"));
    }
}
