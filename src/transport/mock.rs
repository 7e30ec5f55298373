//! Scripted in-memory transport for tests.
//!
//! Always compiled (zero runtime cost), hidden from public docs. Tests feed
//! it a queue of canned responses and inspect the writes afterwards.

use std::collections::VecDeque;

use crate::error::TransportError;
use crate::transport::Transport;

/// In-memory transport that records every write and replays a scripted
/// queue of reads.
///
/// Each `recv` pops one scripted reply; the reply is truncated to the
/// caller's `max_len`, matching how a real device's response competes with
/// the reader's buffer. An exhausted script reads as a timeout, which is
/// exactly what a silent printer looks like.
#[derive(Default)]
pub struct ScriptedTransport {
    /// Everything the caller sent, one entry per `send`.
    pub sent: Vec<Vec<u8>>,
    replies: VecDeque<Result<Vec<u8>, TransportError>>,
    /// When set, the next `send` fails with this error.
    fail_next_send: Option<TransportError>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful reply for a future `recv`.
    pub fn push_reply(&mut self, data: Vec<u8>) {
        self.replies.push_back(Ok(data));
    }

    /// Queue a transport failure for a future `recv`.
    pub fn push_error(&mut self, err: TransportError) {
        self.replies.push_back(Err(err));
    }

    /// Make the next `send` fail.
    pub fn fail_next_send(&mut self, err: TransportError) {
        self.fail_next_send = Some(err);
    }

    /// Total bytes written so far across all sends.
    pub fn bytes_sent(&self) -> usize {
        self.sent.iter().map(|s| s.len()).sum()
    }
}

impl Transport for ScriptedTransport {
    fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        if let Some(err) = self.fail_next_send.take() {
            return Err(err);
        }
        self.sent.push(data.to_vec());
        Ok(())
    }

    fn recv(&mut self, max_len: usize) -> Result<Vec<u8>, TransportError> {
        match self.replies.pop_front() {
            Some(Ok(mut data)) => {
                data.truncate(max_len);
                Ok(data)
            }
            Some(Err(err)) => Err(err),
            None => Err(TransportError::Timeout),
        }
    }
}
