//! # Shared Printer Protocol
//!
//! Implementation of the request/status wire protocol spoken, with minor
//! per-model variation, by the whole dye-sublimation printer family this
//! driver supports.
//!
//! ## Module Structure
//!
//! - [`wire`]: request/status envelopes, command ids, status/error constants
//! - [`status`]: typed status, bank and media decoding
//! - [`client`]: the execute() round-trip engine over a [`Transport`]
//! - [`commands`]: one byte-exact helper per RPC
//!
//! ## Usage Example
//!
//! ```no_run
//! use sublima::protocol::{client::ProtocolClient, commands};
//! use sublima::transport::mock::ScriptedTransport;
//!
//! fn error_text(_major: u8, _minor: u8) -> &'static str { "unknown error" }
//!
//! let transport = ScriptedTransport::new();
//! let mut client = ProtocolClient::new(transport, error_text);
//!
//! let status = commands::query_status(&mut client, 2)?;
//! if status.free_bank().is_some() {
//!     // safe to submit a job
//! }
//! # Ok::<(), sublima::error::ProtocolError>(())
//! ```
//!
//! [`Transport`]: crate::transport::Transport

pub mod client;
pub mod commands;
pub mod status;
pub mod wire;

pub use client::ProtocolClient;
pub use status::{BankState, BankStatus, MediaInfo, PrinterStatus};
pub use wire::{CommandHeader, StatusHeader};
