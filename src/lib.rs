//! # Sublima - Dye-Sublimation Photo Printer Driver
//!
//! Sublima is the host-side driver layer for USB-attached dye-sublimation
//! photo printers, consumed by a thin CUPS front end. It provides:
//!
//! - **Device discovery**: USB enumeration, device-table matching,
//!   IEEE-1284 identification
//! - **Job model**: bounded job batches with copy-combining and panorama
//!   splitting
//! - **Protocol implementation**: the shared request/status wire format of
//!   the Sinfonia/Shinko printer family
//! - **Print engine**: the per-job submit/poll/complete state machine with
//!   bank-aware scheduling
//!
//! ## Quick Start
//!
//! ```no_run
//! use sublima::{
//!     config::Config,
//!     discovery,
//!     job::JobList,
//!     printer::{self, Engine},
//!     protocol::ProtocolClient,
//! };
//!
//! // Read configuration and open the first matching printer
//! let config = Config::from_env();
//! let conn = discovery::probe(&config)?;
//! let backend = printer::backend_for(conn.printer_type);
//!
//! // Parse one batch of jobs from the spool stream
//! let mut list = JobList::new();
//! let mut input = std::io::stdin().lock();
//! while list.can_wait() {
//!     match backend.parse_job(&mut input)? {
//!         Some(job) => list.append(job, backend.as_ref())?,
//!         None => break,
//!     }
//! }
//!
//! // Drive the printer through the batch
//! let client = ProtocolClient::new(conn.transport, backend.error_text());
//! let mut engine = Engine::new(client, backend.as_ref());
//! engine.print_list(&list)?;
//!
//! # Ok::<(), sublima::Error>(())
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`discovery`] | Device enumeration, matching and identification |
//! | [`transport`] | Bulk USB byte transport |
//! | [`protocol`] | Wire format, command helpers, status decoding |
//! | [`job`] | Job model, copy combining, panorama splitting |
//! | [`printer`] | Backend trait, model tables, print engine |
//! | [`config`] | Environment-derived process configuration |
//! | [`error`] | Error taxonomy and spooler exit codes |
//!
//! ## Supported Printers
//!
//! Currently the Sinfonia/Shinko family: CHC-S1245, CHC-S6145 (and the
//! CIAAT Brava 21 rebadge), CHC-S2245. Other family members speaking the
//! same protocol should work with a device-table entry and a model
//! constant block.

pub mod config;
pub mod discovery;
pub mod error;
pub mod job;
pub mod printer;
pub mod protocol;
pub mod transport;

// Re-exports for convenience
pub use config::Config;
pub use error::{Error, ExitCode};
pub use job::{JobList, PrintJob};
pub use printer::Engine;
