//! # Print Engine
//!
//! The per-job control loop: poll status, wait for a free bank, submit the
//! print command, stream the pixel data, poll for completion. One explicit
//! state enum and one polling loop replace the retry spaghetti this flow
//! tends to grow.
//!
//! ## States
//!
//! ```text
//! Idle ──free bank──▶ ReadyToSubmit ──accepted + data──▶ DataSent ──▶ Finished
//!  ▲                     │ buffer full / busy               │
//!  └── 1s poll ──────────┘ (stay, retry)                    └── 1s poll
//! ```
//!
//! Any other non-success status is fatal: the job fails immediately with the
//! decoded major/minor text and no implicit retry. Only the explicit
//! buffer-full/busy conditions are retried, on a fixed 1-second interval,
//! bounded only by job cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crate::error::Error;
use crate::job::{JobList, PrintJob};
use crate::printer::Backend;
use crate::protocol::status::PrinterStatus;
use crate::protocol::wire::{CMD_PRINT, STATUS_HEADER_LEN};
use crate::protocol::{commands, ProtocolClient};
use crate::transport::Transport;

/// Fixed interval between status polls and busy retries.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Per-job control-loop state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobState {
    /// Waiting for a free bank.
    Idle,
    /// Free bank available; submit (and re-submit on busy).
    ReadyToSubmit,
    /// Pixel data streamed; waiting for completion.
    DataSent,
    /// Terminal.
    Finished,
}

/// Drives one printer connection through a batch of jobs.
pub struct Engine<'a, T: Transport> {
    client: ProtocolClient<T>,
    backend: &'a dyn Backend,
    cancel: Option<&'a AtomicBool>,
    poll_interval: Duration,
    /// Exit `DataSent` right after the transfer instead of waiting for the
    /// printer to confirm completion.
    fast_return: bool,
    /// Local job id counter; advanced past any id already occupying a bank.
    jobid: u8,
}

impl<'a, T: Transport> Engine<'a, T> {
    pub fn new(client: ProtocolClient<T>, backend: &'a dyn Backend) -> Self {
        Self {
            client,
            backend,
            cancel: None,
            poll_interval: POLL_INTERVAL,
            fast_return: backend.fast_return(),
            jobid: 0,
        }
    }

    /// Install the cooperative cancellation flag. A set flag aborts waits
    /// between polls, never mid-transfer.
    pub fn set_cancel_flag(&mut self, flag: &'a AtomicBool) {
        self.cancel = Some(flag);
    }

    /// Override the model's fast-return behavior for this connection.
    pub fn set_fast_return(&mut self, fast_return: bool) {
        self.fast_return = fast_return;
    }

    /// Override the poll interval (tests drop it to zero).
    pub fn set_poll_interval(&mut self, interval: Duration) {
        self.poll_interval = interval;
    }

    pub fn client_mut(&mut self) -> &mut ProtocolClient<T> {
        &mut self.client
    }

    /// Print every job in the list, strictly FIFO, repeating the whole
    /// sequence `list.copies` times (collation).
    pub fn print_list(&mut self, list: &JobList) -> Result<(), Error> {
        for pass in 0..list.copies {
            for (index, job) in list.iter().enumerate() {
                log::info!(
                    "printing job {}/{} (pass {}/{}): {}x{} media {:#04x} x{}",
                    index + 1,
                    list.len(),
                    pass + 1,
                    list.copies,
                    job.columns,
                    job.rows,
                    job.media,
                    job.copies
                );
                self.print_job(job)?;
            }
        }
        Ok(())
    }

    /// Run one job through the submit/poll/complete state machine.
    pub fn print_job(&mut self, job: &PrintJob) -> Result<(), Error> {
        let bank_count = self.backend.bank_count();
        let mut state = JobState::Idle;

        loop {
            match state {
                JobState::Idle => {
                    let status = commands::query_status(&mut self.client, bank_count)?;
                    if status.free_bank().is_some() {
                        self.jobid = next_jobid(self.jobid, &status);
                        log::debug!("bank free, submitting as job id {}", self.jobid);
                        state = JobState::ReadyToSubmit;
                    } else {
                        log::debug!("all banks busy, polling");
                        self.wait()?;
                    }
                }

                JobState::ReadyToSubmit => {
                    let payload = self.backend.print_payload(self.jobid, job);
                    match self.client.execute(CMD_PRINT, &payload, STATUS_HEADER_LEN) {
                        Ok(_) => {
                            log::debug!("submit accepted, streaming {} bytes", job.data.len());
                            self.client.transport_mut().send(&job.data)?;
                            state = JobState::DataSent;
                        }
                        Err(e) if e.is_busy() => {
                            // Printer filled up between the status poll and
                            // the submit; hold this state and retry.
                            log::debug!("printer busy on submit: {}", e);
                            self.wait()?;
                        }
                        Err(e) => {
                            log::error!("{}", e);
                            return Err(e.into());
                        }
                    }
                }

                JobState::DataSent => {
                    if self.fast_return {
                        log::debug!("fast return requested, not waiting for completion");
                        state = JobState::Finished;
                        continue;
                    }
                    let status = commands::query_status(&mut self.client, bank_count)?;
                    if job_complete(&status, self.jobid) {
                        state = JobState::Finished;
                    } else {
                        self.wait()?;
                    }
                }

                JobState::Finished => {
                    log::info!("job id {} done", self.jobid);
                    return Ok(());
                }
            }
        }
    }

    /// Sleep one poll interval, honoring cancellation.
    fn wait(&self) -> Result<(), Error> {
        if let Some(flag) = self.cancel {
            if flag.load(Ordering::Relaxed) {
                return Err(Error::Cancelled);
            }
        }
        if !self.poll_interval.is_zero() {
            thread::sleep(self.poll_interval);
        }
        Ok(())
    }
}

/// Pick the next job id: increment (wrapping, zero is reserved) until the
/// id collides with no bank's current job.
fn next_jobid(current: u8, status: &PrinterStatus) -> u8 {
    let mut id = current;
    loop {
        id = id.wrapping_add(1);
        if id == 0 {
            id = 1;
        }
        if status.banks.iter().all(|b| b.jobid != id) {
            return id;
        }
    }
}

/// Whether the submitted job finished: its bank reports all copies done, or
/// it has left the banks entirely while the device reads idle.
fn job_complete(status: &PrinterStatus, jobid: u8) -> bool {
    match status.bank_for_job(jobid) {
        Some(bank) => bank.total > 0 && bank.completed >= bank.total,
        None => status.is_idle(),
    }
}

// ============================================================================
// TESTS
// ============================================================================
