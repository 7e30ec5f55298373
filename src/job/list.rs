//! # Job List & Copy Combining
//!
//! An ordered, bounded batch of jobs plus the append algorithm that folds
//! pairs of identical single-copy jobs into combined multi-panel jobs,
//! halving the number of print passes the hardware has to make.
//!
//! ## Append Algorithm
//!
//! Appending a combinable job tries, in order:
//!
//! 1. Pop the most recently queued job. If it already has multiple copies or
//!    is flagged non-combinable, push it back untouched.
//! 2. Otherwise ask the backend to fold one copy of the new job onto it. On
//!    success the combined job replaces it, the new job loses one copy, and
//!    a last remaining copy is queued standalone.
//! 3. With no prior job to fold into, a multi-copy job folds with *itself*:
//!    the two-panel result carries half the copies, an odd copy stays as a
//!    singleton, and the backend's [`CombineOrder`] decides which of the two
//!    is queued first (so queue order matches the printer's cut order).
//!
//! ## Flush Signalling
//!
//! `can_wait()` tells the caller whether reading another page could still be
//! folded into this batch. Once false — list full, or the newest entry is
//! not combinable — the caller should stop reading and print what it has.

use std::collections::VecDeque;

use crate::error::JobError;
use crate::job::{CombineOrder, JobCombiner, PrintJob};

/// Fixed maximum number of queued entries per batch.
pub const MAX_JOBS: usize = 16;

/// An ordered, bounded batch of print jobs.
///
/// `copies` is the collation multiplier: 1 normally, or the requested copy
/// count when collation duplicates the whole sequence instead of individual
/// pages.
#[derive(Debug, Default)]
pub struct JobList {
    jobs: VecDeque<PrintJob>,
    /// Whole-sequence repeat count (collation).
    pub copies: u16,
}

impl JobList {
    pub fn new() -> Self {
        Self {
            jobs: VecDeque::new(),
            copies: 1,
        }
    }

    /// A list whose entire sequence prints `copies` times (collation).
    pub fn with_copies(copies: u16) -> Self {
        Self {
            jobs: VecDeque::new(),
            copies: copies.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Dequeue the next job to print (strict FIFO).
    pub fn pop_front(&mut self) -> Option<PrintJob> {
        self.jobs.pop_front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PrintJob> {
        self.jobs.iter()
    }

    /// Whether another appended job could still join this batch.
    ///
    /// True for an empty list; otherwise the list must have room and its
    /// most recently queued entry must still be foldable. This bounds how
    /// long a caller should keep reading pages before flushing.
    pub fn can_wait(&self) -> bool {
        match self.jobs.back() {
            None => true,
            Some(last) => self.jobs.len() < MAX_JOBS && last.can_combine,
        }
    }

    fn push(&mut self, job: PrintJob) -> Result<(), JobError> {
        if self.jobs.len() >= MAX_JOBS {
            return Err(JobError::ListFull);
        }
        self.jobs.push_back(job);
        Ok(())
    }

    /// Append a job, folding copies where the backend allows it.
    pub fn append(
        &mut self,
        mut job: PrintJob,
        backend: &dyn JobCombiner,
    ) -> Result<(), JobError> {
        if self.jobs.len() >= MAX_JOBS {
            return Err(JobError::ListFull);
        }

        if !job.can_combine {
            return self.push(job);
        }

        // Step 1/2: fold one copy onto the most recently queued job.
        if let Some(prev) = self.jobs.pop_back() {
            if prev.copies > 1 || !prev.can_combine {
                self.jobs.push_back(prev);
            } else if let Some(combined) = backend.combine(&prev, &job) {
                log::debug!(
                    "combined {}x{} pair into a {}-row job",
                    job.columns,
                    job.rows,
                    combined.rows
                );
                self.push(combined)?;
                job.copies -= 1;
                if job.copies == 0 {
                    return Ok(());
                }
                if job.copies == 1 {
                    return self.push(job);
                }
                return self.fold_self(job, backend);
            } else {
                self.jobs.push_back(prev);
            }
        }

        // Step 3: nothing to fold into; fold a multi-copy job with itself.
        if job.copies > 1 {
            return self.fold_self(job, backend);
        }
        self.push(job)
    }

    /// Fold a multi-copy job with itself: a two-panel job carrying
    /// `copies / 2`, plus an optional odd singleton.
    fn fold_self(
        &mut self,
        mut job: PrintJob,
        backend: &dyn JobCombiner,
    ) -> Result<(), JobError> {
        let remainder = job.copies % 2;

        // Folding is an optimization; when the queue cannot hold both the
        // pair and the leftover, keep the job whole rather than losing a copy.
        if remainder == 1 && self.jobs.len() + 2 > MAX_JOBS {
            return self.push(job);
        }

        let Some(mut combined) = backend.combine(&job, &job) else {
            return self.push(job);
        };
        combined.copies = job.copies / 2;

        match backend.combine_order() {
            CombineOrder::CombinedFirst => {
                self.push(combined)?;
                if remainder == 1 {
                    job.copies = 1;
                    self.push(job)?;
                }
            }
            CombineOrder::SingleFirst => {
                if remainder == 1 {
                    let mut single = job.clone();
                    single.copies = 1;
                    self.push(single)?;
                }
                self.push(combined)?;
            }
        }
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
