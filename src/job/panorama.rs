//! # Panorama Splitting
//!
//! Printers can only hold `max_rows` of image per bank, but panorama media
//! is longer than that. The splitter divides one oversized job into 2 or 3
//! overlapping panels; the printer lays down each panel as its own print and
//! the overlap region lets the finished strips be seamed without a visible
//! gap.
//!
//! ## Geometry
//!
//! The first panel takes exactly `max_rows`. Every later panel covers the
//! remaining rows **plus** the overlap, re-printing the seam region:
//!
//! ```text
//! rows:    |----------------- total ------------------|
//! panel 0: |----- max_rows -----|
//! panel 1:               |-- overlap --|-- remaining --|
//! ```
//!
//! The overlap amount is printer- and paper-size-dependent; the backend
//! supplies it and may shrink it for exact total lengths that need a
//! tighter seam.

use crate::error::JobError;
use crate::job::{PrintJob, PrintMethod};

/// Upper bound on panels per panorama.
pub const MAX_PANELS: usize = 3;

/// Split an oversized job into overlapping panels.
///
/// Each panel is an independent job carrying a copy of the original
/// parameters and a byte-range slice of the original RGB buffer. Jobs that
/// already fit return unchanged as a single "panel".
///
/// ## Errors
///
/// - `copies > 1`: panoramas cannot be combined or duplicated in-printer.
/// - `multicut_media`: strip media gets cut mid-image; seams would land on
///   the cuts.
/// - More than [`MAX_PANELS`] panels would be needed.
pub fn split(
    job: &PrintJob,
    max_rows: u16,
    overlap: u16,
    multicut_media: bool,
) -> Result<Vec<PrintJob>, JobError> {
    if job.copies > 1 {
        return Err(JobError::Unsupported(
            "panorama prints cannot carry multiple copies".into(),
        ));
    }
    if multicut_media {
        return Err(JobError::Unsupported(
            "panorama prints are not possible on multi-cut media".into(),
        ));
    }

    let total = job.rows as usize;
    if total <= max_rows as usize {
        return Ok(vec![job.clone()]);
    }

    let max_rows = max_rows as usize;
    let overlap = overlap as usize;
    let row_len = job.row_len();

    // Longest image 3 panels can cover: each panel past the first
    // contributes max_rows - overlap fresh rows.
    let limit = max_rows + (MAX_PANELS - 1) * (max_rows - overlap);
    if total > limit {
        return Err(JobError::TooLong {
            rows: total as u32,
            limit: limit as u32,
        });
    }

    let mut panels = Vec::new();
    let mut consumed = max_rows;
    panels.push(make_panel(job, 0, max_rows, row_len));

    while consumed < total {
        let remaining = total - consumed;
        let len = (remaining + overlap).min(max_rows);
        let start = consumed - overlap;
        panels.push(make_panel(job, start, len, row_len));
        consumed = start + len;
    }

    log::debug!(
        "panorama: {} rows split into {} panels (max {}, overlap {})",
        total,
        panels.len(),
        max_rows,
        overlap
    );
    Ok(panels)
}

/// Build one panel job from a row window of the original.
fn make_panel(job: &PrintJob, start_row: usize, rows: usize, row_len: usize) -> PrintJob {
    let byte_start = start_row * row_len;
    let byte_end = (start_row + rows) * row_len;
    PrintJob {
        method: PrintMethod::Split,
        rows: rows as u16,
        copies: 1,
        can_combine: false,
        data: job.data[byte_start..byte_end].to_vec(),
        ..*job
    }
}

// ============================================================================
// TESTS
// ============================================================================
