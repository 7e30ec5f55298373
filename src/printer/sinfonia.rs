//! # Sinfonia/Shinko Family Backend
//!
//! The dye-sub family sharing the wire protocol in [`crate::protocol`]. The
//! models differ only in table constants — bank count, bank capacity, copy
//! encoding, whether submission may return before completion — so the family
//! is one implementation parameterized by [`SinfoniaModel`], not one file
//! per model.
//!
//! ## Spool Job Format
//!
//! The front end hands the backend one block per page: a 32-byte header of
//! eight little-endian `u32` words followed by packed RGB pixel data.
//!
//! | Word | Field |
//! |------|-------|
//! | 0 | header length, always 32 |
//! | 1 | media size code |
//! | 2 | print method |
//! | 3 | overcoat mode |
//! | 4 | columns |
//! | 5 | rows |
//! | 6 | copies |
//! | 7 | flags (bit 0: never combine) |
//!
//! ## Print Command Payload (12 bytes)
//!
//! | Offset | Size | Field | Endianness |
//! |--------|------|-------|------------|
//! | 0 | 1 | job id | — |
//! | 1 | 1 | media code | — |
//! | 2 | 1 | method | — |
//! | 3 | 1 | overcoat | — |
//! | 4 | 2 | columns | little-endian |
//! | 6 | 2 | rows | little-endian |
//! | 8 | 2 | copies | little-endian, **or** big-endian BCD on the models that want it packed |
//! | 10 | 2 | reserved | — |

use std::io::Read;

use crate::error::JobError;
use crate::job::{CombineOrder, JobCombiner, PrintJob, PrintMethod};
use crate::printer::{Backend, DeviceEntry, PrinterType};
use crate::protocol::client::ErrorTextFn;
use crate::protocol::wire::u16_to_bcd;

/// Spool header length: eight u32 words.
pub const SPOOL_HEADER_LEN: usize = 32;

/// Spool flag: this page must never share a sheet.
pub const FLAG_NO_COMBINE: u32 = 0x0001;

/// Largest copy count the BCD encoding can carry.
pub const MAX_COPIES: u32 = 9999;

/// Device matching table for the whole family.
pub static DEVICES: &[DeviceEntry] = &[
    DeviceEntry {
        vendor_id: 0x10CE,
        product_id: 0x0007,
        printer_type: PrinterType::S1245,
        make: "Sinfonia",
        model: "chc-s1245",
    },
    DeviceEntry {
        vendor_id: 0x10CE,
        product_id: 0x0019,
        printer_type: PrinterType::S6145,
        make: "Sinfonia",
        model: "chc-s6145",
    },
    DeviceEntry {
        vendor_id: 0x10CE,
        product_id: 0x001E,
        printer_type: PrinterType::S6145,
        make: "CIAAT",
        model: "brava-21",
    },
    DeviceEntry {
        vendor_id: 0x10CE,
        product_id: 0x0039,
        printer_type: PrinterType::S2245,
        make: "Sinfonia",
        model: "chc-s2245",
    },
];

/// Per-model constants driving the shared family code.
#[derive(Debug, Clone, Copy)]
pub struct SinfoniaModel {
    pub name: &'static str,
    pub printer_type: PrinterType,
    /// Hardware print-data banks.
    pub banks: usize,
    /// Largest image one bank can hold, in rows.
    pub max_rows: u16,
    /// Copies field is big-endian BCD instead of little-endian binary.
    pub bcd_copies: bool,
    /// Submission returns once the data transfer finishes.
    pub fast_return: bool,
    /// Panorama media supported.
    pub panorama: bool,
    /// Queue placement of a folded pair relative to an odd leftover copy,
    /// matching the model's cut/stack order.
    pub combine_order: CombineOrder,
}

impl SinfoniaModel {
    /// CHC-S1245: single bank, packed-BCD copies, waits for completion.
    pub const S1245: Self = Self {
        name: "CHC-S1245",
        printer_type: PrinterType::S1245,
        banks: 1,
        max_rows: 2446,
        bcd_copies: true,
        fast_return: false,
        panorama: false,
        combine_order: CombineOrder::SingleFirst,
    };

    /// CHC-S6145: dual bank, binary copies.
    pub const S6145: Self = Self {
        name: "CHC-S6145",
        printer_type: PrinterType::S6145,
        banks: 2,
        max_rows: 2740,
        bcd_copies: false,
        fast_return: true,
        panorama: false,
        combine_order: CombineOrder::CombinedFirst,
    };

    /// CHC-S2245: dual bank, panorama capable.
    pub const S2245: Self = Self {
        name: "CHC-S2245",
        printer_type: PrinterType::S2245,
        banks: 2,
        max_rows: 2136,
        bcd_copies: false,
        fast_return: true,
        panorama: true,
        combine_order: CombineOrder::CombinedFirst,
    };
}

/// The family backend, bound to one model's table.
pub struct Sinfonia {
    pub model: &'static SinfoniaModel,
}

impl Sinfonia {
    pub fn new(model: &'static SinfoniaModel) -> Self {
        Self { model }
    }

    pub fn for_type(printer_type: PrinterType) -> Self {
        let model = match printer_type {
            PrinterType::S1245 => &SinfoniaModel::S1245,
            PrinterType::S6145 => &SinfoniaModel::S6145,
            PrinterType::S2245 => &SinfoniaModel::S2245,
        };
        Self::new(model)
    }
}

impl JobCombiner for Sinfonia {
    fn can_combine(&self, a: &PrintJob, b: &PrintJob) -> bool {
        a.method == PrintMethod::Standard
            && b.method == PrintMethod::Standard
            && a.media == b.media
            && a.overcoat == b.overcoat
            && a.columns == b.columns
            && a.rows == b.rows
            // The folded sheet still has to fit a bank.
            && a.rows as u32 + b.rows as u32 <= self.model.max_rows as u32
    }

    fn combine(&self, first: &PrintJob, second: &PrintJob) -> Option<PrintJob> {
        if !self.can_combine(first, second) {
            return None;
        }
        let mut data = Vec::with_capacity(first.data.len() + second.data.len());
        data.extend_from_slice(&first.data);
        data.extend_from_slice(&second.data);
        Some(PrintJob {
            method: PrintMethod::Combined,
            rows: first.rows + second.rows,
            copies: 1,
            can_combine: false,
            data,
            ..*first
        })
    }

    fn combine_order(&self) -> CombineOrder {
        self.model.combine_order
    }
}

impl Backend for Sinfonia {
    fn name(&self) -> &'static str {
        "sinfonia"
    }

    fn devices(&self) -> &'static [DeviceEntry] {
        DEVICES
    }

    fn bank_count(&self) -> usize {
        self.model.banks
    }

    fn max_rows(&self) -> u16 {
        self.model.max_rows
    }

    fn fast_return(&self) -> bool {
        self.model.fast_return
    }

    fn is_multicut_media(&self, media: u8) -> bool {
        // 2x6 strip media is cut mid-sheet by the printer.
        media == 0x07
    }

    fn panorama_overlap(&self, columns: u16, total_rows: u16) -> u16 {
        if !self.model.panorama {
            return 0;
        }
        // Empirical per-format seam widths; a few exact lengths are known
        // to land the seam on a cut line and need it tightened.
        match (columns, total_rows) {
            (1548, 4618) => 512,
            (1844, 5184) => 548,
            (1548, _) => 636,
            (1844, _) => 756,
            _ => 600,
        }
    }

    fn error_text(&self) -> ErrorTextFn {
        error_text
    }

    fn parse_job(&self, input: &mut dyn Read) -> Result<Option<PrintJob>, JobError> {
        let mut header = [0u8; SPOOL_HEADER_LEN];
        if !read_exact_or_eof(input, &mut header)? {
            return Ok(None);
        }

        let word = |i: usize| {
            u32::from_le_bytes([
                header[i * 4],
                header[i * 4 + 1],
                header[i * 4 + 2],
                header[i * 4 + 3],
            ])
        };

        if word(0) as usize != SPOOL_HEADER_LEN {
            return Err(JobError::BadHeader(format!(
                "header length {} (expected {})",
                word(0),
                SPOOL_HEADER_LEN
            )));
        }

        let media = word(1);
        let method = PrintMethod::from_wire(word(2) as u8)
            .ok_or_else(|| JobError::BadHeader(format!("unknown print method {}", word(2))))?;
        let overcoat = word(3);
        let columns = word(4);
        let rows = word(5);
        let copies = word(6);
        let flags = word(7);

        if media > u8::MAX as u32 || overcoat > u8::MAX as u32 {
            return Err(JobError::BadHeader("media/overcoat out of range".into()));
        }
        if columns == 0 || columns > u16::MAX as u32 || rows == 0 || rows > u16::MAX as u32 {
            return Err(JobError::BadHeader(format!(
                "image dimensions {}x{} out of range",
                columns, rows
            )));
        }
        if copies == 0 || copies > MAX_COPIES {
            return Err(JobError::BadHeader(format!(
                "copy count {} out of range",
                copies
            )));
        }

        let len = columns as usize * rows as usize * 3;
        let mut data = vec![0u8; len];
        input
            .read_exact(&mut data)
            .map_err(|e| JobError::BadHeader(format!("truncated pixel data: {}", e)))?;

        Ok(Some(PrintJob {
            media: media as u8,
            method,
            overcoat: overcoat as u8,
            columns: columns as u16,
            rows: rows as u16,
            copies: copies as u16,
            can_combine: method == PrintMethod::Standard && flags & FLAG_NO_COMBINE == 0,
            data,
        }))
    }

    fn print_payload(&self, jobid: u8, job: &PrintJob) -> Vec<u8> {
        let mut payload = Vec::with_capacity(12);
        payload.push(jobid);
        payload.push(job.media);
        payload.push(job.method.wire());
        payload.push(job.overcoat);
        payload.extend_from_slice(&job.columns.to_le_bytes());
        payload.extend_from_slice(&job.rows.to_le_bytes());
        if self.model.bcd_copies {
            payload.extend_from_slice(&u16_to_bcd(job.copies));
        } else {
            payload.extend_from_slice(&job.copies.to_le_bytes());
        }
        payload.extend_from_slice(&[0, 0]);
        payload
    }
}

/// Family-shared `(major, minor)` error decode.
///
/// A representative subset of the catalog; unknown pairs fall through to a
/// generic message rather than failing the decode.
pub fn error_text(major: u8, minor: u8) -> &'static str {
    match (major, minor) {
        (0x01, 0x01) => "controller: memory error",
        (0x01, 0x02) => "controller: EEPROM error",
        (0x02, 0x01) => "mechanical: thermal head lift failure",
        (0x02, 0x02) => "mechanical: pinch roller failure",
        (0x03, 0x01) => "sensor: head thermistor out of range",
        (0x04, 0x01) => "temperature: print head overheated",
        (0x5A, 0x01) => "paper jam: feeding to print position",
        (0x5A, 0x02) => "paper jam: during printing",
        (0x5A, 0x03) => "paper jam: during ejection",
        (0x61, 0x01) => "out of paper",
        (0x61, 0x02) => "end of ribbon",
        (0x62, 0x01) => "cover open",
        _ => "unknown printer error",
    }
}

/// Fill `buf` from the reader. `Ok(false)` means the stream ended cleanly
/// before the first byte; a partial fill is an error.
fn read_exact_or_eof(input: &mut dyn Read, buf: &mut [u8]) -> Result<bool, JobError> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = input
            .read(&mut buf[filled..])
            .map_err(|e| JobError::BadHeader(format!("read error: {}", e)))?;
        if n == 0 {
            if filled == 0 {
                return Ok(false);
            }
            return Err(JobError::BadHeader(format!(
                "truncated header: {} of {} bytes",
                filled,
                buf.len()
            )));
        }
        filled += n;
    }
    Ok(true)
}

// ============================================================================
// TESTS
// ============================================================================
