//! # Status & Media Decoding
//!
//! Typed views over the GET_STATUS and GET_MEDIA payloads: per-bank job
//! progress, overall device state, and the loaded-media/consumable report
//! surfaced to the spooler as marker attributes.
//!
//! ## Bank Record Layout (8 bytes, repeated per bank)
//!
//! | Offset | Size | Field | Endianness |
//! |--------|------|-------|------------|
//! | 0 | 1 | job id occupying the bank (0 = none) | — |
//! | 1 | 1 | bank status | — |
//! | 2 | 2 | copies remaining | little-endian |
//! | 4 | 2 | copies completed | little-endian |
//! | 6 | 2 | copies total | little-endian |
//!
//! ## Media Record Layout (8 bytes, repeated per loaded media)
//!
//! | Offset | Size | Field | Endianness |
//! |--------|------|-------|------------|
//! | 0 | 1 | media size code | — |
//! | 1 | 1 | ribbon/print type | — |
//! | 2 | 2 | print columns | little-endian |
//! | 4 | 2 | print rows | little-endian |
//! | 6 | 2 | prints remaining | little-endian |

use crate::protocol::wire::{
    self, StatusHeader, BANK_RECORD_LEN, MEDIA_RECORD_LEN,
};

// ============================================================================
// BANKS
// ============================================================================

/// State of one hardware print-data buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BankStatus {
    Free,
    Transferring,
    Full,
    Printing,
    /// A wire value this driver does not know about. Treated as occupied.
    Unknown(u8),
}

impl BankStatus {
    pub fn from_wire(value: u8) -> Self {
        match value {
            wire::BANK_FREE => BankStatus::Free,
            wire::BANK_XFER => BankStatus::Transferring,
            wire::BANK_FULL => BankStatus::Full,
            wire::BANK_PRINTING => BankStatus::Printing,
            other => BankStatus::Unknown(other),
        }
    }
}

/// One bank's decoded record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BankState {
    pub jobid: u8,
    pub status: BankStatus,
    pub remaining: u16,
    pub completed: u16,
    pub total: u16,
}

impl BankState {
    fn decode(rec: &[u8]) -> Self {
        Self {
            jobid: rec[0],
            status: BankStatus::from_wire(rec[1]),
            remaining: u16::from_le_bytes([rec[2], rec[3]]),
            completed: u16::from_le_bytes([rec[4], rec[5]]),
            total: u16::from_le_bytes([rec[6], rec[7]]),
        }
    }
}

// ============================================================================
// PRINTER STATUS
// ============================================================================

/// A point-in-time snapshot of the printer. Never cached; re-fetched by
/// polling.
#[derive(Debug, Clone)]
pub struct PrinterStatus {
    pub header: StatusHeader,
    pub banks: Vec<BankState>,
}

impl PrinterStatus {
    /// Decode a GET_STATUS response payload. The bank count is implied by
    /// the payload length; a trailing partial record is a malformed payload.
    pub fn decode(header: StatusHeader, payload: &[u8]) -> Option<Self> {
        if payload.len() % BANK_RECORD_LEN != 0 {
            return None;
        }
        let banks = payload
            .chunks_exact(BANK_RECORD_LEN)
            .map(BankState::decode)
            .collect();
        Some(Self { header, banks })
    }

    /// Index of the first free bank, if any.
    pub fn free_bank(&self) -> Option<usize> {
        self.banks
            .iter()
            .position(|b| b.status == BankStatus::Free)
    }

    /// The bank currently holding `jobid`, if any.
    pub fn bank_for_job(&self, jobid: u8) -> Option<&BankState> {
        self.banks.iter().find(|b| b.jobid == jobid)
    }

    /// Whether the device reports a globally idle/ready state.
    pub fn is_idle(&self) -> bool {
        matches!(
            self.header.status,
            wire::STATUS_IDLE | wire::STATUS_FINISHED
        )
    }
}

// ============================================================================
// MEDIA / MARKERS
// ============================================================================

/// One loaded media entry from GET_MEDIA.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaEntry {
    pub code: u8,
    pub print_type: u8,
    pub columns: u16,
    pub rows: u16,
    pub remaining: u16,
}

/// The decoded media report.
#[derive(Debug, Clone)]
pub struct MediaInfo {
    pub entries: Vec<MediaEntry>,
}

impl MediaInfo {
    /// Decode a GET_MEDIA response payload: `[u8 count]` then `count`
    /// records.
    pub fn decode(payload: &[u8]) -> Option<Self> {
        let count = *payload.first()? as usize;
        let body = &payload[1..];
        if body.len() < count * MEDIA_RECORD_LEN {
            return None;
        }
        let entries = body
            .chunks_exact(MEDIA_RECORD_LEN)
            .take(count)
            .map(|rec| MediaEntry {
                code: rec[0],
                print_type: rec[1],
                columns: u16::from_le_bytes([rec[2], rec[3]]),
                rows: u16::from_le_bytes([rec[4], rec[5]]),
                remaining: u16::from_le_bytes([rec[6], rec[7]]),
            })
            .collect();
        Some(Self { entries })
    }

    /// Spooler marker attribute lines, one block per loaded media.
    ///
    /// These are the CUPS consumable surface: dye-sub ribbons carry fixed
    /// CMY panels plus overcoat, so the color list is constant.
    pub fn marker_lines(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|m| {
                let (name, capacity) = media_description(m.code);
                let level = if capacity > 0 {
                    (m.remaining as u32 * 100 / capacity as u32).min(100)
                } else {
                    0
                };
                format!(
                    "ATTR: marker-colors=#00FFFF#FF00FF#FFFF00 marker-types=ribbonWax marker-names='{}' marker-levels={}",
                    name, level
                )
            })
            .collect()
    }
}

/// Map a media size code to its display name and nominal ribbon capacity.
///
/// Only the common sizes of the family; unknown codes report a zero
/// capacity so the level reads empty rather than inventing a number.
pub fn media_description(code: u8) -> (&'static str, u16) {
    match code {
        0x00 => ("4x6", 700),
        0x01 => ("3.5x5", 800),
        0x03 => ("5x7", 400),
        0x05 => ("6x9", 230),
        0x06 => ("6x8", 350),
        0x07 => ("2x6", 1400),
        0x10 => ("89x60mm", 800),
        _ => ("Unknown", 0),
    }
}

// ============================================================================
// TESTS
// ============================================================================
