//! # Command Helpers
//!
//! One byte-exact helper per shared RPC. Each helper owns its sub-command's
//! payload layout — including the places where the wire flips to big-endian
//! (tone-curve samples) against the otherwise little-endian protocol — so
//! callers only ever see host-order values.

use crate::error::ProtocolError;
use crate::protocol::client::ProtocolClient;
use crate::protocol::status::{MediaInfo, PrinterStatus};
use crate::protocol::wire::{
    self, BANK_RECORD_LEN, MEDIA_RECORD_LEN, STATUS_HEADER_LEN, TONE_CURVE_LEN,
};
use crate::transport::Transport;

/// Parameter id: overcoat application mode.
pub const PARAM_OVERCOAT: u8 = 0x20;
/// Parameter id: paper handling mode.
pub const PARAM_PAPER_MODE: u8 = 0x3F;
/// Parameter id: standby sleep delay.
pub const PARAM_SLEEP_TIME: u8 = 0x54;

/// Overcoat parameter value: no overcoat.
pub const OVERCOAT_OFF: u32 = 0x01;
/// Overcoat parameter value: glossy finish.
pub const OVERCOAT_GLOSSY: u32 = 0x02;
/// Overcoat parameter value: matte finish.
pub const OVERCOAT_MATTE: u32 = 0x03;

/// Most media entries a GET_MEDIA response can carry.
const MEDIA_MAX_ITEMS: usize = 6;

/// Fixed payload size of the serial and firmware query responses
/// (NUL-padded ASCII).
const ID_STRING_LEN: usize = 32;

/// Poll device status and per-bank job progress.
///
/// `bank_count` comes from the model table; the response is header plus one
/// 8-byte record per bank.
pub fn query_status<T: Transport>(
    client: &mut ProtocolClient<T>,
    bank_count: usize,
) -> Result<PrinterStatus, ProtocolError> {
    let expected = STATUS_HEADER_LEN + bank_count * BANK_RECORD_LEN;
    let (header, payload) = client.execute(wire::CMD_GET_STATUS, &[], expected)?;
    PrinterStatus::decode(header, &payload).ok_or(ProtocolError::ShortRead {
        got: payload.len(),
        want: bank_count * BANK_RECORD_LEN,
    })
}

/// Query loaded media and remaining-print counts.
pub fn query_media<T: Transport>(
    client: &mut ProtocolClient<T>,
) -> Result<MediaInfo, ProtocolError> {
    let max = STATUS_HEADER_LEN + 1 + MEDIA_MAX_ITEMS * MEDIA_RECORD_LEN;
    let (_, payload) = client.execute_max(wire::CMD_GET_MEDIA, &[], max)?;
    MediaInfo::decode(&payload).ok_or(ProtocolError::ShortRead {
        got: payload.len(),
        want: 1,
    })
}

/// Query the factory serial number.
pub fn query_serial<T: Transport>(
    client: &mut ProtocolClient<T>,
) -> Result<String, ProtocolError> {
    let (_, payload) = client.execute(
        wire::CMD_GET_SERIAL,
        &[],
        STATUS_HEADER_LEN + ID_STRING_LEN,
    )?;
    Ok(trim_id_string(&payload))
}

/// Query the firmware version string.
pub fn query_firmware<T: Transport>(
    client: &mut ProtocolClient<T>,
) -> Result<String, ProtocolError> {
    let (_, payload) = client.execute(
        wire::CMD_GET_FWINFO,
        &[],
        STATUS_HEADER_LEN + ID_STRING_LEN,
    )?;
    Ok(trim_id_string(&payload))
}

/// Read a 32-bit device parameter.
pub fn get_param<T: Transport>(
    client: &mut ProtocolClient<T>,
    param: u8,
) -> Result<u32, ProtocolError> {
    let (_, payload) = client.execute(wire::CMD_GET_PARAM, &[param], STATUS_HEADER_LEN + 4)?;
    Ok(u32::from_le_bytes([
        payload[0], payload[1], payload[2], payload[3],
    ]))
}

/// Set a 32-bit device parameter.
pub fn set_param<T: Transport>(
    client: &mut ProtocolClient<T>,
    param: u8,
    value: u32,
) -> Result<(), ProtocolError> {
    log::debug!("SET_PARAM {:#04x} = {:#010x}", param, value);
    let mut payload = vec![param];
    payload.extend_from_slice(&value.to_le_bytes());
    client.execute(wire::CMD_SET_PARAM, &payload, STATUS_HEADER_LEN)?;
    Ok(())
}

/// Read a tone curve from the printer.
///
/// Returns the 768 samples in host order. On the wire the table is 16-bit
/// **big-endian**, unlike every header field.
pub fn read_tone_curve<T: Transport>(
    client: &mut ProtocolClient<T>,
    target: u8,
) -> Result<Vec<u16>, ProtocolError> {
    let (_, payload) = client.execute(
        wire::CMD_READ_TONE,
        &[target],
        STATUS_HEADER_LEN + TONE_CURVE_LEN,
    )?;
    Ok(payload
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect())
}

/// Transfer a tone curve to the printer.
///
/// `samples` must hold exactly 768 entries; they are serialized 16-bit
/// **big-endian** per the sub-command's convention.
pub fn write_tone_curve<T: Transport>(
    client: &mut ProtocolClient<T>,
    target: u8,
    samples: &[u16],
) -> Result<(), ProtocolError> {
    debug_assert_eq!(samples.len() * 2, TONE_CURVE_LEN);
    log::info!("UPDATE_TONE target {:#04x}", target);
    let mut payload = Vec::with_capacity(1 + TONE_CURVE_LEN);
    payload.push(target);
    for sample in samples {
        payload.extend_from_slice(&sample.to_be_bytes());
    }
    client.execute(wire::CMD_UPDATE_TONE, &payload, STATUS_HEADER_LEN)?;
    Ok(())
}

/// Cancel the job occupying a bank.
pub fn cancel_job<T: Transport>(
    client: &mut ProtocolClient<T>,
    jobid: u8,
) -> Result<(), ProtocolError> {
    log::info!("CANCEL job {}", jobid);
    client.execute(wire::CMD_CANCEL, &[jobid], STATUS_HEADER_LEN)?;
    Ok(())
}

/// Soft-reset the print mechanism.
pub fn reset<T: Transport>(client: &mut ProtocolClient<T>) -> Result<(), ProtocolError> {
    log::info!("RESET");
    client.execute(wire::CMD_RESET, &[], STATUS_HEADER_LEN)?;
    Ok(())
}

/// Trim a NUL-padded ASCII identification field.
fn trim_id_string(payload: &[u8]) -> String {
    let end = payload.iter().position(|&b| b == 0).unwrap_or(payload.len());
    String::from_utf8_lossy(&payload[..end]).trim().to_string()
}

// ============================================================================
// TESTS
// ============================================================================
