//! # Pipeline Tests
//!
//! End-to-end tests over the scripted transport: spool bytes in, wire bytes
//! out. These exercise the same path the backend binary runs — job parsing,
//! copy combining, panorama splitting and the print engine — without any
//! hardware attached.

use std::time::Duration;

use sublima::job::{panorama, JobList, PrintMethod};
use sublima::printer::sinfonia::{error_text, Sinfonia, SPOOL_HEADER_LEN};
use sublima::printer::{Backend, Engine, PrinterType};
use sublima::protocol::wire::{
    self, StatusHeader, BANK_RECORD_LEN, ERROR_NONE, ERROR_PRINTER, RESULT_FAIL, RESULT_SUCCESS,
    STATUS_IDLE,
};
use sublima::protocol::{commands, ProtocolClient};
use sublima::transport::mock::ScriptedTransport;

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Serialize one spooled page: the 32-byte header plus solid pixel data.
fn spool_page(columns: u32, rows: u32, copies: u32, fill: u8) -> Vec<u8> {
    let mut block = Vec::new();
    for word in [SPOOL_HEADER_LEN as u32, 0x00, 0x00, 0x02, columns, rows, copies, 0] {
        block.extend_from_slice(&word.to_le_bytes());
    }
    block.extend(vec![fill; (columns * rows * 3) as usize]);
    block
}

/// A GET_STATUS reply reporting `free` free banks out of two.
fn status_reply(free: usize) -> Vec<u8> {
    let hdr = StatusHeader {
        result: RESULT_SUCCESS,
        error: ERROR_NONE,
        printer_major: 0,
        printer_minor: 0,
        status: STATUS_IDLE,
        payload_len: (2 * BANK_RECORD_LEN) as u16,
    };
    let mut resp = hdr.encode().to_vec();
    for bank in 0..2 {
        let occupied = bank >= free;
        resp.push(if occupied { bank as u8 + 1 } else { 0 }); // jobid
        resp.push(if occupied { wire::BANK_PRINTING } else { wire::BANK_FREE });
        resp.extend_from_slice(&0u16.to_le_bytes()); // remaining
        resp.extend_from_slice(&0u16.to_le_bytes()); // completed
        resp.extend_from_slice(&1u16.to_le_bytes()); // total
    }
    resp
}

fn submit_ok() -> Vec<u8> {
    StatusHeader {
        result: RESULT_SUCCESS,
        error: ERROR_NONE,
        printer_major: 0,
        printer_minor: 0,
        status: STATUS_IDLE,
        payload_len: 0,
    }
    .encode()
    .to_vec()
}

fn submit_fail(error: u8, major: u8, minor: u8) -> Vec<u8> {
    StatusHeader {
        result: RESULT_FAIL,
        error,
        printer_major: major,
        printer_minor: minor,
        status: 0xFF,
        payload_len: 0,
    }
    .encode()
    .to_vec()
}

fn engine_for(backend: &Sinfonia, transport: ScriptedTransport) -> Engine<'_, ScriptedTransport> {
    let client = ProtocolClient::new(transport, error_text);
    let mut engine = Engine::new(client, backend);
    engine.set_poll_interval(Duration::ZERO);
    engine
}

/// Frames the engine wrote, split into (command id, frame bytes) pairs for
/// command frames and `None` for raw pixel streams.
fn sent_commands(sent: &[Vec<u8>]) -> Vec<Option<u16>> {
    sent.iter()
        .map(|frame| {
            if frame.len() >= 4 {
                let cmd = u16::from_le_bytes([frame[0], frame[1]]);
                let len = u16::from_le_bytes([frame[2], frame[3]]) as usize;
                if frame.len() == 4 + len {
                    return Some(cmd);
                }
            }
            None
        })
        .collect()
}

// ============================================================================
// COMBINING PIPELINE
// ============================================================================

#[test]
fn test_two_spooled_pages_print_as_one_combined_job() {
    let backend = Sinfonia::for_type(PrinterType::S6145);

    // Two identical single-copy 4x6 pages arrive on the spool stream.
    let mut stream = spool_page(8, 4, 1, 0x11);
    stream.extend(spool_page(8, 4, 1, 0x22));
    let mut cursor = stream.as_slice();

    let mut list = JobList::new();
    while list.can_wait() {
        match backend.parse_job(&mut cursor).unwrap() {
            Some(job) => list.append(job, &backend).unwrap(),
            None => break,
        }
    }

    // The pair folded into one two-panel job.
    assert_eq!(list.len(), 1);
    let job = list.iter().next().unwrap();
    assert_eq!(job.method, PrintMethod::Combined);
    assert_eq!(job.rows, 8);

    let mut transport = ScriptedTransport::new();
    transport.push_reply(status_reply(2));
    transport.push_reply(submit_ok());
    let mut engine = engine_for(&backend, transport);
    engine.print_list(&list).unwrap();

    let sent = &engine.client_mut().transport_mut().sent;
    let commands = sent_commands(sent);
    // One status poll, one print submit, one raw pixel stream.
    assert_eq!(
        commands,
        vec![Some(wire::CMD_GET_STATUS), Some(wire::CMD_PRINT), None]
    );

    // The submit declares the folded geometry.
    let submit = &sent[1];
    assert_eq!(submit[4 + 2], PrintMethod::Combined.wire());
    assert_eq!(u16::from_le_bytes([submit[4 + 4], submit[4 + 5]]), 8); // columns
    assert_eq!(u16::from_le_bytes([submit[4 + 6], submit[4 + 7]]), 8); // folded rows
}

#[test]
fn test_combined_payload_is_both_pages_in_spool_order() {
    let backend = Sinfonia::for_type(PrinterType::S6145);

    let mut stream = spool_page(8, 4, 1, 0x11);
    stream.extend(spool_page(8, 4, 1, 0x22));
    let mut cursor = stream.as_slice();

    let mut list = JobList::new();
    while let Some(job) = backend.parse_job(&mut cursor).unwrap() {
        list.append(job, &backend).unwrap();
    }

    let mut transport = ScriptedTransport::new();
    transport.push_reply(status_reply(2));
    transport.push_reply(submit_ok());
    let mut engine = engine_for(&backend, transport);
    engine.print_list(&list).unwrap();

    let sent = &engine.client_mut().transport_mut().sent;
    let pixels = sent.last().unwrap();
    let page_len = 8 * 4 * 3;
    assert_eq!(pixels.len(), 2 * page_len);
    assert!(pixels[..page_len].iter().all(|&b| b == 0x11));
    assert!(pixels[page_len..].iter().all(|&b| b == 0x22));
}

#[test]
fn test_total_transmitted_payload_is_conserved() {
    let backend = Sinfonia::for_type(PrinterType::S6145);

    // Five identical single-copy pages: ceil(5/2) = 3 queued jobs.
    let mut stream = Vec::new();
    for i in 0..5u8 {
        stream.extend(spool_page(8, 4, 1, i + 1));
    }
    let mut cursor = stream.as_slice();

    let mut list = JobList::new();
    while let Some(job) = backend.parse_job(&mut cursor).unwrap() {
        list.append(job, &backend).unwrap();
    }
    assert_eq!(list.len(), 3);

    let mut transport = ScriptedTransport::new();
    for _ in 0..list.len() {
        transport.push_reply(status_reply(2));
        transport.push_reply(submit_ok());
    }
    let mut engine = engine_for(&backend, transport);
    engine.print_list(&list).unwrap();

    let sent = &engine.client_mut().transport_mut().sent;
    let pixel_total: usize = sent
        .iter()
        .zip(sent_commands(sent))
        .filter(|(_, cmd)| cmd.is_none())
        .map(|(frame, _)| frame.len())
        .sum();
    assert_eq!(pixel_total, 5 * 8 * 4 * 3);
}

// ============================================================================
// PANORAMA PIPELINE
// ============================================================================

#[test]
fn test_panorama_page_prints_as_two_split_jobs() {
    let backend = Sinfonia::for_type(PrinterType::S2245);

    // A 1548-column, 3036-row panorama exceeds the 2136-row bank.
    let stream = spool_page(1548, 3036, 1, 0x5A);
    let mut cursor = stream.as_slice();
    let job = backend.parse_job(&mut cursor).unwrap().unwrap();
    assert!(job.rows > backend.max_rows());

    let overlap = backend.panorama_overlap(job.columns, job.rows);
    assert_eq!(overlap, 636);
    let panels = panorama::split(
        &job,
        backend.max_rows(),
        overlap,
        backend.is_multicut_media(job.media),
    )
    .unwrap();
    assert_eq!(panels.len(), 2);
    assert_eq!(panels[0].rows, 2136);
    assert_eq!(panels[1].rows, 1536);

    let mut list = JobList::new();
    for panel in panels {
        list.append(panel, &backend).unwrap();
    }
    // Split panels never fold together.
    assert_eq!(list.len(), 2);

    let mut transport = ScriptedTransport::new();
    for _ in 0..2 {
        transport.push_reply(status_reply(2));
        transport.push_reply(submit_ok());
    }
    let mut engine = engine_for(&backend, transport);
    engine.print_list(&list).unwrap();

    let sent = &engine.client_mut().transport_mut().sent;
    let submits: Vec<&Vec<u8>> = sent
        .iter()
        .zip(sent_commands(sent))
        .filter(|(_, cmd)| *cmd == Some(wire::CMD_PRINT))
        .map(|(frame, _)| frame)
        .collect();
    assert_eq!(submits.len(), 2);
    for submit in &submits {
        assert_eq!(submit[4 + 2], PrintMethod::Split.wire());
    }
    // Rows field (payload offset 6) carries each panel's height.
    assert_eq!(u16::from_le_bytes([submits[0][4 + 6], submits[0][4 + 7]]), 2136);
    assert_eq!(u16::from_le_bytes([submits[1][4 + 6], submits[1][4 + 7]]), 1536);
}

// ============================================================================
// ERROR PATHS
// ============================================================================

#[test]
fn test_hardware_fault_fails_with_decoded_text() {
    let backend = Sinfonia::for_type(PrinterType::S6145);
    let stream = spool_page(8, 4, 1, 0x01);
    let mut cursor = stream.as_slice();

    let mut list = JobList::new();
    while let Some(job) = backend.parse_job(&mut cursor).unwrap() {
        list.append(job, &backend).unwrap();
    }

    let mut transport = ScriptedTransport::new();
    transport.push_reply(status_reply(2));
    transport.push_reply(submit_fail(ERROR_PRINTER, 0x61, 0x01)); // out of paper
    let mut engine = engine_for(&backend, transport);

    let err = engine.print_list(&list).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("out of paper"), "got: {}", msg);
    assert!(msg.contains("0x61"), "got: {}", msg);
}

#[test]
fn test_repolled_status_stays_valid_and_monotonic() {
    // The same job progresses between two polls; nothing regresses.
    let bank = |completed: u16| {
        let hdr = StatusHeader {
            result: RESULT_SUCCESS,
            error: ERROR_NONE,
            printer_major: 0,
            printer_minor: 0,
            status: STATUS_IDLE,
            payload_len: BANK_RECORD_LEN as u16,
        };
        let mut resp = hdr.encode().to_vec();
        resp.push(7); // jobid
        resp.push(wire::BANK_PRINTING);
        resp.extend_from_slice(&(2 - completed).to_le_bytes()); // remaining
        resp.extend_from_slice(&completed.to_le_bytes());
        resp.extend_from_slice(&2u16.to_le_bytes()); // total
        resp
    };

    let mut transport = ScriptedTransport::new();
    transport.push_reply(bank(0));
    transport.push_reply(bank(1));
    let mut client = ProtocolClient::new(transport, error_text);

    let first = commands::query_status(&mut client, 1).unwrap();
    let second = commands::query_status(&mut client, 1).unwrap();

    let (a, b) = (&first.banks[0], &second.banks[0]);
    assert_eq!(a.jobid, b.jobid);
    assert_eq!(a.total, b.total);
    assert!(b.completed >= a.completed);
    assert_eq!(a.remaining + a.completed, a.total);
    assert_eq!(b.remaining + b.completed, b.total);
}

#[test]
fn test_submit_waits_out_full_banks() {
    let backend = Sinfonia::for_type(PrinterType::S6145);
    let stream = spool_page(8, 4, 1, 0x01);
    let mut cursor = stream.as_slice();

    let mut list = JobList::new();
    while let Some(job) = backend.parse_job(&mut cursor).unwrap() {
        list.append(job, &backend).unwrap();
    }

    let mut transport = ScriptedTransport::new();
    transport.push_reply(status_reply(0)); // all banks occupied
    transport.push_reply(status_reply(0)); // still occupied
    transport.push_reply(status_reply(1)); // one freed up
    transport.push_reply(submit_ok());
    let mut engine = engine_for(&backend, transport);
    engine.print_list(&list).unwrap();

    let sent = &engine.client_mut().transport_mut().sent;
    let commands = sent_commands(sent);
    assert_eq!(
        commands,
        vec![
            Some(wire::CMD_GET_STATUS),
            Some(wire::CMD_GET_STATUS),
            Some(wire::CMD_GET_STATUS),
            Some(wire::CMD_PRINT),
            None,
        ]
    );
}
