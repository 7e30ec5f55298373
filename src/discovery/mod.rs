//! # Device Discovery & Matching
//!
//! Finds attached printers, matches them against the backend device tables,
//! claims the USB interface and resolves the printer's identity.
//!
//! ## Matching Algorithm
//!
//! For every attached USB device whose vendor/product id appears in a
//! backend table (or the environment override), walk its configuration's
//! interfaces and alt-settings looking for the first bulk IN/OUT endpoint
//! pair. IPP-over-USB printer-class interfaces are skipped: those belong to
//! the device's embedded IPP server, not the raw vendor protocol. An
//! alt-setting with fewer than two endpoints can never carry the pair and is
//! rejected outright.
//!
//! ## Identity Resolution
//!
//! Manufacturer, model, description and serial prefer the IEEE-1284 device
//! ID dictionary, then the USB string descriptors, then (for the serial) a
//! backend-specific query over the wire protocol, then a last-ditch
//! placeholder. Every step down that ladder logs a warning, since spoolers
//! key queues off the serial number.
//!
//! ## Modules
//!
//! - [`ieee1284`]: the device-ID string parser

pub mod ieee1284;

use std::thread;
use std::time::Duration;

use rusb::{Context, Device, DeviceHandle, Direction, TransferType, UsbContext};

use crate::config::Config;
use crate::discovery::ieee1284::DeviceId;
use crate::error::DiscoveryError;
use crate::printer::{self, Backend, PrinterType};
use crate::transport::UsbTransport;

/// USB base class code for printers.
const USB_CLASS_PRINTER: u8 = 7;
/// Printer-class protocol value for IPP-over-USB interfaces.
const USB_PROTOCOL_IPP: u8 = 4;
/// Printer-class request: GET_DEVICE_ID (IEEE-1284 string).
const REQUEST_GET_DEVICE_ID: u8 = 0;
/// Largest IEEE-1284 device ID accepted, header included.
const DEVICE_ID_MAX_LEN: usize = 1024;

/// Attempts to claim a busy interface before giving up.
const CLAIM_RETRIES: u32 = 5;
/// Backoff between claim attempts.
const CLAIM_RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Placeholder manufacturer/model when nothing reports one.
const UNKNOWN_NAME: &str = "Unknown";
/// Placeholder serial when nothing reports one.
const UNKNOWN_SERIAL: &str = "NONE_UNKNOWN";

/// URI scheme used in discovery output.
pub const URI_SCHEME: &str = "sublima+usb";

/// The printer's resolved self-description.
#[derive(Debug, Clone)]
pub struct Identity {
    pub manufacturer: String,
    pub model: String,
    pub description: String,
    pub serial: String,
    /// Raw IEEE-1284 body, empty when the device supplied none.
    pub ieee_id: String,
}

/// An opened, interface-claimed printer.
///
/// Exclusively owned by one backend instance for the process lifetime; the
/// interface is released and the handle closed when the transport drops.
pub struct Connection {
    pub transport: UsbTransport,
    pub printer_type: PrinterType,
    pub make: &'static str,
    pub model: &'static str,
    pub vendor_id: u16,
    pub product_id: u16,
    pub bus: u8,
    pub port: u8,
    pub identity: Identity,
}

/// One device-table match found during enumeration, before opening.
struct Candidate {
    device: Device<Context>,
    printer_type: PrinterType,
    make: &'static str,
    model: &'static str,
    vendor_id: u16,
    product_id: u16,
}

/// The bulk endpoint pair selected on a candidate.
struct EndpointPair {
    iface: u8,
    altsetting: u8,
    ep_in: u8,
    ep_out: u8,
    printer_class: bool,
}

/// Find and open the first matching printer.
///
/// Candidates that fail to open or that a filter rejects are logged and
/// skipped; only an empty candidate set (or an unusable USB stack) is an
/// error.
pub fn probe(config: &Config) -> Result<Connection, DiscoveryError> {
    let context = Context::new().map_err(|e| DiscoveryError::Usb(e.to_string()))?;

    let mut last_err = None;
    for candidate in enumerate(&context, config)? {
        match open_candidate(candidate, config) {
            Ok(conn) => return Ok(conn),
            Err(e) => {
                log::warn!("skipping candidate: {}", e);
                last_err = Some(e);
            }
        }
    }
    Err(last_err.unwrap_or(DiscoveryError::NoDevice))
}

/// List every matching printer on standard output, one spooler-discoverable
/// URI line per device. Returns how many devices were listed.
///
/// Each device is opened just long enough to resolve its identity, then
/// released; a device that cannot be opened is reported and skipped so the
/// rest of the bus still gets listed.
pub fn scan(config: &Config) -> Result<usize, DiscoveryError> {
    let context = Context::new().map_err(|e| DiscoveryError::Usb(e.to_string()))?;

    let mut listed = 0;
    for candidate in enumerate(&context, config)? {
        let backend_name = printer::backend_for(candidate.printer_type).name();
        match open_candidate(candidate, config) {
            Ok(conn) => {
                println!(
                    "{}",
                    uri_line(backend_name, conn.make, &conn.identity, config.old_uri_scheme)
                );
                listed += 1;
            }
            Err(e) => log::warn!("skipping candidate during scan: {}", e),
        }
    }
    Ok(listed)
}

/// Enumerate attached devices and collect every device-table match,
/// honoring the backend filter and the environment override entry.
fn enumerate(
    context: &Context,
    config: &Config,
) -> Result<Vec<Candidate>, DiscoveryError> {
    let devices = context
        .devices()
        .map_err(|e| DiscoveryError::Usb(e.to_string()))?;

    let mut candidates = Vec::new();
    for device in devices.iter() {
        let desc = match device.device_descriptor() {
            Ok(d) => d,
            Err(e) => {
                log::debug!("unreadable device descriptor: {}", e);
                continue;
            }
        };
        let vid = desc.vendor_id();
        let pid = desc.product_id();

        let (printer_type, make, model) = match printer::lookup_device(vid, pid) {
            Some(entry) => (entry.printer_type, entry.make, entry.model),
            None => match config.extra_device {
                Some(extra) if extra.vid == vid && extra.pid == pid => {
                    log::info!(
                        "matching {:04x}:{:04x} via environment override as {}",
                        vid,
                        pid,
                        extra.printer_type.name()
                    );
                    (extra.printer_type, UNKNOWN_NAME, extra.printer_type.name())
                }
                _ => continue,
            },
        };

        if let Some(filter) = &config.backend_filter {
            let backend_name = printer::backend_for(printer_type).name();
            if !filter.eq_ignore_ascii_case(backend_name) {
                log::debug!(
                    "{:04x}:{:04x} matches backend {} but filter wants {}",
                    vid,
                    pid,
                    backend_name,
                    filter
                );
                continue;
            }
        }

        log::debug!(
            "candidate {:04x}:{:04x} on bus {:03} port {}: {} {}",
            vid,
            pid,
            device.bus_number(),
            device.port_number(),
            make,
            model
        );
        candidates.push(Candidate {
            device,
            printer_type,
            make,
            model,
            vendor_id: vid,
            product_id: pid,
        });
    }
    Ok(candidates)
}

/// Open one candidate: select endpoints, claim the interface, resolve the
/// identity and apply the serial filter.
fn open_candidate(
    candidate: Candidate,
    config: &Config,
) -> Result<Connection, DiscoveryError> {
    let endpoints = find_endpoints(&candidate.device)?;
    let handle = candidate
        .device
        .open()
        .map_err(|e| DiscoveryError::Usb(format!("open failed: {}", e)))?;

    claim_interface(&handle, endpoints.iface)?;
    if endpoints.altsetting != 0 {
        handle
            .set_alternate_setting(endpoints.iface, endpoints.altsetting)
            .map_err(|e| DiscoveryError::Usb(format!("set_alternate_setting: {}", e)))?;
    }

    let device_id = if endpoints.printer_class {
        fetch_device_id(&handle, endpoints.iface, endpoints.altsetting, config)
    } else {
        None
    };

    let usb_strings = read_usb_strings(&handle);
    let mut transport = UsbTransport::new(
        handle,
        endpoints.iface,
        endpoints.ep_in,
        endpoints.ep_out,
        config.xfer_timeout,
        config.max_xfer_size,
        config.dump_traffic(),
    );

    let backend = printer::backend_for(candidate.printer_type);
    let identity = resolve_identity(
        candidate.make,
        candidate.model,
        device_id.as_ref(),
        &usb_strings,
        || backend.query_serial(&mut transport),
    );

    if let Some(wanted) = &config.serial_filter {
        if !wanted.eq_ignore_ascii_case(&identity.serial) {
            return Err(DiscoveryError::SerialMismatch {
                wanted: wanted.clone(),
                found: identity.serial,
            });
        }
    }

    log::info!(
        "using {} {} serial {} at bus {:03} port {}",
        identity.manufacturer,
        identity.model,
        identity.serial,
        candidate.device.bus_number(),
        candidate.device.port_number()
    );

    Ok(Connection {
        bus: candidate.device.bus_number(),
        port: candidate.device.port_number(),
        transport,
        printer_type: candidate.printer_type,
        make: candidate.make,
        model: candidate.model,
        vendor_id: candidate.vendor_id,
        product_id: candidate.product_id,
        identity,
    })
}

/// Walk the active configuration for the first interface/alt-setting with a
/// bulk IN/OUT pair, skipping IPP-over-USB printer-class interfaces.
fn find_endpoints(device: &Device<Context>) -> Result<EndpointPair, DiscoveryError> {
    let config = device
        .active_config_descriptor()
        .map_err(|e| DiscoveryError::Usb(format!("config descriptor: {}", e)))?;

    for interface in config.interfaces() {
        for alt in interface.descriptors() {
            if alt.num_endpoints() < 2 {
                continue;
            }
            let printer_class = alt.class_code() == USB_CLASS_PRINTER;
            if printer_class && alt.protocol_code() == USB_PROTOCOL_IPP {
                log::debug!(
                    "interface {} alt {} is IPP-over-USB, skipping",
                    alt.interface_number(),
                    alt.setting_number()
                );
                continue;
            }

            let mut ep_in = None;
            let mut ep_out = None;
            for ep in alt.endpoint_descriptors() {
                if ep.transfer_type() != TransferType::Bulk {
                    continue;
                }
                match ep.direction() {
                    Direction::In if ep_in.is_none() => ep_in = Some(ep.address()),
                    Direction::Out if ep_out.is_none() => ep_out = Some(ep.address()),
                    _ => {}
                }
            }

            if let (Some(ep_in), Some(ep_out)) = (ep_in, ep_out) {
                return Ok(EndpointPair {
                    iface: alt.interface_number(),
                    altsetting: alt.setting_number(),
                    ep_in,
                    ep_out,
                    printer_class,
                });
            }
        }
    }
    Err(DiscoveryError::Usb(
        "no interface with a bulk endpoint pair".into(),
    ))
}

/// Detach any kernel driver and claim the interface, retrying a bounded
/// number of times when another driver still holds it.
fn claim_interface(
    handle: &DeviceHandle<Context>,
    iface: u8,
) -> Result<(), DiscoveryError> {
    match handle.kernel_driver_active(iface) {
        Ok(true) => {
            log::debug!("detaching kernel driver from interface {}", iface);
            if let Err(e) = handle.detach_kernel_driver(iface) {
                log::warn!("detach_kernel_driver failed: {}", e);
            }
        }
        Ok(false) => {}
        // Not supported on this platform; claiming will tell us anyway.
        Err(e) => log::debug!("kernel_driver_active: {}", e),
    }

    let mut attempt = 0;
    loop {
        match handle.claim_interface(iface) {
            Ok(()) => return Ok(()),
            Err(rusb::Error::Busy) if attempt < CLAIM_RETRIES => {
                attempt += 1;
                log::info!(
                    "interface {} busy, retrying claim ({}/{})",
                    iface,
                    attempt,
                    CLAIM_RETRIES
                );
                thread::sleep(CLAIM_RETRY_INTERVAL);
            }
            Err(e) => return Err(DiscoveryError::Claim(e.to_string())),
        }
    }
}

/// Fetch and parse the IEEE-1284 device ID via the printer-class
/// GET_DEVICE_ID request. Failures are logged, not fatal: plenty of
/// otherwise healthy devices botch this request.
fn fetch_device_id(
    handle: &DeviceHandle<Context>,
    iface: u8,
    altsetting: u8,
    config: &Config,
) -> Option<DeviceId> {
    let mut buf = vec![0u8; DEVICE_ID_MAX_LEN];
    let request_type = rusb::request_type(
        Direction::In,
        rusb::RequestType::Class,
        rusb::Recipient::Interface,
    );
    let index = ((iface as u16) << 8) | altsetting as u16;

    match handle.read_control(
        request_type,
        REQUEST_GET_DEVICE_ID,
        0,
        index,
        &mut buf,
        config.xfer_timeout,
    ) {
        Ok(len) => {
            buf.truncate(len);
            let id = DeviceId::parse(&buf);
            if id.is_none() {
                log::warn!("device returned a malformed IEEE-1284 ID ({} bytes)", len);
            }
            id
        }
        Err(e) => {
            log::debug!("GET_DEVICE_ID failed: {}", e);
            None
        }
    }
}

/// USB string descriptors relevant to identification.
#[derive(Debug, Default)]
struct UsbStrings {
    manufacturer: Option<String>,
    product: Option<String>,
    serial: Option<String>,
}

fn read_usb_strings(handle: &DeviceHandle<Context>) -> UsbStrings {
    let Ok(desc) = handle.device().device_descriptor() else {
        return UsbStrings::default();
    };
    let clean = |s: rusb::Result<String>| {
        s.ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    };
    UsbStrings {
        manufacturer: clean(handle.read_manufacturer_string_ascii(&desc)),
        product: clean(handle.read_product_string_ascii(&desc)),
        serial: clean(handle.read_serial_number_string_ascii(&desc)),
    }
}

/// Resolve the printer's identity from the available sources.
///
/// Preference order per field: IEEE-1284 dictionary, USB string
/// descriptors, the backend's serial query (serial only), table/placeholder
/// values. Fallbacks below the descriptors are warned about.
fn resolve_identity(
    table_make: &str,
    table_model: &str,
    device_id: Option<&DeviceId>,
    usb: &UsbStrings,
    backend_serial: impl FnOnce() -> Option<String>,
) -> Identity {
    let manufacturer = device_id
        .and_then(|id| id.manufacturer())
        .map(str::to_string)
        .or_else(|| usb.manufacturer.clone())
        .unwrap_or_else(|| {
            log::warn!("no manufacturer reported, using table entry {:?}", table_make);
            table_make.to_string()
        });

    let model = device_id
        .and_then(|id| id.model())
        .map(str::to_string)
        .or_else(|| usb.product.clone())
        .unwrap_or_else(|| {
            log::warn!("no model reported, using table entry {:?}", table_model);
            table_model.to_string()
        });

    let description = device_id
        .and_then(|id| id.description())
        .map(str::to_string)
        .unwrap_or_else(|| format!("{} {}", manufacturer, model));

    let serial = device_id
        .and_then(|id| id.serial())
        .map(str::to_string)
        .or_else(|| usb.serial.clone())
        .or_else(|| {
            log::warn!("no serial in IEEE-1284 ID or USB descriptors, querying printer");
            backend_serial().filter(|s| !s.is_empty())
        })
        .unwrap_or_else(|| {
            log::warn!("printer reports no serial number at all, using placeholder");
            UNKNOWN_SERIAL.to_string()
        });

    Identity {
        manufacturer,
        model,
        description,
        serial,
        ieee_id: device_id.map(|id| id.raw().to_string()).unwrap_or_default(),
    }
}

/// Format one spooler-discoverable URI line.
///
/// The modern form encodes make and serial in the URI path; the legacy form
/// carries them as query parameters for spoolers configured before the
/// path-style scheme existed.
fn uri_line(backend: &str, make: &str, identity: &Identity, old_scheme: bool) -> String {
    let uri = if old_scheme {
        format!(
            "{}://?backend={}&serial={}",
            URI_SCHEME, backend, identity.serial
        )
    } else {
        format!(
            "{}://{}/{}",
            URI_SCHEME,
            make.to_ascii_lowercase(),
            identity.serial
        )
    };
    format!(
        "direct {} \"{}\" \"{}\" \"{}\"",
        uri, identity.description, identity.description, identity.ieee_id
    )
}

// ============================================================================
// TESTS
// ============================================================================
