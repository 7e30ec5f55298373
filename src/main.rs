//! # Sublima CLI
//!
//! The spooler-facing backend binary for dye-sublimation photo printing.
//!
//! ## Usage
//!
//! ```bash
//! # List attached printers as spooler-discoverable URIs
//! sublima scan
//!
//! # Print a spooled job stream from a file
//! sublima print job.spool
//!
//! # Print from standard input, 3 collated copies of the whole sequence
//! sublima print --copies 3 --collate
//!
//! # Target one specific printer and wait for each print to finish
//! sublima print --serial Q12345 --wait job.spool
//!
//! # Show printer status, loaded media and firmware
//! sublima status
//! ```
//!
//! Exit codes follow the spooler backend contract; see
//! [`sublima::error::ExitCode`].

use std::fs::File;
use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::{Parser, Subcommand};

use sublima::{
    config::Config,
    discovery,
    error::{Error, JobError},
    job::{panorama, JobList, PrintJob, MAX_JOBS},
    printer::{self, Backend, Engine, PrinterType},
    protocol::{commands, ProtocolClient},
};

/// Cooperative cancellation flag, set from the signal handler and checked
/// by the engine between polls and between jobs.
static CANCEL: AtomicBool = AtomicBool::new(false);

extern "C" fn handle_signal(_sig: libc::c_int) {
    CANCEL.store(true, Ordering::Relaxed);
}

fn install_signal_handlers() {
    let handler = handle_signal as extern "C" fn(libc::c_int);
    unsafe {
        libc::signal(libc::SIGINT, handler as libc::sighandler_t);
        libc::signal(libc::SIGTERM, handler as libc::sighandler_t);
    }
}

/// Sublima - dye-sublimation photo printer backend
#[derive(Parser, Debug)]
#[command(name = "sublima")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print a spooled job stream
    Print {
        /// Spool file (omit to read standard input)
        file: Option<PathBuf>,

        /// Number of copies
        #[arg(long, default_value = "1")]
        copies: u16,

        /// Collate copies: repeat the whole page sequence instead of each page
        #[arg(long)]
        collate: bool,

        /// Only match the printer with this serial number
        #[arg(long)]
        serial: Option<String>,

        /// Only match printers of this backend family
        #[arg(long)]
        backend: Option<String>,

        /// Wait for each print to finish instead of returning after the
        /// data transfer on models that allow it
        #[arg(long)]
        wait: bool,
    },

    /// List attached printers as spooler-discoverable URI lines
    Scan,

    /// Show printer status, loaded media and firmware
    Status {
        /// Only match the printer with this serial number
        #[arg(long)]
        serial: Option<String>,
    },
}

fn main() {
    let config = Config::from_env();

    let mut builder = colog::default_builder();
    builder.filter_level(if config.debug > 0 {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    });
    builder.init();

    install_signal_handlers();

    if let Err(e) = run(Cli::parse(), config) {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code() as i32);
    }
}

fn run(cli: Cli, mut config: Config) -> Result<(), Error> {
    match cli.command {
        Commands::Print {
            file,
            copies,
            collate,
            serial,
            backend,
            wait,
        } => {
            if serial.is_some() {
                config.serial_filter = serial;
            }
            if backend.is_some() {
                config.backend_filter = backend;
            }

            let mut input: Box<dyn Read> = match file {
                Some(path) => Box::new(File::open(&path).map_err(|e| {
                    Error::Job(JobError::BadHeader(format!(
                        "cannot open {}: {}",
                        path.display(),
                        e
                    )))
                })?),
                None => Box::new(io::stdin().lock()),
            };

            if config.test_mode {
                return dry_run(&config, &mut input, copies, collate);
            }

            let conn = discovery::probe(&config)?;
            let backend = printer::backend_for(conn.printer_type);
            let client = ProtocolClient::new(conn.transport, backend.error_text());
            let mut engine = Engine::new(client, backend.as_ref());
            engine.set_cancel_flag(&CANCEL);
            if wait {
                engine.set_fast_return(false);
            }

            print_stream(&mut engine, backend.as_ref(), &mut input, copies, collate)
        }

        Commands::Scan => {
            let listed = discovery::scan(&config)?;
            log::info!("{} printer(s) found", listed);
            Ok(())
        }

        Commands::Status { serial } => {
            if serial.is_some() {
                config.serial_filter = serial;
            }
            show_status(&config)
        }
    }
}

/// Read batches from the spool stream and drive the printer through them.
///
/// A batch keeps growing while the job list reports it can still fold
/// another page in; it is flushed to the printer once the list is full, its
/// newest entry is non-combinable, or the stream ends. Cancellation is
/// checked between batches, letting the current batch drain.
fn print_stream<T: sublima::transport::Transport>(
    engine: &mut Engine<T>,
    backend: &dyn Backend,
    input: &mut dyn Read,
    copies: u16,
    collate: bool,
) -> Result<(), Error> {
    let mut eof = false;
    while !eof {
        if CANCEL.load(Ordering::Relaxed) {
            return Err(Error::Cancelled);
        }

        let mut list = new_list(copies, collate);
        while list.can_wait() {
            match backend.parse_job(input)? {
                Some(job) => {
                    let jobs = expand_job(backend, job, copies, collate)?;
                    if list.len() + jobs.len() > MAX_JOBS {
                        engine.print_list(&list)?;
                        list = new_list(copies, collate);
                    }
                    for job in jobs {
                        list.append(job, backend)?;
                    }
                }
                None => {
                    eof = true;
                    break;
                }
            }
        }

        if list.is_empty() {
            break;
        }
        engine.print_list(&list)?;
        report_markers(engine.client_mut());
    }
    Ok(())
}

/// Refresh the consumable report after a batch. Marker lines go to stdout,
/// where the spooler picks them up as ribbon level indicators.
fn report_markers<T: sublima::transport::Transport>(client: &mut ProtocolClient<T>) {
    match commands::query_media(client) {
        Ok(media) => {
            for line in media.marker_lines() {
                println!("{}", line);
            }
        }
        Err(e) => log::warn!("media query failed: {}", e),
    }
}

fn new_list(copies: u16, collate: bool) -> JobList {
    if collate {
        JobList::with_copies(copies)
    } else {
        JobList::new()
    }
}

/// Apply the copy multiplier and split oversized images into panorama
/// panels. Returns the job(s) actually queued for one parsed page.
fn expand_job(
    backend: &dyn Backend,
    mut job: PrintJob,
    copies: u16,
    collate: bool,
) -> Result<Vec<PrintJob>, Error> {
    // Collation multiplies the whole sequence instead of individual pages.
    if !collate && copies > 1 {
        job.copies = job.copies.saturating_mul(copies);
    }

    if job.rows <= backend.max_rows() {
        return Ok(vec![job]);
    }

    let overlap = backend.panorama_overlap(job.columns, job.rows);
    if overlap == 0 {
        return Err(Error::Job(JobError::Unsupported(format!(
            "{} rows exceed the printer's {}-row limit and it cannot print panoramas",
            job.rows,
            backend.max_rows()
        ))));
    }
    let panels = panorama::split(
        &job,
        backend.max_rows(),
        overlap,
        backend.is_multicut_media(job.media),
    )?;
    log::info!(
        "split {}-row panorama into {} panels",
        job.rows,
        panels.len()
    );
    Ok(panels)
}

/// Test mode: parse and schedule every batch, log what would be printed,
/// never touch a device.
fn dry_run(
    config: &Config,
    input: &mut dyn Read,
    copies: u16,
    collate: bool,
) -> Result<(), Error> {
    let printer_type = config
        .extra_device
        .map(|extra| extra.printer_type)
        .unwrap_or(PrinterType::S6145);
    let backend = printer::backend_for(printer_type);
    log::info!("test mode: scheduling against {} tables", printer_type.name());

    let mut eof = false;
    while !eof {
        let mut list = new_list(copies, collate);
        while list.can_wait() {
            match backend.parse_job(input)? {
                Some(job) => {
                    let jobs = expand_job(backend.as_ref(), job, copies, collate)?;
                    if list.len() + jobs.len() > MAX_JOBS {
                        log_list(&list);
                        list = new_list(copies, collate);
                    }
                    for job in jobs {
                        list.append(job, backend.as_ref())?;
                    }
                }
                None => {
                    eof = true;
                    break;
                }
            }
        }
        if list.is_empty() {
            break;
        }
        log_list(&list);
    }
    Ok(())
}

fn log_list(list: &JobList) {
    log::info!("batch of {} job(s), sequence x{}:", list.len(), list.copies);
    for (index, job) in list.iter().enumerate() {
        log::info!(
            "  [{}] {}x{} media {:#04x} method {:?} x{}",
            index,
            job.columns,
            job.rows,
            job.media,
            job.method,
            job.copies
        );
    }
}

/// Query and display status, bank occupancy, media and firmware.
fn show_status(config: &Config) -> Result<(), Error> {
    let conn = discovery::probe(config)?;
    let backend = printer::backend_for(conn.printer_type);
    let mut client = ProtocolClient::new(conn.transport, backend.error_text());

    println!(
        "{} {} (serial {}) at bus {:03} port {}",
        conn.identity.manufacturer, conn.identity.model, conn.identity.serial, conn.bus, conn.port
    );

    let status = commands::query_status(&mut client, backend.bank_count())?;
    println!(
        "status {:#04x}, error {:#04x} ({:#04x}/{:#04x})",
        status.header.status,
        status.header.error,
        status.header.printer_major,
        status.header.printer_minor
    );
    for (index, bank) in status.banks.iter().enumerate() {
        println!(
            "bank {}: {:?} job {} ({}/{} copies)",
            index, bank.status, bank.jobid, bank.completed, bank.total
        );
    }

    let media = commands::query_media(&mut client)?;
    for line in media.marker_lines() {
        println!("{}", line);
    }

    match commands::query_firmware(&mut client) {
        Ok(firmware) => println!("firmware: {}", firmware),
        Err(e) => log::warn!("firmware query failed: {}", e),
    }

    Ok(())
}
