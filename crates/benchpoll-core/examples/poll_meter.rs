//! Bench Meter Polling Tool
//!
//! Initializes a SCPI temperature meter on a serial port and prints every
//! reading until Ctrl-C is pressed.
//!
//! Usage:
//!   cargo run --example poll_meter -- [OPTIONS] [PORT]
//!
//! Options:
//!   --port PORT       Serial port (default: /dev/ttyUSB0)
//!   --baud RATE       Baud rate (default: 2400)
//!   --settle MS       Wait between a query and its read in ms (default: 500)
//!   --pace MS         Wait after each cycle in ms (default: 1000)
//!   --config FILE     Load session settings from a JSON file
//!   --simulate        Poll a simulated meter instead of a serial port
//!   --abort-on-sink   Stop the session when the sink fails

use anyhow::Context;
use benchpoll_core::prelude::*;
use benchpoll_core::protocol::DEFAULT_BAUD_RATE;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();

    // Parse arguments
    let mut port_name = "/dev/ttyUSB0".to_string();
    let mut baud_rate = DEFAULT_BAUD_RATE;
    let mut settle_ms = None;
    let mut pace_ms = None;
    let mut config_path = None;
    let mut simulate = false;
    let mut abort_on_sink = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--port" | "-p" => {
                i += 1;
                if i < args.len() {
                    port_name = args[i].clone();
                }
            }
            "--baud" | "-b" => {
                i += 1;
                if i < args.len() {
                    baud_rate = args[i].parse().unwrap_or(DEFAULT_BAUD_RATE);
                }
            }
            "--settle" => {
                i += 1;
                if i < args.len() {
                    settle_ms = args[i].parse().ok();
                }
            }
            "--pace" => {
                i += 1;
                if i < args.len() {
                    pace_ms = args[i].parse().ok();
                }
            }
            "--config" | "-c" => {
                i += 1;
                if i < args.len() {
                    config_path = Some(args[i].clone());
                }
            }
            "--simulate" => {
                simulate = true;
            }
            "--abort-on-sink" => {
                abort_on_sink = true;
            }
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            arg if !arg.starts_with('-') => {
                port_name = arg.to_string();
            }
            other => {
                eprintln!("Unknown option: {}", other);
                print_help();
                return Ok(());
            }
        }
        i += 1;
    }

    let mut config = match &config_path {
        Some(path) => SessionConfig::load(path)
            .with_context(|| format!("loading session config from {}", path))?,
        None => {
            let mut instrument = InstrumentConfig::new(port_name.clone());
            instrument.baud_rate = baud_rate;
            SessionConfig::new(instrument)
        }
    };
    if simulate {
        config.instrument.port = "simulated".to_string();
    }
    if let Some(ms) = settle_ms {
        config.timing.settle_ms = ms;
    }
    if let Some(ms) = pace_ms {
        config.timing.pace_ms = ms;
    }
    if abort_on_sink {
        config.sink_faults = SinkFaultPolicy::Abort;
    }

    println!("=== Bench Meter Poller v{} ===", benchpoll_core::VERSION);
    println!("Port: {}", config.instrument.port);
    println!("Baud: {}", config.instrument.baud_rate);
    println!(
        "Settle: {}ms, Pace: {}ms",
        config.timing.settle_ms, config.timing.pace_ms
    );
    println!("Press Ctrl-C to stop");
    println!();

    let session = Session::new(config, LogSink::with_unit("C")).context("invalid settings")?;
    let stop = session.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            stop.cancel();
        }
    });

    let report = if simulate {
        session.run(Box::new(SimulatedInstrument::new())).await
    } else {
        session.run_serial().await
    };

    println!();
    println!("=== Summary ===");
    println!("Final state: {:?}", report.state);
    println!("Readings:    {}", report.series.len());
    println!("Cycles:      {}", report.diagnostics.cycles);
    println!("Errors:      {}", report.diagnostics.error_count());
    if let Some(last) = report.series.last() {
        println!("Last value:  {:.3} C at {}", last.value, last.received_at);
    }
    if let Some(diagnostic) = &report.diagnostics.last {
        println!("Last issue:  {}", diagnostic);
    }

    if !report.stopped_cleanly() {
        anyhow::bail!("session ended in {:?}", report.state);
    }
    Ok(())
}

fn print_help() {
    println!("Bench Meter Polling Tool");
    println!();
    println!("Usage: poll_meter [OPTIONS] [PORT]");
    println!();
    println!("Options:");
    println!("  --port, -p PORT     Serial port (default: /dev/ttyUSB0)");
    println!("  --baud, -b RATE     Baud rate (default: 2400)");
    println!("  --settle MS         Wait between a query and its read (default: 500)");
    println!("  --pace MS           Wait after each cycle (default: 1000)");
    println!("  --config, -c FILE   Load session settings from a JSON file");
    println!("  --simulate          Poll a simulated meter");
    println!("  --abort-on-sink     Stop the session when the sink fails");
    println!("  --help, -h          Show this help");
}
