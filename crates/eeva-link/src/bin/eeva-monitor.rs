//! Eeva link monitor
//!
//! Connects to the robot, logs every decoded Glob and prints link rates.
//!
//! Usage:
//!   eeva-monitor [OPTIONS] [PORT]
//!
//! Options:
//!   --port PORT       Serial port (default: /dev/rfcomm0)
//!   --baud RATE       Baud rate (default: 115200)
//!   --config FILE     JSON link configuration
//!   --json            Log messages as JSON
//!   --request-gains   Ask for every controller's PID parameters after connecting
//!   --seconds N       Exit after N seconds (default: run until Ctrl-C)
//!
//! Set RUST_LOG (e.g. `RUST_LOG=eeva_link=debug`) for protocol level logging.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use eeva_link::link::{CaptureSession, LinkHealth, LinkMonitor};
use eeva_link::prelude::*;
use eeva_link::protocol::version::{FirmwareCheck, FirmwareVerifier};
use eeva_link::protocol::PROTOCOL_VERSION;

const USAGE: &str = "usage: eeva-monitor [--port PORT] [--baud RATE] [--config FILE] [--json] \
                     [--request-gains] [--seconds N]";

struct Options {
    port_name: String,
    baud_rate: Option<u32>,
    config_path: Option<String>,
    json: bool,
    request_gains: bool,
    seconds: Option<u64>,
}

fn parse_args() -> Result<Options> {
    let args: Vec<String> = std::env::args().collect();
    let mut options = Options {
        port_name: "/dev/rfcomm0".to_string(),
        baud_rate: None,
        config_path: None,
        json: false,
        request_gains: false,
        seconds: None,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--port" | "-p" => {
                i += 1;
                options.port_name = args.get(i).context("--port needs a value")?.clone();
            }
            "--baud" | "-b" => {
                i += 1;
                let value = args.get(i).context("--baud needs a value")?;
                options.baud_rate = Some(value.parse().context("invalid baud rate")?);
            }
            "--config" | "-c" => {
                i += 1;
                options.config_path = Some(args.get(i).context("--config needs a value")?.clone());
            }
            "--seconds" | "-s" => {
                i += 1;
                let value = args.get(i).context("--seconds needs a value")?;
                options.seconds = Some(value.parse().context("invalid duration")?);
            }
            "--json" => options.json = true,
            "--request-gains" => options.request_gains = true,
            "--help" | "-h" => {
                println!("{}", USAGE);
                std::process::exit(0);
            }
            other if !other.starts_with('-') => options.port_name = other.to_string(),
            other => anyhow::bail!("unknown option {}", other),
        }
        i += 1;
    }

    Ok(options)
}

fn report_firmware(check: &FirmwareCheck) {
    info!("Eeva firmware version {}", check.firmware_version);
    if !check.compatible {
        warn!(
            "firmware version {} is not compatible with protocol {}",
            check.firmware_version, PROTOCOL_VERSION
        );
        warn!("compatible firmware versions: {:?}", check.compatible_firmware);
        warn!(
            "protocol versions compatible with this firmware: {:?}",
            check.compatible_hosts
        );
    }
}

/// Per-connection message handling
struct MessageLog {
    json: bool,
    firmware: FirmwareVerifier,
    capture: CaptureSession,
}

impl MessageLog {
    fn new(json: bool) -> Self {
        Self {
            json,
            firmware: FirmwareVerifier::new(),
            capture: CaptureSession::new(),
        }
    }

    fn handle(&mut self, env: Envelope) {
        if let Some(check) = self.firmware.observe(&env.glob) {
            report_firmware(&check);
        }
        if let Some(report) = self.capture.observe(&env.glob) {
            if report.outcome.has_data() {
                info!("{} ({} rows)", report.outcome, report.samples.len());
            } else {
                warn!("{}", report.outcome);
            }
        }

        if self.json {
            match serde_json::to_string(&env) {
                Ok(line) => println!("{}", line),
                Err(e) => warn!("could not serialize {}: {}", env.glob.name(), e),
            }
            return;
        }

        match &env.glob {
            Glob::AssertMessage(m) => warn!("assert ({:?}): {}", m.action, m.message),
            Glob::DebugMessage(m) => info!("robot: {}", m.message),
            Glob::StatusData(s) => info!(
                "status: battery {:.2} V, pitch {:.1}°, \
                 L {:.0} rpm / {:.2} V, R {:.0} rpm / {:.2} V",
                s.battery_voltage,
                s.derived.pitch_deg,
                s.derived.left_rpm,
                s.derived.left_voltage,
                s.derived.right_rpm,
                s.derived.right_voltage,
            ),
            Glob::CaptureData(_) => {}
            other => info!("{} instance {}: {:?}", other.name(), env.instance, other),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let options = parse_args()?;

    let mut config = match &options.config_path {
        Some(path) => LinkConfig::load(path).with_context(|| format!("loading {}", path))?,
        None => LinkConfig::default(),
    };
    if let Some(baud) = options.baud_rate {
        config.baud_rate = baud;
    }

    let mut link = Link::new(config);
    let mut log = MessageLog::new(options.json);
    link.connect(&options.port_name, move |env| log.handle(env))
        .with_context(|| format!("connecting to {}", options.port_name))?;

    // A previous session may have left a capture running
    link.send(&Envelope::new(CaptureCommand::stop()))
        .await
        .context("stopping data capture")?;

    if options.request_gains {
        link.send(&Envelope::with_instance(0, Request::of::<PidParams>()))
            .await
            .context("requesting PID parameters")?;
    }

    let mut monitor = LinkMonitor::default();
    let mut ticker = tokio::time::interval(monitor.interval());
    let deadline = options
        .seconds
        .map(|s| tokio::time::Instant::now() + Duration::from_secs(s));

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => {
                let report = monitor.sample(link.is_connected(), link.stats());
                info!(
                    "tx {} B/s, rx {} B/s, msgs {}/{}, bad crc {}, dropped {}",
                    report.bytes_sent_per_sec,
                    report.bytes_received_per_sec,
                    report.stats.messages_sent,
                    report.stats.messages_received,
                    report.stats.bad_crc,
                    report.stats.dropped,
                );
                match report.health {
                    LinkHealth::LostConnection => {
                        warn!("robot not responding, disconnecting");
                        break;
                    }
                    LinkHealth::Disconnected => {
                        warn!("transport closed");
                        break;
                    }
                    _ => {}
                }
                if deadline.is_some_and(|d| tokio::time::Instant::now() >= d) {
                    break;
                }
            }
        }
    }

    link.shutdown().await;
    Ok(())
}
