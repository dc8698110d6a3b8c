use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};
use xcp_core::SlaveConfig;

#[derive(Parser, Debug)]
#[command(author, version, about = "XCP-on-CAN slave (Pure Rust)", long_about = None)]
struct Args {
    /// Path to the slave configuration (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// CAN interface, overrides the config file (e.g. can0, vcan0)
    #[arg(short, long)]
    interface: Option<String>,

    /// Master -> slave CAN identifier (hex with 0x prefix, or decimal)
    #[arg(long, value_parser = parse_id)]
    request_id: Option<u32>,

    /// Slave -> master CAN identifier (hex with 0x prefix, or decimal)
    #[arg(long, value_parser = parse_id)]
    response_id: Option<u32>,

    /// Seed/key secret; enables resource protection
    #[arg(long, value_parser = parse_id)]
    secret: Option<u32>,

    /// Print the effective configuration and exit
    #[arg(long)]
    dump_config: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn parse_id(s: &str) -> Result<u32, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid number '{}': {}", s, e))
}

fn load_config(args: &Args) -> Result<SlaveConfig> {
    let mut config = match &args.config {
        Some(path) => {
            info!(path = %path.display(), "Loading configuration");
            SlaveConfig::load_from_file(path)?
        }
        None => SlaveConfig::default(),
    };

    if let Some(interface) = &args.interface {
        config.transport.interface = interface.clone();
    }
    if let Some(id) = args.request_id {
        config.transport.request_id = id;
    }
    if let Some(id) = args.response_id {
        config.transport.response_id = id;
    }
    if let Some(secret) = args.secret {
        config.security.enabled = true;
        config.security.secret_key = secret;
    }
    config.validate()?;
    Ok(config)
}

fn run(args: Args) -> Result<()> {
    let config = load_config(&args)?;
    if args.dump_config {
        print!("{}", config.to_toml()?);
        return Ok(());
    }
    slave::serve(config)
}

#[cfg(target_os = "linux")]
mod slave {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use std::time::{Duration, Instant};

    use anyhow::{Context, Result};
    use parking_lot::Mutex;
    use tracing::{debug, info, warn};
    use xcp_core::{
        CanTransport, EventChannelConfig, EventScheduler, RamMemory, SimFlash, SlaveConfig, SocketCanTransport,
        TransportError, XcpSlave,
    };

    type Slave = XcpSlave<Arc<SocketCanTransport>, RamMemory, SimFlash>;

    /// Idle sleep of the DAQ thread when no channel is configured.
    const IDLE_TICK: Duration = Duration::from_millis(10);

    pub fn serve(config: SlaveConfig) -> Result<()> {
        let t = &config.transport;
        let transport = Arc::new(
            SocketCanTransport::open(
                &t.interface,
                t.request_id,
                t.response_id,
                t.extended_ids,
                Duration::from_millis(t.read_timeout_ms),
            )
            .with_context(|| format!("opening {}", t.interface))?,
        );

        let slave = XcpSlave::new(
            transport.clone(),
            config.build_memory()?,
            config.build_flash(),
            &config,
        );
        let slave = Arc::new(Mutex::new(slave));
        let running = Arc::new(AtomicBool::new(true));

        let daq_handle = {
            let slave = slave.clone();
            let running = running.clone();
            let events = config.daq.events.clone();
            thread::spawn(move || daq_loop(slave, running, &events))
        };

        info!(interface = %t.interface, "Serving XCP requests");

        // Receive outside the lock so DAQ emission keeps running while idle.
        while running.load(Ordering::SeqCst) {
            match transport.recv() {
                Ok(frame) => {
                    if let Err(e) = slave.lock().process(&frame) {
                        warn!(error = %e, "Failed to send response");
                    }
                }
                Err(TransportError::Timeout { .. }) => continue,
                Err(TransportError::Disconnected) => {
                    slave.lock().on_transport_lost();
                    running.store(false, Ordering::SeqCst);
                }
                Err(e) => {
                    warn!(error = %e, "Receive failed");
                    thread::sleep(Duration::from_millis(50));
                }
            }
        }

        if daq_handle.join().is_err() {
            warn!("DAQ thread panicked");
        }
        info!("Shutting down");
        Ok(())
    }

    /// Calls `emit_daq` once per period of each event channel.
    fn daq_loop(slave: Arc<Mutex<Slave>>, running: Arc<AtomicBool>, events: &[EventChannelConfig]) {
        let mut scheduler = EventScheduler::new(events, Instant::now());
        while running.load(Ordering::SeqCst) {
            let now = Instant::now();
            for channel in scheduler.due(now) {
                match slave.lock().emit_daq(channel) {
                    Ok(0) => {}
                    Ok(sent) => debug!(channel, sent, "DAQ packets sent"),
                    Err(e) => warn!(channel, error = %e, "DAQ transmit failed"),
                }
            }
            let wait = scheduler
                .next_deadline()
                .map(|deadline| deadline.saturating_duration_since(Instant::now()))
                .unwrap_or(IDLE_TICK);
            thread::sleep(wait);
        }
    }
}

#[cfg(not(target_os = "linux"))]
mod slave {
    use anyhow::{Result, bail};
    use xcp_core::SlaveConfig;

    pub fn serve(_config: SlaveConfig) -> Result<()> {
        bail!("the SocketCAN transport is only available on Linux")
    }
}

fn main() {
    let args = Args::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(if args.verbose {
                    tracing::Level::DEBUG.into()
                } else {
                    tracing::Level::INFO.into()
                })
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("failed to install tracing subscriber: {}", e);
    }

    info!("Starting XCP slave...");

    if let Err(e) = run(args) {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
}
