// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Command line utility for verifying TKey x25519 shared secret derivation

use std::{net::SocketAddr, path::PathBuf, time::Duration};

use clap::Parser;
use log::{debug, info, LevelFilter};

use tkey_x25519::{
    key::DEFAULT_DOMAIN,
    loader::{AppImage, Uss},
    proto::ProtocolVersion,
    report::{LogReporter, RunReport},
    session,
    transport::DEFAULT_SPEED,
    DeviceInfo, Filter, HandshakeConfig, TkeyProvider,
};

/// TKey x25519 verification utility
///
/// Loads the x25519 app (where the device is in firmware mode), then checks
/// the device and host compute matching X25519 shared secrets.
#[derive(Clone, PartialEq, Debug, Parser)]
struct Options {
    /// Serial port device PATH, auto-detected if not provided
    #[clap(long)]
    port: Option<String>,

    /// Serial port speed in BPS (bits per second)
    #[clap(long, default_value_t = DEFAULT_SPEED)]
    speed: u32,

    /// Connect to a simulated device at ADDR instead of a serial port
    #[clap(long, conflicts_with = "port")]
    tcp: Option<SocketAddr>,

    /// x25519 app binary to load
    #[clap(long)]
    app: Option<PathBuf>,

    /// Do NOT require touch before computing the shared secret
    #[clap(long)]
    no_touch: bool,

    /// Timeout in seconds waiting for touch (waits indefinitely if not set)
    #[clap(long)]
    touch_timeout: Option<u64>,

    /// Key derivation domain
    #[clap(long, default_value = DEFAULT_DOMAIN)]
    domain: String,

    /// Key derivation protocol version
    #[clap(long, default_value = "v1")]
    protocol: ProtocolVersion,

    /// Phrase for deriving the user supplied secret (USS) used on app load
    #[clap(long)]
    uss: Option<String>,

    /// Write a JSON run report to FILE
    #[clap(long)]
    output: Option<PathBuf>,

    /// Subcommand to execute (runs verification if not provided)
    #[clap(subcommand)]
    cmd: Option<Actions>,

    /// Enable verbose logging
    #[clap(long, default_value = "info")]
    log_level: LevelFilter,
}

#[derive(Clone, PartialEq, Debug, Parser)]
#[non_exhaustive]
enum Actions {
    /// List available devices
    List {
        /// Supported transports for device discovery
        #[clap(long, value_enum, default_value = "any")]
        target: Filter,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let args = Options::parse();

    // Setup logging
    simplelog::SimpleLogger::init(args.log_level, simplelog::Config::default())?;

    let p = TkeyProvider::new();

    // Handle list command
    if let Some(Actions::List { target }) = args.cmd {
        let devices = p.list_devices(target).await;
        if devices.is_empty() {
            return Err(anyhow::anyhow!("No devices found"));
        }

        info!("Devices:");
        for (i, d) in devices.iter().enumerate() {
            info!("  {}: {}", i, d);
        }

        return Ok(());
    }

    // Select device
    let info = match (args.tcp, &args.port) {
        (Some(addr), _) => DeviceInfo::Tcp(addr),
        (None, Some(path)) => DeviceInfo::Serial {
            path: path.clone(),
            speed: args.speed,
        },
        (None, None) => match p.list_devices(Filter::Serial).await.into_iter().next() {
            Some(DeviceInfo::Serial { path, .. }) => DeviceInfo::Serial {
                path,
                speed: args.speed,
            },
            _ => {
                return Err(anyhow::anyhow!(
                    "No TKey found, use --port to specify a serial port"
                ))
            }
        },
    };

    debug!("Using device: {}", info);

    // Load app image
    let app = args
        .app
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("--app PATH is required"))?;
    let image = AppImage::load(app).await?;

    let cfg = HandshakeConfig {
        params: args.protocol.params(),
        domain: args.domain.clone(),
        require_touch: !args.no_touch,
        touch_timeout: args.touch_timeout.map(Duration::from_secs),
        uss: args.uss.as_deref().map(Uss::from_phrase),
        ..Default::default()
    };

    debug!("Using config: {:?}", cfg);

    // Execute verification
    let mut reporter = (LogReporter, RunReport::default());
    let outcome = session::run(&info, &image, &cfg, &mut reporter).await;

    println!("{outcome}");

    // Write report if requested
    if let Some(o) = &args.output {
        reporter.1.write(o).await?;
        debug!("Wrote report to {}", o.display());
    }

    std::process::exit(outcome.exit_code());
}
