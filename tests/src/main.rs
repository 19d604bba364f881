// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Run common device tests against a physical or simulated TKey

use std::{net::SocketAddr, path::PathBuf};

use clap::{Parser, ValueEnum};
use log::{info, LevelFilter};
use strum::{Display, EnumString, EnumVariantNames};

use tkey_x25519::{
    loader::AppImage,
    transport::{GenericTransport, DEFAULT_SPEED},
    Connect, Device, DeviceInfo, Filter, GenericHandle, TkeyProvider, DEFAULT_SIM_PORT,
};

/// Test CLI arguments
#[derive(Clone, Debug, Parser)]
pub struct Opts {
    #[clap(subcommand)]
    pub test: Tests,

    /// Target for test execution
    #[clap(long, value_enum, default_value = "serial", env)]
    pub target: Target,

    /// Serial port (auto-detected if not provided)
    #[clap(long, env)]
    pub port: Option<String>,

    /// Serial port speed
    #[clap(long, default_value_t = DEFAULT_SPEED)]
    pub speed: u32,

    /// Simulator address
    #[clap(long, env)]
    pub tcp: Option<SocketAddr>,

    /// x25519 app binary
    #[clap(long, env)]
    pub app: PathBuf,

    /// Log level
    #[clap(long, default_value = "debug", env)]
    pub log_level: LevelFilter,
}

/// Test modes
#[derive(Clone, PartialEq, Debug, Parser, Display, EnumString, EnumVariantNames)]
pub enum Tests {
    /// Test full handshake
    Handshake {
        /// Do not require touch
        #[clap(long)]
        no_touch: bool,
    },
    /// Test key derivation
    Keys,
}

/// Test target connection
#[derive(Clone, PartialEq, Debug, ValueEnum, Display, EnumString, EnumVariantNames)]
#[strum(serialize_all = "snake_case")]
#[non_exhaustive]
pub enum Target {
    /// USB serial connection for physical devices
    Serial,
    /// TCP connection for the simulator
    Tcp,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load command line arguments
    let o = Opts::parse();

    // Setup logging
    simplelog::SimpleLogger::init(o.log_level, simplelog::Config::default())?;

    let p = TkeyProvider::new();

    // Resolve target device
    let info = match (&o.target, &o.port, o.tcp) {
        (Target::Serial, Some(path), _) => DeviceInfo::Serial {
            path: path.clone(),
            speed: o.speed,
        },
        (Target::Serial, None, _) => p
            .list_devices(Filter::Serial)
            .await
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("No TKey found"))?,
        (Target::Tcp, _, Some(addr)) => DeviceInfo::Tcp(addr),
        (Target::Tcp, _, None) => DeviceInfo::Tcp(SocketAddr::new(
            std::net::Ipv4Addr::LOCALHOST.into(),
            DEFAULT_SIM_PORT,
        )),
    };

    info!("Connecting to {}", info);

    let mut d: GenericHandle = Connect::<GenericTransport>::connect(&p, &info).await?;

    let image = AppImage::load(&o.app).await?;

    // Touch prompt for physical devices
    let touch = || async {
        info!("Touch the device when it flashes");
    };

    let r = match o.test {
        Tests::Handshake { no_touch } => {
            tkey_x25519_tests::handshake::test(&mut d, touch, &image, None, !no_touch)
                .await
                .map(|_| ())
        }
        Tests::Keys => tkey_x25519_tests::keys::test(&mut d, touch, &image).await,
    };

    d.close().await?;

    r?;

    info!("Test passed");

    Ok(())
}
