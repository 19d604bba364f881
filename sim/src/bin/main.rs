// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Simulated TKey served over TCP

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use clap::{Parser, ValueEnum};
use log::{info, LevelFilter};
use strum::Display;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    net::TcpListener,
};

use tkey_sim::{SimOptions, Simulator, DEFAULT_PORT};
use tkey_x25519_core::engine::{Faults, Options};
use tkey_x25519_proto::{DeviceIdentity, ProtocolVersion};

/// Simulated TKey (firmware and x25519 app) served over TCP
#[derive(Clone, PartialEq, Debug, Parser)]
struct Args {
    /// Address to listen on
    #[clap(long, default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
    bind: IpAddr,

    /// Port to listen on
    #[clap(long, default_value_t = DEFAULT_PORT, env = "TKEY_SIM_PORT")]
    port: u16,

    /// Automatically touch when required (otherwise press enter to touch)
    #[clap(long)]
    auto_touch: bool,

    /// Require touch for public key requests as well as shared secret computation
    #[clap(long)]
    touch_on_pubkey: bool,

    /// Application name reported after loading (8 characters)
    #[clap(long, default_value = "x25519  ", value_parser = parse_name)]
    app_name: ([u8; 4], [u8; 4]),

    /// Application version reported after loading
    #[clap(long, default_value = "1")]
    app_version: u32,

    /// Unique device secret (hex), for deriving device keys
    #[clap(long)]
    uds: Option<String>,

    /// Key derivation protocol version
    #[clap(long, default_value = "v1")]
    protocol: ProtocolVersion,

    /// Faults to inject into device responses
    #[clap(long, value_enum)]
    fault: Vec<Fault>,

    /// Log level
    #[clap(long, default_value = "info")]
    log_level: LevelFilter,
}

/// Injectable faults
#[derive(Copy, Clone, PartialEq, Debug, ValueEnum, Display)]
enum Fault {
    /// Corrupt computed shared secrets
    CorruptShared,
    /// Return a low order public key
    LowOrderPubkey,
    /// Reject application loads
    RejectLoad,
}

impl From<Fault> for Faults {
    fn from(f: Fault) -> Self {
        match f {
            Fault::CorruptShared => Faults::CORRUPT_SHARED,
            Fault::LowOrderPubkey => Faults::LOW_ORDER_PUBKEY,
            Fault::RejectLoad => Faults::REJECT_LOAD,
        }
    }
}

fn parse_name(s: &str) -> anyhow::Result<([u8; 4], [u8; 4])> {
    let b = s.as_bytes();
    if b.len() != 8 {
        return Err(anyhow::anyhow!("application name must be 8 bytes"));
    }

    let (mut n0, mut n1) = ([0u8; 4], [0u8; 4]);
    n0.copy_from_slice(&b[..4]);
    n1.copy_from_slice(&b[4..]);

    Ok((n0, n1))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Setup logging
    simplelog::SimpleLogger::init(args.log_level, simplelog::Config::default())?;

    // Setup engine options
    let mut engine = Options {
        app_ident: DeviceIdentity::new(args.app_name.0, args.app_name.1, args.app_version),
        params: args.protocol.params(),
        faults: args.fault.iter().fold(Faults::empty(), |a, f| a | Faults::from(*f)),
        touch_on_pubkey: args.touch_on_pubkey,
        ..Default::default()
    };

    if let Some(uds) = &args.uds {
        hex::decode_to_slice(uds, &mut engine.uds)?;
    }

    let sim = Simulator::new(SimOptions {
        engine,
        auto_touch: args.auto_touch,
    });

    // Read touches from stdin
    if !args.auto_touch {
        let h = sim.handle();
        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Ok(Some(_l)) = lines.next_line().await {
                h.touch();
            }
        });

        info!("Press enter to touch the device while it is waiting for a touch");
    }

    // Bind listener
    let addr = SocketAddr::new(args.bind, args.port);
    let l = TcpListener::bind(addr).await?;

    info!("Listening on {} (faults: {:?})", addr, args.fault);

    // Serve until exit
    tokio::select! {
        r = sim.serve_tcp(l) => r?,
        _ = tokio::signal::ctrl_c() => info!("Exiting"),
    }

    Ok(())
}
