// Copyright (c) 2022-2023 The MobileCoin Foundation

//! TKey x25519 API Library (and CLI)
//!
//! This provides a host library for the TKey x25519 application, verifying
//! the device derives X25519 shared secrets matching those computed on the host.
//!
//! Devices are discovered and connected via [TkeyProvider], producing a
//! [DeviceHandle] implementing [Device]. A verification run is executed
//! with [session::run] (or [session::run_with] for pre-connected devices).

use std::fmt::Debug;
#[cfg(feature = "transport_tcp")]
use std::net::{Ipv4Addr, SocketAddr};

use async_trait::async_trait;
use log::debug;

/// Re-export transports for consumer use
pub mod transport;
use transport::*;

/// Re-export `tkey-x25519-proto` for consumers
pub use tkey_x25519_proto::{self as proto};

mod handle;
pub use handle::DeviceHandle;

mod error;
pub use error::Error;

mod device;
pub use device::Device;

pub mod handshake;
pub mod host;
pub mod ident;
pub mod key;
pub mod loader;
pub mod report;

pub mod session;
pub use session::{HandshakeConfig, Outcome};

/// Default TCP port for simulated devices
pub const DEFAULT_SIM_PORT: u16 = 6545;

/// TKey provider manages device discovery and connections
#[derive(Clone, Debug, Default)]
pub struct TkeyProvider {}

/// Device discovery filter
#[derive(Copy, Clone, Debug, PartialEq, clap::ValueEnum, strum::Display)]
#[non_exhaustive]
pub enum Filter {
    /// List all devices available using supported transports
    Any,
    /// List only USB serial devices
    Serial,
    /// List only TCP devices
    Tcp,
}

/// TKey device information for listing, used by connect
#[derive(Clone, Debug, PartialEq)]
pub enum DeviceInfo {
    #[cfg(feature = "transport_serial")]
    Serial { path: String, speed: u32 },
    #[cfg(feature = "transport_tcp")]
    Tcp(SocketAddr),
}

impl TkeyProvider {
    /// Create a new TKey provider
    pub fn new() -> Self {
        Self {}
    }

    /// List available TKey devices
    pub async fn list_devices(&self, filter: Filter) -> Vec<DeviceInfo> {
        let mut devices = vec![];

        #[cfg(feature = "transport_serial")]
        if filter == Filter::Any || filter == Filter::Serial {
            match tokio_serial::available_ports() {
                Ok(ports) => {
                    for p in ports {
                        if let tokio_serial::SerialPortType::UsbPort(u) = &p.port_type {
                            if u.vid == TKEY_VID && u.pid == TKEY_PID {
                                devices.push(DeviceInfo::Serial {
                                    path: p.port_name.clone(),
                                    speed: DEFAULT_SPEED,
                                });
                            }
                        }
                    }
                }
                Err(e) => log::warn!("Serial port enumeration failed: {e}"),
            }
        }

        #[cfg(feature = "transport_tcp")]
        if filter == Filter::Any || filter == Filter::Tcp {
            // Try connecting to default simulator port
            let addr = SocketAddr::new(Ipv4Addr::LOCALHOST.into(), DEFAULT_SIM_PORT);
            if let Ok(_t) = tokio::net::TcpStream::connect(addr).await {
                // Return default port if connection succeeded
                devices.push(DeviceInfo::Tcp(addr));
            };
        }

        debug!("Found {} devices: {:?}", devices.len(), devices);

        devices
    }
}

/// Generic TKey device handle (abstract over transport types)
pub type GenericHandle = DeviceHandle<GenericTransport>;

impl GenericHandle {
    /// Create a new generic device handle
    pub fn new(d: impl Into<GenericTransport>) -> Self {
        Self::from(d.into())
    }
}

impl std::fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            #[cfg(feature = "transport_serial")]
            DeviceInfo::Serial { path, speed } => {
                write!(f, "{:16} (USB serial, {} bps)", path, speed)
            }
            #[cfg(feature = "transport_tcp")]
            DeviceInfo::Tcp(addr) => {
                write!(f, "{:16} (TCP, {})", "Simulator", addr)
            }
            #[cfg(not(any(feature = "transport_serial", feature = "transport_tcp")))]
            _ => unreachable!(),
        }
    }
}

/// Connect trait for supported transports
#[async_trait]
pub trait Connect<T: Exchange> {
    type Options: Debug;

    /// Connect to the specified device
    async fn connect(&self, opts: &Self::Options) -> Result<DeviceHandle<T>, Error>;
}

/// Generic connect implementation
#[cfg(any(feature = "transport_serial", feature = "transport_tcp"))]
#[async_trait]
impl Connect<GenericTransport> for TkeyProvider {
    type Options = DeviceInfo;

    async fn connect(&self, opts: &Self::Options) -> Result<DeviceHandle<GenericTransport>, Error> {
        let t = match opts {
            #[cfg(feature = "transport_serial")]
            DeviceInfo::Serial { path, speed } => {
                // Open serial port
                let s = open_serial(path, *speed)?;

                GenericTransport::from(s)
            }
            #[cfg(feature = "transport_tcp")]
            DeviceInfo::Tcp(addr) => {
                // Connect to simulator
                let s = TcpStream::connect(addr).await?;

                GenericTransport::from(s)
            }
        };

        Ok(DeviceHandle::from(t))
    }
}

/// Connect implementation for serial devices
#[cfg(feature = "transport_serial")]
#[async_trait]
impl Connect<FramedTransport<SerialStream>> for TkeyProvider {
    type Options = (String, u32);

    async fn connect(
        &self,
        opts: &Self::Options,
    ) -> Result<DeviceHandle<FramedTransport<SerialStream>>, Error> {
        let s = open_serial(&opts.0, opts.1)?;

        Ok(DeviceHandle::from(FramedTransport::new(s)))
    }
}

/// Connect implementation for TCP devices
#[cfg(feature = "transport_tcp")]
#[async_trait]
impl Connect<FramedTransport<TcpStream>> for TkeyProvider {
    type Options = SocketAddr;

    async fn connect(
        &self,
        opts: &Self::Options,
    ) -> Result<DeviceHandle<FramedTransport<TcpStream>>, Error> {
        let s = TcpStream::connect(opts).await?;

        Ok(DeviceHandle::from(FramedTransport::new(s)))
    }
}

#[cfg(feature = "transport_serial")]
fn open_serial(path: &str, speed: u32) -> Result<SerialStream, Error> {
    use tokio_serial::SerialPortBuilderExt;

    debug!("Opening serial port {path} ({speed} bps)");

    let s = tokio_serial::new(path, speed).open_native_async()?;

    Ok(s)
}
