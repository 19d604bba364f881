// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Frame transports for TKey devices, and a generic transport abstraction
//! for hiding underlying transport types

use async_trait::async_trait;
use log::trace;
use strum::Display;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

#[cfg(feature = "transport_serial")]
pub use tokio_serial::SerialStream;

#[cfg(feature = "transport_tcp")]
pub use tokio::net::TcpStream;

use tkey_x25519_proto::{FrameHeader, ProtoError};

use crate::Error;

/// Default TKey serial speed (bits per second)
pub const DEFAULT_SPEED: u32 = 62_500;

/// TKey USB vendor ID
pub const TKEY_VID: u16 = 0x1207;

/// TKey USB product ID
pub const TKEY_PID: u16 = 0x8887;

/// Frame exchange trait, implemented by transports
#[async_trait]
pub trait Exchange: Send {
    /// Write an encoded frame to the device
    async fn send(&mut self, frame: &[u8]) -> Result<(), Error>;

    /// Read a single frame from the device, returning the frame header
    /// and the payload length written to `buff`
    async fn recv(&mut self, buff: &mut [u8]) -> Result<(FrameHeader, usize), Error>;

    /// Close the transport, further operations return [Error::Closed]
    async fn close(&mut self) -> Result<(), Error>;
}

/// Framed transport over any async byte stream
pub struct FramedTransport<S> {
    s: Option<S>,
}

impl<S: AsyncRead + AsyncWrite + Unpin + Send> FramedTransport<S> {
    /// Create a new framed transport using the provided stream
    pub fn new(s: S) -> Self {
        Self { s: Some(s) }
    }

    /// Check whether the transport has been closed
    pub fn is_closed(&self) -> bool {
        self.s.is_none()
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin + Send> From<S> for FramedTransport<S> {
    fn from(s: S) -> Self {
        Self::new(s)
    }
}

#[async_trait]
impl<S: AsyncRead + AsyncWrite + Unpin + Send> Exchange for FramedTransport<S> {
    async fn send(&mut self, frame: &[u8]) -> Result<(), Error> {
        let s = self.s.as_mut().ok_or(Error::Closed)?;

        trace!("tx: {:02x?}", frame);

        s.write_all(frame).await?;
        s.flush().await?;

        Ok(())
    }

    async fn recv(&mut self, buff: &mut [u8]) -> Result<(FrameHeader, usize), Error> {
        let s = self.s.as_mut().ok_or(Error::Closed)?;

        // Read and decode frame header
        let mut h = [0u8; 1];
        s.read_exact(&mut h).await?;

        let hdr = FrameHeader::decode_byte(h[0])?;

        // Read payload
        let n = hdr.len.byte_len();
        if buff.len() < n {
            return Err(ProtoError::InvalidLength.into());
        }

        s.read_exact(&mut buff[..n]).await?;

        trace!("rx: {:02x} {:02x?}", h[0], &buff[..n]);

        Ok((hdr, n))
    }

    async fn close(&mut self) -> Result<(), Error> {
        match self.s.take() {
            Some(mut s) => {
                s.shutdown().await?;
                Ok(())
            }
            None => Err(Error::Closed),
        }
    }
}

/// Generic TKey transport (abstract over transport types)
#[derive(Display)]
#[non_exhaustive]
pub enum GenericTransport {
    #[cfg(feature = "transport_serial")]
    Serial(FramedTransport<SerialStream>),
    #[cfg(feature = "transport_tcp")]
    Tcp(FramedTransport<TcpStream>),
}

/// Convert a serial stream into a generic transport
#[cfg(feature = "transport_serial")]
impl From<SerialStream> for GenericTransport {
    fn from(s: SerialStream) -> Self {
        Self::Serial(FramedTransport::new(s))
    }
}

/// Convert a TCP stream into a generic transport
#[cfg(feature = "transport_tcp")]
impl From<TcpStream> for GenericTransport {
    fn from(s: TcpStream) -> Self {
        Self::Tcp(FramedTransport::new(s))
    }
}

/// Implementation of [Exchange] for [GenericTransport], dispatching to the underlying transport
#[async_trait]
impl Exchange for GenericTransport {
    async fn send(&mut self, frame: &[u8]) -> Result<(), Error> {
        match self {
            #[cfg(feature = "transport_serial")]
            Self::Serial(t) => t.send(frame).await,
            #[cfg(feature = "transport_tcp")]
            Self::Tcp(t) => t.send(frame).await,
            #[cfg(not(any(feature = "transport_serial", feature = "transport_tcp")))]
            _ => Err(Error::NoDevice),
        }
    }

    async fn recv(&mut self, buff: &mut [u8]) -> Result<(FrameHeader, usize), Error> {
        match self {
            #[cfg(feature = "transport_serial")]
            Self::Serial(t) => t.recv(buff).await,
            #[cfg(feature = "transport_tcp")]
            Self::Tcp(t) => t.recv(buff).await,
            #[cfg(not(any(feature = "transport_serial", feature = "transport_tcp")))]
            _ => Err(Error::NoDevice),
        }
    }

    async fn close(&mut self) -> Result<(), Error> {
        match self {
            #[cfg(feature = "transport_serial")]
            Self::Serial(t) => t.close().await,
            #[cfg(feature = "transport_tcp")]
            Self::Tcp(t) => t.close().await,
            #[cfg(not(any(feature = "transport_serial", feature = "transport_tcp")))]
            _ => Err(Error::NoDevice),
        }
    }
}
