// Copyright (c) 2022-2023 The MobileCoin Foundation

use tokio::time::error::Elapsed;

use tkey_x25519_proto::{DeviceIdentity, ProtoError, Status};

use crate::handshake::HandshakeState;

/// TKey x25519 API Error Type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No matching device found
    #[error("No device found")]
    NoDevice,

    /// Underlying I/O error
    #[error("I/O error: {0}")]
    Io(std::io::Error),

    /// Serial port error
    #[cfg(feature = "transport_serial")]
    #[error("Serial error: {0}")]
    Serial(#[from] tokio_serial::Error),

    /// Device closed the connection (end of stream)
    #[error("Device closed connection")]
    Eof,

    /// Transport already closed
    #[error("Transport closed")]
    Closed,

    /// Device replied with a not-OK frame status
    #[error("Device responded with frame status not-OK")]
    StatusNotOk,

    /// Request timeout
    #[error("Timeout waiting for device response")]
    RequestTimeout,

    /// Timeout waiting for user
    #[error("Timeout waiting for user interaction")]
    UserTimeout,

    /// Frame encoding or decoding failed
    #[error("Protocol error: {0}")]
    Proto(#[from] ProtoError),

    /// Device reported a failed operation
    #[error("Device operation failed (status: {0})")]
    DeviceStatus(Status),

    /// Application load rejected by the firmware
    #[error("Application load rejected")]
    LoadRejected,

    /// Firmware reported digest does not match the image
    #[error("Loaded application digest mismatch")]
    DigestMismatch,

    /// Application image exceeds the firmware limit
    #[error("Application image too large ({0} bytes)")]
    ImageTooLarge(usize),

    /// Application image empty
    #[error("Application image empty")]
    EmptyImage,

    /// Device running some other application
    #[error(
        "Unexpected application ({}), the TKey may already be running another app. Please unplug and plug it in again",
        ident_str(.0)
    )]
    UnexpectedApp(Option<DeviceIdentity>),

    /// Invalid key in response
    #[error("Invalid key object")]
    InvalidKey,

    /// Invalid handshake state
    #[error("Invalid handshake state (actual: {0}, expected: {1})")]
    InvalidState(HandshakeState, HandshakeState),

    /// Key parameters differ between handshake phases
    #[error("Key parameters do not match those used for the public key exchange")]
    ParamsMismatch,

    /// Domain does not fit the protocol domain length
    #[error("Domain too long ({0} bytes, maximum {1})")]
    DomainTooLong(usize, usize),
}

impl Error {
    /// Check whether an error is a transient transport condition,
    /// used to distinguish indeterminate probes from failures
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Eof | Error::StatusNotOk | Error::RequestTimeout)
    }
}

fn ident_str(i: &Option<DeviceIdentity>) -> String {
    match i {
        Some(i) => i.to_string(),
        None => "no response".to_string(),
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::UnexpectedEof => Error::Eof,
            _ => Error::Io(e),
        }
    }
}

impl From<Elapsed> for Error {
    fn from(_: Elapsed) -> Self {
        Error::RequestTimeout
    }
}
