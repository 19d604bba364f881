// Copyright (c) 2022-2023 The MobileCoin Foundation

use tkey_x25519_proto::ProtoError;

/// [Engine][super::Engine] errors
#[derive(Clone, PartialEq, Debug)]
#[cfg_attr(feature = "thiserror", derive(thiserror::Error))]
#[repr(u8)]
pub enum Error {
    /// Invalid argument length
    #[cfg_attr(feature = "thiserror", error("Invalid argument length"))]
    InvalidLength = 0x00,

    /// Unexpected event
    #[cfg_attr(feature = "thiserror", error("Unexpected event"))]
    UnexpectedEvent = 0x01,

    /// Message encoding failed
    #[cfg_attr(feature = "thiserror", error("message encoding failed"))]
    EncodingFailed = 0x03,

    /// Unknown / not-yet defined error (placeholder)
    #[cfg_attr(feature = "thiserror", error("unknown"))]
    Unknown = 0xf0,
}

impl From<ProtoError> for Error {
    fn from(e: ProtoError) -> Self {
        match e {
            ProtoError::InvalidLength => Error::InvalidLength,
            ProtoError::InvalidEncoding | ProtoError::ReservedBit => Error::EncodingFailed,
            ProtoError::UnexpectedCode { .. } | ProtoError::UnexpectedLength { .. } => {
                Error::UnexpectedEvent
            }
            ProtoError::InvalidParams => Error::Unknown,
        }
    }
}
