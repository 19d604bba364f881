// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Protocol / frame definitions for TKey x25519 app communication
//!
//! This module defines frames and request / response objects for
//! communication with the TKey firmware and the x25519 device application.
//!
//! Every message is a single frame: a one byte [FrameHeader] followed by a payload
//! of 1, 4, 32 or 128 bytes (see [CmdLen]). The first payload byte carries the
//! command or response code, the remainder the (zero padded) arguments.
//! Multi-byte integer fields are little-endian.
//!
//! ```text
//!  7   6   5   4   3   2   1   0
//! +---+-------+-------+---+-------+
//! | 0 |  ID   |  EP   | S |  LEN  |
//! +---+-------+-------+---+-------+
//! ```
//!

#![cfg_attr(not(feature = "std"), no_std)]

use core::fmt::Debug;

use encdec::{DecodeOwned, Encode};
use strum::Display;

pub mod app;
pub mod frame;
pub mod fw;
pub mod ident;
pub mod params;

mod helpers;

pub use frame::{CmdLen, Endpoint, FrameHeader, FrameStatus};
pub use ident::DeviceIdentity;
pub use params::{ProtocolParams, ProtocolVersion};

/// Maximum payload length of a single frame
pub const MAX_PAYLOAD_LEN: usize = 128;

/// Maximum encoded frame length (header + payload)
pub const MAX_FRAME_LEN: usize = MAX_PAYLOAD_LEN + 1;

/// Length of X25519 public keys and shared secrets
pub const X25519_LEN: usize = 32;

/// Status byte carried in firmware and application responses
#[derive(Copy, Clone, PartialEq, Eq, Debug, Display)]
#[repr(u8)]
pub enum Status {
    Ok = 0,
    Bad = 1,
}

impl From<u8> for Status {
    fn from(v: u8) -> Self {
        match v {
            0 => Status::Ok,
            _ => Status::Bad,
        }
    }
}

/// Protocol encoding / decoding errors
#[derive(Copy, Clone, PartialEq, Debug)]
#[cfg_attr(feature = "thiserror", derive(thiserror::Error))]
pub enum ProtoError {
    /// Buffer or argument length invalid
    #[cfg_attr(feature = "thiserror", error("Invalid length"))]
    InvalidLength,

    /// Invalid field encoding
    #[cfg_attr(feature = "thiserror", error("Invalid encoding"))]
    InvalidEncoding,

    /// Reserved header bit set
    #[cfg_attr(feature = "thiserror", error("Reserved frame header bit set"))]
    ReservedBit,

    /// Response code did not match the expected response
    #[cfg_attr(
        feature = "thiserror",
        error("Unexpected response code (actual: 0x{actual:02x}, expected: 0x{expected:02x})")
    )]
    UnexpectedCode { actual: u8, expected: u8 },

    /// Frame length code did not match the expected response
    #[cfg_attr(feature = "thiserror", error("Unexpected frame length {actual} (expected {expected})"))]
    UnexpectedLength { actual: CmdLen, expected: CmdLen },

    /// Invalid protocol parameters
    #[cfg_attr(feature = "thiserror", error("Invalid protocol parameters"))]
    InvalidParams,
}

impl From<encdec::Error> for ProtoError {
    fn from(_: encdec::Error) -> Self {
        ProtoError::InvalidLength
    }
}

/// Request frames, sent from host to device
pub trait Request: Encode<Error = ProtoError> + Debug {
    /// Endpoint the request is addressed to
    const ENDPOINT: Endpoint;
    /// Command code (first payload byte)
    const CODE: u8;
    /// Frame length code
    const LEN: CmdLen;
}

/// Response frames, sent from device to host
pub trait Response: DecodeOwned<Output = Self, Error = ProtoError> + Debug {
    /// Response code (first payload byte)
    const CODE: u8;
    /// Frame length code
    const LEN: CmdLen;
}

/// Encode a request frame with the provided frame `id`, returning the encoded length
pub fn encode_request<R: Request>(id: u8, req: &R, buff: &mut [u8]) -> Result<usize, ProtoError> {
    let hdr = FrameHeader::new(id, R::ENDPOINT, FrameStatus::Ok, R::LEN);
    encode_frame(hdr, R::CODE, req, buff)
}

/// Encode a response frame answering the request header `req`
pub fn encode_response<R: Response + Encode<Error = ProtoError>>(
    req: &FrameHeader,
    resp: &R,
    buff: &mut [u8],
) -> Result<usize, ProtoError> {
    let hdr = FrameHeader::new(req.id, req.endpoint, FrameStatus::Ok, R::LEN);
    encode_frame(hdr, R::CODE, resp, buff)
}

/// Encode the not-OK reply to the request header `req`
pub fn encode_nok(req: &FrameHeader, buff: &mut [u8]) -> Result<usize, ProtoError> {
    if buff.len() < 2 {
        return Err(ProtoError::InvalidLength);
    }

    buff[0] = FrameHeader::new(req.id, req.endpoint, FrameStatus::NotOk, CmdLen::Len1).encode_byte();
    buff[1] = 0;

    Ok(2)
}

fn encode_frame<E: Encode<Error = ProtoError>>(
    hdr: FrameHeader,
    code: u8,
    body: &E,
    buff: &mut [u8],
) -> Result<usize, ProtoError> {
    let n = 1 + hdr.len.byte_len();
    if buff.len() < n {
        return Err(ProtoError::InvalidLength);
    }

    // Code plus arguments must fit the declared length
    if 1 + body.encode_len()? > hdr.len.byte_len() {
        return Err(ProtoError::InvalidLength);
    }

    buff[..n].fill(0);
    buff[0] = hdr.encode_byte();
    buff[1] = code;
    body.encode(&mut buff[2..n])?;

    Ok(n)
}

/// Decode a response payload (excluding the frame header),
/// checking length and response codes match `R`
pub fn decode_response<R: Response>(hdr: &FrameHeader, payload: &[u8]) -> Result<R, ProtoError> {
    if hdr.len != R::LEN {
        return Err(ProtoError::UnexpectedLength {
            actual: hdr.len,
            expected: R::LEN,
        });
    }

    if payload.len() < hdr.len.byte_len() {
        return Err(ProtoError::InvalidLength);
    }

    if payload[0] != R::CODE {
        return Err(ProtoError::UnexpectedCode {
            actual: payload[0],
            expected: R::CODE,
        });
    }

    let (r, _n) = R::decode_owned(&payload[1..hdr.len.byte_len()])?;

    Ok(r)
}
