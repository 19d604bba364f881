// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Frame header encoding
//!

use encdec::{DecodeOwned, Encode};
use num_enum::TryFromPrimitive;
use strum::{Display, EnumString};

use crate::ProtoError;

/// Frame endpoints (header bits 4..3)
#[derive(Copy, Clone, PartialEq, Eq, Debug, Display, EnumString, TryFromPrimitive)]
#[repr(u8)]
pub enum Endpoint {
    /// Hardware in the interface FPGA
    HwIfpga = 0,
    /// Hardware in the application FPGA
    HwAfpga = 1,
    /// Device firmware
    Firmware = 2,
    /// Loaded device application
    App = 3,
}

/// Frame length codes (header bits 1..0)
#[derive(Copy, Clone, PartialEq, Eq, Debug, Display, TryFromPrimitive)]
#[repr(u8)]
pub enum CmdLen {
    Len1 = 0,
    Len4 = 1,
    Len32 = 2,
    Len128 = 3,
}

impl CmdLen {
    /// Payload length in bytes for this length code
    pub const fn byte_len(&self) -> usize {
        match self {
            CmdLen::Len1 => 1,
            CmdLen::Len4 => 4,
            CmdLen::Len32 => 32,
            CmdLen::Len128 => 128,
        }
    }
}

/// Frame status (header bit 2)
#[derive(Copy, Clone, PartialEq, Eq, Debug, Display)]
pub enum FrameStatus {
    Ok,
    NotOk,
}

/// Frame header, a single byte prefixing every frame
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct FrameHeader {
    /// Frame id (0..=3), echoed in responses
    pub id: u8,
    /// Frame endpoint
    pub endpoint: Endpoint,
    /// Frame status
    pub status: FrameStatus,
    /// Payload length
    pub len: CmdLen,
}

impl FrameHeader {
    /// Create a new frame header, `id` is truncated to two bits
    pub const fn new(id: u8, endpoint: Endpoint, status: FrameStatus, len: CmdLen) -> Self {
        Self {
            id: id & 0b11,
            endpoint,
            status,
            len,
        }
    }

    /// Encode header to its single byte representation
    pub const fn encode_byte(&self) -> u8 {
        let status = match self.status {
            FrameStatus::Ok => 0,
            FrameStatus::NotOk => 1,
        };

        ((self.id & 0b11) << 5) | ((self.endpoint as u8) << 3) | (status << 2) | self.len as u8
    }

    /// Decode a header byte
    pub fn decode_byte(b: u8) -> Result<Self, ProtoError> {
        if b & 0x80 != 0 {
            return Err(ProtoError::ReservedBit);
        }

        // Two bit fields, conversions cannot fail
        let endpoint =
            Endpoint::try_from((b >> 3) & 0b11).map_err(|_| ProtoError::InvalidEncoding)?;
        let len = CmdLen::try_from(b & 0b11).map_err(|_| ProtoError::InvalidEncoding)?;

        let status = match b & (1 << 2) {
            0 => FrameStatus::Ok,
            _ => FrameStatus::NotOk,
        };

        Ok(Self {
            id: (b >> 5) & 0b11,
            endpoint,
            status,
            len,
        })
    }
}

impl Encode for FrameHeader {
    type Error = ProtoError;

    fn encode_len(&self) -> Result<usize, Self::Error> {
        Ok(1)
    }

    fn encode(&self, buff: &mut [u8]) -> Result<usize, Self::Error> {
        if buff.is_empty() {
            return Err(ProtoError::InvalidLength);
        }

        buff[0] = self.encode_byte();

        Ok(1)
    }
}

impl DecodeOwned for FrameHeader {
    type Output = Self;

    type Error = ProtoError;

    fn decode_owned(buff: &[u8]) -> Result<(Self::Output, usize), Self::Error> {
        if buff.is_empty() {
            return Err(ProtoError::InvalidLength);
        }

        Ok((Self::decode_byte(buff[0])?, 1))
    }
}
