// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Firmware / application name and version
//!

use byteorder::{ByteOrder, LittleEndian};
use encdec::{DecodeOwned, Encode};

use crate::ProtoError;

/// Firmware name tags
pub const FW_NAME: ([u8; 4], [u8; 4]) = (*b"tk1 ", *b"mkdf");

/// x25519 application name tags
pub const APP_NAME: ([u8; 4], [u8; 4]) = (*b"x255", *b"19  ");

/// x25519 application version
pub const APP_VERSION: u32 = 0x0000_0001;

/// Name / version identity reported by firmware or applications
///
/// ## Encoding
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                             NAME0                             |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                             NAME1                             |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                        VERSION (u32le)                        |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct DeviceIdentity {
    pub name0: [u8; 4],
    pub name1: [u8; 4],
    pub version: u32,
}

impl DeviceIdentity {
    /// Encoded identity length
    pub const LEN: usize = 12;

    pub const fn new(name0: [u8; 4], name1: [u8; 4], version: u32) -> Self {
        Self {
            name0,
            name1,
            version,
        }
    }

    /// Compare name tags, ignoring version
    pub fn has_name(&self, name: &([u8; 4], [u8; 4])) -> bool {
        self.name0 == name.0 && self.name1 == name.1
    }
}

impl core::fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        for b in self.name0.iter().chain(self.name1.iter()) {
            match b.is_ascii_graphic() || *b == b' ' {
                true => write!(f, "{}", *b as char)?,
                false => write!(f, "\\x{b:02x}")?,
            }
        }
        write!(f, " v{}", self.version)
    }
}

impl Encode for DeviceIdentity {
    type Error = ProtoError;

    fn encode_len(&self) -> Result<usize, Self::Error> {
        Ok(Self::LEN)
    }

    fn encode(&self, buff: &mut [u8]) -> Result<usize, Self::Error> {
        if buff.len() < Self::LEN {
            return Err(ProtoError::InvalidLength);
        }

        buff[..4].copy_from_slice(&self.name0);
        buff[4..8].copy_from_slice(&self.name1);
        LittleEndian::write_u32(&mut buff[8..12], self.version);

        Ok(Self::LEN)
    }
}

impl DecodeOwned for DeviceIdentity {
    type Output = Self;

    type Error = ProtoError;

    fn decode_owned(buff: &[u8]) -> Result<(Self::Output, usize), Self::Error> {
        if buff.len() < Self::LEN {
            return Err(ProtoError::InvalidLength);
        }

        let mut name0 = [0u8; 4];
        name0.copy_from_slice(&buff[..4]);

        let mut name1 = [0u8; 4];
        name1.copy_from_slice(&buff[4..8]);

        let version = LittleEndian::read_u32(&buff[8..12]);

        Ok((
            Self {
                name0,
                name1,
                version,
            },
            Self::LEN,
        ))
    }
}
