// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Firmware frames, used to identify the device and load applications
//!
//! Applications are loaded by issuing a [LoadAppReq] with the image size,
//! followed by [LoadAppDataReq] chunks of [LOAD_CHUNK_LEN] bytes. Each chunk
//! is acknowledged with a [LoadAppDataResp] except the last, which returns a
//! [LoadAppDataReady] containing the BLAKE2s digest of the loaded image.

use byteorder::{ByteOrder, LittleEndian};
use encdec::{Decode, DecodeOwned, Encode};
use num_enum::TryFromPrimitive;

use crate::{
    helpers::{arr, status},
    CmdLen, DeviceIdentity, Endpoint, ProtoError, Request, Response, Status,
};

/// Maximum application image size accepted by the firmware
pub const MAX_APP_SIZE: usize = 100 * 1024;

/// Application data bytes carried per [LoadAppDataReq]
pub const LOAD_CHUNK_LEN: usize = 127;

/// Length of user supplied secrets (USS) and image digests
pub const USS_LEN: usize = 32;

/// Firmware command and response codes
#[derive(Copy, Clone, PartialEq, Eq, Debug, TryFromPrimitive)]
#[repr(u8)]
pub enum FwCode {
    NameVersionReq = 0x01,
    NameVersionResp = 0x02,
    LoadAppReq = 0x03,
    LoadAppResp = 0x04,
    LoadAppDataReq = 0x05,
    LoadAppDataResp = 0x06,
    LoadAppDataReady = 0x07,
}

/// Fetch firmware name and version
#[derive(Copy, Clone, PartialEq, Debug, Default)]
pub struct NameVersionReq;

impl Request for NameVersionReq {
    const ENDPOINT: Endpoint = Endpoint::Firmware;
    const CODE: u8 = FwCode::NameVersionReq as u8;
    const LEN: CmdLen = CmdLen::Len1;
}

impl Encode for NameVersionReq {
    type Error = ProtoError;

    fn encode_len(&self) -> Result<usize, Self::Error> {
        Ok(0)
    }

    fn encode(&self, _buff: &mut [u8]) -> Result<usize, Self::Error> {
        Ok(0)
    }
}

/// Firmware name and version response
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct NameVersionResp {
    pub ident: DeviceIdentity,
}

impl Response for NameVersionResp {
    const CODE: u8 = FwCode::NameVersionResp as u8;
    const LEN: CmdLen = CmdLen::Len32;
}

impl Encode for NameVersionResp {
    type Error = ProtoError;

    fn encode_len(&self) -> Result<usize, Self::Error> {
        self.ident.encode_len()
    }

    fn encode(&self, buff: &mut [u8]) -> Result<usize, Self::Error> {
        self.ident.encode(buff)
    }
}

impl DecodeOwned for NameVersionResp {
    type Output = Self;

    type Error = ProtoError;

    fn decode_owned(buff: &[u8]) -> Result<(Self::Output, usize), Self::Error> {
        let (ident, n) = DeviceIdentity::decode_owned(buff)?;
        Ok((Self { ident }, n))
    }
}

/// Start loading an application of `size` bytes, with an optional
/// user supplied secret mixed into the application CDI
///
/// ## Encoding
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                          SIZE (u32le)                         |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |  USS_PRESENT  |                                               |
/// +-+-+-+-+-+-+-+-+                                               +
/// /                           USS (32)                            /
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct LoadAppReq {
    pub size: u32,
    pub uss: Option<[u8; USS_LEN]>,
}

impl Request for LoadAppReq {
    const ENDPOINT: Endpoint = Endpoint::Firmware;
    const CODE: u8 = FwCode::LoadAppReq as u8;
    const LEN: CmdLen = CmdLen::Len128;
}

impl Encode for LoadAppReq {
    type Error = ProtoError;

    fn encode_len(&self) -> Result<usize, Self::Error> {
        Ok(4 + 1 + USS_LEN)
    }

    fn encode(&self, buff: &mut [u8]) -> Result<usize, Self::Error> {
        if buff.len() < 4 + 1 + USS_LEN {
            return Err(ProtoError::InvalidLength);
        }

        LittleEndian::write_u32(&mut buff[..4], self.size);

        match &self.uss {
            Some(uss) => {
                buff[4] = 1;
                buff[5..][..USS_LEN].copy_from_slice(uss);
            }
            None => {
                buff[4] = 0;
                buff[5..][..USS_LEN].fill(0);
            }
        }

        Ok(4 + 1 + USS_LEN)
    }
}

impl DecodeOwned for LoadAppReq {
    type Output = Self;

    type Error = ProtoError;

    fn decode_owned(buff: &[u8]) -> Result<(Self::Output, usize), Self::Error> {
        if buff.len() < 4 + 1 + USS_LEN {
            return Err(ProtoError::InvalidLength);
        }

        let size = LittleEndian::read_u32(&buff[..4]);

        let uss = match buff[4] {
            0 => None,
            _ => Some(arr::dec::<USS_LEN>(&buff[5..])?.0),
        };

        Ok((Self { size, uss }, 4 + 1 + USS_LEN))
    }
}

/// Generic status response, used for [LoadAppResp] and [LoadAppDataResp]
macro_rules! status_resp {
    ($t:ident, $code:expr) => {
        #[derive(Copy, Clone, PartialEq, Debug)]
        pub struct $t {
            pub status: Status,
        }

        impl Response for $t {
            const CODE: u8 = $code as u8;
            const LEN: CmdLen = CmdLen::Len4;
        }

        impl Encode for $t {
            type Error = ProtoError;

            fn encode_len(&self) -> Result<usize, Self::Error> {
                Ok(1)
            }

            fn encode(&self, buff: &mut [u8]) -> Result<usize, Self::Error> {
                status::enc(self.status, buff)
            }
        }

        impl DecodeOwned for $t {
            type Output = Self;

            type Error = ProtoError;

            fn decode_owned(buff: &[u8]) -> Result<(Self::Output, usize), Self::Error> {
                let (status, n) = status::dec(buff)?;
                Ok((Self { status }, n))
            }
        }
    };
}

status_resp!(LoadAppResp, FwCode::LoadAppResp);
status_resp!(LoadAppDataResp, FwCode::LoadAppDataResp);

/// Application data chunk, at most [LOAD_CHUNK_LEN] bytes
/// (the final chunk is zero padded)
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct LoadAppDataReq<'a> {
    pub data: &'a [u8],
}

impl<'a> Request for LoadAppDataReq<'a> {
    const ENDPOINT: Endpoint = Endpoint::Firmware;
    const CODE: u8 = FwCode::LoadAppDataReq as u8;
    const LEN: CmdLen = CmdLen::Len128;
}

impl<'a> Encode for LoadAppDataReq<'a> {
    type Error = ProtoError;

    fn encode_len(&self) -> Result<usize, Self::Error> {
        Ok(self.data.len())
    }

    fn encode(&self, buff: &mut [u8]) -> Result<usize, Self::Error> {
        if self.data.len() > LOAD_CHUNK_LEN || buff.len() < self.data.len() {
            return Err(ProtoError::InvalidLength);
        }

        buff[..self.data.len()].copy_from_slice(self.data);

        Ok(self.data.len())
    }
}

impl<'a> Decode<'a> for LoadAppDataReq<'a> {
    type Output = Self;

    type Error = ProtoError;

    /// Decode a chunk, always [LOAD_CHUNK_LEN] bytes including padding
    fn decode(buff: &'a [u8]) -> Result<(Self::Output, usize), Self::Error> {
        if buff.len() < LOAD_CHUNK_LEN {
            return Err(ProtoError::InvalidLength);
        }

        Ok((
            Self {
                data: &buff[..LOAD_CHUNK_LEN],
            },
            LOAD_CHUNK_LEN,
        ))
    }
}

/// Final load response, containing the BLAKE2s digest of the loaded image
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct LoadAppDataReady {
    pub status: Status,
    pub digest: [u8; USS_LEN],
}

impl Response for LoadAppDataReady {
    const CODE: u8 = FwCode::LoadAppDataReady as u8;
    const LEN: CmdLen = CmdLen::Len128;
}

impl Encode for LoadAppDataReady {
    type Error = ProtoError;

    fn encode_len(&self) -> Result<usize, Self::Error> {
        Ok(1 + USS_LEN)
    }

    fn encode(&self, buff: &mut [u8]) -> Result<usize, Self::Error> {
        let mut index = status::enc(self.status, buff)?;
        index += arr::enc(&self.digest, &mut buff[index..])?;
        Ok(index)
    }
}

impl DecodeOwned for LoadAppDataReady {
    type Output = Self;

    type Error = ProtoError;

    fn decode_owned(buff: &[u8]) -> Result<(Self::Output, usize), Self::Error> {
        let (status, mut index) = status::dec(buff)?;
        let (digest, n) = arr::dec(&buff[index..])?;
        index += n;

        Ok((Self { status, digest }, index))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        encode_request, test::encode_decode_resp, FrameHeader, FrameStatus, MAX_FRAME_LEN,
    };

    #[test]
    fn name_version_resp() {
        let r = NameVersionResp {
            ident: DeviceIdentity::new(*b"tk1 ", *b"mkdf", 5),
        };
        assert_eq!(encode_decode_resp(&r), 33);
    }

    #[test]
    fn load_app_req_layout() {
        let req = LoadAppReq {
            size: 0x0102_0304,
            uss: Some([0xaa; USS_LEN]),
        };

        let mut buff = [0u8; MAX_FRAME_LEN];
        let n = encode_request(3, &req, &mut buff).unwrap();
        assert_eq!(n, 129);

        let hdr = FrameHeader::decode_byte(buff[0]).unwrap();
        assert_eq!(hdr.endpoint, Endpoint::Firmware);
        assert_eq!(hdr.len, CmdLen::Len128);
        assert_eq!(hdr.status, FrameStatus::Ok);

        assert_eq!(buff[1], FwCode::LoadAppReq as u8);
        assert_eq!(&buff[2..6], &[0x04, 0x03, 0x02, 0x01]);
        assert_eq!(buff[6], 1);
        assert_eq!(&buff[7..39], &[0xaa; USS_LEN]);
        assert!(buff[39..n].iter().all(|b| *b == 0));

        let (d, _) = LoadAppReq::decode_owned(&buff[2..n]).unwrap();
        assert_eq!(d, req);
    }

    #[test]
    fn load_app_req_no_uss() {
        let req = LoadAppReq {
            size: 1024,
            uss: None,
        };

        let mut buff = [0u8; 64];
        req.encode(&mut buff).unwrap();

        let (d, _) = LoadAppReq::decode_owned(&buff).unwrap();
        assert_eq!(d.uss, None);
    }

    #[test]
    fn load_app_data_chunk_padding() {
        let data = [0x55u8; 10];
        let req = LoadAppDataReq { data: &data };

        let mut buff = [0xffu8; MAX_FRAME_LEN];
        let n = encode_request(0, &req, &mut buff).unwrap();
        assert_eq!(n, 129);

        let (d, n) = LoadAppDataReq::decode(&buff[2..]).unwrap();
        assert_eq!(n, LOAD_CHUNK_LEN);
        assert_eq!(&d.data[..10], &data);
        assert!(d.data[10..].iter().all(|b| *b == 0));
    }

    #[test]
    fn load_app_data_oversized_chunk() {
        let data = [0u8; LOAD_CHUNK_LEN + 1];
        let req = LoadAppDataReq { data: &data };

        let mut buff = [0u8; MAX_FRAME_LEN + 1];
        assert_eq!(
            encode_request(0, &req, &mut buff),
            Err(ProtoError::InvalidLength)
        );
    }

    #[test]
    fn load_responses() {
        encode_decode_resp(&LoadAppResp { status: Status::Ok });
        encode_decode_resp(&LoadAppDataResp { status: Status::Bad });
        encode_decode_resp(&LoadAppDataReady {
            status: Status::Ok,
            digest: [0x11; USS_LEN],
        });
    }
}
