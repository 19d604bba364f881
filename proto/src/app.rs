// Copyright (c) 2022-2023 The MobileCoin Foundation

//! x25519 application frames
//!
//! Both key operations derive the device X25519 secret from the domain,
//! user secret and touch flag (combined with the device CDI), so the same
//! [KeyArgs] must be supplied to [GetPubkeyReq] and [DoEcdhReq] for the
//! resulting keys to correspond.

use encdec::{DecodeOwned, Encode};
use num_enum::TryFromPrimitive;

use crate::{
    helpers::{arr, status},
    CmdLen, DeviceIdentity, Endpoint, ProtoError, ProtocolParams, Request, Response, Status,
    X25519_LEN,
};

/// Application command and response codes
#[derive(Copy, Clone, PartialEq, Eq, Debug, TryFromPrimitive)]
#[repr(u8)]
pub enum AppCode {
    NameVersionReq = 0x01,
    NameVersionResp = 0x02,
    GetPubkeyReq = 0x03,
    GetPubkeyResp = 0x04,
    DoEcdhReq = 0x05,
    DoEcdhResp = 0x06,
    UnknownCmd = 0xff,
}

/// Fetch application name and version
#[derive(Copy, Clone, PartialEq, Debug, Default)]
pub struct NameVersionReq;

impl Request for NameVersionReq {
    const ENDPOINT: Endpoint = Endpoint::App;
    const CODE: u8 = AppCode::NameVersionReq as u8;
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

/// Application name and version response
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct NameVersionResp {
    pub ident: DeviceIdentity,
}

impl Response for NameVersionResp {
    const CODE: u8 = AppCode::NameVersionResp as u8;
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

/// Key derivation arguments shared by [GetPubkeyReq] and [DoEcdhReq]
///
/// ## Encoding
///
/// ```text
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// /                      DOMAIN (domain_len)                      /
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// /                 USER_SECRET (user_secret_len)                 /
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// | REQUIRE_TOUCH |
/// +-+-+-+-+-+-+-+-+
/// ```
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct KeyArgs<'a> {
    /// Domain separation string, padded to the protocol domain length
    pub domain: &'a [u8],
    /// Per-run user secret
    pub user_secret: &'a [u8],
    /// Require a touch before private key operations
    pub require_touch: bool,
}

impl<'a> KeyArgs<'a> {
    /// Parse key arguments using the provided protocol parameters
    pub fn parse(buff: &'a [u8], params: &ProtocolParams) -> Result<(Self, usize), ProtoError> {
        let n = params.key_args_len();
        if buff.len() < n {
            return Err(ProtoError::InvalidLength);
        }

        let (domain, rest) = buff.split_at(params.domain_len());
        let (user_secret, rest) = rest.split_at(params.user_secret_len());

        Ok((
            Self {
                domain,
                user_secret,
                require_touch: rest[0] != 0,
            },
            n,
        ))
    }

    /// Check argument lengths match the provided protocol parameters
    pub fn check(&self, params: &ProtocolParams) -> Result<(), ProtoError> {
        if self.domain.len() != params.domain_len()
            || self.user_secret.len() != params.user_secret_len()
        {
            return Err(ProtoError::InvalidParams);
        }
        Ok(())
    }
}

impl<'a> Encode for KeyArgs<'a> {
    type Error = ProtoError;

    fn encode_len(&self) -> Result<usize, Self::Error> {
        Ok(self.domain.len() + self.user_secret.len() + 1)
    }

    fn encode(&self, buff: &mut [u8]) -> Result<usize, Self::Error> {
        let n = self.encode_len()?;
        if buff.len() < n {
            return Err(ProtoError::InvalidLength);
        }

        let mut index = 0;

        buff[index..][..self.domain.len()].copy_from_slice(self.domain);
        index += self.domain.len();

        buff[index..][..self.user_secret.len()].copy_from_slice(self.user_secret);
        index += self.user_secret.len();

        buff[index] = self.require_touch as u8;
        index += 1;

        Ok(index)
    }
}

/// Fetch the device public key for the provided [KeyArgs]
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct GetPubkeyReq<'a> {
    pub args: KeyArgs<'a>,
}

impl<'a> Request for GetPubkeyReq<'a> {
    const ENDPOINT: Endpoint = Endpoint::App;
    const CODE: u8 = AppCode::GetPubkeyReq as u8;
    const LEN: CmdLen = CmdLen::Len128;
}

impl<'a> Encode for GetPubkeyReq<'a> {
    type Error = ProtoError;

    fn encode_len(&self) -> Result<usize, Self::Error> {
        self.args.encode_len()
    }

    fn encode(&self, buff: &mut [u8]) -> Result<usize, Self::Error> {
        self.args.encode(buff)
    }
}

impl<'a> GetPubkeyReq<'a> {
    /// Parse a request using the provided protocol parameters
    pub fn parse(buff: &'a [u8], params: &ProtocolParams) -> Result<(Self, usize), ProtoError> {
        let (args, n) = KeyArgs::parse(buff, params)?;
        Ok((Self { args }, n))
    }
}

/// Compute the shared secret between the device key for the
/// provided [KeyArgs] and the `peer` public key
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct DoEcdhReq<'a> {
    pub args: KeyArgs<'a>,
    pub peer: [u8; X25519_LEN],
}

impl<'a> Request for DoEcdhReq<'a> {
    const ENDPOINT: Endpoint = Endpoint::App;
    const CODE: u8 = AppCode::DoEcdhReq as u8;
    const LEN: CmdLen = CmdLen::Len128;
}

impl<'a> Encode for DoEcdhReq<'a> {
    type Error = ProtoError;

    fn encode_len(&self) -> Result<usize, Self::Error> {
        Ok(self.args.encode_len()? + X25519_LEN)
    }

    fn encode(&self, buff: &mut [u8]) -> Result<usize, Self::Error> {
        let mut index = self.args.encode(buff)?;
        index += arr::enc(&self.peer, &mut buff[index..])?;
        Ok(index)
    }
}

impl<'a> DoEcdhReq<'a> {
    /// Parse a request using the provided protocol parameters
    pub fn parse(buff: &'a [u8], params: &ProtocolParams) -> Result<(Self, usize), ProtoError> {
        let (args, mut index) = KeyArgs::parse(buff, params)?;
        let (peer, n) = arr::dec(&buff[index..])?;
        index += n;

        Ok((Self { args, peer }, index))
    }
}

/// Key response, used for [PubkeyResp] and [SharedResp]
macro_rules! key_resp {
    ($t:ident, $code:expr, $field:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Copy, Clone, PartialEq, Debug)]
        pub struct $t {
            pub status: Status,
            pub $field: [u8; X25519_LEN],
        }

        impl Response for $t {
            const CODE: u8 = $code as u8;
            const LEN: CmdLen = CmdLen::Len128;
        }

        impl Encode for $t {
            type Error = ProtoError;

            fn encode_len(&self) -> Result<usize, Self::Error> {
                Ok(1 + X25519_LEN)
            }

            fn encode(&self, buff: &mut [u8]) -> Result<usize, Self::Error> {
                let mut index = status::enc(self.status, buff)?;
                index += arr::enc(&self.$field, &mut buff[index..])?;
                Ok(index)
            }
        }

        impl DecodeOwned for $t {
            type Output = Self;

            type Error = ProtoError;

            fn decode_owned(buff: &[u8]) -> Result<(Self::Output, usize), Self::Error> {
                let (status, mut index) = status::dec(buff)?;
                let ($field, n) = arr::dec(&buff[index..])?;
                index += n;

                Ok((Self { status, $field }, index))
            }
        }
    };
}

key_resp!(
    PubkeyResp,
    AppCode::GetPubkeyResp,
    public_key,
    "Device public key response"
);
key_resp!(
    SharedResp,
    AppCode::DoEcdhResp,
    shared,
    "Device shared secret response"
);

/// Response to unrecognised application commands
#[derive(Copy, Clone, PartialEq, Debug, Default)]
pub struct UnknownCmdResp;

impl Response for UnknownCmdResp {
    const CODE: u8 = AppCode::UnknownCmd as u8;
    const LEN: CmdLen = CmdLen::Len1;
}

impl Encode for UnknownCmdResp {
    type Error = ProtoError;

    fn encode_len(&self) -> Result<usize, Self::Error> {
        Ok(0)
    }

    fn encode(&self, _buff: &mut [u8]) -> Result<usize, Self::Error> {
        Ok(0)
    }
}

impl DecodeOwned for UnknownCmdResp {
    type Output = Self;

    type Error = ProtoError;

    fn decode_owned(_buff: &[u8]) -> Result<(Self::Output, usize), Self::Error> {
        Ok((Self, 0))
    }
}
