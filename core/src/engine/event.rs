// Copyright (c) 2022-2023 The MobileCoin Foundation

use encdec::{Decode, DecodeOwned};

use tkey_x25519_proto::{
    app::{AppCode, DoEcdhReq, GetPubkeyReq, KeyArgs},
    fw::{FwCode, LoadAppDataReq, LoadAppReq, USS_LEN},
    CmdLen, Endpoint, FrameHeader, ProtocolParams, X25519_LEN,
};

use super::Error;

/// [`Engine`][super::Engine] input events, decoded from request frames
#[derive(Clone, PartialEq, Debug)]
pub enum Event<'a> {
    /// Fetch firmware name and version
    FwNameVersion,

    /// Start loading an application
    FwLoadApp {
        size: u32,
        uss: Option<[u8; USS_LEN]>,
    },

    /// Application data chunk
    FwLoadAppData { data: &'a [u8] },

    /// Fetch application name and version
    AppNameVersion,

    /// Fetch the derived X25519 public key
    AppGetPubkey { args: KeyArgs<'a> },

    /// Compute an X25519 shared secret with the provided peer key
    AppDoEcdh {
        args: KeyArgs<'a>,
        peer: [u8; X25519_LEN],
    },

    /// Key request with an invalid frame length
    AppBadLength { code: AppCode },

    /// Unrecognised application command
    AppUnknown { code: u8 },
}

impl<'a> Event<'a> {
    /// Parse a request frame payload (excluding the header) into an [Event]
    pub fn parse(
        hdr: &FrameHeader,
        payload: &'a [u8],
        params: &ProtocolParams,
    ) -> Result<Self, Error> {
        let len = hdr.len.byte_len();
        if payload.len() < len {
            return Err(Error::InvalidLength);
        }

        let (code, body) = (payload[0], &payload[1..len]);

        match hdr.endpoint {
            Endpoint::Firmware => match FwCode::try_from(code) {
                Ok(FwCode::NameVersionReq) => Ok(Event::FwNameVersion),
                Ok(FwCode::LoadAppReq) => {
                    let (r, _n) = LoadAppReq::decode_owned(body)?;
                    Ok(Event::FwLoadApp {
                        size: r.size,
                        uss: r.uss,
                    })
                }
                Ok(FwCode::LoadAppDataReq) => {
                    let (r, _n) = LoadAppDataReq::decode(body)?;
                    Ok(Event::FwLoadAppData { data: r.data })
                }
                _ => Err(Error::UnexpectedEvent),
            },
            Endpoint::App => match AppCode::try_from(code) {
                Ok(AppCode::NameVersionReq) => Ok(Event::AppNameVersion),
                Ok(c @ (AppCode::GetPubkeyReq | AppCode::DoEcdhReq)) if hdr.len != CmdLen::Len128 => {
                    Ok(Event::AppBadLength { code: c })
                }
                Ok(AppCode::GetPubkeyReq) => {
                    let (r, _n) = GetPubkeyReq::parse(body, params)?;
                    Ok(Event::AppGetPubkey { args: r.args })
                }
                Ok(AppCode::DoEcdhReq) => {
                    let (r, _n) = DoEcdhReq::parse(body, params)?;
                    Ok(Event::AppDoEcdh {
                        args: r.args,
                        peer: r.peer,
                    })
                }
                _ => Ok(Event::AppUnknown { code }),
            },
            _ => Err(Error::UnexpectedEvent),
        }
    }

    /// Check whether this event is addressed to the firmware
    pub fn is_firmware(&self) -> bool {
        matches!(
            self,
            Event::FwNameVersion | Event::FwLoadApp { .. } | Event::FwLoadAppData { .. }
        )
    }
}

#[cfg(test)]
mod test {
    use tkey_x25519_proto::FrameStatus;

    use super::*;

    #[test]
    fn unknown_codes() {
        let p = ProtocolParams::V1;

        // Unknown firmware commands never reach the engine
        let hdr = FrameHeader::new(0, Endpoint::Firmware, FrameStatus::Ok, CmdLen::Len1);
        assert_eq!(Event::parse(&hdr, &[0x7f], &p), Err(Error::UnexpectedEvent));
        assert_eq!(Event::parse(&hdr, &[0x02], &p), Err(Error::UnexpectedEvent));

        // Unknown app commands are answered by the app
        let hdr = FrameHeader::new(0, Endpoint::App, FrameStatus::Ok, CmdLen::Len1);
        assert_eq!(
            Event::parse(&hdr, &[0x7f], &p),
            Ok(Event::AppUnknown { code: 0x7f })
        );
    }
}
