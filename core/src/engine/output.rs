// Copyright (c) 2022-2023 The MobileCoin Foundation

use tkey_x25519_proto::{
    app, encode_nok, encode_response,
    fw::{self, USS_LEN},
    DeviceIdentity, FrameHeader, ProtoError, Status, X25519_LEN,
};

/// [`Engine`][super::Engine] outputs (in response to events), encoded to response frames
#[derive(Clone, PartialEq, Debug)]
pub enum Output {
    /// Frame level not-OK reply
    Nok,

    /// Firmware name and version
    FwNameVersion(DeviceIdentity),

    /// Application load accepted / rejected
    FwLoadApp(Status),

    /// Application data chunk accepted / rejected
    FwLoadAppData(Status),

    /// Application load complete
    FwLoadAppReady {
        status: Status,
        digest: [u8; USS_LEN],
    },

    /// Application name and version
    AppNameVersion(DeviceIdentity),

    /// Derived public key
    AppPubkey {
        status: Status,
        public_key: [u8; X25519_LEN],
    },

    /// Computed shared secret
    AppShared {
        status: Status,
        shared: [u8; X25519_LEN],
    },

    /// Unrecognised command
    AppUnknown,
}

impl Output {
    /// Encode output to a response frame for the request header `req`
    pub fn encode(&self, req: &FrameHeader, buff: &mut [u8]) -> Result<usize, ProtoError> {
        match self {
            Output::Nok => encode_nok(req, buff),
            Output::FwNameVersion(ident) => {
                encode_response(req, &fw::NameVersionResp { ident: *ident }, buff)
            }
            Output::FwLoadApp(status) => {
                encode_response(req, &fw::LoadAppResp { status: *status }, buff)
            }
            Output::FwLoadAppData(status) => {
                encode_response(req, &fw::LoadAppDataResp { status: *status }, buff)
            }
            Output::FwLoadAppReady { status, digest } => encode_response(
                req,
                &fw::LoadAppDataReady {
                    status: *status,
                    digest: *digest,
                },
                buff,
            ),
            Output::AppNameVersion(ident) => {
                encode_response(req, &app::NameVersionResp { ident: *ident }, buff)
            }
            Output::AppPubkey { status, public_key } => encode_response(
                req,
                &app::PubkeyResp {
                    status: *status,
                    public_key: *public_key,
                },
                buff,
            ),
            Output::AppShared { status, shared } => encode_response(
                req,
                &app::SharedResp {
                    status: *status,
                    shared: *shared,
                },
                buff,
            ),
            Output::AppUnknown => encode_response(req, &app::UnknownCmdResp, buff),
        }
    }
}
