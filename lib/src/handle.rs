// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Handle for connected TKey devices
//!
//! This provides methods for interacting with the device
//! and is generic over [Exchange] transports

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};

use tkey_x25519_proto::{
    app, decode_response, encode_request,
    fw::{self, LOAD_CHUNK_LEN, MAX_APP_SIZE},
    DeviceIdentity, FrameStatus, Request, Response, Status, MAX_FRAME_LEN, X25519_LEN,
};

use crate::{key::KeyParams, loader::Uss, transport::Exchange, Device, Error};

/// Handle for a connected TKey using an [Exchange] transport.
///
/// Requests are issued strictly sequentially, each with a rolling frame id.
/// Responses with stale ids (from timed out requests) are discarded.
pub struct DeviceHandle<T: Exchange> {
    /// Transport for communication
    t: T,
    /// Next frame id
    id: u8,
    /// Timeout for ordinary requests
    request_timeout: Duration,
}

/// Create a [DeviceHandle] wrapper from a type implementing [Exchange]
impl<T: Exchange> From<T> for DeviceHandle<T> {
    fn from(t: T) -> Self {
        Self {
            t,
            id: 0,
            request_timeout: Duration::from_secs(2),
        }
    }
}

impl<T: Exchange> DeviceHandle<T> {
    /// Set the timeout for requests not gated on user interaction
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Fetch the request timeout
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Access the underlying transport
    pub fn transport(&mut self) -> &mut T {
        &mut self.t
    }

    fn next_id(&mut self) -> u8 {
        let id = self.id;
        self.id = (self.id + 1) & 0b11;
        id
    }

    /// Issue a request and await the matching response,
    /// with an optional timeout (`None` waits indefinitely)
    pub async fn request<REQ, RESP>(
        &mut self,
        req: &REQ,
        timeout: Option<Duration>,
    ) -> Result<RESP, Error>
    where
        REQ: Request + Sync,
        RESP: Response + Send,
    {
        let id = self.next_id();

        let mut buff = [0u8; MAX_FRAME_LEN];
        let n = encode_request(id, req, &mut buff)?;

        debug!("req ({id}): {req:?}");

        self.t.send(&buff[..n]).await?;

        let resp = match timeout {
            Some(d) => tokio::time::timeout(d, self.response::<RESP>(id)).await??,
            None => self.response::<RESP>(id).await?,
        };

        debug!("resp ({id}): {resp:?}");

        Ok(resp)
    }

    async fn response<RESP: Response>(&mut self, id: u8) -> Result<RESP, Error> {
        let mut buff = [0u8; MAX_FRAME_LEN];

        loop {
            let (hdr, n) = self.t.recv(&mut buff).await?;

            if hdr.id != id {
                warn!("Discarding stale frame (id: {}, expected: {})", hdr.id, id);
                continue;
            }

            if hdr.status == FrameStatus::NotOk {
                return Err(Error::StatusNotOk);
            }

            return Ok(decode_response::<RESP>(&hdr, &buff[..n])?);
        }
    }

    /// Timeout for key operations, touch gated requests wait indefinitely
    fn key_timeout(&self, key: &KeyParams) -> Option<Duration> {
        match key.require_touch() {
            true => None,
            false => Some(self.request_timeout),
        }
    }
}

#[async_trait]
impl<T: Exchange> Device for DeviceHandle<T> {
    async fn firmware_identity(&mut self) -> Result<DeviceIdentity, Error> {
        let r = self
            .request::<_, fw::NameVersionResp>(&fw::NameVersionReq, Some(self.request_timeout))
            .await?;

        Ok(r.ident)
    }

    async fn app_identity(&mut self) -> Result<DeviceIdentity, Error> {
        let r = self
            .request::<_, app::NameVersionResp>(&app::NameVersionReq, Some(self.request_timeout))
            .await?;

        Ok(r.ident)
    }

    async fn load_app(&mut self, image: &[u8], uss: Option<&Uss>) -> Result<[u8; 32], Error> {
        if image.is_empty() {
            return Err(Error::EmptyImage);
        }
        if image.len() > MAX_APP_SIZE {
            return Err(Error::ImageTooLarge(image.len()));
        }

        let req = fw::LoadAppReq {
            size: image.len() as u32,
            uss: uss.map(|u| *u.as_bytes()),
        };

        let r = self
            .request::<_, fw::LoadAppResp>(&req, Some(self.request_timeout))
            .await?;
        if r.status != Status::Ok {
            return Err(Error::LoadRejected);
        }

        let chunks = image.chunks(LOAD_CHUNK_LEN);
        let last = chunks.len() - 1;

        for (i, data) in chunks.enumerate() {
            let req = fw::LoadAppDataReq { data };

            // Final chunk returns the digest of the loaded image
            if i == last {
                let r = self
                    .request::<_, fw::LoadAppDataReady>(&req, Some(self.request_timeout))
                    .await?;
                if r.status != Status::Ok {
                    return Err(Error::LoadRejected);
                }

                return Ok(r.digest);
            }

            let r = self
                .request::<_, fw::LoadAppDataResp>(&req, Some(self.request_timeout))
                .await?;
            if r.status != Status::Ok {
                return Err(Error::LoadRejected);
            }
        }

        Err(Error::EmptyImage)
    }

    async fn get_public_key(&mut self, key: &KeyParams) -> Result<[u8; X25519_LEN], Error> {
        let req = app::GetPubkeyReq { args: key.args() };

        let r = self
            .request::<_, app::PubkeyResp>(&req, self.key_timeout(key))
            .await?;

        match r.status {
            Status::Ok => Ok(r.public_key),
            s => Err(Error::DeviceStatus(s)),
        }
    }

    async fn compute_shared(
        &mut self,
        key: &KeyParams,
        peer: &[u8; X25519_LEN],
    ) -> Result<[u8; X25519_LEN], Error> {
        let req = app::DoEcdhReq {
            args: key.args(),
            peer: *peer,
        };

        let r = self
            .request::<_, app::SharedResp>(&req, self.key_timeout(key))
            .await?;

        match r.status {
            Status::Ok => Ok(r.shared),
            s => Err(Error::DeviceStatus(s)),
        }
    }

    async fn close(&mut self) -> Result<(), Error> {
        self.t.close().await
    }
}
