// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Handshake orchestration
//!
//! A [Handshake] drives a [Device] through identity checks, application
//! loading, public key exchange and shared secret computation, then compares
//! the host and device shared secrets.
//!
//! ```text
//! Connected -> ModeKnown -> AppVerified -> PubKeyExchanged -> SecretComputed -> Verified
//!     \            \             \                \                  \
//!      +------------+-------------+----------------+------------------+-> Failed
//! ```

use std::{
    future::Future,
    time::{Duration, Instant},
};

use log::debug;
use serde::Serialize;
use strum::Display;
use subtle::ConstantTimeEq;

use tkey_x25519_proto::{DeviceIdentity, X25519_LEN};

use crate::{
    host::{HostKeyPair, SharedSecret},
    ident::{
        classify_mode, is_expected_application, probe_application, probe_firmware, DeviceMode,
    },
    key::KeyParams,
    loader::{load_application, AppImage, Uss},
    report::Reporter,
    Device, Error,
};

/// Handshake state enumeration
#[derive(Copy, Clone, PartialEq, Eq, Debug, Display, Serialize)]
pub enum HandshakeState {
    Connected,
    ModeKnown,
    AppVerified,
    PubKeyExchanged,
    SecretComputed,
    Verified,
    Failed,
}

/// Timed handshake phases
#[derive(Copy, Clone, PartialEq, Eq, Debug, Display, Serialize)]
pub enum Phase {
    #[strum(serialize = "GetNameVersion")]
    Probe,
    #[strum(serialize = "LoadApp")]
    Load,
    #[strum(serialize = "GetPubKey")]
    PublicKey,
    #[strum(serialize = "DoECDH")]
    SharedSecret,
}

/// Result of comparing host and device shared secrets
#[derive(Copy, Clone, PartialEq, Eq, Debug, Display)]
pub enum Verdict {
    Match,
    Mismatch,
}

/// Handshake with a device, see module docs for the state machine.
///
/// Errors from device operations move the handshake to [HandshakeState::Failed],
/// caller errors ([Error::InvalidState], [Error::ParamsMismatch]) leave
/// the state unchanged.
pub struct Handshake<'a, D: Device + ?Sized, R: Reporter + ?Sized> {
    d: &'a mut D,
    r: &'a mut R,

    state: HandshakeState,
    mode: DeviceMode,
    touch_timeout: Option<Duration>,

    key: Option<KeyParams>,
    host: Option<HostKeyPair>,
    host_public: [u8; X25519_LEN],
    device_public: Option<[u8; X25519_LEN]>,

    host_shared: Option<SharedSecret>,
    device_shared: Option<SharedSecret>,
}

impl<'a, D: Device + ?Sized, R: Reporter + ?Sized> Handshake<'a, D, R> {
    /// Create a new handshake using the provided device and reporter
    pub fn new(d: &'a mut D, r: &'a mut R) -> Self {
        Self {
            d,
            r,
            state: HandshakeState::Connected,
            mode: DeviceMode::Unknown,
            touch_timeout: None,
            key: None,
            host: None,
            host_public: [0u8; X25519_LEN],
            device_public: None,
            host_shared: None,
            device_shared: None,
        }
    }

    /// Set a timeout for touch gated device operations
    pub fn with_touch_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.touch_timeout = timeout;
        self
    }

    /// Fetch handshake state
    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Fetch the detected device mode
    pub fn mode(&self) -> DeviceMode {
        self.mode
    }

    /// Probe the firmware identity to determine the device mode
    pub async fn probe_mode(&mut self) -> Result<DeviceMode, Error> {
        self.expect(HandshakeState::Connected)?;

        let start = Instant::now();
        let r = probe_firmware(&mut *self.d).await;
        let ident = self.check(r)?;

        self.r.phase_complete(Phase::Probe, start.elapsed());

        let mode = match &ident {
            Some(i) => classify_mode(i),
            None => DeviceMode::Unknown,
        };

        self.r.mode(mode, ident.as_ref());
        self.mode = mode;
        self.set_state(HandshakeState::ModeKnown);

        Ok(mode)
    }

    /// Load the application where the device is in firmware mode,
    /// then check the expected application is running
    pub async fn verify_app(
        &mut self,
        image: &AppImage,
        uss: Option<&Uss>,
    ) -> Result<DeviceIdentity, Error> {
        self.expect(HandshakeState::ModeKnown)?;

        if self.mode == DeviceMode::Firmware {
            self.r.loading(image.len());

            let start = Instant::now();
            let r = load_application(&mut *self.d, image, uss).await;
            self.check(r)?;

            self.r.phase_complete(Phase::Load, start.elapsed());
        }

        let r = probe_application(&mut *self.d).await;
        let ident = self.check(r)?;

        match ident {
            Some(i) if is_expected_application(&i) => {
                self.r.app(&i);
                self.mode = DeviceMode::Application;
                self.set_state(HandshakeState::AppVerified);

                Ok(i)
            }
            other => self.check(Err(Error::UnexpectedApp(other))),
        }
    }

    /// Generate the host key pair and fetch the device public key
    pub async fn exchange_public_keys(
        &mut self,
        key: &KeyParams,
    ) -> Result<[u8; X25519_LEN], Error> {
        self.expect(HandshakeState::AppVerified)?;

        let host = HostKeyPair::generate();
        self.host_public = host.public_key();
        self.r.host_public(&self.host_public);

        if key.require_touch() {
            self.r.touch_required(Phase::PublicKey);
        }

        let start = Instant::now();
        let r = touch_gated(
            key.require_touch(),
            self.touch_timeout,
            self.d.get_public_key(key),
        )
        .await;
        self.r.phase_complete(Phase::PublicKey, start.elapsed());

        let device_public = self.check(r)?;
        self.r.device_public(&device_public);

        self.host = Some(host);
        self.key = Some(key.clone());
        self.device_public = Some(device_public);
        self.set_state(HandshakeState::PubKeyExchanged);

        Ok(device_public)
    }

    /// Compute host and device shared secrets.
    ///
    /// `key` must match the parameters used in [Handshake::exchange_public_keys].
    pub async fn compute_secrets(&mut self, key: &KeyParams) -> Result<(), Error> {
        self.expect(HandshakeState::PubKeyExchanged)?;

        if self.key.as_ref() != Some(key) {
            return Err(Error::ParamsMismatch);
        }

        let (host, device_public) = match (self.host.take(), self.device_public) {
            (Some(h), Some(p)) => (h, p),
            _ => {
                return self.check(Err(Error::InvalidState(
                    self.state,
                    HandshakeState::PubKeyExchanged,
                )))
            }
        };

        // Host side first, rejecting invalid device keys before any device call
        let r = host.compute_shared(&device_public);
        let host_shared = self.check(r)?;

        if key.require_touch() {
            self.r.touch_required(Phase::SharedSecret);
        }

        let start = Instant::now();
        let r = touch_gated(
            key.require_touch(),
            self.touch_timeout,
            self.d.compute_shared(key, &self.host_public),
        )
        .await;
        self.r.phase_complete(Phase::SharedSecret, start.elapsed());

        let device_shared = self.check(r)?;

        self.host_shared = Some(host_shared);
        self.device_shared = Some(SharedSecret::from(device_shared));
        self.set_state(HandshakeState::SecretComputed);

        Ok(())
    }

    /// Compare host and device shared secrets
    pub fn verify(&mut self) -> Result<Verdict, Error> {
        self.expect(HandshakeState::SecretComputed)?;

        let verdict = match (self.host_shared.take(), self.device_shared.take()) {
            (Some(h), Some(d)) if bool::from(h.ct_eq(&d)) => Verdict::Match,
            _ => Verdict::Mismatch,
        };

        debug!("Shared secret comparison: {verdict}");

        match verdict {
            Verdict::Match => self.set_state(HandshakeState::Verified),
            Verdict::Mismatch => self.set_state(HandshakeState::Failed),
        }

        Ok(verdict)
    }

    /// Execute the full handshake
    pub async fn run(
        &mut self,
        image: &AppImage,
        uss: Option<&Uss>,
        key: &KeyParams,
    ) -> Result<Verdict, Error> {
        self.probe_mode().await?;
        self.verify_app(image, uss).await?;
        self.exchange_public_keys(key).await?;
        self.compute_secrets(key).await?;
        self.verify()
    }

    fn expect(&self, expected: HandshakeState) -> Result<(), Error> {
        match self.state == expected {
            true => Ok(()),
            false => Err(Error::InvalidState(self.state, expected)),
        }
    }

    fn set_state(&mut self, state: HandshakeState) {
        debug!("Handshake state: {} -> {}", self.state, state);

        self.state = state;
        self.r.state(state);
    }

    /// Move to [HandshakeState::Failed] on error
    fn check<T>(&mut self, r: Result<T, Error>) -> Result<T, Error> {
        if r.is_err() {
            self.set_state(HandshakeState::Failed);
        }
        r
    }
}

/// Apply the touch timeout (if any) to touch gated operations
async fn touch_gated<T>(
    touch: bool,
    timeout: Option<Duration>,
    f: impl Future<Output = Result<T, Error>>,
) -> Result<T, Error> {
    match (touch, timeout) {
        (true, Some(d)) => match tokio::time::timeout(d, f).await {
            Ok(r) => r,
            Err(_) => Err(Error::UserTimeout),
        },
        _ => f.await,
    }
}

#[cfg(test)]
mod test {
    use tkey_x25519_proto::{DeviceIdentity, ProtocolParams};

    use super::*;
    use crate::{device::test::MockDevice, key::DEFAULT_DOMAIN, report::RunReport};

    fn image() -> AppImage {
        AppImage::new(vec![0x13; 1000]).unwrap()
    }

    fn key(require_touch: bool) -> KeyParams {
        KeyParams::random(ProtocolParams::V1, DEFAULT_DOMAIN, require_touch).unwrap()
    }

    #[tokio::test]
    async fn firmware_to_verified() {
        let mut d = MockDevice::default();
        let mut r = RunReport::default();

        let mut h = Handshake::new(&mut d, &mut r);
        let v = h.run(&image(), None, &key(false)).await.unwrap();

        assert_eq!(v, Verdict::Match);
        assert_eq!(h.state(), HandshakeState::Verified);
        assert_eq!(h.mode(), DeviceMode::Application);

        assert_eq!(
            d.calls,
            &[
                "firmware_identity",
                "load_app",
                "app_identity",
                "get_public_key",
                "compute_shared"
            ]
        );

        assert_eq!(
            r.states,
            &[
                HandshakeState::ModeKnown,
                HandshakeState::AppVerified,
                HandshakeState::PubKeyExchanged,
                HandshakeState::SecretComputed,
                HandshakeState::Verified,
            ]
        );
        assert!(r.touch_prompts.is_empty());
    }

    #[tokio::test]
    async fn app_already_running() {
        let mut d = MockDevice {
            loaded: true,
            ..Default::default()
        };
        let mut r = ();

        let mut h = Handshake::new(&mut d, &mut r);
        assert_eq!(h.probe_mode().await.unwrap(), DeviceMode::Unknown);
        h.verify_app(&image(), None).await.unwrap();
        assert_eq!(h.state(), HandshakeState::AppVerified);

        assert!(!d.calls.contains(&"load_app"));
    }

    #[tokio::test]
    async fn unexpected_app() {
        let other = DeviceIdentity::new(*b"ssh-", *b"agnt", 1);
        let mut d = MockDevice {
            loaded: true,
            app: other,
            ..Default::default()
        };
        let mut r = ();

        let mut h = Handshake::new(&mut d, &mut r);
        h.probe_mode().await.unwrap();

        let e = h.verify_app(&image(), None).await;
        assert!(matches!(e, Err(Error::UnexpectedApp(Some(i))) if i == other));
        assert_eq!(h.state(), HandshakeState::Failed);

        // No key operations after a failed identity check
        assert!(matches!(
            h.exchange_public_keys(&key(false)).await,
            Err(Error::InvalidState(HandshakeState::Failed, _))
        ));
        assert!(!d.calls.contains(&"get_public_key"));
    }

    #[tokio::test]
    async fn out_of_order() {
        let mut d = MockDevice::default();
        let mut r = ();

        let mut h = Handshake::new(&mut d, &mut r);

        let e = h.exchange_public_keys(&key(false)).await;
        assert!(matches!(
            e,
            Err(Error::InvalidState(
                HandshakeState::Connected,
                HandshakeState::AppVerified
            ))
        ));
        assert_eq!(h.state(), HandshakeState::Connected);

        assert!(matches!(h.verify(), Err(Error::InvalidState(..))));
        assert!(d.calls.is_empty());
    }

    #[tokio::test]
    async fn params_mismatch() {
        let mut d = MockDevice::default();
        let mut r = ();

        let mut h = Handshake::new(&mut d, &mut r);
        h.probe_mode().await.unwrap();
        h.verify_app(&image(), None).await.unwrap();
        h.exchange_public_keys(&key(false)).await.unwrap();

        // A different user secret is rejected before any device call
        let e = h.compute_secrets(&key(false)).await;
        assert!(matches!(e, Err(Error::ParamsMismatch)));
        assert_eq!(h.state(), HandshakeState::PubKeyExchanged);

        assert!(!d.calls.contains(&"compute_shared"));
    }

    #[tokio::test]
    async fn touch_requirement_mismatch() {
        let mut d = MockDevice::default();
        let mut r = ();

        let secret = [0x07u8; 16];
        let k = |touch| KeyParams::new(ProtocolParams::V1, DEFAULT_DOMAIN, &secret, touch).unwrap();

        let mut h = Handshake::new(&mut d, &mut r);
        h.probe_mode().await.unwrap();
        h.verify_app(&image(), None).await.unwrap();
        h.exchange_public_keys(&k(false)).await.unwrap();

        // Same domain and user secret, touch requirement flipped
        let e = h.compute_secrets(&k(true)).await;
        assert!(matches!(e, Err(Error::ParamsMismatch)), "{e:?}");
        assert_eq!(h.state(), HandshakeState::PubKeyExchanged);

        // Matching parameters still complete the handshake
        h.compute_secrets(&k(false)).await.unwrap();
        assert_eq!(h.verify().unwrap(), Verdict::Match);

        assert_eq!(
            d.calls.iter().filter(|c| **c == "compute_shared").count(),
            1
        );
    }

    #[tokio::test]
    async fn secret_mismatch() {
        let mut d = MockDevice {
            corrupt: true,
            ..Default::default()
        };
        let mut r = ();

        let mut h = Handshake::new(&mut d, &mut r);
        let v = h.run(&image(), None, &key(true)).await.unwrap();

        assert_eq!(v, Verdict::Mismatch);
        assert_eq!(h.state(), HandshakeState::Failed);
    }

    #[tokio::test]
    async fn touch_prompts() {
        let mut d = MockDevice::default();
        let mut r = RunReport::default();

        let mut h = Handshake::new(&mut d, &mut r);
        h.run(&image(), None, &key(true)).await.unwrap();

        assert_eq!(r.touch_prompts, &[Phase::PublicKey, Phase::SharedSecret]);
        assert_eq!(r.phases.len(), 4);
    }

    #[tokio::test]
    async fn touch_timeout() {
        let mut d = MockDevice {
            delay: Some(Duration::from_secs(5)),
            ..Default::default()
        };
        let mut r = ();

        let mut h =
            Handshake::new(&mut d, &mut r).with_touch_timeout(Some(Duration::from_millis(50)));

        let e = h.run(&image(), None, &key(true)).await;
        assert!(matches!(e, Err(Error::UserTimeout)));
        assert_eq!(h.state(), HandshakeState::Failed);
    }
}
