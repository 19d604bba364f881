// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Verification run entry points
//!
//! A run owns the device exclusively for its duration, and releases it
//! exactly once on every exit path (success, failure or signal).

use std::{fmt::Display, future::Future, time::Duration};

use log::{debug, info, warn};

use tkey_x25519_proto::ProtocolParams;

use crate::{
    handshake::{Handshake, Verdict},
    key::{KeyParams, DEFAULT_DOMAIN},
    loader::{AppImage, Uss},
    report::Reporter,
    Device, Error,
};

#[cfg(any(feature = "transport_serial", feature = "transport_tcp"))]
use crate::{transport::GenericTransport, Connect, DeviceInfo, GenericHandle, TkeyProvider};

/// Verification run outcome
#[derive(Debug)]
pub enum Outcome {
    /// Host and device shared secrets match
    Success,
    /// Host and device shared secrets differ
    SecretMismatch,
    /// Timeout waiting for a touch
    TouchTimeout,
    /// Device or transport failure
    DeviceError(Error),
    /// Aborted by SIGINT / SIGTERM
    AbortedBySignal,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }

    /// Process exit code for this outcome
    pub fn exit_code(&self) -> i32 {
        match self {
            Outcome::Success => 0,
            _ => 1,
        }
    }
}

impl From<Result<Verdict, Error>> for Outcome {
    fn from(r: Result<Verdict, Error>) -> Self {
        match r {
            Ok(Verdict::Match) => Outcome::Success,
            Ok(Verdict::Mismatch) => Outcome::SecretMismatch,
            Err(Error::UserTimeout) => Outcome::TouchTimeout,
            Err(e) => Outcome::DeviceError(e),
        }
    }
}

impl Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Success => write!(f, "OK 👍"),
            Outcome::SecretMismatch => write!(f, "Nope 👎"),
            Outcome::TouchTimeout => write!(f, "Nope 👎 (timeout waiting for touch)"),
            Outcome::DeviceError(e) => write!(f, "Nope 👎 ({e})"),
            Outcome::AbortedBySignal => write!(f, "Nope 👎 (aborted)"),
        }
    }
}

/// Verification run configuration
#[derive(Clone, Debug)]
pub struct HandshakeConfig {
    /// Key derivation protocol parameters
    pub params: ProtocolParams,
    /// Key derivation domain
    pub domain: String,
    /// Require a touch for device key operations
    pub require_touch: bool,
    /// Timeout for touch gated operations (`None` waits indefinitely)
    pub touch_timeout: Option<Duration>,
    /// Timeout for ordinary requests
    pub request_timeout: Duration,
    /// User supplied secret for application loading
    pub uss: Option<Uss>,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            params: ProtocolParams::V1,
            domain: DEFAULT_DOMAIN.to_string(),
            require_touch: true,
            touch_timeout: None,
            request_timeout: Duration::from_secs(2),
            uss: None,
        }
    }
}

/// Exclusive device session, closing the device exactly once
pub struct Session<D: Device> {
    d: Option<D>,
}

impl<D: Device> Session<D> {
    pub fn new(d: D) -> Self {
        Self { d: Some(d) }
    }

    /// Access the device, `None` once the session is closed
    pub fn device(&mut self) -> Option<&mut D> {
        self.d.as_mut()
    }

    pub fn is_closed(&self) -> bool {
        self.d.is_none()
    }

    /// Close the session, subsequent calls are no-ops
    pub async fn close(&mut self) -> Result<(), Error> {
        match self.d.take() {
            Some(mut d) => {
                debug!("Closing device");
                d.close().await
            }
            None => Ok(()),
        }
    }
}

impl<D: Device> Drop for Session<D> {
    fn drop(&mut self) {
        if self.d.is_some() {
            warn!("Session dropped without close");
        }
    }
}

/// Run verification on a connected device until complete or `shutdown` resolves,
/// then close the device
pub async fn run_with<D: Device, R: Reporter + ?Sized>(
    device: D,
    image: &AppImage,
    cfg: &HandshakeConfig,
    reporter: &mut R,
    shutdown: impl Future<Output = ()>,
) -> Outcome {
    let mut s = Session::new(device);

    let key = KeyParams::random(cfg.params, &cfg.domain, cfg.require_touch);

    let outcome = match (key, s.device()) {
        (Ok(key), Some(d)) => {
            let mut h = Handshake::new(d, &mut *reporter).with_touch_timeout(cfg.touch_timeout);

            tokio::select! {
                r = h.run(image, cfg.uss.as_ref(), &key) => Outcome::from(r),
                _ = shutdown => {
                    info!("Received signal, closing device");
                    Outcome::AbortedBySignal
                }
            }
        }
        (Err(e), _) => Outcome::DeviceError(e),
        (_, None) => Outcome::DeviceError(Error::Closed),
    };

    if let Err(e) = s.close().await {
        warn!("Failed to close device: {e}");
    }

    reporter.outcome(&outcome);

    outcome
}

/// Connect to the described device and run verification,
/// aborting on SIGINT / SIGTERM
#[cfg(any(feature = "transport_serial", feature = "transport_tcp"))]
pub async fn run<R: Reporter + ?Sized>(
    info: &DeviceInfo,
    image: &AppImage,
    cfg: &HandshakeConfig,
    reporter: &mut R,
) -> Outcome {
    info!("Connecting to device {info}...");

    let p = TkeyProvider::new();
    let d: GenericHandle = match Connect::<GenericTransport>::connect(&p, info).await {
        Ok(d) => d.with_request_timeout(cfg.request_timeout),
        Err(e) => {
            let outcome = Outcome::DeviceError(e);
            reporter.outcome(&outcome);
            return outcome;
        }
    };

    run_with(d, image, cfg, reporter, shutdown_signal()).await
}

/// Resolves on receipt of SIGINT (Ctrl-C) or SIGTERM
pub async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut term = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                warn!("Failed to register SIGTERM handler: {e}");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => (),
            _ = term.recv() => (),
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
