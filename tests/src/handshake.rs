// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Full handshake tests

use std::future::Future;

use log::debug;

use tkey_x25519::{
    handshake::{Handshake, HandshakeState, Phase, Verdict},
    ident::{is_expected_application, DeviceMode},
    key::{KeyParams, DEFAULT_DOMAIN},
    loader::{AppImage, Uss},
    report::RunReport,
    Device,
};
use tkey_x25519_proto::ProtocolParams;

/// Run a full handshake, calling `touch` alongside the shared secret computation
/// where touch is required.
///
/// `touch` is started with the request and should wait for the device to ask
/// for a touch before providing one.
pub async fn test<D, F>(
    d: &mut D,
    touch: impl Fn() -> F,
    image: &AppImage,
    uss: Option<&Uss>,
    require_touch: bool,
) -> anyhow::Result<RunReport>
where
    D: Device + ?Sized,
    F: Future<Output = ()>,
{
    let mut report = RunReport::default();
    let key = KeyParams::random(ProtocolParams::V1, DEFAULT_DOMAIN, require_touch)?;

    let mut h = Handshake::new(d, &mut report);

    // Determine mode and load app
    let mode = h.probe_mode().await?;
    debug!("Device mode: {}", mode);

    let ident = h.verify_app(image, uss).await?;
    assert!(is_expected_application(&ident), "unexpected app {ident}");
    assert_eq!(h.mode(), DeviceMode::Application);

    // Exchange public keys
    let device_public = h.exchange_public_keys(&key).await?;
    assert_ne!(device_public, [0u8; 32], "device returned zero public key");

    // Compute shared secrets, touching where required
    match require_touch {
        true => {
            let (r, _) = tokio::join!(h.compute_secrets(&key), touch());
            r?;
        }
        false => h.compute_secrets(&key).await?,
    }

    // Check secrets match
    let v = h.verify()?;
    assert_eq!(v, Verdict::Match, "shared secret mismatch");
    assert_eq!(h.state(), HandshakeState::Verified);

    // Check report contents
    assert_eq!(
        report.touch_prompts.contains(&Phase::SharedSecret),
        require_touch
    );
    assert!(report.device_public.is_some());
    assert_eq!(report.states.last(), Some(&HandshakeState::Verified));

    Ok(report)
}
