// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Device key derivation tests
//!
//! Checks device keys are deterministic for a given domain, user secret and
//! touch flag, that each of these is bound into the derived key, and that
//! device shared secrets match host computations.

use std::future::Future;

use log::debug;

use tkey_x25519::{host::HostKeyPair, key::KeyParams, loader::AppImage, Device};
use tkey_x25519_proto::ProtocolParams;

use crate::ensure_app;

/// Run key derivation tests, calling `touch` alongside touch gated requests
pub async fn test<D, F>(d: &mut D, touch: impl Fn() -> F, image: &AppImage) -> anyhow::Result<()>
where
    D: Device + ?Sized,
    F: Future<Output = ()>,
{
    ensure_app(&mut *d, image).await?;

    let p = ProtocolParams::V1;
    let secret: [u8; 16] = rand::random();

    let k1 = KeyParams::new(p, "test-domain", &secret, false)?;

    // Derivation is deterministic
    let a = d.get_public_key(&k1).await?;
    let a2 = d.get_public_key(&k1).await?;
    assert_eq!(a, a2, "public key derivation not deterministic");

    // Fresh user secrets produce fresh keys
    let k2 = KeyParams::random(p, "test-domain", false)?;
    let b = d.get_public_key(&k2).await?;
    assert_ne!(a, b, "user secret not bound to public key");

    // Domain is bound to the key
    let k3 = KeyParams::new(p, "other-domain", &secret, false)?;
    let c = d.get_public_key(&k3).await?;
    assert_ne!(a, c, "domain not bound to public key");

    // Touch flag is bound to the key
    let kt = KeyParams::new(p, "test-domain", &secret, true)?;
    let t = d.get_public_key(&kt).await?;
    assert_ne!(a, t, "touch flag not bound to public key");

    for k in [a, b, c, t] {
        debug!("Device public key: {}", hex::encode(k));
    }

    // Shared secret without touch matches host computation
    let host = HostKeyPair::generate();
    let host_public = host.public_key();

    let s = d.compute_shared(&k1, &host_public).await?;
    let expected = host.compute_shared(&a)?;
    assert_eq!(&s, expected.as_bytes(), "shared secret mismatch (no touch)");

    // Shared secret with touch matches host computation
    let host = HostKeyPair::generate();
    let host_public = host.public_key();

    let (s, _) = tokio::join!(d.compute_shared(&kt, &host_public), touch());
    let expected = host.compute_shared(&t)?;
    assert_eq!(&s?, expected.as_bytes(), "shared secret mismatch (touch)");

    Ok(())
}
