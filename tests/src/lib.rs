// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Tests for TKey x25519 integration.
//!
//! Generic over [tkey_x25519::Device] for reuse against simulated and physical devices.
//!

use rand::{rngs::StdRng, RngCore, SeedableRng};

use tkey_x25519::{
    handshake::{Handshake, HandshakeState},
    loader::AppImage,
    Device,
};

pub mod handshake;

pub mod keys;

/// Deterministic application image for tests
pub fn test_image(len: usize) -> AppImage {
    let mut b = vec![0u8; len];
    StdRng::seed_from_u64(len as u64).fill_bytes(&mut b);

    AppImage::new(b).expect("invalid test image length")
}

/// Load the application where required and check the expected app is running
pub async fn ensure_app<D: Device + ?Sized>(d: &mut D, image: &AppImage) -> anyhow::Result<()> {
    let mut r = ();
    let mut h = Handshake::new(d, &mut r);

    h.probe_mode().await?;
    h.verify_app(image, None).await?;

    assert_eq!(h.state(), HandshakeState::AppVerified);

    Ok(())
}
