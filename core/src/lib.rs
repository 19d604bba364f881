// Copyright (c) 2022-2023 The MobileCoin Foundation

//! TKey x25519 device core
//!
//! This provides a software model of a TKey device, the firmware application
//! loader and the x25519 application, for use by simulators and tests.
//!
//! Interactions with the [Engine][engine::Engine] are performed via
//! [Event][engine::Event]s and [Output][engine::Output]s, see [tkey_x25519_proto]
//! for frame objects and wire encodings.
//!
//! ## Operations
//!
//! A freshly connected device runs the firmware, identifying itself as `tk1 mkdf`.
//!
//! 1. The host loads an application by issuing
//!    [`LoadAppReq`][tkey_x25519_proto::fw::LoadAppReq] followed by
//!    [`LoadAppDataReq`][tkey_x25519_proto::fw::LoadAppDataReq] chunks,
//!    the final chunk returns the BLAKE2s digest of the loaded image.
//! 2. The firmware derives the compound device identifier (CDI) from the
//!    unique device secret, the image digest and an optional user supplied secret,
//!    then starts the application.
//! 3. The x25519 application derives a per-request X25519 secret from the domain,
//!    user secret, touch flag and CDI, and serves
//!    [`GetPubkeyReq`][tkey_x25519_proto::app::GetPubkeyReq] and
//!    [`DoEcdhReq`][tkey_x25519_proto::app::DoEcdhReq] requests.
//!

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub use tkey_x25519_proto::{self as proto};

pub mod engine;
