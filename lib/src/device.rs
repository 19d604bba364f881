// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Device capability abstraction, implemented by [DeviceHandle][crate::DeviceHandle]
//! for real transports and by test doubles

use async_trait::async_trait;

use tkey_x25519_proto::{DeviceIdentity, X25519_LEN};

use crate::{key::KeyParams, loader::Uss, Error};

/// Operations supported by a TKey running the firmware or x25519 application
#[async_trait]
pub trait Device: Send {
    /// Fetch the firmware name and version
    async fn firmware_identity(&mut self) -> Result<DeviceIdentity, Error>;

    /// Fetch the application name and version
    async fn app_identity(&mut self) -> Result<DeviceIdentity, Error>;

    /// Load an application image, returning the firmware computed digest
    async fn load_app(&mut self, image: &[u8], uss: Option<&Uss>) -> Result<[u8; 32], Error>;

    /// Fetch the device public key for the provided key parameters
    async fn get_public_key(&mut self, key: &KeyParams) -> Result<[u8; X25519_LEN], Error>;

    /// Compute the shared secret between the device key and `peer`
    async fn compute_shared(
        &mut self,
        key: &KeyParams,
        peer: &[u8; X25519_LEN],
    ) -> Result<[u8; X25519_LEN], Error>;

    /// Release the device
    async fn close(&mut self) -> Result<(), Error>;
}

#[async_trait]
impl<D: Device + ?Sized> Device for Box<D> {
    async fn firmware_identity(&mut self) -> Result<DeviceIdentity, Error> {
        (**self).firmware_identity().await
    }

    async fn app_identity(&mut self) -> Result<DeviceIdentity, Error> {
        (**self).app_identity().await
    }

    async fn load_app(&mut self, image: &[u8], uss: Option<&Uss>) -> Result<[u8; 32], Error> {
        (**self).load_app(image, uss).await
    }

    async fn get_public_key(&mut self, key: &KeyParams) -> Result<[u8; X25519_LEN], Error> {
        (**self).get_public_key(key).await
    }

    async fn compute_shared(
        &mut self,
        key: &KeyParams,
        peer: &[u8; X25519_LEN],
    ) -> Result<[u8; X25519_LEN], Error> {
        (**self).compute_shared(key, peer).await
    }

    async fn close(&mut self) -> Result<(), Error> {
        (**self).close().await
    }
}
