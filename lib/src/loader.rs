// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Application image loading

use std::path::Path;

use blake2::{Blake2s256, Digest};
use log::{debug, info};
use zeroize::{Zeroize, ZeroizeOnDrop};

use tkey_x25519_proto::fw::MAX_APP_SIZE;

use crate::{Device, Error};

/// Device application image, with precomputed BLAKE2s digest
#[derive(Clone, PartialEq)]
pub struct AppImage {
    data: Vec<u8>,
    digest: [u8; 32],
}

impl AppImage {
    /// Create an application image, checking size against firmware limits
    pub fn new(data: Vec<u8>) -> Result<Self, Error> {
        if data.is_empty() {
            return Err(Error::EmptyImage);
        }
        if data.len() > MAX_APP_SIZE {
            return Err(Error::ImageTooLarge(data.len()));
        }

        let digest = Blake2s256::digest(&data).into();

        Ok(Self { data, digest })
    }

    /// Read an application image from a file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let data = tokio::fs::read(path.as_ref()).await?;

        debug!(
            "Read {} byte app image from {}",
            data.len(),
            path.as_ref().display()
        );

        Self::new(data)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// BLAKE2s-256 digest of the image, as reported by the firmware on load
    pub fn digest(&self) -> &[u8; 32] {
        &self.digest
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl core::fmt::Debug for AppImage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AppImage")
            .field("len", &self.data.len())
            .field("digest", &hex::encode(self.digest))
            .finish()
    }
}

/// User supplied secret, mixed into the device CDI on application load
#[derive(Clone, PartialEq, Zeroize, ZeroizeOnDrop)]
pub struct Uss([u8; 32]);

impl Uss {
    /// Derive a USS from a phrase
    pub fn from_phrase(phrase: &str) -> Self {
        Self(Blake2s256::digest(phrase.as_bytes()).into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl From<[u8; 32]> for Uss {
    fn from(b: [u8; 32]) -> Self {
        Self(b)
    }
}

impl core::fmt::Debug for Uss {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Uss([redacted])")
    }
}

/// Load an application onto a device in firmware mode,
/// checking the digest returned by the firmware matches the image
pub async fn load_application<D: Device + ?Sized>(
    d: &mut D,
    image: &AppImage,
    uss: Option<&Uss>,
) -> Result<(), Error> {
    info!(
        "Loading app ({} bytes{})",
        image.len(),
        match uss.is_some() {
            true => ", with USS",
            false => "",
        }
    );

    let digest = d.load_app(image.data(), uss).await?;

    if &digest != image.digest() {
        debug!(
            "Digest mismatch (device: {}, image: {})",
            hex::encode(digest),
            hex::encode(image.digest())
        );
        return Err(Error::DigestMismatch);
    }

    debug!("App loaded, digest: {}", hex::encode(digest));

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn image_limits() {
        assert!(matches!(AppImage::new(vec![]), Err(Error::EmptyImage)));
        assert!(matches!(
            AppImage::new(vec![0u8; MAX_APP_SIZE + 1]),
            Err(Error::ImageTooLarge(_))
        ));
        assert!(AppImage::new(vec![0u8; MAX_APP_SIZE]).is_ok());
    }

    #[test]
    fn uss_from_phrase() {
        let a = Uss::from_phrase("correct horse");
        let b = Uss::from_phrase("correct horse");
        let c = Uss::from_phrase("battery staple");

        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
