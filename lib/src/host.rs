// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Host side X25519 operations

use rand_core::OsRng;
use subtle::{Choice, ConstantTimeEq};
use x25519_dalek::{EphemeralSecret, PublicKey};
use zeroize::Zeroizing;

use tkey_x25519_proto::X25519_LEN;

use crate::Error;

/// Ephemeral host key pair, consumed on computing a shared secret
pub struct HostKeyPair {
    secret: EphemeralSecret,
    public: PublicKey,
}

impl HostKeyPair {
    /// Generate a new key pair using the OS random number generator
    pub fn generate() -> Self {
        let secret = EphemeralSecret::random_from_rng(OsRng);
        let public = PublicKey::from(&secret);

        Self { secret, public }
    }

    /// Fetch the host public key
    pub fn public_key(&self) -> [u8; X25519_LEN] {
        self.public.to_bytes()
    }

    /// Compute the shared secret with `their` public key,
    /// rejecting low order points
    pub fn compute_shared(self, their: &[u8; X25519_LEN]) -> Result<SharedSecret, Error> {
        let s = self.secret.diffie_hellman(&PublicKey::from(*their));

        if !s.was_contributory() {
            return Err(Error::InvalidKey);
        }

        Ok(SharedSecret::from(s.to_bytes()))
    }
}

impl core::fmt::Debug for HostKeyPair {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "HostKeyPair({})", hex::encode(self.public.as_bytes()))
    }
}

/// Generate an ephemeral host key pair
pub fn generate_key_pair() -> HostKeyPair {
    HostKeyPair::generate()
}

/// X25519 shared secret, cleared on drop and compared in constant time
#[derive(Clone)]
pub struct SharedSecret(Zeroizing<[u8; X25519_LEN]>);

impl ConstantTimeEq for SharedSecret {
    fn ct_eq(&self, other: &Self) -> Choice {
        self.0.as_slice().ct_eq(other.0.as_slice())
    }
}

impl PartialEq for SharedSecret {
    fn eq(&self, other: &Self) -> bool {
        self.ct_eq(other).into()
    }
}

impl Eq for SharedSecret {}

impl SharedSecret {
    pub fn as_bytes(&self) -> &[u8; X25519_LEN] {
        &self.0
    }
}

impl From<[u8; X25519_LEN]> for SharedSecret {
    fn from(b: [u8; X25519_LEN]) -> Self {
        Self(Zeroizing::new(b))
    }
}

impl core::fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "SharedSecret([redacted])")
    }
}

#[cfg(test)]
mod test {
    use x25519_dalek::{x25519, X25519_BASEPOINT_BYTES};

    use super::*;

    #[test]
    fn shared_matches_peer() {
        let peer_secret = [0x42u8; 32];
        let peer_public = x25519(peer_secret, X25519_BASEPOINT_BYTES);

        let k = generate_key_pair();
        let host_public = k.public_key();

        let s = k.compute_shared(&peer_public).unwrap();
        assert_eq!(s.as_bytes(), &x25519(peer_secret, host_public));
    }

    #[test]
    fn low_order_rejected() {
        let k = generate_key_pair();
        assert!(matches!(
            k.compute_shared(&[0u8; 32]),
            Err(Error::InvalidKey)
        ));

        // Order 4 point (u = 1)
        let mut one = [0u8; 32];
        one[0] = 1;

        let k = generate_key_pair();
        assert!(matches!(k.compute_shared(&one), Err(Error::InvalidKey)));
    }

    #[test]
    fn secret_equality() {
        let a = SharedSecret::from([0x11; 32]);
        let mut b = [0x11; 32];

        assert_eq!(a, SharedSecret::from(b));
        assert!(bool::from(a.ct_eq(&SharedSecret::from(b))));

        b[31] ^= 0x01;
        assert_ne!(a, SharedSecret::from(b));
        assert!(!bool::from(a.ct_eq(&SharedSecret::from(b))));
    }

    #[test]
    fn secret_debug_redacted() {
        let s = SharedSecret::from([0xab; 32]);
        assert!(!format!("{s:?}").contains("ab"));
    }
}
