// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Key derivation arguments for device key operations

use rand_core::{OsRng, RngCore};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use tkey_x25519_proto::{app::KeyArgs, ProtoError, ProtocolParams};

use crate::Error;

/// Default key derivation domain
pub const DEFAULT_DOMAIN: &str = "age...";

/// Device key parameters, the `(domain, user_secret, require_touch)` triple
/// used to derive the device X25519 secret.
///
/// The same [KeyParams] must be used for both the public key and the shared
/// secret requests for the resulting keys to correspond.
#[derive(Clone)]
pub struct KeyParams {
    params: ProtocolParams,
    domain: Vec<u8>,
    user_secret: Zeroizing<Vec<u8>>,
    require_touch: bool,
}

impl KeyParams {
    /// Create key parameters with the provided user secret,
    /// the domain is zero-padded to the protocol domain length
    pub fn new(
        params: ProtocolParams,
        domain: &str,
        user_secret: &[u8],
        require_touch: bool,
    ) -> Result<Self, Error> {
        if domain.len() > params.domain_len() {
            return Err(Error::DomainTooLong(domain.len(), params.domain_len()));
        }

        if user_secret.len() != params.user_secret_len() {
            return Err(Error::Proto(ProtoError::InvalidParams));
        }

        let mut d = vec![0u8; params.domain_len()];
        d[..domain.len()].copy_from_slice(domain.as_bytes());

        Ok(Self {
            params,
            domain: d,
            user_secret: Zeroizing::new(user_secret.to_vec()),
            require_touch,
        })
    }

    /// Create key parameters with a fresh random user secret
    pub fn random(params: ProtocolParams, domain: &str, require_touch: bool) -> Result<Self, Error> {
        let mut s = Zeroizing::new(vec![0u8; params.user_secret_len()]);
        OsRng.fill_bytes(&mut s);

        Self::new(params, domain, &s, require_touch)
    }

    /// Fetch protocol parameters
    pub fn params(&self) -> &ProtocolParams {
        &self.params
    }

    /// Fetch the padded domain
    pub fn domain(&self) -> &[u8] {
        &self.domain
    }

    /// Check whether device operations require a touch
    pub fn require_touch(&self) -> bool {
        self.require_touch
    }

    /// Borrow as protocol [KeyArgs] for request encoding
    pub fn args(&self) -> KeyArgs<'_> {
        KeyArgs {
            domain: &self.domain,
            user_secret: &self.user_secret,
            require_touch: self.require_touch,
        }
    }
}

/// Key parameters match where all fields are equal, user secrets compared in constant time
impl PartialEq for KeyParams {
    fn eq(&self, other: &Self) -> bool {
        let secret: bool = self.user_secret.as_slice().ct_eq(other.user_secret.as_slice()).into();

        secret
            && self.params == other.params
            && self.domain == other.domain
            && self.require_touch == other.require_touch
    }
}

impl core::fmt::Debug for KeyParams {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("KeyParams")
            .field("params", &self.params)
            .field("domain", &String::from_utf8_lossy(&self.domain).trim_end_matches('\0'))
            .field("user_secret", &"[redacted]")
            .field("require_touch", &self.require_touch)
            .finish()
    }
}
