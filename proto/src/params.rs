// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Protocol parameters for key derivation requests
//!
//! Device applications differ in the user secret length they expect, and the
//! domain length is bounded by what remains of the 127 byte argument space.
//! These are treated as protocol version parameters rather than constants.

use static_assertions::const_assert;
use strum::{Display, EnumString, EnumVariantNames};

use crate::{ProtoError, MAX_PAYLOAD_LEN, X25519_LEN};

/// Domain length for [ProtocolParams::V1]
pub const V1_DOMAIN_LEN: usize = 78;

/// User secret length for [ProtocolParams::V1]
pub const V1_USER_SECRET_LEN: usize = 16;

/// Argument space available after the command code
const ARGS_LEN: usize = MAX_PAYLOAD_LEN - 1;

// domain + user secret + touch flag + peer key must fit a single `DoEcdh` frame
const_assert!(V1_DOMAIN_LEN + V1_USER_SECRET_LEN + 1 + X25519_LEN <= ARGS_LEN);

/// Key derivation parameters (domain and user secret lengths)
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct ProtocolParams {
    domain_len: usize,
    user_secret_len: usize,
}

impl ProtocolParams {
    /// Parameters used by the x25519 app v1 (78 byte domain, 16 byte user secret)
    pub const V1: Self = Self {
        domain_len: V1_DOMAIN_LEN,
        user_secret_len: V1_USER_SECRET_LEN,
    };

    /// Parameters for apps expecting a 32 byte user secret
    pub const WIDE_SECRET: Self = Self {
        domain_len: ARGS_LEN - 32 - 1 - X25519_LEN,
        user_secret_len: 32,
    };

    /// Create new protocol parameters, checking requests fit a single frame
    pub const fn new(domain_len: usize, user_secret_len: usize) -> Result<Self, ProtoError> {
        if domain_len == 0 || user_secret_len == 0 {
            return Err(ProtoError::InvalidParams);
        }

        if domain_len + user_secret_len + 1 + X25519_LEN > ARGS_LEN {
            return Err(ProtoError::InvalidParams);
        }

        Ok(Self {
            domain_len,
            user_secret_len,
        })
    }

    /// Domain length in bytes
    pub const fn domain_len(&self) -> usize {
        self.domain_len
    }

    /// User secret length in bytes
    pub const fn user_secret_len(&self) -> usize {
        self.user_secret_len
    }

    /// Length of the key derivation arguments (domain, user secret, touch flag)
    pub const fn key_args_len(&self) -> usize {
        self.domain_len + self.user_secret_len + 1
    }
}

impl Default for ProtocolParams {
    fn default() -> Self {
        Self::V1
    }
}

/// Named protocol versions
#[derive(Copy, Clone, PartialEq, Eq, Debug, Display, EnumString, EnumVariantNames)]
#[strum(serialize_all = "kebab-case")]
pub enum ProtocolVersion {
    /// 78 byte domain, 16 byte user secret
    V1,
    /// 62 byte domain, 32 byte user secret
    WideSecret,
}

impl ProtocolVersion {
    /// Fetch parameters for a protocol version
    pub const fn params(&self) -> ProtocolParams {
        match self {
            ProtocolVersion::V1 => ProtocolParams::V1,
            ProtocolVersion::WideSecret => ProtocolParams::WIDE_SECRET,
        }
    }
}

#[cfg(test)]
mod test {
    use core::str::FromStr;

    use super::*;

    #[test]
    fn v1_fills_frame() {
        let p = ProtocolParams::V1;
        assert_eq!(p.key_args_len() + X25519_LEN, ARGS_LEN);
        assert_eq!(ProtocolParams::new(78, 16), Ok(p));
    }

    #[test]
    fn wide_secret_fills_frame() {
        let p = ProtocolParams::WIDE_SECRET;
        assert_eq!(p.domain_len(), 62);
        assert_eq!(p.key_args_len() + X25519_LEN, ARGS_LEN);
    }

    #[test]
    fn oversized_params_rejected() {
        assert_eq!(ProtocolParams::new(78, 32), Err(ProtoError::InvalidParams));
        assert_eq!(ProtocolParams::new(0, 16), Err(ProtoError::InvalidParams));
        assert!(ProtocolParams::new(10, 0).is_err());
    }

    #[test]
    fn version_names() {
        assert_eq!(ProtocolVersion::from_str("v1"), Ok(ProtocolVersion::V1));
        assert_eq!(
            ProtocolVersion::from_str("wide-secret"),
            Ok(ProtocolVersion::WideSecret)
        );
        assert_eq!(ProtocolVersion::WideSecret.params(), ProtocolParams::WIDE_SECRET);
    }
}
