// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Device key derivation

use blake2::{Blake2s256, Digest};
use zeroize::Zeroizing;

use tkey_x25519_proto::app::KeyArgs;

/// BLAKE2s-256 over the concatenation of `parts`
pub fn blake2s(parts: &[&[u8]]) -> [u8; 32] {
    let mut h = Blake2s256::new();
    for p in parts {
        h.update(p);
    }

    let mut out = [0u8; 32];
    out.copy_from_slice(&h.finalize());
    out
}

/// Compound device identifier, bound to the device secret, the loaded
/// application and the (optional) user supplied secret
pub fn derive_cdi(uds: &[u8; 32], digest: &[u8; 32], uss: Option<&[u8; 32]>) -> [u8; 32] {
    match uss {
        Some(uss) => blake2s(&[uds, digest, uss]),
        None => blake2s(&[uds, digest]),
    }
}

/// Application X25519 secret for the provided key arguments
pub fn derive_secret(args: &KeyArgs, cdi: &[u8; 32]) -> Zeroizing<[u8; 32]> {
    let touch = [args.require_touch as u8];
    Zeroizing::new(blake2s(&[args.domain, args.user_secret, &touch, cdi]))
}

#[cfg(test)]
mod test {
    use super::*;

    const CDI: [u8; 32] = [0xcd; 32];

    #[test]
    fn touch_flag_changes_secret() {
        let args = KeyArgs {
            domain: &[0x61; 78],
            user_secret: &[0x01; 16],
            require_touch: false,
        };

        let a = derive_secret(&args, &CDI);
        let b = derive_secret(
            &KeyArgs {
                require_touch: true,
                ..args
            },
            &CDI,
        );

        assert_ne!(*a, *b);
    }

    #[test]
    fn uss_changes_cdi() {
        let (uds, digest) = ([0x11; 32], [0x22; 32]);

        let a = derive_cdi(&uds, &digest, None);
        let b = derive_cdi(&uds, &digest, Some(&[0u8; 32]));

        assert_ne!(a, b);
        assert_eq!(a, derive_cdi(&uds, &digest, None));
    }
}
