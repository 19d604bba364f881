// Copyright (c) 2022-2023 The MobileCoin Foundation

/// Encoding helper for fixed size arrays
pub(crate) mod arr {
    use crate::ProtoError;

    pub fn enc<const N: usize>(d: &[u8; N], buff: &mut [u8]) -> Result<usize, ProtoError> {
        if buff.len() < d.len() {
            return Err(ProtoError::InvalidLength);
        }

        buff[..d.len()].copy_from_slice(&d[..]);

        Ok(d.len())
    }

    pub fn dec<const N: usize>(buff: &[u8]) -> Result<([u8; N], usize), ProtoError> {
        if buff.len() < N {
            return Err(ProtoError::InvalidLength);
        }

        let mut d = [0u8; N];
        d.copy_from_slice(&buff[..N]);

        Ok((d, N))
    }
}

/// Encoding helper for response status bytes
pub(crate) mod status {
    use crate::{ProtoError, Status};

    pub fn enc(s: Status, buff: &mut [u8]) -> Result<usize, ProtoError> {
        if buff.is_empty() {
            return Err(ProtoError::InvalidLength);
        }

        buff[0] = s as u8;

        Ok(1)
    }

    pub fn dec(buff: &[u8]) -> Result<(Status, usize), ProtoError> {
        if buff.is_empty() {
            return Err(ProtoError::InvalidLength);
        }

        Ok((Status::from(buff[0]), 1))
    }
}
