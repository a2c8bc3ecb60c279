//! Binary framing for wrapped keys
//!
//! A wrapped key is persisted as a single length-prefixed record:
//!
//! ```text
//! +----------------+----------------------------+
//! | length: u32 BE | wrapped key (length bytes) |
//! +----------------+----------------------------+
//! ```
//!
//! Readers consume exactly `4 + length` bytes and never return a short key.

use crate::{envelope::WrappedKey, CryptoError, Result};
use bytes::{BufMut, BytesMut};
use std::io::Read;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Size of the length prefix in bytes
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Upper bound on a declared key length; anything larger is not a wrapped key
pub const MAX_WRAPPED_KEY_LEN: usize = 64 * 1024;

/// Frame a wrapped key for storage
///
/// Keys that [`deserialize`] would refuse (empty, or longer than
/// [`MAX_WRAPPED_KEY_LEN`]) are rejected here instead of being written.
pub fn serialize(key: &WrappedKey) -> Result<Vec<u8>> {
    let body = key.as_bytes();
    check_length(body.len())?;
    let mut buf = BytesMut::with_capacity(LENGTH_PREFIX_SIZE + body.len());
    buf.put_u32(body.len() as u32);
    buf.put_slice(body);
    Ok(buf.to_vec())
}

/// Validate a wrapped key length against what the record format accepts
pub fn check_length(len: usize) -> Result<()> {
    if len == 0 {
        return Err(CryptoError::CorruptEnvelope("wrapped key is empty".into()));
    }
    if len > MAX_WRAPPED_KEY_LEN {
        return Err(CryptoError::CorruptEnvelope(format!(
            "wrapped key has {} bytes, maximum is {}",
            len, MAX_WRAPPED_KEY_LEN
        )));
    }
    Ok(())
}

/// Read one framed wrapped key from `reader`
pub fn deserialize<R: Read>(mut reader: R) -> Result<WrappedKey> {
    let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
    let got = read_full(&mut reader, &mut prefix)?;
    if got < LENGTH_PREFIX_SIZE {
        return Err(truncated(LENGTH_PREFIX_SIZE, got));
    }
    let len = declared_length(prefix)?;

    let mut body = Vec::with_capacity(len);
    reader.take(len as u64).read_to_end(&mut body)?;
    if body.len() < len {
        return Err(truncated(len, body.len()));
    }
    Ok(WrappedKey::new(body))
}

/// Async variant of [`deserialize`] for object streams
pub async fn read_framed_async<R: AsyncRead + Unpin>(reader: &mut R) -> Result<WrappedKey> {
    let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
    let mut got = 0;
    while got < LENGTH_PREFIX_SIZE {
        let n = reader.read(&mut prefix[got..]).await?;
        if n == 0 {
            return Err(truncated(LENGTH_PREFIX_SIZE, got));
        }
        got += n;
    }
    let len = declared_length(prefix)?;

    let mut body = Vec::with_capacity(len);
    reader.take(len as u64).read_to_end(&mut body).await?;
    if body.len() < len {
        return Err(truncated(len, body.len()));
    }
    Ok(WrappedKey::new(body))
}

fn declared_length(prefix: [u8; LENGTH_PREFIX_SIZE]) -> Result<usize> {
    let len = u32::from_be_bytes(prefix) as usize;
    if len == 0 {
        return Err(CryptoError::CorruptEnvelope(
            "wrapped key record declares zero length".into(),
        ));
    }
    if len > MAX_WRAPPED_KEY_LEN {
        return Err(CryptoError::CorruptEnvelope(format!(
            "wrapped key record declares {} bytes, maximum is {}",
            len, MAX_WRAPPED_KEY_LEN
        )));
    }
    Ok(len)
}

/// Fill `buf` as far as the reader allows, returning how much was read
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut got = 0;
    while got < buf.len() {
        match reader.read(&mut buf[got..]) {
            Ok(0) => break,
            Ok(n) => got += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(got)
}

fn truncated(expected: usize, available: usize) -> CryptoError {
    tracing::error!(expected, available, "wrapped key record is truncated");
    CryptoError::TruncatedEnvelope {
        expected,
        available,
    }
}
