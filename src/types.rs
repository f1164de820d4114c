//! Tree geometry and key/value primitives.
//!
//! `ORDER`, `KMAX` and `VMAX` are part of the on-disk format: a file written
//! with one parameter set is not readable by a build with another.

/// Maximum number of children of an index node; a leaf holds up to `ORDER`
/// records.
pub const ORDER: usize = 32;

/// Fixed width of a stored key, including null padding.
pub const KMAX: usize = 32;

/// Fixed width of a stored value, including null padding.
pub const VMAX: usize = 256;

/// Upper bound on `count` for any node.
pub const MAX_KEYS: usize = ORDER - 1;

/// Lower bound on `count` for a non-root node.
pub const MIN_KEYS: usize = (ORDER + 1) / 2 - 1;

/// File offset of the store header.
pub const META_OFFSET: u64 = 0;

const _: () = assert!(ORDER >= 3, "a B+ tree of order < 3 cannot rebalance");

/// A null-padded fixed-width key buffer. Ordering is plain byte-wise
/// comparison over all `KMAX` bytes.
pub type KeyBuf = [u8; KMAX];

/// A null-padded fixed-width value buffer.
pub type ValueBuf = [u8; VMAX];

/// Copy `src` into a fresh key buffer, silently truncating to `KMAX - 1`
/// bytes so the stored key always ends in at least one NUL.
pub(crate) fn pack_key(src: &[u8]) -> KeyBuf {
    let mut buf = [0u8; KMAX];
    let n = src.len().min(KMAX - 1);
    buf[..n].copy_from_slice(&src[..n]);
    buf
}

/// Copy `src` into a fresh value buffer, silently truncating to `VMAX - 1`
/// bytes.
pub(crate) fn pack_value(src: &[u8]) -> ValueBuf {
    let mut buf = [0u8; VMAX];
    let n = src.len().min(VMAX - 1);
    buf[..n].copy_from_slice(&src[..n]);
    buf
}

/// The meaningful prefix of a stored buffer: everything up to the first NUL.
pub(crate) fn trim_nul(buf: &[u8]) -> &[u8] {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    &buf[..end]
}
