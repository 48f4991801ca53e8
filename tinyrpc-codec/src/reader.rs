//! Cursor over a decoded frame payload with sticky-error semantics.

use crate::errors::CodecError;

/// Reads values out of a payload buffer in the order they were written.
///
/// Once any read fails, the `Reader` is poisoned: every subsequent call
/// returns the same [`CodecError`] without touching the cursor, so a decode
/// function built out of several chained reads never has to check the
/// result of each one individually — it only has to check
/// [`Reader::failed`] (or the `Result` of the final call) at the end.
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
    error: Option<CodecError>,
}

impl<'a> Reader<'a> {
    /// Wraps a payload buffer for sequential decoding.
    pub fn new(buf: &'a [u8]) -> Self {
        Reader {
            buf,
            pos: 0,
            error: None,
        }
    }

    /// Whether a prior read has already failed.
    pub fn failed(&self) -> bool {
        self.error.is_some()
    }

    /// The sticky error, if any read has failed so far.
    pub fn error(&self) -> Option<&CodecError> {
        self.error.as_ref()
    }

    /// Total length of the wrapped payload.
    pub fn payload_length(&self) -> usize {
        self.buf.len()
    }

    /// Number of bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn fail<T>(&mut self, err: CodecError) -> Result<T, CodecError> {
        let err = self.error.get_or_insert(err).clone();
        Err(err)
    }

    /// Reads exactly `n` bytes off the cursor.
    ///
    /// `pub(crate)` because it hands back a borrowed slice tied to the
    /// payload's lifetime — fine for `value.rs`'s own decode impls, but not
    /// safe to expose as-is across the crate boundary. Macro-generated code
    /// in downstream crates needs owned bytes instead; see [`Reader::take_raw`].
    pub(crate) fn read_exact(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        if self.remaining() < n {
            return self.fail(CodecError::ShortRead {
                needed: n,
                available: self.remaining(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Reads the 8-byte little-endian element count prefixing every
    /// dynamically-sized sequence (`Vec`, `HashMap`, `String`, ...).
    ///
    /// Fixed-size arrays never carry this prefix — their length is already
    /// known at the type level, so writing one would only be redundant
    /// bytes on the wire.
    ///
    /// A count that doesn't fit in this platform's `usize` (only reachable
    /// on 32-bit hosts, since `usize` is 64 bits wide everywhere else)
    /// fails with [`CodecError::UnsupportedType`] rather than silently
    /// truncating.
    pub(crate) fn read_len_prefix(&mut self) -> Result<usize, CodecError> {
        let bytes = self.read_exact(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        let count = u64::from_le_bytes(raw);
        match usize::try_from(count) {
            Ok(len) => Ok(len),
            Err(_) => self.fail(CodecError::UnsupportedType(format!(
                "sequence length {count} does not fit in this platform's usize"
            ))),
        }
    }

    /// Reads `n` raw bytes and returns them as an owned buffer.
    ///
    /// This is the public counterpart to [`Reader::read_exact`], reachable
    /// from macro expansions in downstream crates (e.g. [`crate::aggregate`]'s
    /// `plain_aggregate!`) that cannot call `pub(crate)` items defined here.
    pub fn take_raw(&mut self, n: usize) -> Result<Vec<u8>, CodecError> {
        self.read_exact(n).map(|s| s.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_in_order() {
        let buf = [1u8, 2, 3, 4, 5, 6];
        let mut r = Reader::new(&buf);
        assert_eq!(r.read_exact(2).unwrap(), &[1, 2]);
        assert_eq!(r.read_exact(4).unwrap(), &[3, 4, 5, 6]);
    }

    #[test]
    fn short_read_is_sticky() {
        let buf = [1u8, 2];
        let mut r = Reader::new(&buf);
        let first = r.read_exact(8);
        assert!(matches!(first, Err(CodecError::ShortRead { .. })));
        assert!(r.failed());

        // subsequent reads return the same error without touching state
        let second = r.read_exact(1);
        assert_eq!(second, first);
    }

    #[test]
    fn len_prefix_round_trips_u64_le() {
        let buf = 42u64.to_le_bytes();
        let mut r = Reader::new(&buf);
        assert_eq!(r.read_len_prefix().unwrap(), 42);
    }

    #[test]
    fn len_prefix_accepts_the_largest_representable_count() {
        let buf = (usize::MAX as u64).to_le_bytes();
        let mut r = Reader::new(&buf);
        assert_eq!(r.read_len_prefix().unwrap(), usize::MAX);
    }

    // usize is 64 bits wide on every platform this crate is built for in
    // practice, so u64::MAX always fits and this branch is unreachable here;
    // it only fires on a genuine 32-bit host.
    #[test]
    #[cfg(target_pointer_width = "32")]
    fn len_prefix_rejects_a_count_too_large_for_usize() {
        let buf = u64::MAX.to_le_bytes();
        let mut r = Reader::new(&buf);
        let err = r.read_len_prefix().unwrap_err();
        assert!(matches!(err, CodecError::UnsupportedType(_)));
        assert!(r.failed());
    }

    #[test]
    fn take_raw_returns_owned_copy() {
        let buf = [9u8, 8, 7];
        let mut r = Reader::new(&buf);
        let owned = r.take_raw(3).unwrap();
        assert_eq!(owned, vec![9, 8, 7]);
    }
}
