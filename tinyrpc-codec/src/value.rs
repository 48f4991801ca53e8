//! The `Encode`/`Decode` trait family and the built-in shapes the codec
//! understands without any help from the caller.
//!
//! Shape dispatch — picking how to read or write a value based on its type —
//! is expressed the idiomatic Rust way: a pair of traits implemented once
//! per shape, with the call site simply invoking `value.encode(writer)` /
//! `T::decode(reader)` and trait resolution doing the rest.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::hash::Hash;

use crate::errors::CodecError;
use crate::reader::Reader;
use crate::writer::Writer;

/// A value that knows how to serialize itself onto a [`Writer`].
pub trait Encode {
    fn encode(&self, w: &mut Writer);
}

/// A value that knows how to read itself back off a [`Reader`].
pub trait Decode: Sized {
    fn decode(r: &mut Reader) -> Result<Self, CodecError>;
}

macro_rules! impl_int {
    ($($t:ty),* $(,)?) => {
        $(
            impl Encode for $t {
                fn encode(&self, w: &mut Writer) {
                    w.append(&self.to_le_bytes());
                }
            }

            impl Decode for $t {
                fn decode(r: &mut Reader) -> Result<Self, CodecError> {
                    let bytes = r.take_raw(std::mem::size_of::<$t>())?;
                    let mut raw = [0u8; std::mem::size_of::<$t>()];
                    raw.copy_from_slice(&bytes);
                    Ok(<$t>::from_le_bytes(raw))
                }
            }
        )*
    };
}

impl_int!(u8, i8, u16, i16, u32, i32, u64, i64, u128, i128, f32, f64);

impl Encode for bool {
    fn encode(&self, w: &mut Writer) {
        w.append(&[*self as u8]);
    }
}

impl Decode for bool {
    fn decode(r: &mut Reader) -> Result<Self, CodecError> {
        let bytes = r.take_raw(1)?;
        match bytes[0] {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(CodecError::UnsupportedType(format!(
                "bool byte out of range: {other}"
            ))),
        }
    }
}

impl Encode for () {
    fn encode(&self, _w: &mut Writer) {}
}

impl Decode for () {
    fn decode(_r: &mut Reader) -> Result<Self, CodecError> {
        Ok(())
    }
}

impl Encode for String {
    fn encode(&self, w: &mut Writer) {
        w.append_len_prefixed(self.len(), self.as_bytes());
    }
}

impl Decode for String {
    fn decode(r: &mut Reader) -> Result<Self, CodecError> {
        let len = r.read_len_prefix()?;
        let bytes = r.take_raw(len)?;
        String::from_utf8(bytes)
            .map_err(|e| CodecError::UnsupportedType(format!("invalid utf-8 string: {e}")))
    }
}

impl Encode for str {
    fn encode(&self, w: &mut Writer) {
        w.append_len_prefixed(self.len(), self.as_bytes());
    }
}

impl<T: Encode> Encode for Vec<T> {
    fn encode(&self, w: &mut Writer) {
        // each element is encoded into its own scratch buffer so the
        // length prefix in front of the whole sequence describes the
        // element *count*, not a byte length — matching String/Map below.
        let mut body = Writer::new();
        for item in self {
            item.encode(&mut body);
        }
        match body.finalize() {
            Ok(bytes) => w.append_len_prefixed(self.len(), &bytes),
            Err(e) => w.fail(e),
        }
    }
}

impl<T: Decode> Decode for Vec<T> {
    fn decode(r: &mut Reader) -> Result<Self, CodecError> {
        let count = r.read_len_prefix()?;
        let mut out = Vec::with_capacity(count.min(1 << 20));
        for _ in 0..count {
            out.push(T::decode(r)?);
        }
        Ok(out)
    }
}

impl<T: Encode + Eq + Hash> Encode for HashSet<T> {
    fn encode(&self, w: &mut Writer) {
        let mut body = Writer::new();
        for item in self {
            item.encode(&mut body);
        }
        match body.finalize() {
            Ok(bytes) => w.append_len_prefixed(self.len(), &bytes),
            Err(e) => w.fail(e),
        }
    }
}

impl<T: Decode + Eq + Hash> Decode for HashSet<T> {
    fn decode(r: &mut Reader) -> Result<Self, CodecError> {
        let count = r.read_len_prefix()?;
        let mut out = HashSet::with_capacity(count.min(1 << 20));
        for _ in 0..count {
            out.insert(T::decode(r)?);
        }
        Ok(out)
    }
}

impl<T: Encode + Ord> Encode for BTreeSet<T> {
    fn encode(&self, w: &mut Writer) {
        let mut body = Writer::new();
        for item in self {
            item.encode(&mut body);
        }
        match body.finalize() {
            Ok(bytes) => w.append_len_prefixed(self.len(), &bytes),
            Err(e) => w.fail(e),
        }
    }
}

impl<T: Decode + Ord> Decode for BTreeSet<T> {
    fn decode(r: &mut Reader) -> Result<Self, CodecError> {
        let count = r.read_len_prefix()?;
        let mut out = BTreeSet::new();
        for _ in 0..count {
            out.insert(T::decode(r)?);
        }
        Ok(out)
    }
}

impl<K: Encode + Eq + Hash, V: Encode> Encode for HashMap<K, V> {
    fn encode(&self, w: &mut Writer) {
        let mut body = Writer::new();
        for (k, v) in self {
            k.encode(&mut body);
            v.encode(&mut body);
        }
        match body.finalize() {
            Ok(bytes) => w.append_len_prefixed(self.len(), &bytes),
            Err(e) => w.fail(e),
        }
    }
}

impl<K: Decode + Eq + Hash, V: Decode> Decode for HashMap<K, V> {
    fn decode(r: &mut Reader) -> Result<Self, CodecError> {
        let count = r.read_len_prefix()?;
        let mut out = HashMap::with_capacity(count.min(1 << 20));
        for _ in 0..count {
            let k = K::decode(r)?;
            let v = V::decode(r)?;
            out.insert(k, v);
        }
        Ok(out)
    }
}

impl<K: Encode + Ord, V: Encode> Encode for BTreeMap<K, V> {
    fn encode(&self, w: &mut Writer) {
        let mut body = Writer::new();
        for (k, v) in self {
            k.encode(&mut body);
            v.encode(&mut body);
        }
        match body.finalize() {
            Ok(bytes) => w.append_len_prefixed(self.len(), &bytes),
            Err(e) => w.fail(e),
        }
    }
}

impl<K: Decode + Ord, V: Decode> Decode for BTreeMap<K, V> {
    fn decode(r: &mut Reader) -> Result<Self, CodecError> {
        let count = r.read_len_prefix()?;
        let mut out = BTreeMap::new();
        for _ in 0..count {
            let k = K::decode(r)?;
            let v = V::decode(r)?;
            out.insert(k, v);
        }
        Ok(out)
    }
}

// Fixed-size arrays carry no length prefix: the element count is already
// fixed by the type, so writing one would only be redundant bytes on the
// wire. Dynamic sequences (Vec/HashSet/HashMap/...) above still carry their
// count, since a reader has no other way to know how many elements to pull.
impl<T: Encode, const N: usize> Encode for [T; N] {
    fn encode(&self, w: &mut Writer) {
        for item in self {
            item.encode(w);
        }
    }
}

impl<T: Decode, const N: usize> Decode for [T; N] {
    fn decode(r: &mut Reader) -> Result<Self, CodecError> {
        // std has no direct [T; N] from-iterator short of unstable APIs or
        // MaybeUninit gymnastics; a Vec -> try_into round trip stays in safe,
        // ordinary Rust and N is always small for this protocol's payloads.
        let items: Vec<T> = (0..N).map(|_| T::decode(r)).collect::<Result<_, _>>()?;
        items
            .try_into()
            .map_err(|_| CodecError::UnsupportedType(format!("array length mismatch, want {N}")))
    }
}

macro_rules! impl_tuple {
    ($($idx:tt => $name:ident),+) => {
        impl<$($name: Encode),+> Encode for ($($name,)+) {
            fn encode(&self, w: &mut Writer) {
                $( self.$idx.encode(w); )+
            }
        }

        impl<$($name: Decode),+> Decode for ($($name,)+) {
            fn decode(r: &mut Reader) -> Result<Self, CodecError> {
                Ok(($( $name::decode(r)?, )+))
            }
        }
    };
}

impl_tuple!(0 => A);
impl_tuple!(0 => A, 1 => B);
impl_tuple!(0 => A, 1 => B, 2 => C);
impl_tuple!(0 => A, 1 => B, 2 => C, 3 => D);

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip<T: Encode + Decode + PartialEq + std::fmt::Debug>(value: T) {
        let mut w = Writer::new();
        value.encode(&mut w);
        let bytes = w.finalize().unwrap();
        let mut r = Reader::new(&bytes);
        let decoded = T::decode(&mut r).unwrap();
        assert_eq!(value, decoded);
    }

    #[test]
    fn integers_round_trip() {
        round_trip(42u32);
        round_trip(-7i64);
        round_trip(255u8);
        round_trip(3.5f64);
    }

    #[test]
    fn bool_round_trips() {
        round_trip(true);
        round_trip(false);
    }

    #[test]
    fn bool_rejects_out_of_range_byte() {
        let bytes = [2u8];
        let mut r = Reader::new(&bytes);
        assert!(matches!(
            bool::decode(&mut r),
            Err(CodecError::UnsupportedType(_))
        ));
    }

    #[test]
    fn string_round_trips() {
        round_trip("hello tinyrpc".to_string());
        round_trip(String::new());
    }

    #[test]
    fn vec_round_trips() {
        round_trip(vec![1i32, 2, 3, 4]);
        round_trip(Vec::<u8>::new());
    }

    #[test]
    fn nested_vec_round_trips() {
        round_trip(vec![vec![1u8, 2], vec![3, 4, 5], vec![]]);
    }

    #[test]
    fn hashmap_round_trips() {
        let mut m = HashMap::new();
        m.insert("a".to_string(), 1u32);
        m.insert("b".to_string(), 2u32);
        round_trip(m);
    }

    #[test]
    fn btreemap_round_trips() {
        let mut m = BTreeMap::new();
        m.insert(1u32, "one".to_string());
        m.insert(2u32, "two".to_string());
        round_trip(m);
    }

    #[test]
    fn hashset_round_trips() {
        let mut s = HashSet::new();
        s.insert(1u32);
        s.insert(2u32);
        s.insert(3u32);
        round_trip(s);
    }

    #[test]
    fn btreeset_round_trips_in_sorted_order() {
        let mut s = BTreeSet::new();
        s.insert(3u32);
        s.insert(1u32);
        s.insert(2u32);

        let mut w = Writer::new();
        s.encode(&mut w);
        let bytes = w.finalize().unwrap();
        let mut r = Reader::new(&bytes);
        let decoded = BTreeSet::<u32>::decode(&mut r).unwrap();

        assert_eq!(decoded, s);
        assert_eq!(decoded.into_iter().collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn fixed_array_has_no_length_prefix() {
        let arr = [1u32, 2, 3];
        let mut w = Writer::new();
        arr.encode(&mut w);
        let bytes = w.finalize().unwrap();
        assert_eq!(bytes.len(), 12); // 3 * 4 bytes, no 8-byte count prefix
    }

    #[test]
    fn tuple_round_trips() {
        round_trip((1u32, "x".to_string(), true));
    }
}
