//! Opaque byte-image encoding for plain-data structs.
//!
//! Lets a caller serialize a struct as a raw memory image rather than
//! field-by-field — cheap, but only sound for types with no padding, no
//! pointers and no platform-dependent layout. [`PlainAggregate`] is the
//! marker that opts a type into this, and [`plain_aggregate!`] is how you
//! provide the `Encode`/`Decode` impls for it.
//!
//! A blanket `impl<T: PlainAggregate> Encode for T` would be the obvious way
//! to wire a marker trait to a behaviour, but it cannot coexist with the
//! concrete impls in [`crate::value`] (`impl Encode for u32`, etc.): nothing
//! stops a downstream crate from also implementing `PlainAggregate` for
//! `u32`, so the compiler has to assume the two impls could overlap and
//! rejects the blanket one. The macro sidesteps this by generating a
//! non-generic `impl Encode for $ty` per invocation, one per caller-defined
//! struct, which the coherence checker can always tell apart from the
//! primitive impls.

/// Marker for structs whose bytes may be written and read back verbatim.
///
/// # Safety
///
/// The implementing type must have no padding bytes that vary between
/// otherwise-equal values, no pointers or references, and a layout that is
/// stable across the processes exchanging it (in practice: `#[repr(C)]` or
/// `#[repr(packed)]`, plain numeric fields only). Getting this wrong does
/// not trip a compile error — it silently serializes uninitialized padding
/// or, worse, a pointer value.
pub unsafe trait PlainAggregate: Sized {}

/// Generates `Encode`/`Decode` for a [`PlainAggregate`] type by copying its
/// raw byte image to and from the wire, with no endianness conversion and
/// no length prefix (the size is fixed by `size_of::<$ty>()`).
///
/// ```ignore
/// #[repr(C)]
/// #[derive(Clone, Copy)]
/// struct Point { x: i32, y: i32 }
///
/// unsafe impl PlainAggregate for Point {}
/// plain_aggregate!(Point);
/// ```
#[macro_export]
macro_rules! plain_aggregate {
    ($ty:ty) => {
        impl $crate::value::Encode for $ty {
            fn encode(&self, w: &mut $crate::writer::Writer) {
                let bytes = unsafe {
                    ::std::slice::from_raw_parts(
                        (self as *const $ty) as *const u8,
                        ::std::mem::size_of::<$ty>(),
                    )
                };
                w.append(bytes);
            }
        }

        impl $crate::value::Decode for $ty {
            fn decode(r: &mut $crate::reader::Reader) -> Result<Self, $crate::errors::CodecError> {
                let bytes = r.take_raw(::std::mem::size_of::<$ty>())?;
                let mut value = ::std::mem::MaybeUninit::<$ty>::uninit();
                unsafe {
                    ::std::ptr::copy_nonoverlapping(
                        bytes.as_ptr(),
                        value.as_mut_ptr() as *mut u8,
                        ::std::mem::size_of::<$ty>(),
                    );
                    Ok(value.assume_init())
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use crate::reader::Reader;
    use crate::value::{Decode, Encode};
    use crate::writer::Writer;

    #[repr(C)]
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    struct Point {
        x: i32,
        y: i32,
    }

    unsafe impl super::PlainAggregate for Point {}
    plain_aggregate!(Point);

    #[test]
    fn plain_aggregate_round_trips_as_raw_bytes() {
        let p = Point { x: 7, y: -3 };
        let mut w = Writer::new();
        p.encode(&mut w);
        let bytes = w.finalize().unwrap();
        assert_eq!(bytes.len(), std::mem::size_of::<Point>());

        let mut r = Reader::new(&bytes);
        let decoded = Point::decode(&mut r).unwrap();
        assert_eq!(p, decoded);
    }

    #[test]
    fn plain_aggregate_has_no_length_prefix() {
        let p = Point { x: 1, y: 2 };
        let mut w = Writer::new();
        p.encode(&mut w);
        assert_eq!(w.finalize().unwrap().len(), 8); // two i32 fields, no count prefix
    }
}
