//! Field readers and the macro generating [`super::RecordLayout`] structs.

use byteorder::ByteOrder;
use pastey::paste;

/// A fixed width field that can appear in a record layout.
pub trait WireField: Sized {
    /// Width of the field in the record.
    const WIDTH: usize;

    /// Read the field from the start of `data`.
    fn read<O: ByteOrder>(data: &[u8]) -> Self;
}

/// Reader for a multi-byte scalar type
macro_rules! scalar_field {
    ($ty: tt) => {
        paste! {
            impl WireField for $ty {
                const WIDTH: usize = size_of::<$ty>();

                fn read<O: ByteOrder>(data: &[u8]) -> Self {
                    O::[<read_ $ty>](&data[..Self::WIDTH])
                }
            }
        }
    };
}

/// Reader for i8 and u8 types
macro_rules! byte_field {
    ($ty: tt) => {
        impl WireField for $ty {
            const WIDTH: usize = 1;

            #[allow(trivial_numeric_casts)]
            fn read<O: ByteOrder>(data: &[u8]) -> Self {
                data[0] as $ty
            }
        }
    };
}

byte_field!(i8);

byte_field!(u8);

scalar_field!(i16);

scalar_field!(u16);

scalar_field!(i32);

scalar_field!(u32);

scalar_field!(i64);

scalar_field!(u64);

/// Padding declared by a layout. The bytes are skipped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pad<const N: usize>;

impl<const N: usize> WireField for Pad<N> {
    const WIDTH: usize = N;

    fn read<O: ByteOrder>(_data: &[u8]) -> Self {
        Self
    }
}

/// Reads consecutive fields out of one record.
#[derive(Debug)]
pub struct FieldCursor<'data> {
    data: &'data [u8],
    offset: usize,
}

impl<'data> FieldCursor<'data> {
    pub fn new(data: &'data [u8]) -> Self {
        Self { data, offset: 0 }
    }

    /// Read the next field. The caller has checked the record size.
    pub fn read<T: WireField, O: ByteOrder>(&mut self) -> T {
        let value = T::read::<O>(&self.data[self.offset..]);
        self.offset += T::WIDTH;
        value
    }
}

/// Macro to generate a struct mirroring a fixed record layout, along with
/// its [`super::RecordLayout`] implementation.
///
/// Fields are laid out in declaration order with no implicit padding, so
/// any padding the producer has must be spelled out with [`Pad`].
#[doc(hidden)]
#[macro_export]
macro_rules! record_layout {
    (#[layout($layout_name:tt)] pub struct $name:ident { $($field:ident: $type:ty,)* }) => {
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name {
            $(
                pub $field: $type,
            )*
        }

        impl $crate::layouts::RecordLayout for $name {
            const LAYOUT_NAME: &'static str = $layout_name;

            const SIZE: usize = 0 $(+ <$type as $crate::layouts::wire::WireField>::WIDTH)*;

            fn parse<O: byteorder::ByteOrder>(
                record: &linux_perf_data::linux_perf_event_reader::RawData<'_>,
            ) -> Result<Self, $crate::layouts::DecodeError> {
                if record.len() != Self::SIZE {
                    return Err($crate::layouts::DecodeError::MalformedRecord {
                        layout: Self::LAYOUT_NAME,
                        expected: Self::SIZE,
                        actual: record.len(),
                    });
                }
                let data = record.as_slice();
                let mut cursor = $crate::layouts::wire::FieldCursor::new(data.as_ref());
                Ok(Self {
                    $(
                        $field: cursor.read::<$type, O>(),
                    )*
                })
            }
        }
    };
}

#[doc(inline)]
pub use record_layout;
