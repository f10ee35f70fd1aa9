use crate::error::{Error, Result};

use std::mem::size_of;

pub(crate) trait DbusPrimitive {
    fn signature() -> u8;
    fn alignment() -> usize;
    fn size(&self) -> usize;
    fn serialize(&self, out: &mut [u8]) -> Result<()>;
}

macro_rules! basic_primitive {
    ($type:ident, $sig:expr) => {
        impl DbusPrimitive for $type {
            fn signature() -> u8 {
                $sig as u8
            }

            fn size(&self) -> usize {
                size_of::<$type>()
            }

            fn serialize(&self, out: &mut [u8]) -> Result<()> {
                out.copy_from_slice(&self.to_le_bytes());
                Ok(())
            }

            fn alignment() -> usize {
                size_of::<$type>()
            }
        }
    };
}

basic_primitive!(u8, 'y');
basic_primitive!(f64, 'd');
basic_primitive!(i16, 'n');
basic_primitive!(u16, 'q');
basic_primitive!(i32, 'i');
basic_primitive!(u32, 'u');
basic_primitive!(i64, 'x');
basic_primitive!(u64, 't');

impl DbusPrimitive for bool {
    fn signature() -> u8 {
        b'b'
    }

    fn size(&self) -> usize {
        4
    }

    fn serialize(&self, out: &mut [u8]) -> Result<()> {
        out.copy_from_slice(&(*self as u32).to_le_bytes());
        Ok(())
    }

    fn alignment() -> usize {
        4
    }
}

fn serialize_long_str(text: &str, out: &mut [u8]) -> Result<()> {
    let bytes = text.as_bytes();
    if bytes.contains(&0) {
        return Err(Error::InteriorNul(text.to_owned()));
    }
    out[0..4].copy_from_slice(&(bytes.len() as u32).to_le_bytes());
    out[4..4 + bytes.len()].copy_from_slice(bytes);
    out[4 + bytes.len()] = 0u8;
    Ok(())
}

impl DbusPrimitive for &str {
    fn signature() -> u8 {
        b's'
    }

    fn size(&self) -> usize {
        self.as_bytes().len() + 5 // size and terminating null
    }

    fn serialize(&self, out: &mut [u8]) -> Result<()> {
        serialize_long_str(self, out)
    }

    fn alignment() -> usize {
        4
    }
}

/// Object path text, written like a string under the `o` code.
pub(crate) struct PathStr<'a>(pub &'a str);

impl DbusPrimitive for PathStr<'_> {
    fn signature() -> u8 {
        b'o'
    }

    fn size(&self) -> usize {
        self.0.as_bytes().len() + 5 // size and terminating null
    }

    fn serialize(&self, out: &mut [u8]) -> Result<()> {
        serialize_long_str(self.0, out)
    }

    fn alignment() -> usize {
        4
    }
}

/// Signature text: a one-byte length, the bytes and a terminating null.
/// Callers validate the text (and so its length) beforehand.
pub(crate) struct SigStr<'a>(pub &'a str);

impl DbusPrimitive for SigStr<'_> {
    fn signature() -> u8 {
        b'g'
    }

    fn size(&self) -> usize {
        self.0.as_bytes().len() + 2 // size and terminating null
    }

    fn serialize(&self, out: &mut [u8]) -> Result<()> {
        let bytes = self.0.as_bytes();
        out[0] = bytes.len() as u8;
        out[1..1 + bytes.len()].copy_from_slice(bytes);
        out[1 + bytes.len()] = 0u8;
        Ok(())
    }

    fn alignment() -> usize {
        1
    }
}
