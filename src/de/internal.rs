use crate::align::align;
use crate::error::{Error, Result};
use crate::ser::MAX_ARRAY_LEN;
use crate::signature::{alignment_of, element_type_len, Signature};
use byteorder::ByteOrder;
use log::{error, trace};
use std::cmp::Ordering;
use std::marker::PhantomData;
use std::str::from_utf8;

/// Deepest nesting of arrays, structs, dict entries and variants a value may
/// have, counted together.
pub(super) const MAX_NESTING: usize = 64;

pub(super) struct DataBuffer<'de> {
    pub(super) data: &'de [u8],
    pub(super) data_ix: usize,
}

impl<'de> DataBuffer<'de> {
    pub(super) fn new(data: &'de [u8]) -> Self {
        Self { data, data_ix: 0 }
    }

    pub(super) fn complete(self) -> Result<()> {
        let leftover_data = self.data.len() - self.data_ix;
        if leftover_data != 0 {
            return Err(Error::LeftoverData(leftover_data));
        }

        Ok(())
    }
}

pub(super) struct Deserializer<'a, 'de, B: ByteOrder> {
    pub(super) data_buffer: &'a mut DataBuffer<'de>,
    sig: &'de [u8],
    sig_ix: usize,
    // containers enclosing the value being read
    depth: usize,
    phantom: PhantomData<B>,
}

pub(super) struct ArrayDeserializer<'a, 'de, B: ByteOrder> {
    pub(super) data_buffer: &'a mut DataBuffer<'de>,
    pub(super) end_ix: usize,
    pub(super) item_sig: &'de [u8],
    // of the items
    pub(super) depth: usize,
    pub(super) phantom: PhantomData<B>,
}

impl<'a, 'de, B: ByteOrder> ArrayDeserializer<'a, 'de, B> {
    pub(super) fn next_item_deserializer<'b>(
        &'b mut self,
    ) -> Result<Option<Deserializer<'b, 'de, B>>> {
        match self.data_buffer.data_ix.cmp(&self.end_ix) {
            Ordering::Greater => Err(Error::ArrayElementOverrun(
                self.data_buffer.data_ix,
                self.end_ix,
            )),
            Ordering::Equal => Ok(None),
            Ordering::Less => {
                let sig = self.item_sig;
                Ok(Some(Deserializer {
                    data_buffer: self.data_buffer,
                    sig,
                    sig_ix: 0,
                    depth: self.depth,
                    phantom: PhantomData,
                }))
            }
        }
    }

    pub(super) fn next_key_deserializer<'b>(
        &'b mut self,
    ) -> Result<Option<Deserializer<'b, 'de, B>>> {
        if let Some(mut de) = self.next_item_deserializer()? {
            de.align_reader(8)?;
            de.expect_signature_byte(b'{')?;
            let sig = de.grab_single_sig()?;
            let depth = de.nested()?;
            Ok(Some(Deserializer {
                data_buffer: de.data_buffer,
                sig,
                sig_ix: 0,
                depth,
                phantom: PhantomData,
            }))
        } else {
            Ok(None)
        }
    }

    pub(super) fn next_value_deserializer<'b>(
        &'b mut self,
    ) -> Result<Option<Deserializer<'b, 'de, B>>> {
        if let Some(mut de) = self.next_item_deserializer()? {
            de.expect_signature_byte(b'{')?;
            let _ = de.grab_single_sig()?;
            let sig = de.grab_single_sig()?;
            de.expect_signature_byte(b'}')?;
            let depth = de.nested()?;
            Ok(Some(Deserializer {
                data_buffer: de.data_buffer,
                sig,
                sig_ix: 0,
                depth,
                phantom: PhantomData,
            }))
        } else {
            Ok(None)
        }
    }

    /// Every element must have been read, and none may reach past the end.
    pub(super) fn finish(&self) -> Result<()> {
        if self.data_buffer.data_ix != self.end_ix {
            return Err(Error::ArrayElementOverrun(
                self.data_buffer.data_ix,
                self.end_ix,
            ));
        }
        Ok(())
    }
}

impl<'a, 'de, B: ByteOrder> Deserializer<'a, 'de, B> {
    pub(super) fn new(data_buffer: &'a mut DataBuffer<'de>, sig: &'de [u8]) -> Self {
        Self {
            data_buffer,
            sig,
            sig_ix: 0,
            depth: 0,
            phantom: PhantomData,
        }
    }

    /// Depth of a value one level inside this one.
    fn nested(&self) -> Result<usize> {
        let depth = self.depth + 1;
        if depth > MAX_NESTING {
            error!("Value nested {} levels deep", depth);
            return Err(Error::NestingTooDeep(MAX_NESTING));
        }
        Ok(depth)
    }

    // Must have already processed the 'a' sig side, and the size data side.
    pub(super) fn array_deserializer(
        mut self,
        array_size: usize,
    ) -> Result<ArrayDeserializer<'a, 'de, B>> {
        let item_sig = self.grab_single_sig()?;
        let depth = self.nested()?;
        self.align_reader(alignment_of(item_sig[0])?)?;
        let end_ix = self.data_buffer.data_ix + array_size;
        if end_ix > self.data_buffer.data.len() {
            error!("Array of {} bytes runs past the end of the data", array_size);
            return Err(Error::IndexOutOfBounds(end_ix));
        }
        Ok(ArrayDeserializer {
            data_buffer: self.data_buffer,
            end_ix,
            item_sig,
            depth,
            phantom: PhantomData,
        })
    }

    pub(super) fn subsidiary<'b>(&'b mut self) -> Result<Deserializer<'b, 'de, B>> {
        let item_sig = self.grab_single_sig()?;
        let depth = self.nested()?;
        Ok(Deserializer {
            data_buffer: &mut *self.data_buffer,
            sig: item_sig,
            sig_ix: 0,
            depth,
            phantom: PhantomData,
        })
    }

    /// Reads a variant's signature, returning its text and a deserializer
    /// for the value it describes.
    pub(super) fn variant<'b>(&'b mut self) -> Result<(&'de str, Deserializer<'b, 'de, B>)> {
        self.expect_signature_byte(b'v')?;
        let depth = self.nested()?;
        let sig = self.read_signature_text()?;
        let validated = Signature::new(sig)?;
        if !validated.is_single() {
            return Err(Error::InvalidSignature(
                sig.to_owned(),
                "variant must hold a single complete type",
            ));
        }
        Ok((
            sig,
            Deserializer {
                data_buffer: &mut *self.data_buffer,
                sig: sig.as_bytes(),
                sig_ix: 0,
                depth,
                phantom: PhantomData,
            },
        ))
    }

    // Transparently steps into a variant, so self-describing visitors see
    // the value inside it.
    pub(super) fn possible_variant<'b>(&'b mut self) -> Result<Deserializer<'b, 'de, B>> {
        if self.sig.get(self.sig_ix) == Some(&b'v') {
            let (_, de) = self.variant()?;
            Ok(de)
        } else {
            Ok(Deserializer {
                data_buffer: &mut *self.data_buffer,
                sig: self.sig,
                sig_ix: self.sig_ix,
                depth: self.depth,
                phantom: PhantomData,
            })
        }
    }

    pub(super) fn peek_single_sig(&mut self) -> Result<&'de [u8]> {
        let start = self.sig_ix;
        let res = self.grab_single_sig()?;
        self.sig_ix = start;
        Ok(res)
    }

    pub(super) fn grab_single_sig(&mut self) -> Result<&'de [u8]> {
        let start = self.sig_ix;
        let sig = self.sig;
        let len = element_type_len(&sig[start..])?;
        self.sig_ix = start + len;
        Ok(&sig[start..start + len])
    }

    pub(super) fn next_signature_byte(&self) -> Option<u8> {
        self.sig.get(self.sig_ix).copied()
    }

    pub(super) fn match_signature_bytes(&mut self, expected: &[u8]) -> bool {
        let len = expected.len();
        if self.sig_ix + len > self.sig.len() {
            return false;
        }
        let ix = self.sig_ix;

        let sig_slice = &self.sig[ix..ix + len];
        if sig_slice == expected {
            self.sig_ix = ix + len;
            true
        } else {
            false
        }
    }

    pub(super) fn expect_signature_byte(&mut self, expected: u8) -> Result<()> {
        match self.sig.get(self.sig_ix) {
            Some(&got) if got == expected => {
                self.sig_ix += 1;
                Ok(())
            }
            Some(_) => Err(self.mismatch(&[expected])),
            None => Err(Error::mismatch(&[expected], "end of signature")),
        }
    }

    pub(super) fn mismatch(&self, expected: &[u8]) -> Error {
        let found = &self.sig[self.sig_ix.min(self.sig.len())..];
        Error::mismatch(expected, String::from_utf8_lossy(found).into_owned())
    }

    // Index after read must be valid for read to be valid
    fn validate_ix(&mut self) -> Result<()> {
        // Strict inequality
        if self.data_buffer.data_ix > self.data_buffer.data.len() {
            error!("Index out of bounds");
            return Err(Error::IndexOutOfBounds(self.data_buffer.data_ix));
        }

        Ok(())
    }

    pub(super) fn align_reader(&mut self, alignment: usize) -> Result<()> {
        self.data_buffer.data_ix = align(self.data_buffer.data_ix, alignment);
        self.validate_ix()?;
        Ok(())
    }

    pub(super) fn read(&mut self, len: usize) -> Result<&'de [u8]> {
        let old_ix = self.data_buffer.data_ix;
        let new_ix = old_ix + len;
        self.data_buffer.data_ix = new_ix;
        self.validate_ix()?;
        let data = self.data_buffer.data;
        Ok(&data[old_ix..new_ix])
    }

    pub(super) fn read_align_signature_value<const S: usize>(
        &mut self,
        signature: u8,
        alignment: usize,
    ) -> Result<[u8; S]> {
        self.expect_signature_byte(signature)?;
        self.align_reader(alignment)?;
        trace!(
            "Read signature '{}', {} bytes, at {}",
            signature as char,
            S,
            self.data_buffer.data_ix
        );
        let slice = self.read(S)?;
        let mut array = [0u8; S];
        array.copy_from_slice(slice);
        Ok(array)
    }

    pub(super) fn read_array_len(&mut self) -> Result<usize> {
        self.expect_signature_byte(b'a')?;
        self.align_reader(4)?;
        let len = B::read_u32(self.read(4)?) as usize;
        if len > MAX_ARRAY_LEN {
            return Err(Error::ArrayTooLong(len));
        }
        Ok(len)
    }

    fn read_terminated(&mut self, size: usize) -> Result<&'de [u8]> {
        let res = self.read(size + 1)?;
        if res[size] != 0 {
            return Err(Error::UnterminatedString);
        }
        Ok(&res[..size])
    }

    fn read_signature_text(&mut self) -> Result<&'de str> {
        let size = self.read(1)?[0] as usize;
        Ok(from_utf8(self.read_terminated(size)?)?)
    }

    /// Reads one of the string-like types, which must be `code`: STRING,
    /// OBJECT_PATH or SIGNATURE.
    pub(super) fn deserialize_str_basic(&mut self, code: u8) -> Result<&'de str> {
        trace!("read string at {}", self.data_buffer.data_ix);
        if self.next_signature_byte() != Some(code) {
            return Err(self.mismatch(&[code]));
        }
        let string = match code {
            b's' | b'o' => {
                let size = B::read_u32(&self.read_align_signature_value::<4>(code, 4)?);
                trace!("size is {}", size);
                let bytes = self.read_terminated(size as usize)?;
                if bytes.contains(&0) {
                    return Err(Error::InteriorNul(
                        String::from_utf8_lossy(bytes).into_owned(),
                    ));
                }
                from_utf8(bytes)?
            }
            b'g' => {
                self.expect_signature_byte(b'g')?;
                let sig = self.read_signature_text()?;
                Signature::new(sig)?;
                sig
            }
            _ => return Err(self.mismatch(b"s")),
        };
        trace!("string is {}", string);
        Ok(string)
    }

    pub(super) fn deserialize_bytes_basic(&mut self) -> Result<&'de [u8]> {
        if self.sig.get(self.sig_ix..self.sig_ix + 2) != Some(&b"ay"[..]) {
            return Err(self.mismatch(b"ay"));
        }
        let len = self.read_array_len()?;
        self.expect_signature_byte(b'y')?;
        self.read(len)
    }
}
