//! Unmarshalling of DBus message bodies into Rust values.
//!
//! Decoding is driven by the body's signature: each serde request must match
//! the next complete type in it, so a `String` is never read out of an `i`
//! and a struct must have exactly the signature's member count. Plain
//! strings come only from an `s`; an `o` or a `g` is read as an
//! [`ObjectPath`](crate::ObjectPath) or a [`Signature`](crate::Signature),
//! or through `deserialize_any`. Both byte
//! orders are supported. Only `deserialize_any` steps transparently into
//! variants; everywhere else a `v` must be asked for as a
//! [`Variant`](crate::Variant).

use crate::body::{Body, Endian};
use crate::error::{Error, Result};
use crate::ser::VARIANT_NAME;
use crate::signature::{Signature, SIGNATURE_NAME};
use crate::value::OBJECT_PATH_NAME;
use byteorder::{ByteOrder, BE, LE};

use serde::de::value::BorrowedStrDeserializer;
use serde::de::{self, DeserializeSeed, EnumAccess, MapAccess, SeqAccess, VariantAccess, Visitor};
use serde::Deserialize;
use std::marker::PhantomData;

mod internal;
use internal::{ArrayDeserializer, DataBuffer, Deserializer};

/// Decodes a whole body, which must hold a single complete type.
pub fn from_body<'a, T: Deserialize<'a>>(body: &'a Body) -> Result<T> {
    from_parts(body.signature(), body.data(), body.endian())
}

pub fn from_parts<'a, T: Deserialize<'a>>(
    signature: &'a Signature,
    data: &'a [u8],
    endian: Endian,
) -> Result<T> {
    from_parts_seed(signature, data, endian, PhantomData)
}

pub(crate) fn from_parts_seed<'a, S: DeserializeSeed<'a>>(
    signature: &'a Signature,
    data: &'a [u8],
    endian: Endian,
    seed: S,
) -> Result<S::Value> {
    let (value, used) = from_prefix_seed(signature, data, endian, seed)?;
    DataBuffer {
        data,
        data_ix: used,
    }
    .complete()?;
    Ok(value)
}

/// Decodes a value from the start of `data`, returning it along with the
/// number of bytes it took.
pub(crate) fn from_prefix<'a, T: Deserialize<'a>>(
    signature: &'a Signature,
    data: &'a [u8],
    endian: Endian,
) -> Result<(T, usize)> {
    from_prefix_seed(signature, data, endian, PhantomData)
}

fn from_prefix_seed<'a, S: DeserializeSeed<'a>>(
    signature: &'a Signature,
    data: &'a [u8],
    endian: Endian,
    seed: S,
) -> Result<(S::Value, usize)> {
    if !signature.is_single() {
        return Err(Error::InvalidSignature(
            signature.to_string(),
            "not a single complete type",
        ));
    }
    let mut buff = DataBuffer::new(data);
    let value = match endian {
        Endian::Little => seed.deserialize(Deserializer::<LE>::new(&mut buff, signature.as_bytes()))?,
        Endian::Big => seed.deserialize(Deserializer::<BE>::new(&mut buff, signature.as_bytes()))?,
    };
    Ok((value, buff.data_ix))
}

fn unsupported(what: &str) -> Error {
    Error::UnsupportedType(what.to_owned())
}

impl<'de, 'a, B: ByteOrder> de::Deserializer<'de> for Deserializer<'a, 'de, B> {
    type Error = Error;

    fn deserialize_any<V>(mut self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        let sig = self.peek_single_sig()?;
        match sig[0] {
            b'y' => self.deserialize_u8(visitor),
            b'b' => self.deserialize_bool(visitor),
            b'n' => self.deserialize_i16(visitor),
            b'q' => self.deserialize_u16(visitor),
            b'i' => self.deserialize_i32(visitor),
            b'u' => self.deserialize_u32(visitor),
            b'x' => self.deserialize_i64(visitor),
            b't' => self.deserialize_u64(visitor),
            b'd' => self.deserialize_f64(visitor),
            code @ (b's' | b'o' | b'g') => {
                let string = self.deserialize_str_basic(code)?;
                visitor.visit_borrowed_str(string)
            }
            b'a' => match sig[1] {
                b'{' => self.deserialize_map(visitor),
                _ => self.deserialize_seq(visitor),
            },
            b'(' => self.deserialize_tuple(0, visitor),
            b'v' => {
                let de = self.possible_variant()?;
                de.deserialize_any(visitor)
            }
            other => Err(Error::UnsupportedType(format!("'{}'", other as char))),
        }
    }

    fn deserialize_bool<V>(mut self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        let i = B::read_u32(&self.read_align_signature_value::<4>(b'b', 4)?);
        if i > 1 {
            return Err(Error::InvalidBoolValue(i));
        }
        visitor.visit_bool(i == 1)
    }

    fn deserialize_i8<V>(self, _: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        Err(unsupported("i8"))
    }

    fn deserialize_i16<V>(mut self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        let i = B::read_i16(&self.read_align_signature_value::<2>(b'n', 2)?);
        visitor.visit_i16(i)
    }

    fn deserialize_i32<V>(mut self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        let i = B::read_i32(&self.read_align_signature_value::<4>(b'i', 4)?);
        visitor.visit_i32(i)
    }

    fn deserialize_i64<V>(mut self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        let i = B::read_i64(&self.read_align_signature_value::<8>(b'x', 8)?);
        visitor.visit_i64(i)
    }

    fn deserialize_u8<V>(mut self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        let i = self.read_align_signature_value::<1>(b'y', 1)?[0];
        visitor.visit_u8(i)
    }

    fn deserialize_u16<V>(mut self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        let i = B::read_u16(&self.read_align_signature_value::<2>(b'q', 2)?);
        visitor.visit_u16(i)
    }

    fn deserialize_u32<V>(mut self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        let i = B::read_u32(&self.read_align_signature_value::<4>(b'u', 4)?);
        visitor.visit_u32(i)
    }

    fn deserialize_u64<V>(mut self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        let i = B::read_u64(&self.read_align_signature_value::<8>(b't', 8)?);
        visitor.visit_u64(i)
    }

    fn deserialize_f32<V>(self, _: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        Err(unsupported("f32"))
    }

    fn deserialize_f64<V>(mut self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        let i = B::read_f64(&self.read_align_signature_value::<8>(b'd', 8)?);
        visitor.visit_f64(i)
    }

    fn deserialize_char<V>(self, _: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        Err(unsupported("char"))
    }

    fn deserialize_str<V>(mut self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        let string = self.deserialize_str_basic(b's')?;
        visitor.visit_borrowed_str(string)
    }

    fn deserialize_string<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        self.deserialize_str(visitor)
    }

    fn deserialize_bytes<V>(mut self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        let bytes = self.deserialize_bytes_basic()?;
        visitor.visit_borrowed_bytes(bytes)
    }

    fn deserialize_byte_buf<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        self.deserialize_bytes(visitor)
    }

    fn deserialize_option<V>(self, _: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        Err(unsupported("Option"))
    }

    fn deserialize_unit<V>(self, _: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        Err(unsupported("()"))
    }

    fn deserialize_unit_struct<V>(self, name: &'static str, _: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        Err(unsupported(name))
    }

    fn deserialize_newtype_struct<V>(mut self, name: &'static str, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        // Plain strings only ever come from an 's'.
        let code = match name {
            OBJECT_PATH_NAME => b'o',
            SIGNATURE_NAME => b'g',
            _ => return visitor.visit_newtype_struct(self),
        };
        let string = self.deserialize_str_basic(code)?;
        visitor.visit_newtype_struct(BorrowedStrDeserializer::<Error>::new(string))
    }

    fn deserialize_seq<V>(mut self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        let len = self.read_array_len()?;
        let mut array = self.array_deserializer(len)?;
        let value = visitor.visit_seq(&mut array)?;
        array.finish()?;
        Ok(value)
    }

    fn deserialize_tuple<V>(mut self, _: usize, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        self.expect_signature_byte(b'(')?;
        self.align_reader(8)?;
        let mut fields = StructDeserializer {
            de: self,
            closed: false,
        };
        let value = visitor.visit_seq(&mut fields)?;
        fields.close()?;
        Ok(value)
    }

    fn deserialize_tuple_struct<V>(
        mut self,
        name: &'static str,
        sz: usize,
        visitor: V,
    ) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        if name == VARIANT_NAME {
            let (sig, value) = self.variant()?;
            visitor.visit_seq(VariantDeserializer {
                sig: Some(sig),
                value: Some(value),
            })
        } else {
            self.deserialize_tuple(sz, visitor)
        }
    }

    fn deserialize_map<V>(mut self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        if !self.peek_single_sig()?.starts_with(b"a{") {
            return Err(self.mismatch(b"a{"));
        }
        let len = self.read_array_len()?;
        let mut array = self.array_deserializer(len)?;
        let value = visitor.visit_map(&mut array)?;
        array.finish()?;
        Ok(value)
    }

    fn deserialize_struct<V>(
        self,
        _: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        self.deserialize_tuple(fields.len(), visitor)
    }

    fn deserialize_enum<V>(
        self,
        name: &'static str,
        _: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_enum(EnumDeserializer { de: self, name })
    }

    // Enum variants travel as their index.
    fn deserialize_identifier<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        self.deserialize_u32(visitor)
    }

    fn deserialize_ignored_any<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        self.deserialize_any(visitor)
    }
}

impl<'de, 'a, B: ByteOrder> ArrayDeserializer<'a, 'de, B> {
    fn overrun(&self) -> Error {
        Error::ArrayElementOverrun(self.data_buffer.data_ix, self.end_ix)
    }
}

impl<'de, 'a, B: ByteOrder> SeqAccess<'de> for ArrayDeserializer<'a, 'de, B> {
    type Error = Error;

    fn next_element_seed<T>(&mut self, seed: T) -> Result<Option<T::Value>>
    where
        T: DeserializeSeed<'de>,
    {
        if let Some(de) = self.next_item_deserializer()? {
            Ok(Some(seed.deserialize(de)?))
        } else {
            Ok(None)
        }
    }
}

impl<'de, 'a, B: ByteOrder> MapAccess<'de> for ArrayDeserializer<'a, 'de, B> {
    type Error = Error;

    fn next_key_seed<K>(&mut self, seed: K) -> Result<Option<K::Value>>
    where
        K: DeserializeSeed<'de>,
    {
        if let Some(de) = self.next_key_deserializer()? {
            Ok(Some(seed.deserialize(de)?))
        } else {
            Ok(None)
        }
    }

    fn next_value_seed<V>(&mut self, seed: V) -> Result<V::Value>
    where
        V: DeserializeSeed<'de>,
    {
        if let Some(de) = self.next_value_deserializer()? {
            Ok(seed.deserialize(de)?)
        } else {
            Err(self.overrun())
        }
    }
}

struct StructDeserializer<'a, 'de, B: ByteOrder> {
    de: Deserializer<'a, 'de, B>,
    closed: bool,
}

impl<'de, 'a, B: ByteOrder> StructDeserializer<'a, 'de, B> {
    // A visitor that stops early leaves members behind, which do not match.
    fn close(mut self) -> Result<()> {
        if !self.closed {
            self.de.expect_signature_byte(b')')?;
        }
        Ok(())
    }
}

impl<'de, 'a, B: ByteOrder> SeqAccess<'de> for StructDeserializer<'a, 'de, B> {
    type Error = Error;

    fn next_element_seed<T>(&mut self, seed: T) -> Result<Option<T::Value>>
    where
        T: DeserializeSeed<'de>,
    {
        if self.closed {
            Ok(None)
        } else if self.de.match_signature_bytes(b")") {
            self.closed = true;
            Ok(None)
        } else {
            Ok(Some(seed.deserialize(self.de.subsidiary()?)?))
        }
    }
}

// Presents a variant as the two-element sequence (signature text, value).
struct VariantDeserializer<'a, 'de, B: ByteOrder> {
    sig: Option<&'de str>,
    value: Option<Deserializer<'a, 'de, B>>,
}

impl<'de, 'a, B: ByteOrder> SeqAccess<'de> for VariantDeserializer<'a, 'de, B> {
    type Error = Error;

    fn next_element_seed<T>(&mut self, seed: T) -> Result<Option<T::Value>>
    where
        T: DeserializeSeed<'de>,
    {
        if let Some(sig) = self.sig.take() {
            let de = BorrowedStrDeserializer::<Error>::new(sig);
            Ok(Some(seed.deserialize(de)?))
        } else if let Some(value) = self.value.take() {
            Ok(Some(seed.deserialize(value)?))
        } else {
            Ok(None)
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.sig.iter().count() + self.value.iter().count())
    }
}

struct EnumDeserializer<'a, 'de: 'a, B: ByteOrder> {
    de: Deserializer<'a, 'de, B>,
    name: &'static str,
}

impl<'de, 'a, B: ByteOrder> EnumAccess<'de> for EnumDeserializer<'a, 'de, B> {
    type Error = Error;
    type Variant = UnitVariant;

    fn variant_seed<V>(self, seed: V) -> Result<(V::Value, Self::Variant)>
    where
        V: DeserializeSeed<'de>,
    {
        let name = self.name;
        seed.deserialize(self.de).map(|v| (v, UnitVariant { name }))
    }
}

struct UnitVariant {
    name: &'static str,
}

impl<'de> VariantAccess<'de> for UnitVariant {
    type Error = Error;

    fn unit_variant(self) -> Result<()> {
        Ok(())
    }

    fn newtype_variant_seed<T>(self, _: T) -> Result<T::Value>
    where
        T: DeserializeSeed<'de>,
    {
        Err(unsupported(self.name))
    }

    fn tuple_variant<V>(self, _len: usize, _: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        Err(unsupported(self.name))
    }

    fn struct_variant<V>(self, _: &'static [&'static str], _: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        Err(unsupported(self.name))
    }
}

#[cfg(test)]
mod tests {
    use crate::body::{Body, Endian};
    use crate::de::{from_body, from_parts};
    use crate::error::{Error, Result};
    use crate::ser::serialize;
    use crate::signature::{DbusType, Signature};
    use crate::value::{ObjectPath, Variant};
    use serde::de::DeserializeOwned;
    use serde::{Deserialize, Serialize};
    use std::collections::{BTreeMap, HashMap};
    use std::fmt::Debug;
    use test_log::test;

    fn round_trip<T>(val: T) -> Result<()>
    where
        T: DbusType + DeserializeOwned + Debug + Serialize + PartialEq,
    {
        let b = val;
        let body = serialize(&b)?;
        let b2: T = from_body(&body)?;
        assert_eq!(b, b2);
        Ok(())
    }

    fn body(sig: &str, data: &[u8]) -> Result<Body> {
        Ok(Body::new(Signature::new(sig)?, data.to_vec()))
    }

    // `levels` variants, each holding the next, around a u32 of 7.
    fn variant_chain(levels: usize) -> Result<Body> {
        let mut data = Vec::new();
        for _ in 1..levels {
            data.extend_from_slice(&[1, b'v', 0]);
        }
        data.extend_from_slice(&[1, b'u', 0]);
        data.resize((data.len() + 3) / 4 * 4, 0);
        data.extend_from_slice(&7u32.to_le_bytes());
        body("v", &data)
    }

    #[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
    struct StructSerialize {
        pub a: String,
        pub b: f64,
        pub c: (String, f64),
    }

    impl DbusType for StructSerialize {
        fn write_signature(out: &mut String) {
            <(String, f64, (String, f64))>::write_signature(out)
        }
    }

    #[test]
    fn round_trip_bool() -> Result<()> {
        round_trip(true)
    }

    #[test]
    fn round_trip_int() -> Result<()> {
        round_trip(3)?;
        round_trip(-3i64)?;
        round_trip(u16::MAX)
    }

    #[test]
    fn round_trip_float() -> Result<()> {
        round_trip(3.14)
    }

    #[test]
    fn round_trip_string() -> Result<()> {
        round_trip("string".to_owned())
    }

    #[test]
    fn round_trip_array0() -> Result<()> {
        round_trip(vec![1, 3, 5, 6])?;
        round_trip(Vec::<(u8, String)>::new())
    }

    #[test]
    fn round_trip_struct1() -> Result<()> {
        let data = StructSerialize {
            a: "Hi".to_owned(),
            b: 0.2,
            c: ("Hello".to_owned(), 8.3),
        };

        round_trip(data)
    }

    #[test]
    fn round_trip_dict() -> Result<()> {
        let mut props = HashMap::new();
        props.insert("Features".to_owned(), Variant::new(&vec!["SystemdActivation"])?);
        props.insert("Path".to_owned(), Variant::new(&ObjectPath::from("/org/a"))?);
        props.insert("Count".to_owned(), Variant::new(&7u32)?);
        round_trip(props)
    }

    #[test]
    fn round_trip_maps() -> Result<()> {
        let mut counts = HashMap::new();
        counts.insert("a".to_owned(), 1u32);
        counts.insert("b".to_owned(), 2u32);
        round_trip(counts)?;

        let mut nested = BTreeMap::new();
        nested.insert(3u8, vec![(1i64, "x".to_owned())]);
        nested.insert(9u8, Vec::new());
        round_trip(nested)?;
        round_trip(vec![BTreeMap::from([(ObjectPath::from("/a"), true)])])
    }

    #[test]
    fn decodes_wire_dict() -> Result<()> {
        // a{su} holding {"k": 5}; the entry starts 8-aligned after the length.
        let data = [
            12, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, b'k', 0, 0, 0, 5, 0, 0, 0,
        ];
        let map: HashMap<String, u32> = from_body(&body("a{su}", &data)?)?;
        assert_eq!(map.len(), 1);
        assert_eq!(map["k"], 5);

        // An empty a{su} in a variant, padded out to where the first entry
        // would start.
        let data = [5, b'a', b'{', b's', b'u', b'}', 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];
        let variant: Variant = from_body(&body("v", &data)?)?;
        assert_eq!(variant.signature(), "a{su}");
        assert!(variant.get::<HashMap<String, u32>>()?.is_empty());
        Ok(())
    }

    #[test]
    fn limits_nesting() -> Result<()> {
        let deepest: Variant = from_body(&variant_chain(64)?)?;
        assert_eq!(deepest.signature(), "v");

        for levels in [65, 100_000] {
            let result: Result<Variant> = from_body(&variant_chain(levels)?);
            assert!(matches!(result, Err(Error::NestingTooDeep(64))), "{} levels", levels);
        }

        Ok(())
    }

    #[test]
    fn rejects_interior_nul() -> Result<()> {
        let result: Result<String> = from_body(&body("s", &[3, 0, 0, 0, b'a', 0, b'b', 0])?);
        assert!(matches!(result, Err(Error::InteriorNul(s)) if s == "a\0b"));

        let result: Result<ObjectPath> = from_body(&body("o", &[3, 0, 0, 0, b'/', 0, b'a', 0])?);
        assert!(matches!(result, Err(Error::InteriorNul(_))));
        Ok(())
    }

    #[test]
    fn strings_need_their_own_code() -> Result<()> {
        let path = serialize(&ObjectPath::from("/org/a"))?;
        let result: Result<String> = from_body(&path);
        assert!(matches!(result, Err(Error::SignatureMismatch { .. })));

        let signature = serialize(&Signature::new("as")?)?;
        let result: Result<String> = from_body(&signature);
        assert!(matches!(result, Err(Error::SignatureMismatch { .. })));

        let text = serialize("/org/a")?;
        let result: Result<ObjectPath> = from_body(&text);
        assert!(matches!(result, Err(Error::SignatureMismatch { .. })));
        let result: Result<Signature> = from_body(&text);
        assert!(matches!(result, Err(Error::SignatureMismatch { .. })));
        Ok(())
    }

    #[test]
    fn round_trip_string_likes() -> Result<()> {
        round_trip(ObjectPath::from("/org/freedesktop/DBus"))?;
        round_trip(Signature::new("a{sv}")?)?;
        round_trip(vec![Signature::new("i")?, Signature::new("(ss)")?])
    }

    #[test]
    fn tuple_vs_struct() -> Result<()> {
        let data_tuple = ("Hi", 0.2, ("Hello", 8.3));
        let body = serialize(&data_tuple)?;
        let data: StructSerialize = from_body(&body)?;

        let data_good = StructSerialize {
            a: "Hi".to_owned(),
            b: 0.2,
            c: ("Hello".to_owned(), 8.3),
        };
        assert_eq!(data, data_good);

        Ok(())
    }

    #[test]
    fn borrows_strings() -> Result<()> {
        let body = serialize("borrowed")?;
        let s: &str = from_body(&body)?;
        assert_eq!(s, "borrowed");
        Ok(())
    }

    #[test]
    fn big_endian() -> Result<()> {
        let sig = Signature::new("(su)")?;
        let data = [0, 0, 0, 2, b'H', b'i', 0, 0, 0, 0, 0, 7];
        let (s, u): (String, u32) = from_parts(&sig, &data, Endian::Big)?;
        assert_eq!(s, "Hi");
        assert_eq!(u, 7);
        Ok(())
    }

    #[test]
    fn rejects_malformed_data() -> Result<()> {
        let result: Result<bool> = from_body(&body("b", &[2, 0, 0, 0])?);
        assert!(matches!(result, Err(Error::InvalidBoolValue(2))));

        let result: Result<i32> = from_body(&body("i", &[1, 0, 0, 0, 0])?);
        assert!(matches!(result, Err(Error::LeftoverData(1))));

        let result: Result<i32> = from_body(&body("i", &[1, 0])?);
        assert!(matches!(result, Err(Error::IndexOutOfBounds(_))));

        let result: Result<String> = from_body(&body("s", &[2, 0, 0, 0, b'H', b'i', b'x'])?);
        assert!(matches!(result, Err(Error::UnterminatedString)));

        let result: Result<Vec<u32>> = from_body(&body("au", &[64, 0, 0, 0, 1, 0, 0, 0])?);
        assert!(matches!(result, Err(Error::IndexOutOfBounds(_))));
        Ok(())
    }

    #[test]
    fn type_must_match_signature() -> Result<()> {
        let int_body = serialize(&5i32)?;
        let result: Result<String> = from_body(&int_body);
        assert!(matches!(result, Err(Error::SignatureMismatch { .. })));

        let result: Result<u32> = from_body(&int_body);
        assert!(matches!(result, Err(Error::SignatureMismatch { .. })));

        let triple = serialize(&(1i32, 2i32, 3i32))?;
        let result: Result<(i32, i32)> = from_body(&triple);
        assert!(matches!(result, Err(Error::SignatureMismatch { .. })));

        let result: Result<(i32, i32, i32, i32)> = from_body(&triple);
        assert!(result.is_err());
        Ok(())
    }

    #[test]
    fn unit_enums_use_their_index() -> Result<()> {
        #[derive(Debug, Serialize, Deserialize, PartialEq)]
        enum Level {
            Low,
            High,
        }

        impl DbusType for Level {
            fn write_signature(out: &mut String) {
                out.push('u');
            }
        }

        let body = serialize(&Level::High)?;
        assert_eq!(body.data(), &[1, 0, 0, 0]);
        round_trip(Level::Low)
    }
}
