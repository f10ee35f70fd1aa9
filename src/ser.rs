//! Marshalling of Rust values into DBus message bodies.
//!
//! The serializer walks the value and its expected signature in lock-step:
//! every serde call is checked against the complete type the signature says
//! comes next, so a value can never be written under a signature that does
//! not describe it. The expected signature is normally derived from the
//! value's [`DbusType`], but [`serialize_with_signature`] accepts any single
//! complete type, which is how values of dynamic shape (such as
//! [`Value`](crate::Value)) are written.

use crate::body::Body;
use crate::error::{Error, Result};
use crate::primitives::{PathStr, SigStr};
use crate::signature::{complete_type_len, DbusType, Signature};

use serde::{ser, Serialize};

mod internal;
mod message_builder;

use internal::*;
use message_builder::MessageBuilder;
pub(crate) use message_builder::MAX_ARRAY_LEN;

const MAX_SIGNATURE_LEN: usize = 255;

/// Name under which [`Variant`](crate::Variant) presents itself to serde, as
/// a tuple struct of its signature text and its value.
pub(crate) const VARIANT_NAME: &str = "$typed_dbus::Variant";

/// Serializes a single value under the signature derived from its type.
pub fn serialize<T>(value: &T) -> Result<Body>
where
    T: DbusType + Serialize + ?Sized,
{
    serialize_with_signature(value, &T::signature())
}

/// Serializes a single value under an explicit signature, which must be one
/// complete type.
pub fn serialize_with_signature<T>(value: &T, signature: &Signature) -> Result<Body>
where
    T: Serialize + ?Sized,
{
    require_single(signature)?;
    let done = value.serialize(Serializer::new(ReadySerializer::new(), signature.as_bytes()))?;
    done.complete()
}

fn require_single(signature: &Signature) -> Result<()> {
    if signature.is_single() {
        Ok(())
    } else {
        Err(Error::InvalidSignature(
            signature.to_string(),
            "not a single complete type",
        ))
    }
}

/// Accumulates the arguments of a message body, one complete type at a time.
///
/// An argument that fails to serialize leaves the builder as it was.
pub struct BodyBuilder {
    builder: MessageBuilder,
    signature: String,
}

impl Default for BodyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BodyBuilder {
    pub fn new() -> Self {
        Self {
            builder: MessageBuilder::new(),
            signature: String::new(),
        }
    }

    pub fn push<T>(&mut self, value: &T) -> Result<()>
    where
        T: DbusType + Serialize + ?Sized,
    {
        // Derived signatures are re-validated, since DbusType can be
        // implemented by hand.
        let signature = Signature::new(T::signature().as_str())?;
        self.push_with_signature(value, &signature)
    }

    pub fn push_with_signature<T>(&mut self, value: &T, signature: &Signature) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        require_single(signature)?;
        if self.signature.len() + signature.len() > MAX_SIGNATURE_LEN {
            return Err(Error::InvalidSignature(
                format!("{}{}", self.signature, signature),
                "longer than 255 bytes",
            ));
        }

        let done = value.serialize(Serializer::new(ReadySerializer::new(), signature.as_bytes()))?;
        let (builder, _) = done.into_parts();
        self.builder.append_data(&builder);
        self.signature.push_str(signature.as_str());
        Ok(())
    }

    /// The signature of the arguments pushed so far.
    pub fn signature(&self) -> &str {
        &self.signature
    }

    pub fn is_empty(&self) -> bool {
        self.signature.is_empty()
    }

    pub fn finish(self) -> Result<Body> {
        let signature = Signature::new(self.signature)?;
        Ok(Body::new(signature, self.builder.complete()?))
    }
}

fn taken<T>(slot: &mut Option<T>) -> Result<T> {
    slot.take()
        .ok_or_else(|| Error::Serializing("serializer used after an error".to_owned()))
}

fn unsupported(what: &str) -> Error {
    Error::UnsupportedType(what.to_owned())
}

struct Serializer<'s> {
    internal_ser: ReadySerializer,
    // The single complete type this value must have.
    sig: &'s [u8],
}

impl<'s> Serializer<'s> {
    fn new(internal_ser: ReadySerializer, sig: &'s [u8]) -> Self {
        Self { internal_ser, sig }
    }

    fn expect(&self, code: u8) -> Result<()> {
        if self.sig == &[code][..] {
            Ok(())
        } else {
            Err(Error::mismatch(self.sig, (code as char).to_string()))
        }
    }

    // Splits "(...)" or "{...}" into the member types, keeping the closing
    // bracket at the end.
    fn members(&self, open: u8, found: &str) -> Result<&'s [u8]> {
        let sig = self.sig;
        match sig.first() {
            Some(&code) if code == open => Ok(&sig[1..]),
            _ => Err(Error::mismatch(self.sig, found)),
        }
    }

    fn start_struct(self, found: &str) -> Result<SerializeTuple<'s>> {
        let fields = self.members(b'(', found)?;
        Ok(SerializeTuple {
            internal_ser: Some(self.internal_ser.start_struct()),
            sig: self.sig,
            fields,
        })
    }
}

impl<'s> ser::Serializer for Serializer<'s> {
    type Ok = DoneSerializer;
    type Error = Error;

    type SerializeSeq = SerializeSeq<'s>;
    type SerializeTuple = SerializeTuple<'s>;
    type SerializeTupleStruct = SerializeTupleStruct<'s>;
    type SerializeTupleVariant = ser::Impossible<DoneSerializer, Error>;
    type SerializeMap = SerializeMap<'s>;
    type SerializeStruct = SerializeTuple<'s>;
    type SerializeStructVariant = ser::Impossible<DoneSerializer, Error>;

    fn serialize_bool(self, val: bool) -> Result<DoneSerializer> {
        self.expect(b'b')?;
        self.internal_ser.serialize_primitive(&val)
    }

    fn serialize_i8(self, _: i8) -> Result<DoneSerializer> {
        Err(unsupported("i8"))
    }

    fn serialize_i16(self, val: i16) -> Result<DoneSerializer> {
        self.expect(b'n')?;
        self.internal_ser.serialize_primitive(&val)
    }

    fn serialize_i32(self, val: i32) -> Result<DoneSerializer> {
        self.expect(b'i')?;
        self.internal_ser.serialize_primitive(&val)
    }

    fn serialize_i64(self, val: i64) -> Result<DoneSerializer> {
        self.expect(b'x')?;
        self.internal_ser.serialize_primitive(&val)
    }

    fn serialize_u8(self, val: u8) -> Result<DoneSerializer> {
        self.expect(b'y')?;
        self.internal_ser.serialize_primitive(&val)
    }

    fn serialize_u16(self, val: u16) -> Result<DoneSerializer> {
        self.expect(b'q')?;
        self.internal_ser.serialize_primitive(&val)
    }

    fn serialize_u32(self, val: u32) -> Result<DoneSerializer> {
        self.expect(b'u')?;
        self.internal_ser.serialize_primitive(&val)
    }

    fn serialize_u64(self, val: u64) -> Result<DoneSerializer> {
        self.expect(b't')?;
        self.internal_ser.serialize_primitive(&val)
    }

    fn serialize_f32(self, _: f32) -> Result<DoneSerializer> {
        Err(unsupported("f32"))
    }

    fn serialize_f64(self, val: f64) -> Result<DoneSerializer> {
        self.expect(b'd')?;
        self.internal_ser.serialize_primitive(&val)
    }

    fn serialize_char(self, _: char) -> Result<DoneSerializer> {
        Err(unsupported("char"))
    }

    fn serialize_str(self, val: &str) -> Result<DoneSerializer> {
        match self.sig {
            b"s" => self.internal_ser.serialize_primitive(&val),
            b"o" => self.internal_ser.serialize_primitive(&PathStr(val)),
            b"g" => {
                Signature::new(val)?;
                self.internal_ser.serialize_primitive(&SigStr(val))
            }
            _ => Err(Error::mismatch(self.sig, "s")),
        }
    }

    fn serialize_bytes(self, val: &[u8]) -> Result<DoneSerializer> {
        if self.sig != &b"ay"[..] {
            return Err(Error::mismatch(self.sig, "ay"));
        }
        let mut array = self.internal_ser.start_array(vec![b'y'])?;
        for byte in val {
            let (pending, item) = array.start_item();
            array = pending.finish_item(item.serialize_primitive(byte)?)?;
        }
        array.finish_array()
    }

    fn serialize_none(self) -> Result<DoneSerializer> {
        Err(unsupported("Option"))
    }

    fn serialize_some<T>(self, _: &T) -> Result<DoneSerializer>
    where
        T: Serialize + ?Sized,
    {
        Err(unsupported("Option"))
    }

    fn serialize_unit(self) -> Result<DoneSerializer> {
        Err(unsupported("()"))
    }

    fn serialize_unit_struct(self, name: &'static str) -> Result<DoneSerializer> {
        Err(unsupported(name))
    }

    fn serialize_unit_variant(
        self,
        _: &'static str,
        variant_index: u32,
        _: &'static str,
    ) -> Result<DoneSerializer> {
        self.serialize_u32(variant_index)
    }

    fn serialize_newtype_struct<T>(self, _: &'static str, value: &T) -> Result<DoneSerializer>
    where
        T: Serialize + ?Sized,
    {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T>(
        self,
        name: &'static str,
        _: u32,
        variant: &'static str,
        _: &T,
    ) -> Result<DoneSerializer>
    where
        T: Serialize + ?Sized,
    {
        Err(unsupported(&format!("{}::{}", name, variant)))
    }

    fn serialize_seq(self, _: Option<usize>) -> Result<Self::SerializeSeq> {
        match self.sig {
            [b'a', item_sig @ ..] if item_sig.first() != Some(&b'{') => Ok(SerializeSeq {
                internal_ser: Some(self.internal_ser.start_array(item_sig.to_vec())?),
                item_sig,
            }),
            _ => Err(Error::mismatch(self.sig, "array")),
        }
    }

    fn serialize_tuple(self, _: usize) -> Result<Self::SerializeTuple> {
        self.start_struct("struct")
    }

    fn serialize_tuple_struct(
        self,
        name: &'static str,
        _: usize,
    ) -> Result<Self::SerializeTupleStruct> {
        if name == VARIANT_NAME {
            if self.sig != &b"v"[..] {
                return Err(Error::mismatch(self.sig, "v"));
            }
            let (parent, ready) = self.internal_ser.start_variant();
            Ok(SerializeTupleStruct::Variant(SerializeVariant {
                parent: Some(parent),
                ready: Some(ready),
                signature: None,
                value: None,
            }))
        } else {
            Ok(SerializeTupleStruct::Struct(self.start_struct(name)?))
        }
    }

    fn serialize_tuple_variant(
        self,
        name: &'static str,
        _: u32,
        variant: &'static str,
        _: usize,
    ) -> Result<Self::SerializeTupleVariant> {
        Err(unsupported(&format!("{}::{}", name, variant)))
    }

    fn serialize_map(self, _: Option<usize>) -> Result<Self::SerializeMap> {
        let entry_sig = match self.sig {
            [b'a', entry_sig @ ..] if entry_sig.first() == Some(&b'{') => entry_sig,
            _ => return Err(Error::mismatch(self.sig, "dict")),
        };
        // A valid "{KV}" always has a single-byte basic key.
        let key_sig = &entry_sig[1..2];
        let value_len = complete_type_len(&entry_sig[2..])?;
        let value_sig = &entry_sig[2..2 + value_len];
        Ok(SerializeMap {
            internal_ser: Some(self.internal_ser.start_array(entry_sig.to_vec())?),
            pending: None,
            key_sig,
            value_sig,
        })
    }

    fn serialize_struct(self, name: &'static str, _: usize) -> Result<Self::SerializeStruct> {
        self.start_struct(name)
    }

    fn serialize_struct_variant(
        self,
        name: &'static str,
        _: u32,
        variant: &'static str,
        _: usize,
    ) -> Result<Self::SerializeStructVariant> {
        Err(unsupported(&format!("{}::{}", name, variant)))
    }
}

struct SerializeSeq<'s> {
    internal_ser: Option<ReadyArraySerializer>,
    item_sig: &'s [u8],
}

impl ser::SerializeSeq for SerializeSeq<'_> {
    type Ok = DoneSerializer;
    type Error = Error;

    fn serialize_element<T>(&mut self, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let internal_ser = taken(&mut self.internal_ser)?;
        let (internal_ser, item) = internal_ser.start_item();
        let item = value.serialize(Serializer::new(item, self.item_sig))?;
        self.internal_ser = Some(internal_ser.finish_item(item)?);
        Ok(())
    }

    fn end(mut self) -> Result<DoneSerializer> {
        taken(&mut self.internal_ser)?.finish_array()
    }
}

struct SerializeTuple<'s> {
    internal_ser: Option<ReadyStructSerializer>,
    sig: &'s [u8],
    // Member types not written yet, followed by the closing ')'.
    fields: &'s [u8],
}

impl SerializeTuple<'_> {
    fn field<T>(&mut self, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        if self.fields.len() <= 1 {
            return Err(Error::mismatch(self.sig, "struct with more fields"));
        }
        let len = complete_type_len(self.fields)?;
        let (field_sig, rest) = self.fields.split_at(len);

        let internal_ser = taken(&mut self.internal_ser)?;
        let (internal_ser, item) = internal_ser.start_item();
        let item = value.serialize(Serializer::new(item, field_sig))?;
        self.internal_ser = Some(internal_ser.finish_item(item));
        self.fields = rest;
        Ok(())
    }

    fn finish(mut self) -> Result<DoneSerializer> {
        if self.fields.len() != 1 {
            return Err(Error::mismatch(self.sig, "struct with fewer fields"));
        }
        Ok(taken(&mut self.internal_ser)?.finish_struct())
    }
}

impl ser::SerializeTuple for SerializeTuple<'_> {
    type Ok = DoneSerializer;
    type Error = Error;

    fn serialize_element<T>(&mut self, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        self.field(value)
    }

    fn end(self) -> Result<DoneSerializer> {
        self.finish()
    }
}

impl ser::SerializeStruct for SerializeTuple<'_> {
    type Ok = DoneSerializer;
    type Error = Error;

    fn serialize_field<T>(&mut self, _: &'static str, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        self.field(value)
    }

    fn end(self) -> Result<DoneSerializer> {
        self.finish()
    }
}

struct SerializeVariant {
    parent: Option<VariantSerializer>,
    ready: Option<ReadySerializer>,
    signature: Option<Signature>,
    value: Option<DoneSerializer>,
}

impl SerializeVariant {
    fn field<T>(&mut self, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        match &self.signature {
            None => {
                // The signature text arrives as an ordinary string, so it is
                // captured by writing it out and reading it back.
                let scratch = value.serialize(Serializer::new(ReadySerializer::new(), b"s"))?;
                let text: String = crate::de::from_body(&scratch.complete()?)?;
                let signature = Signature::new(text)?;
                require_single(&signature)?;
                self.signature = Some(signature);
            }
            Some(signature) => {
                if self.value.is_some() {
                    return Err(Error::Serializing(
                        "variant has exactly two fields".to_owned(),
                    ));
                }
                let ready = taken(&mut self.ready)?;
                self.value = Some(value.serialize(Serializer::new(ready, signature.as_bytes()))?);
            }
        }
        Ok(())
    }

    fn finish(mut self) -> Result<DoneSerializer> {
        let value = taken(&mut self.value)?;
        Ok(taken(&mut self.parent)?.finish_variant(value))
    }
}

enum SerializeTupleStruct<'s> {
    Struct(SerializeTuple<'s>),
    Variant(SerializeVariant),
}

impl ser::SerializeTupleStruct for SerializeTupleStruct<'_> {
    type Ok = DoneSerializer;
    type Error = Error;

    fn serialize_field<T>(&mut self, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        match self {
            SerializeTupleStruct::Struct(ser) => ser.field(value),
            SerializeTupleStruct::Variant(ser) => ser.field(value),
        }
    }

    fn end(self) -> Result<DoneSerializer> {
        match self {
            SerializeTupleStruct::Struct(ser) => ser.finish(),
            SerializeTupleStruct::Variant(ser) => ser.finish(),
        }
    }
}

struct SerializeMap<'s> {
    internal_ser: Option<ReadyArraySerializer>,
    // Set between a key and its value.
    pending: Option<(PendingArraySerializer, ReadyStructSerializer)>,
    key_sig: &'s [u8],
    value_sig: &'s [u8],
}

impl ser::SerializeMap for SerializeMap<'_> {
    type Ok = DoneSerializer;
    type Error = Error;

    fn serialize_key<T>(&mut self, key: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let internal_ser = taken(&mut self.internal_ser)?;
        let (pending, entry) = internal_ser.start_item();
        let (entry, key_ser) = entry.start_kv_pair().start_item();
        let key_done = key.serialize(Serializer::new(key_ser, self.key_sig))?;
        self.pending = Some((pending, entry.finish_item(key_done)));
        Ok(())
    }

    fn serialize_value<T>(&mut self, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let (pending, entry) = taken(&mut self.pending)?;
        let (entry, value_ser) = entry.start_item();
        let value_done = value.serialize(Serializer::new(value_ser, self.value_sig))?;
        let entry = entry.finish_item(value_done).finish_kv_pair();
        self.internal_ser = Some(pending.finish_item(entry)?);
        Ok(())
    }

    fn end(mut self) -> Result<DoneSerializer> {
        taken(&mut self.internal_ser)?.finish_array()
    }
}

#[cfg(test)]
mod tests {
    use super::{serialize, serialize_with_signature, BodyBuilder};
    use crate::error::{Error, Result};
    use crate::signature::{DbusType, Signature};
    use crate::value::{ObjectPath, Variant};
    use serde::Serialize;
    use std::collections::BTreeMap;
    use test_log::test;

    const NESTED_STRUCT: [u8; 40] = [
        2u8, 0u8, 0u8, 0u8, 72u8, 105u8, 0u8, 0u8, 154u8, 153u8, 153u8, 153u8, 153u8, 153u8,
        201u8, 63u8, 5u8, 0u8, 0u8, 0u8, 72u8, 101u8, 108u8, 108u8, 111u8, 0u8, 0u8, 0u8, 0u8,
        0u8, 0u8, 0u8, 154u8, 153u8, 153u8, 153u8, 153u8, 153u8, 32u8, 64u8,
    ];

    #[test]
    fn serialize_int() -> Result<()> {
        let body = serialize(&37i32)?;
        assert_eq!(body.data(), &[37, 0, 0, 0], "i32 serialized incorrectly");
        assert_eq!(body.signature(), "i");
        Ok(())
    }

    #[test]
    fn serialize_tuple() -> Result<()> {
        let data = ("Hi", 0.2f64, ("Hello", 8.3f64));
        let body = serialize(&data)?;
        assert_eq!(body.data(), &NESTED_STRUCT[..], "struct serialized incorrectly");
        assert_eq!(body.signature(), "(sd(sd))");
        Ok(())
    }

    #[test]
    fn serialize_struct() -> Result<()> {
        #[derive(Clone, Debug, Serialize)]
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

        let data = StructSerialize {
            a: "Hi".to_owned(),
            b: 0.2,
            c: ("Hello".to_owned(), 8.3),
        };
        let body = serialize(&data)?;
        assert_eq!(body.data(), &NESTED_STRUCT[..], "struct serialized incorrectly");
        assert_eq!(body.signature(), "(sd(sd))");
        Ok(())
    }

    #[test]
    fn serialize_dict() -> Result<()> {
        let mut data = BTreeMap::new();
        data.insert("a".to_owned(), Variant::new("Hi")?);
        data.insert("b".to_owned(), Variant::new(&0.2f64)?);
        data.insert("c".to_owned(), Variant::new(&("Hello", 8.3f64))?);

        let body = serialize(&data)?;
        assert_eq!(
            body.data(),
            &[
                88u8, 0u8, 0u8, 0u8, // 88 bytes of array
                0u8, 0u8, 0u8, 0u8, // padding(8)
                1u8, 0u8, 0u8, 0u8, // 1 byte string
                97u8, 0u8, // "a"
                1u8, // 1 byte signature
                115u8, 0u8, // 's'
                0u8, 0u8, 0u8, // padding(4)
                2u8, 0u8, 0u8, 0u8, // 2 byte string
                72u8, 105u8, 0u8, // "Hi"
                0u8, 0u8, 0u8, 0u8, 0u8, // padding(8)
                1u8, 0u8, 0u8, 0u8, // 1 byte string
                98u8, 0u8, // "b"
                1u8, // 1 byte signature
                100u8, 0u8, // "d"
                0u8, 0u8, 0u8, 0u8, 0u8, 0u8, 0u8, // padding(8)
                154u8, 153u8, 153u8, 153u8, 153u8, 153u8, 201u8, 63u8, // double 0.2
                1u8, 0u8, 0u8, 0u8, // 1 byte string
                99u8, 0u8, // "c"
                4u8, // 4 byte signature
                40u8, 115u8, 100u8, 41u8, 0u8, // "(sd)"
                0u8, 0u8, 0u8, 0u8, // padding(8)
                5u8, 0u8, 0u8, 0u8, // 5 byte string
                72u8, 101u8, 108u8, 108u8, 111u8, 0u8, // "Hello"
                0u8, 0u8, 0u8, 0u8, 0u8, 0u8, // padding(8)
                154u8, 153u8, 153u8, 153u8, 153u8, 153u8, 32u8, 64u8, // double 8.3
            ][..],
            "dict serialized incorrectly"
        );
        assert_eq!(body.signature(), "a{sv}");
        Ok(())
    }

    #[test]
    fn serialize_variant_array() -> Result<()> {
        let body = serialize(&Variant::new(&vec![1.0f64, 2.0, 3.0, 4.0])?)?;
        assert_eq!(
            body.data(),
            &[
                2, 97, 100, 0, 32, 0, 0, 0, 0, 0, 0, 0, 0, 0, 240, 63, 0, 0, 0, 0, 0, 0, 0, 64, 0,
                0, 0, 0, 0, 0, 8, 64, 0, 0, 0, 0, 0, 0, 16, 64,
            ][..]
        );
        assert_eq!(body.signature(), "v");
        Ok(())
    }

    #[test]
    fn string_like_types() -> Result<()> {
        let body = serialize(&ObjectPath::from("/org/a"))?;
        assert_eq!(body.data(), b"\x06\0\0\0/org/a\0");
        assert_eq!(body.signature(), "o");

        let body = serialize(&Signature::new("a{sv}")?)?;
        assert_eq!(body.data(), b"\x05a{sv}\0");
        assert_eq!(body.signature(), "g");

        let result = serialize_with_signature("a{", &Signature::new("g")?);
        assert!(matches!(result, Err(Error::InvalidSignature(_, _))));
        Ok(())
    }

    #[test]
    fn empty_array_of_structs() -> Result<()> {
        let body = serialize(&Vec::<(i32, i32)>::new())?;
        assert_eq!(body.data(), &[0, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(body.signature(), "a(ii)");
        Ok(())
    }

    #[test]
    fn value_must_match_signature() -> Result<()> {
        let result = serialize_with_signature(&5i32, &Signature::new("s")?);
        assert!(matches!(result, Err(Error::SignatureMismatch { .. })));

        let result = serialize_with_signature(&(1i32, 2i32), &Signature::new("(iii)")?);
        assert!(matches!(result, Err(Error::SignatureMismatch { .. })));

        let result = serialize_with_signature(&(1i32, 2i32), &Signature::new("(i)")?);
        assert!(matches!(result, Err(Error::SignatureMismatch { .. })));

        let result = serialize_with_signature(&5i32, &Signature::new("ii")?);
        assert!(matches!(result, Err(Error::InvalidSignature(_, _))));
        Ok(())
    }

    #[test]
    fn unsupported_types() -> Result<()> {
        let result = serialize_with_signature(&Some(1i32), &Signature::new("i")?);
        assert!(matches!(result, Err(Error::UnsupportedType(_))));

        let result = serialize_with_signature(&1i8, &Signature::new("y")?);
        assert!(matches!(result, Err(Error::UnsupportedType(_))));

        let result = serialize_with_signature(&1.5f32, &Signature::new("d")?);
        assert!(matches!(result, Err(Error::UnsupportedType(_))));
        Ok(())
    }

    #[test]
    fn body_builder_survives_failed_push() -> Result<()> {
        let mut builder = BodyBuilder::new();
        builder.push(&1i32)?;
        assert!(builder
            .push_with_signature("x", &Signature::new("u")?)
            .is_err());
        builder.push("ok")?;
        assert_eq!(builder.signature(), "is");

        let body = builder.finish()?;
        assert_eq!(body.signature(), "is");
        assert_eq!(body.data(), b"\x01\0\0\0\x02\0\0\0ok\0");
        Ok(())
    }

    #[test]
    fn rejects_interior_nul() -> Result<()> {
        assert!(matches!(serialize("a\0b"), Err(Error::InteriorNul(s)) if s == "a\0b"));
        assert!(matches!(
            serialize(&ObjectPath::from("/a\0b")),
            Err(Error::InteriorNul(_))
        ));
        assert!(matches!(
            serialize(&vec!["fine".to_owned(), "not\0fine".to_owned()]),
            Err(Error::InteriorNul(_))
        ));

        let mut builder = BodyBuilder::new();
        assert!(builder.push("a\0b").is_err());
        assert!(builder.is_empty());
        builder.push("ab")?;
        assert_eq!(builder.finish()?.data(), b"\x02\0\0\0ab\0");
        Ok(())
    }

    #[test]
    fn body_builder_aligns_each_argument() -> Result<()> {
        let mut builder = BodyBuilder::new();
        builder.push(&7u8)?;
        builder.push(&9u64)?;
        let body = builder.finish()?;
        assert_eq!(body.signature(), "yt");
        assert_eq!(
            body.data(),
            &[7, 0, 0, 0, 0, 0, 0, 0, 9, 0, 0, 0, 0, 0, 0, 0]
        );
        Ok(())
    }
}
