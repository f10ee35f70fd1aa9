//! Dynamically typed DBus values.
//!
//! [`Variant`] is the self-describing `v` container: it pairs a value with
//! its signature, and hands the value back out only as the type that
//! signature describes. [`Value`] is the closed set of shapes a variant can
//! hold, which is also how replies of unknown type can be inspected.

use crate::body::Body;
use crate::de::from_parts_seed;
use crate::error::{Error, Result};
use crate::ser::{serialize, serialize_with_signature, VARIANT_NAME};
use crate::signature::{complete_type_len, is_basic, BasicType, DbusType, Signature};

use serde::de::{self, DeserializeOwned, DeserializeSeed, MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeMap, SerializeSeq, SerializeTuple, SerializeTupleStruct};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{self, Display, Write};

/// A DBus object path, e.g. `/org/freedesktop/DBus`.
///
/// The text is not validated; the bus rejects malformed paths.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectPath(pub String);

/// The newtype name serde derives for [`ObjectPath`].
pub(crate) const OBJECT_PATH_NAME: &str = "ObjectPath";

impl ObjectPath {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ObjectPath {
    fn from(path: &str) -> Self {
        ObjectPath(path.to_owned())
    }
}

impl From<String> for ObjectPath {
    fn from(path: String) -> Self {
        ObjectPath(path)
    }
}

impl Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl DbusType for ObjectPath {
    fn write_signature(out: &mut String) {
        out.push('o');
    }
}

impl BasicType for ObjectPath {}

/// Any value that can travel over the bus.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Byte(u8),
    Bool(bool),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Double(f64),
    Str(String),
    ObjectPath(ObjectPath),
    Signature(Signature),
    Array(Array),
    Dict(Dict),
    /// Must have at least one field; an empty struct has no signature.
    Struct(Vec<Value>),
    Variant(Box<Variant>),
}

/// A homogeneous array that knows its element type even when empty.
#[derive(Clone, Debug, PartialEq)]
pub struct Array {
    element: Signature,
    items: Vec<Value>,
}

impl Array {
    pub fn new(element: Signature, items: Vec<Value>) -> Result<Self> {
        if !element.is_single() || element.as_bytes()[0] == b'{' {
            return Err(Error::InvalidSignature(
                element.to_string(),
                "array element must be a single complete type",
            ));
        }
        check_items(&element, items.iter())?;
        Ok(Self { element, items })
    }

    pub fn element_signature(&self) -> &Signature {
        &self.element
    }

    pub fn items(&self) -> &[Value] {
        &self.items
    }

    pub fn into_items(self) -> Vec<Value> {
        self.items
    }
}

/// A dict (`a{KV}`): an array of key/value entries with a basic key type.
#[derive(Clone, Debug, PartialEq)]
pub struct Dict {
    key: Signature,
    value: Signature,
    entries: Vec<(Value, Value)>,
}

impl Dict {
    pub fn new(key: Signature, value: Signature, entries: Vec<(Value, Value)>) -> Result<Self> {
        if key.len() != 1 || !is_basic(key.as_bytes()[0]) {
            return Err(Error::InvalidDictKey(key.to_string()));
        }
        if !value.is_single() {
            return Err(Error::InvalidSignature(
                value.to_string(),
                "dict value must be a single complete type",
            ));
        }
        check_items(&key, entries.iter().map(|(k, _)| k))?;
        check_items(&value, entries.iter().map(|(_, v)| v))?;
        Ok(Self {
            key,
            value,
            entries,
        })
    }

    pub fn key_signature(&self) -> &Signature {
        &self.key
    }

    pub fn value_signature(&self) -> &Signature {
        &self.value
    }

    pub fn entries(&self) -> &[(Value, Value)] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<(Value, Value)> {
        self.entries
    }
}

fn check_items<'v>(expected: &Signature, items: impl Iterator<Item = &'v Value>) -> Result<()> {
    for item in items {
        let found = item.signature();
        if found != *expected {
            return Err(Error::mismatch(expected.as_bytes(), found.as_str()));
        }
    }
    Ok(())
}

impl Value {
    pub fn signature(&self) -> Signature {
        let mut sig = String::new();
        self.write_signature(&mut sig);
        Signature::from_trusted(sig)
    }

    fn write_signature(&self, out: &mut String) {
        match self {
            Value::Byte(_) => out.push('y'),
            Value::Bool(_) => out.push('b'),
            Value::Int16(_) => out.push('n'),
            Value::UInt16(_) => out.push('q'),
            Value::Int32(_) => out.push('i'),
            Value::UInt32(_) => out.push('u'),
            Value::Int64(_) => out.push('x'),
            Value::UInt64(_) => out.push('t'),
            Value::Double(_) => out.push('d'),
            Value::Str(_) => out.push('s'),
            Value::ObjectPath(_) => out.push('o'),
            Value::Signature(_) => out.push('g'),
            Value::Array(array) => {
                out.push('a');
                out.push_str(array.element.as_str());
            }
            Value::Dict(dict) => {
                out.push_str("a{");
                out.push_str(dict.key.as_str());
                out.push_str(dict.value.as_str());
                out.push('}');
            }
            Value::Struct(fields) => {
                out.push('(');
                for field in fields {
                    field.write_signature(out);
                }
                out.push(')');
            }
            Value::Variant(_) => out.push('v'),
        }
    }

    /// Writes the value in the textual format used by `gdbus`, e.g.
    /// `<['SystemdActivation']>`. Types that would not be inferred from the
    /// text are annotated when `annotate` is set.
    fn write_text(&self, f: &mut fmt::Formatter<'_>, annotate: bool) -> fmt::Result {
        let prefix = |name: &str| if annotate { format!("{} ", name) } else { String::new() };
        match self {
            Value::Byte(b) => write!(f, "{}0x{:02x}", prefix("byte"), b),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int16(i) => write!(f, "{}{}", prefix("int16"), i),
            Value::UInt16(i) => write!(f, "{}{}", prefix("uint16"), i),
            Value::Int32(i) => write!(f, "{}", i),
            Value::UInt32(i) => write!(f, "{}{}", prefix("uint32"), i),
            Value::Int64(i) => write!(f, "{}{}", prefix("int64"), i),
            Value::UInt64(i) => write!(f, "{}{}", prefix("uint64"), i),
            Value::Double(d) => write!(f, "{:?}", d),
            Value::Str(s) => write_quoted(f, s),
            Value::ObjectPath(p) => {
                f.write_str(&prefix("objectpath"))?;
                write_quoted(f, p.as_str())
            }
            Value::Signature(s) => {
                f.write_str(&prefix("signature"))?;
                write_quoted(f, s.as_str())
            }
            Value::Array(array) => {
                if array.items.is_empty() {
                    return write!(f, "@a{} []", array.element);
                }
                f.write_char('[')?;
                for (ix, item) in array.items.iter().enumerate() {
                    if ix > 0 {
                        f.write_str(", ")?;
                    }
                    item.write_text(f, annotate && ix == 0)?;
                }
                f.write_char(']')
            }
            Value::Dict(dict) => {
                if dict.entries.is_empty() {
                    return write!(f, "@a{{{}{}}} {{}}", dict.key, dict.value);
                }
                f.write_char('{')?;
                for (ix, (key, value)) in dict.entries.iter().enumerate() {
                    if ix > 0 {
                        f.write_str(", ")?;
                    }
                    key.write_text(f, annotate && ix == 0)?;
                    f.write_str(": ")?;
                    value.write_text(f, annotate && ix == 0)?;
                }
                f.write_char('}')
            }
            Value::Struct(fields) => {
                f.write_char('(')?;
                for (ix, field) in fields.iter().enumerate() {
                    if ix > 0 {
                        f.write_str(", ")?;
                    }
                    field.write_text(f, annotate)?;
                }
                if fields.len() == 1 {
                    f.write_char(',')?;
                }
                f.write_char(')')
            }
            Value::Variant(variant) => write!(f, "{}", variant),
        }
    }
}

fn write_quoted(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    f.write_char('\'')?;
    for c in s.chars() {
        match c {
            '\'' | '\\' => {
                f.write_char('\\')?;
                f.write_char(c)?;
            }
            '\n' => f.write_str("\\n")?,
            _ => f.write_char(c)?,
        }
    }
    f.write_char('\'')
}

impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_text(f, true)
    }
}

macro_rules! value_from {
    ($type:ty, $variant:ident) => {
        impl From<$type> for Value {
            fn from(v: $type) -> Self {
                Value::$variant(v)
            }
        }
    };
}

value_from!(u8, Byte);
value_from!(bool, Bool);
value_from!(i16, Int16);
value_from!(u16, UInt16);
value_from!(i32, Int32);
value_from!(u32, UInt32);
value_from!(i64, Int64);
value_from!(u64, UInt64);
value_from!(f64, Double);
value_from!(String, Str);
value_from!(ObjectPath, ObjectPath);
value_from!(Signature, Signature);
value_from!(Array, Array);
value_from!(Dict, Dict);

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_owned())
    }
}

impl From<Variant> for Value {
    fn from(v: Variant) -> Self {
        Value::Variant(Box::new(v))
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Byte(v) => serializer.serialize_u8(*v),
            Value::Bool(v) => serializer.serialize_bool(*v),
            Value::Int16(v) => serializer.serialize_i16(*v),
            Value::UInt16(v) => serializer.serialize_u16(*v),
            Value::Int32(v) => serializer.serialize_i32(*v),
            Value::UInt32(v) => serializer.serialize_u32(*v),
            Value::Int64(v) => serializer.serialize_i64(*v),
            Value::UInt64(v) => serializer.serialize_u64(*v),
            Value::Double(v) => serializer.serialize_f64(*v),
            Value::Str(v) => serializer.serialize_str(v),
            Value::ObjectPath(v) => v.serialize(serializer),
            Value::Signature(v) => v.serialize(serializer),
            Value::Array(array) => {
                let mut seq = serializer.serialize_seq(Some(array.items.len()))?;
                for item in &array.items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Dict(dict) => {
                let mut map = serializer.serialize_map(Some(dict.entries.len()))?;
                for (key, value) in &dict.entries {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
            Value::Struct(fields) => {
                let mut tuple = serializer.serialize_tuple(fields.len())?;
                for field in fields {
                    tuple.serialize_element(field)?;
                }
                tuple.end()
            }
            Value::Variant(v) => v.serialize(serializer),
        }
    }
}

/// Decodes a [`Value`] of the given single complete type.
#[derive(Clone, Copy)]
pub(crate) struct ValueSeed<'s>(pub &'s str);

impl<'de> DeserializeSeed<'de> for ValueSeed<'_> {
    type Value = Value;

    fn deserialize<D: Deserializer<'de>>(self, d: D) -> std::result::Result<Value, D::Error> {
        let sig = self.0;
        match sig.as_bytes() {
            [b'y'] => u8::deserialize(d).map(Value::Byte),
            [b'b'] => bool::deserialize(d).map(Value::Bool),
            [b'n'] => i16::deserialize(d).map(Value::Int16),
            [b'q'] => u16::deserialize(d).map(Value::UInt16),
            [b'i'] => i32::deserialize(d).map(Value::Int32),
            [b'u'] => u32::deserialize(d).map(Value::UInt32),
            [b'x'] => i64::deserialize(d).map(Value::Int64),
            [b't'] => u64::deserialize(d).map(Value::UInt64),
            [b'd'] => f64::deserialize(d).map(Value::Double),
            [b's'] => String::deserialize(d).map(Value::Str),
            [b'o'] => ObjectPath::deserialize(d).map(Value::ObjectPath),
            [b'g'] => Signature::deserialize(d).map(Value::Signature),
            [b'v'] => Variant::deserialize(d).map(|v| Value::Variant(Box::new(v))),
            [b'a', b'{', .., b'}'] => {
                // "a{" key value "}", the key being a single basic code.
                let key = Signature::new(&sig[2..3]).map_err(de::Error::custom)?;
                let value = Signature::new(&sig[3..sig.len() - 1]).map_err(de::Error::custom)?;
                d.deserialize_map(DictVisitor { key, value })
            }
            [b'a', ..] => {
                let element = Signature::new(&sig[1..]).map_err(de::Error::custom)?;
                d.deserialize_seq(ArrayVisitor { element })
            }
            [b'(', .., b')'] => {
                let fields = split_types(&sig[1..sig.len() - 1]).map_err(de::Error::custom)?;
                d.deserialize_tuple(fields.len(), StructVisitor { fields })
            }
            _ => Err(de::Error::custom(format!(
                "{:?} is not a single complete type",
                sig
            ))),
        }
    }
}

fn split_types(mut sig: &str) -> Result<Vec<&str>> {
    let mut types = Vec::new();
    while !sig.is_empty() {
        let len = complete_type_len(sig.as_bytes())?;
        let (head, rest) = sig.split_at(len);
        types.push(head);
        sig = rest;
    }
    Ok(types)
}

struct ArrayVisitor {
    element: Signature,
}

impl<'de> Visitor<'de> for ArrayVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "an array of {}", self.element)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<Value, A::Error> {
        let mut items = Vec::new();
        while let Some(item) = seq.next_element_seed(ValueSeed(self.element.as_str()))? {
            items.push(item);
        }
        Ok(Value::Array(Array {
            element: self.element,
            items,
        }))
    }
}

struct DictVisitor {
    key: Signature,
    value: Signature,
}

impl<'de> Visitor<'de> for DictVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a dict of {} to {}", self.key, self.value)
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Value, A::Error> {
        let mut entries = Vec::new();
        while let Some(key) = map.next_key_seed(ValueSeed(self.key.as_str()))? {
            let value = map.next_value_seed(ValueSeed(self.value.as_str()))?;
            entries.push((key, value));
        }
        Ok(Value::Dict(Dict {
            key: self.key,
            value: self.value,
            entries,
        }))
    }
}

struct StructVisitor<'s> {
    fields: Vec<&'s str>,
}

impl<'de> Visitor<'de> for StructVisitor<'_> {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a struct of {} fields", self.fields.len())
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<Value, A::Error> {
        let mut values = Vec::with_capacity(self.fields.len());
        for (ix, field) in self.fields.iter().enumerate() {
            let value = seq
                .next_element_seed(ValueSeed(field))?
                .ok_or_else(|| de::Error::invalid_length(ix, &self))?;
            values.push(value);
        }
        Ok(Value::Struct(values))
    }
}

/// A value together with its signature (`v`).
#[derive(Clone, Debug, PartialEq)]
pub struct Variant(Value);

impl Variant {
    /// Wraps any value whose signature is known from its type.
    pub fn new<T>(value: &T) -> Result<Self>
    where
        T: DbusType + Serialize + ?Sized,
    {
        let body = serialize(value)?;
        Self::from_body(&body)
    }

    fn from_body(body: &Body) -> Result<Self> {
        let seed = ValueSeed(body.signature().as_str());
        let value = from_parts_seed(body.signature(), body.data(), body.endian(), seed)?;
        Ok(Variant(value))
    }

    /// Takes the value out as `T`, which must have exactly the contained
    /// signature.
    pub fn get<T>(&self) -> Result<T>
    where
        T: DbusType + DeserializeOwned,
    {
        let expected = T::signature();
        let found = self.signature();
        if expected != found {
            return Err(Error::VariantTypeMismatch {
                expected: expected.to_string(),
                found: found.to_string(),
            });
        }
        let body = serialize_with_signature(&self.0, &found)?;
        crate::de::from_body(&body)
    }

    /// The signature of the contained value.
    pub fn signature(&self) -> Signature {
        self.0.signature()
    }

    pub fn value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

impl From<Value> for Variant {
    fn from(value: Value) -> Self {
        Variant(value)
    }
}

impl Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.0)
    }
}

impl DbusType for Variant {
    fn write_signature(out: &mut String) {
        out.push('v');
    }
}

impl Serialize for Variant {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let signature = self.signature();
        let mut tuple = serializer.serialize_tuple_struct(VARIANT_NAME, 2)?;
        tuple.serialize_field(signature.as_str())?;
        tuple.serialize_field(&self.0)?;
        tuple.end()
    }
}

struct VariantVisitor;

impl<'de> Visitor<'de> for VariantVisitor {
    type Value = Variant;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a variant")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<Variant, A::Error> {
        let sig: String = seq
            .next_element()?
            .ok_or_else(|| de::Error::invalid_length(0, &self))?;
        let signature = Signature::new(sig).map_err(de::Error::custom)?;
        let value = seq
            .next_element_seed(ValueSeed(signature.as_str()))?
            .ok_or_else(|| de::Error::invalid_length(1, &self))?;
        Ok(Variant(value))
    }
}

impl<'de> Deserialize<'de> for Variant {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_tuple_struct(VARIANT_NAME, 2, VariantVisitor)
    }
}
