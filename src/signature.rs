//! DBus type signatures and their derivation from Rust types.
//!
//! Every type that can travel over the bus implements [`DbusType`], which
//! writes the type's signature fragment. Containers derive theirs from their
//! elements, so `Vec<(String, i32)>` is `a(si)` and
//! `HashMap<String, Variant>` is `a{sv}`. Only [`BasicType`]s may key a map.
//!
//! [`Signature`] is the validated, owned form of a signature string, as
//! carried in message headers and variants.

use crate::error::{Error, Result};

use serde::de::{self, Deserialize, Deserializer, Visitor};
use serde::ser::{Serialize, Serializer};
use std::collections::{BTreeMap, HashMap};
use std::fmt::{self, Display};
use std::hash::BuildHasher;
use std::str::FromStr;

const MAX_SIGNATURE_LEN: usize = 255;
const MAX_DEPTH: usize = 32;

/// A validated DBus signature: zero or more complete types.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Signature(String);

impl Signature {
    pub fn new(sig: impl Into<String>) -> Result<Self> {
        let sig = sig.into();
        validate(sig.as_bytes())?;
        Ok(Signature(sig))
    }

    // For signatures assembled from parts that are valid by construction.
    pub(crate) fn from_trusted(sig: String) -> Self {
        Signature(sig)
    }

    pub(crate) fn from_bytes(sig: Vec<u8>) -> Result<Self> {
        let sig = String::from_utf8(sig).map_err(|e| e.utf8_error())?;
        Self::new(sig)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True if the signature is exactly one complete type.
    pub fn is_single(&self) -> bool {
        matches!(complete_type_len(self.as_bytes()), Ok(len) if len == self.len())
    }

    /// The complete types making up this signature, in order.
    pub fn types(&self) -> SingleTypes<'_> {
        SingleTypes { rest: &self.0 }
    }
}

pub struct SingleTypes<'a> {
    rest: &'a str,
}

impl<'a> Iterator for SingleTypes<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        if self.rest.is_empty() {
            return None;
        }
        let len = complete_type_len(self.rest.as_bytes()).ok()?;
        let (head, rest) = self.rest.split_at(len);
        self.rest = rest;
        Some(head)
    }
}

impl Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Signature {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for Signature {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Signature {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl FromStr for Signature {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Signature::new(s)
    }
}

pub(crate) const SIGNATURE_NAME: &str = "Signature";

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_newtype_struct(SIGNATURE_NAME, self.as_str())
    }
}

struct SignatureVisitor;

impl<'de> Visitor<'de> for SignatureVisitor {
    type Value = Signature;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a DBus signature")
    }

    fn visit_str<E: de::Error>(self, sig: &str) -> std::result::Result<Signature, E> {
        Signature::new(sig).map_err(E::custom)
    }

    fn visit_newtype_struct<D: Deserializer<'de>>(
        self,
        deserializer: D,
    ) -> std::result::Result<Signature, D::Error> {
        let sig = String::deserialize(deserializer)?;
        Signature::new(sig).map_err(de::Error::custom)
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_newtype_struct(SIGNATURE_NAME, SignatureVisitor)
    }
}

fn invalid(sig: &[u8], reason: &'static str) -> Error {
    Error::InvalidSignature(String::from_utf8_lossy(sig).into_owned(), reason)
}

fn validate(sig: &[u8]) -> Result<()> {
    if sig.len() > MAX_SIGNATURE_LEN {
        return Err(invalid(sig, "longer than 255 bytes"));
    }
    let mut ix = 0;
    while ix < sig.len() {
        ix = single_type_end(sig, ix, 0, 0)?;
    }
    Ok(())
}

/// Length of the complete type at the start of `sig`.
pub(crate) fn complete_type_len(sig: &[u8]) -> Result<usize> {
    single_type_end(sig, 0, 0, 0)
}

/// Length of an array's element type at the start of `sig`, which is either
/// a complete type or the dict entry following an `a{`.
pub(crate) fn element_type_len(sig: &[u8]) -> Result<usize> {
    if sig.first() == Some(&b'{') {
        dict_entry_end(sig, 0, 1, 0)
    } else {
        complete_type_len(sig)
    }
}

pub(crate) fn is_basic(code: u8) -> bool {
    matches!(
        code,
        b'y' | b'b' | b'n' | b'q' | b'i' | b'u' | b'x' | b't' | b'd' | b's' | b'o' | b'g'
    )
}

fn single_type_end(sig: &[u8], ix: usize, arrays: usize, structs: usize) -> Result<usize> {
    let code = *sig
        .get(ix)
        .ok_or_else(|| invalid(sig, "ends inside a type"))?;
    match code {
        b'v' => Ok(ix + 1),
        code if is_basic(code) => Ok(ix + 1),
        b'a' => {
            if arrays >= MAX_DEPTH {
                return Err(invalid(sig, "arrays nested too deeply"));
            }
            if sig.get(ix + 1) == Some(&b'{') {
                dict_entry_end(sig, ix + 1, arrays + 1, structs)
            } else {
                single_type_end(sig, ix + 1, arrays + 1, structs)
            }
        }
        b'(' => {
            if structs >= MAX_DEPTH {
                return Err(invalid(sig, "structs nested too deeply"));
            }
            let mut end = ix + 1;
            if sig.get(end) == Some(&b')') {
                return Err(invalid(sig, "empty struct"));
            }
            loop {
                match sig.get(end) {
                    Some(b')') => return Ok(end + 1),
                    None => return Err(invalid(sig, "unterminated struct")),
                    Some(_) => end = single_type_end(sig, end, arrays, structs + 1)?,
                }
            }
        }
        b'{' => Err(invalid(sig, "dict entry outside of an array")),
        b')' | b'}' => Err(invalid(sig, "unbalanced bracket")),
        other => Err(Error::UnsupportedType(format!("'{}'", other as char))),
    }
}

// `ix` points at the '{'
fn dict_entry_end(sig: &[u8], ix: usize, arrays: usize, structs: usize) -> Result<usize> {
    if structs >= MAX_DEPTH {
        return Err(invalid(sig, "structs nested too deeply"));
    }
    let key_end = single_type_end(sig, ix + 1, arrays, structs + 1)?;
    if key_end != ix + 2 || !is_basic(sig[ix + 1]) {
        return Err(Error::InvalidDictKey(
            String::from_utf8_lossy(&sig[ix + 1..key_end]).into_owned(),
        ));
    }
    let value_end = single_type_end(sig, key_end, arrays, structs + 1)?;
    match sig.get(value_end) {
        Some(b'}') => Ok(value_end + 1),
        None => Err(invalid(sig, "unterminated dict entry")),
        Some(_) => Err(invalid(sig, "dict entry must hold exactly two types")),
    }
}

pub(crate) fn alignment_of(code: u8) -> Result<usize> {
    match code {
        b'y' => Ok(1), // BYTE
        b'b' => Ok(4), // BOOLEAN
        b'n' => Ok(2), // INT16
        b'q' => Ok(2), // UINT16
        b'i' => Ok(4), // INT32
        b'u' => Ok(4), // UINT32
        b'x' => Ok(8), // INT64
        b't' => Ok(8), // UINT64
        b'd' => Ok(8), // DOUBLE
        b's' => Ok(4), // STRING
        b'o' => Ok(4), // OBJECT_PATH
        b'g' => Ok(1), // SIGNATURE
        b'a' => Ok(4), // ARRAY
        b'(' => Ok(8), // STRUCT
        b'v' => Ok(1), // VARIANT
        b'{' => Ok(8), // DICT_ENTRY
        _ => Err(Error::UnsupportedType(format!("'{}'", code as char))),
    }
}

/// A Rust type with a fixed DBus signature.
pub trait DbusType {
    fn write_signature(out: &mut String);

    fn signature() -> Signature {
        let mut sig = String::new();
        Self::write_signature(&mut sig);
        Signature(sig)
    }
}

/// Types that may be used as the key of a DBus dict.
pub trait BasicType: DbusType {}

macro_rules! basic_type {
    ($type:ty, $code:expr) => {
        impl DbusType for $type {
            fn write_signature(out: &mut String) {
                out.push($code);
            }
        }

        impl BasicType for $type {}
    };
}

basic_type!(u8, 'y');
basic_type!(bool, 'b');
basic_type!(i16, 'n');
basic_type!(u16, 'q');
basic_type!(i32, 'i');
basic_type!(u32, 'u');
basic_type!(i64, 'x');
basic_type!(u64, 't');
basic_type!(f64, 'd');
basic_type!(String, 's');
basic_type!(str, 's');
basic_type!(Signature, 'g');

impl<T: DbusType + ?Sized> DbusType for &T {
    fn write_signature(out: &mut String) {
        T::write_signature(out)
    }
}

impl<T: BasicType + ?Sized> BasicType for &T {}

impl<T: DbusType> DbusType for Vec<T> {
    fn write_signature(out: &mut String) {
        out.push('a');
        T::write_signature(out);
    }
}

impl<T: DbusType> DbusType for [T] {
    fn write_signature(out: &mut String) {
        out.push('a');
        T::write_signature(out);
    }
}

impl<K: BasicType, V: DbusType, S: BuildHasher> DbusType for HashMap<K, V, S> {
    fn write_signature(out: &mut String) {
        out.push_str("a{");
        K::write_signature(out);
        V::write_signature(out);
        out.push('}');
    }
}

impl<K: BasicType, V: DbusType> DbusType for BTreeMap<K, V> {
    fn write_signature(out: &mut String) {
        out.push_str("a{");
        K::write_signature(out);
        V::write_signature(out);
        out.push('}');
    }
}

macro_rules! tuple_type {
    ($($name:ident)+) => {
        impl<$($name: DbusType),+> DbusType for ($($name,)+) {
            fn write_signature(out: &mut String) {
                out.push('(');
                $($name::write_signature(out);)+
                out.push(')');
            }
        }
    };
}

tuple_type!(A);
tuple_type!(A B);
tuple_type!(A B C);
tuple_type!(A B C D);
tuple_type!(A B C D E);
tuple_type!(A B C D E F);
tuple_type!(A B C D E F G);
tuple_type!(A B C D E F G H);
tuple_type!(A B C D E F G H I);
tuple_type!(A B C D E F G H I J);
