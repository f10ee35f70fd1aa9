use std::fmt::{self, Display};
use std::io;
use std::str::Utf8Error;

use serde::{de, ser};

pub type Result<T> = std::result::Result<T, Error>;

/// An error reply sent by the peer of a method call.
///
/// The name is the dot-separated DBus error name, e.g.
/// `org.freedesktop.DBus.Error.UnknownMethod`, so callers can branch on it
/// without parsing the message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BusError {
    pub name: String,
    pub message: String,
}

impl Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}: {}", self.name, self.message)
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Type {0} has no DBus representation")]
    UnsupportedType(String),
    #[error("Dict key signature {0:?} is not a basic type")]
    InvalidDictKey(String),
    #[error("Invalid signature {0:?}: {1}")]
    InvalidSignature(String, &'static str),
    #[error("Value does not match signature: expected {expected:?}, found {found}")]
    SignatureMismatch { expected: String, found: String },
    #[error("Reply signature {found:?} does not match requested type {expected:?}")]
    ReplySignatureMismatch { expected: String, found: String },
    #[error("Variant holds {found:?}, requested {expected:?}")]
    VariantTypeMismatch { expected: String, found: String },
    #[error("Property {property} holds {found:?}, requested {expected:?}")]
    PropertyTypeMismatch {
        property: String,
        expected: String,
        found: String,
    },
    #[error("Message was already dispatched")]
    InvalidState,
    #[error("{0}")]
    Bus(BusError),
    #[error("Method call timed out")]
    Timeout,
    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Error serializing: {0}")]
    Serializing(String),
    #[error("Error deserializing: {0}")]
    Deserializing(String),
    #[error("Read past end of data at {0}")]
    IndexOutOfBounds(usize),
    #[error("{0} bytes left over after deserializing")]
    LeftoverData(usize),
    #[error("Array element overran array end: {0} > {1}")]
    ArrayElementOverrun(usize, usize),
    #[error("Array of {0} bytes exceeds the protocol limit")]
    ArrayTooLong(usize),
    #[error("Invalid boolean value {0}")]
    InvalidBoolValue(u32),
    #[error("String is not nul-terminated")]
    UnterminatedString,
    #[error("String {0:?} contains a nul byte")]
    InteriorNul(String),
    #[error("Value nested more than {0} levels deep")]
    NestingTooDeep(usize),
    #[error("Invalid UTF-8: {0}")]
    InvalidUtf8(#[from] Utf8Error),

    #[error("Invalid message header: {0}")]
    InvalidHeader(String),
    #[error("Message of {0} bytes exceeds the protocol limit")]
    MessageTooLarge(usize),
    #[error("No bus address: {0} is not set")]
    NoBusAddress(&'static str),
    #[error("Unsupported bus address {0:?}")]
    UnsupportedAddress(String),
    #[error("Authentication rejected: {0:?}")]
    AuthenticationFailed(String),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    pub(crate) fn mismatch(expected: &[u8], found: impl Into<String>) -> Self {
        Error::SignatureMismatch {
            expected: String::from_utf8_lossy(expected).into_owned(),
            found: found.into(),
        }
    }

    /// The bus error name, if this is an error reply from the peer.
    pub fn bus_error_name(&self) -> Option<&str> {
        match self {
            Error::Bus(err) => Some(&err.name),
            _ => None,
        }
    }
}

impl ser::Error for Error {
    fn custom<T: Display>(msg: T) -> Self {
        Error::Serializing(msg.to_string())
    }
}

impl de::Error for Error {
    fn custom<T: Display>(msg: T) -> Self {
        Error::Deserializing(msg.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::{BusError, Error};

    #[test]
    fn bus_error_keeps_name_and_message_apart() {
        let err = Error::Bus(BusError {
            name: "org.freedesktop.DBus.Error.UnknownMethod".to_owned(),
            message: "No such method".to_owned(),
        });
        assert_eq!(
            err.bus_error_name(),
            Some("org.freedesktop.DBus.Error.UnknownMethod")
        );
        assert_eq!(
            err.to_string(),
            "org.freedesktop.DBus.Error.UnknownMethod: No such method"
        );
        assert_eq!(Error::Timeout.bus_error_name(), None);
    }
}
