//! Whole-message framing: the fixed header, the header fields, and the body.
//!
//! A frame is the header `yyyyuua(yv)` padded to 8 bytes, then the body. The
//! header is decoded with the ordinary deserializer in whichever byte order
//! the frame declares; frames are always written little-endian.

use crate::align::align;
use crate::body::{Body, Endian};
use crate::de::from_prefix;
use crate::error::{Error, Result};
use crate::ser::serialize;
use crate::signature::{DbusType, Signature};
use crate::value::{ObjectPath, Value, Variant};

use byteorder::{ByteOrder, BE, LE};
use serde::de::DeserializeOwned;
use std::convert::TryFrom;

pub(crate) const MAX_MESSAGE_LEN: usize = 128 * 1024 * 1024;

/// Bytes needed to tell how long the whole frame is.
pub(crate) const FIXED_HEADER_LEN: usize = 16;

const PROTOCOL_VERSION: u8 = 1;

const FIELD_PATH: u8 = 1;
const FIELD_INTERFACE: u8 = 2;
const FIELD_MEMBER: u8 = 3;
const FIELD_ERROR_NAME: u8 = 4;
const FIELD_REPLY_SERIAL: u8 = 5;
const FIELD_DESTINATION: u8 = 6;
const FIELD_SENDER: u8 = 7;
const FIELD_SIGNATURE: u8 = 8;

type RawHeader = (u8, u8, u8, u8, u32, u32, Vec<(u8, Variant)>);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageType {
    MethodCall = 1,
    MethodReturn = 2,
    Error = 3,
    Signal = 4,
}

impl TryFrom<u8> for MessageType {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self> {
        match code {
            1 => Ok(MessageType::MethodCall),
            2 => Ok(MessageType::MethodReturn),
            3 => Ok(MessageType::Error),
            4 => Ok(MessageType::Signal),
            other => Err(Error::InvalidHeader(format!("unknown message type {}", other))),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Header {
    pub message_type: MessageType,
    pub flags: u8,
    pub serial: u32,
    pub path: Option<ObjectPath>,
    pub interface: Option<String>,
    pub member: Option<String>,
    pub error_name: Option<String>,
    pub reply_serial: Option<u32>,
    pub destination: Option<String>,
    pub sender: Option<String>,
}

impl Header {
    fn new(message_type: MessageType) -> Self {
        Self {
            message_type,
            flags: 0,
            serial: 0,
            path: None,
            interface: None,
            member: None,
            error_name: None,
            reply_serial: None,
            destination: None,
            sender: None,
        }
    }

    pub fn method_call(
        destination: Option<&str>,
        path: &ObjectPath,
        interface: Option<&str>,
        member: &str,
    ) -> Self {
        Self {
            destination: destination.map(str::to_owned),
            path: Some(path.clone()),
            interface: interface.map(str::to_owned),
            member: Some(member.to_owned()),
            ..Self::new(MessageType::MethodCall)
        }
    }

    pub fn method_return(reply_serial: u32) -> Self {
        Self {
            reply_serial: Some(reply_serial),
            ..Self::new(MessageType::MethodReturn)
        }
    }

    pub fn error(reply_serial: u32, name: &str) -> Self {
        Self {
            reply_serial: Some(reply_serial),
            error_name: Some(name.to_owned()),
            ..Self::new(MessageType::Error)
        }
    }

    fn fields(&self, body: &Body) -> Vec<(u8, Variant)> {
        let mut fields = Vec::new();
        let mut push = |code: u8, value: Value| fields.push((code, Variant::from(value)));

        if let Some(path) = &self.path {
            push(FIELD_PATH, Value::ObjectPath(path.clone()));
        }
        if let Some(interface) = &self.interface {
            push(FIELD_INTERFACE, Value::from(interface.as_str()));
        }
        if let Some(member) = &self.member {
            push(FIELD_MEMBER, Value::from(member.as_str()));
        }
        if let Some(error_name) = &self.error_name {
            push(FIELD_ERROR_NAME, Value::from(error_name.as_str()));
        }
        if let Some(reply_serial) = self.reply_serial {
            push(FIELD_REPLY_SERIAL, Value::UInt32(reply_serial));
        }
        if let Some(destination) = &self.destination {
            push(FIELD_DESTINATION, Value::from(destination.as_str()));
        }
        if let Some(sender) = &self.sender {
            push(FIELD_SENDER, Value::from(sender.as_str()));
        }
        if !body.is_empty() {
            push(FIELD_SIGNATURE, Value::Signature(body.signature().clone()));
        }
        fields
    }
}

/// Writes a complete frame. The body must be little-endian.
pub(crate) fn encode(header: &Header, body: &Body) -> Result<Vec<u8>> {
    if body.endian() != Endian::Little {
        return Err(Error::InvalidHeader(
            "only little-endian bodies can be sent".to_owned(),
        ));
    }

    let raw: RawHeader = (
        Endian::Little.flag(),
        header.message_type as u8,
        header.flags,
        PROTOCOL_VERSION,
        body.data().len() as u32,
        header.serial,
        header.fields(body),
    );
    let encoded = serialize(&raw)?;

    let mut frame = encoded.data().to_vec();
    frame.resize(align(frame.len(), 8), 0);
    frame.extend_from_slice(body.data());

    if frame.len() > MAX_MESSAGE_LEN {
        return Err(Error::MessageTooLarge(frame.len()));
    }
    Ok(frame)
}

/// Total length of the frame starting with `prefix`, which must hold at
/// least [`FIXED_HEADER_LEN`] bytes.
pub(crate) fn frame_length(prefix: &[u8]) -> Result<usize> {
    if prefix.len() < FIXED_HEADER_LEN {
        return Err(Error::InvalidHeader("truncated header".to_owned()));
    }
    let (body_len, fields_len) = match frame_endian(prefix)? {
        Endian::Little => (LE::read_u32(&prefix[4..8]), LE::read_u32(&prefix[12..16])),
        Endian::Big => (BE::read_u32(&prefix[4..8]), BE::read_u32(&prefix[12..16])),
    };
    let total = align(FIXED_HEADER_LEN + fields_len as usize, 8) + body_len as usize;
    if total > MAX_MESSAGE_LEN {
        return Err(Error::MessageTooLarge(total));
    }
    Ok(total)
}

fn frame_endian(frame: &[u8]) -> Result<Endian> {
    let flag = frame
        .first()
        .ok_or_else(|| Error::InvalidHeader("empty frame".to_owned()))?;
    Endian::from_flag(*flag)
        .ok_or_else(|| Error::InvalidHeader(format!("unknown endianness flag {:#04x}", flag)))
}

fn field<T: DbusType + DeserializeOwned>(code: u8, value: &Variant) -> Result<T> {
    value
        .get()
        .map_err(|e| Error::InvalidHeader(format!("header field {}: {}", code, e)))
}

/// Splits a complete frame into its header and body.
pub(crate) fn decode(frame: &[u8]) -> Result<(Header, Body)> {
    let endian = frame_endian(frame)?;
    let header_sig = Signature::from_trusted("(yyyyuua(yv))".to_owned());
    let ((_, message_type, flags, version, body_len, serial, fields), used): (RawHeader, usize) =
        from_prefix(&header_sig, frame, endian)?;

    if version != PROTOCOL_VERSION {
        return Err(Error::InvalidHeader(format!(
            "unsupported protocol version {}",
            version
        )));
    }

    let mut header = Header::new(MessageType::try_from(message_type)?);
    header.flags = flags;
    header.serial = serial;
    let mut signature = Signature::default();

    for (code, value) in &fields {
        match *code {
            FIELD_PATH => header.path = Some(field(*code, value)?),
            FIELD_INTERFACE => header.interface = Some(field(*code, value)?),
            FIELD_MEMBER => header.member = Some(field(*code, value)?),
            FIELD_ERROR_NAME => header.error_name = Some(field(*code, value)?),
            FIELD_REPLY_SERIAL => header.reply_serial = Some(field(*code, value)?),
            FIELD_DESTINATION => header.destination = Some(field(*code, value)?),
            FIELD_SENDER => header.sender = Some(field(*code, value)?),
            FIELD_SIGNATURE => signature = field(*code, value)?,
            // Unknown fields must be ignored.
            _ => (),
        }
    }

    let body_start = align(used, 8);
    let body_end = body_start + body_len as usize;
    if body_end != frame.len() {
        return Err(Error::InvalidHeader(format!(
            "frame is {} bytes, header says {}",
            frame.len(),
            body_end
        )));
    }

    let body = Body::with_endian(signature, frame[body_start..body_end].to_vec(), endian);
    Ok((header, body))
}

/// Decodes the first argument of an error reply as its message, if it is a
/// string.
pub(crate) fn error_message(body: &Body) -> String {
    match body.signature().types().next() {
        Some("s") => {
            let first = Signature::from_trusted("s".to_owned());
            from_prefix::<String>(&first, body.data(), body.endian())
                .map(|(message, _)| message)
                .unwrap_or_default()
        }
        _ => String::new(),
    }
}
