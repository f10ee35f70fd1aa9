//! An in-process stand-in for a message bus, driven by the tests over a
//! [`ChannelTransport`].

use crate::body::Body;
use crate::connection::{BusScope, Connection, ConnectionBuilder};
use crate::de::from_parts;
use crate::error::Result;
use crate::ser::{serialize, BodyBuilder};
use crate::signature::{DbusType, Signature};
use crate::transport::{ChannelTransport, Transport};
use crate::value::ObjectPath;
use crate::wire::{self, Header, MessageType};

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::atomic::{AtomicU32, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// A method call as the bus received it.
pub(crate) struct Call {
    pub(crate) header: Header,
    pub(crate) body: Body,
}

impl Call {
    /// All arguments, as a tuple.
    pub(crate) fn args<T: DeserializeOwned>(&self) -> Result<T> {
        let wrapped = Signature::new(format!("({})", self.body.signature()))?;
        from_parts(&wrapped, self.body.data(), self.body.endian())
    }
}

pub(crate) enum Reply {
    Return(Body),
    Fail { name: String, message: String },
    /// Never answer.
    Ignore,
    /// Drop the connection.
    Hangup,
}

impl Reply {
    pub(crate) fn value<T: DbusType + Serialize + ?Sized>(value: &T) -> Result<Reply> {
        Ok(Reply::Return(serialize(value)?))
    }

    pub(crate) fn error(name: &str, message: &str) -> Reply {
        Reply::Fail {
            name: name.to_owned(),
            message: message.to_owned(),
        }
    }
}

pub(crate) struct FakeBus {
    transport: ChannelTransport,
    serial: AtomicU32,
}

impl FakeBus {
    pub(crate) fn new(transport: ChannelTransport) -> Self {
        Self {
            transport,
            serial: AtomicU32::new(1),
        }
    }

    /// The next method call, or `None` once the client has gone.
    pub(crate) fn next_call(&self) -> Result<Option<Call>> {
        while let Some(frame) = self.transport.receive()? {
            let (header, body) = wire::decode(&frame)?;
            if header.message_type == MessageType::MethodCall {
                return Ok(Some(Call { header, body }));
            }
        }
        Ok(None)
    }

    fn send(&self, mut header: Header, body: &Body) -> Result<()> {
        header.serial = self.serial.fetch_add(1, Ordering::Relaxed);
        header.sender = Some("org.freedesktop.DBus".to_owned());
        self.transport.send(&wire::encode(&header, body)?)
    }

    pub(crate) fn reply<T: DbusType + Serialize + ?Sized>(&self, call: &Call, value: &T) -> Result<()> {
        self.reply_to_serial(call.header.serial, value)
    }

    pub(crate) fn reply_to_serial<T: DbusType + Serialize + ?Sized>(
        &self,
        serial: u32,
        value: &T,
    ) -> Result<()> {
        self.send(Header::method_return(serial), &serialize(value)?)
    }

    pub(crate) fn reply_body(&self, call: &Call, body: Body) -> Result<()> {
        self.send(Header::method_return(call.header.serial), &body)
    }

    pub(crate) fn error(&self, call: &Call, name: &str, message: &str) -> Result<()> {
        let mut body = BodyBuilder::new();
        body.push(message)?;
        self.send(Header::error(call.header.serial, name), &body.finish()?)
    }

    pub(crate) fn signal(&self, path: &str, interface: &str, member: &str) -> Result<()> {
        let mut header = Header::method_call(None, &ObjectPath::from(path), Some(interface), member);
        header.message_type = MessageType::Signal;
        self.send(header, &Body::empty())
    }

    pub(crate) fn send_raw(&self, frame: &[u8]) -> Result<()> {
        self.transport.send(frame)
    }
}

/// A connection to a fresh bus, which the test drives by hand.
pub(crate) fn connect(timeout: Duration) -> Result<(Connection, FakeBus)> {
    let (transport, peer) = ChannelTransport::pair();
    let connection = ConnectionBuilder::new(BusScope::Session)
        .transport(transport)
        .timeout(timeout)
        .build()?;
    Ok((connection, FakeBus::new(peer)))
}

/// A connection to a bus answering every call through `handler`. A handler
/// error is sent back as `org.freedesktop.DBus.Error.Failed`.
pub(crate) fn serve<F>(timeout: Duration, mut handler: F) -> Result<(Connection, JoinHandle<()>)>
where
    F: FnMut(&Call) -> Result<Reply> + Send + 'static,
{
    let (transport, peer) = ChannelTransport::pair();
    let bus = FakeBus::new(peer);
    let server = thread::Builder::new()
        .name("fake-bus".to_owned())
        .spawn(move || {
            while let Ok(Some(call)) = bus.next_call() {
                let reply = handler(&call).unwrap_or_else(|e| {
                    Reply::error("org.freedesktop.DBus.Error.Failed", &e.to_string())
                });
                let sent = match reply {
                    Reply::Return(body) => bus.reply_body(&call, body),
                    Reply::Fail { name, message } => bus.error(&call, &name, &message),
                    Reply::Ignore => Ok(()),
                    Reply::Hangup => break,
                };
                if sent.is_err() {
                    break;
                }
            }
        })?;

    let connection = ConnectionBuilder::new(BusScope::Session)
        .transport(transport)
        .timeout(timeout)
        .build()?;
    Ok((connection, server))
}
