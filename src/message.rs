//! Method calls: argument building, dispatch, and typed replies.

use crate::body::Body;
use crate::connection::Connection;
use crate::de::{from_body, from_parts};
use crate::error::{Error, Result};
use crate::ser::BodyBuilder;
use crate::signature::{DbusType, Signature};
use crate::wire::Header;

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::mem;
use std::time::Duration;

/// Where a [`Message`] is in its life.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallState {
    /// Arguments may still be added.
    Building,
    /// Written to the bus, waiting for the reply.
    Dispatched,
    Completed,
    /// The call was refused by the peer, or the connection failed.
    Failed,
    TimedOut,
}

/// A method call on a remote object.
///
/// Arguments are appended one at a time with [`args`](Message::args); one of
/// the `run` methods then sends the call and blocks until its reply arrives.
/// A message is run at most once.
pub struct Message<'c> {
    connection: &'c Connection,
    header: Header,
    body: BodyBuilder,
    signature: Signature,
    state: CallState,
    timeout: Duration,
    serial: Option<u32>,
    reply: Option<Body>,
}

impl<'c> Message<'c> {
    pub(crate) fn new(connection: &'c Connection, header: Header) -> Self {
        Self {
            connection,
            header,
            body: BodyBuilder::new(),
            signature: Signature::default(),
            state: CallState::Building,
            timeout: connection.timeout(),
            serial: None,
            reply: None,
        }
    }

    /// Appends one argument. Fails with [`Error::InvalidState`] once the
    /// call has been run.
    pub fn args<T>(&mut self, value: &T) -> Result<&mut Self>
    where
        T: DbusType + Serialize + ?Sized,
    {
        if self.state != CallState::Building {
            return Err(Error::InvalidState);
        }
        self.body.push(value)?;
        self.signature = Signature::from_trusted(self.body.signature().to_owned());
        Ok(self)
    }

    /// Overrides the connection's deadline for this call.
    pub fn timeout(&mut self, timeout: Duration) -> &mut Self {
        self.timeout = timeout;
        self
    }

    /// The arguments' signature, or once the call has completed, the
    /// reply's.
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn state(&self) -> CallState {
        self.state
    }

    /// The serial the call was sent under.
    pub fn serial(&self) -> Option<u32> {
        self.serial
    }

    pub fn reply(&self) -> Option<&Body> {
        self.reply.as_ref()
    }

    /// Runs the call and waits for it to finish, discarding any reply.
    pub fn run(&mut self) -> Result<()> {
        self.complete().map(|_| ())
    }

    /// Runs the call and decodes the reply as `T`.
    ///
    /// The reply's signature must be exactly `T`'s. A reply of several
    /// values can also be taken as a tuple of them.
    pub fn run_typed<T>(&mut self) -> Result<T>
    where
        T: DbusType + DeserializeOwned,
    {
        let reply = self.complete()?;
        decode_reply(reply)
    }

    /// Like [`run_typed`](Message::run_typed), storing the reply in `out`.
    /// `out` is left alone if the call fails.
    pub fn run_into<T>(&mut self, out: &mut T) -> Result<()>
    where
        T: DbusType + DeserializeOwned,
    {
        *out = self.run_typed()?;
        Ok(())
    }

    fn complete(&mut self) -> Result<&Body> {
        if self.state != CallState::Building {
            return Err(Error::InvalidState);
        }
        self.state = CallState::Dispatched;

        let body = match mem::take(&mut self.body).finish() {
            Ok(body) => body,
            Err(e) => {
                self.state = CallState::Failed;
                return Err(e);
            }
        };

        let pending = match self.connection.dispatch(self.header.clone(), &body) {
            Ok(pending) => pending,
            Err(e) => {
                self.state = CallState::Failed;
                return Err(e);
            }
        };
        self.serial = Some(pending.serial());

        match pending.wait(self.timeout) {
            Ok(reply) => {
                self.state = CallState::Completed;
                self.signature = reply.signature().clone();
                Ok(self.reply.insert(reply))
            }
            Err(Error::Timeout) => {
                self.state = CallState::TimedOut;
                Err(Error::Timeout)
            }
            Err(e) => {
                self.state = CallState::Failed;
                Err(e)
            }
        }
    }
}

fn decode_reply<T>(reply: &Body) -> Result<T>
where
    T: DbusType + DeserializeOwned,
{
    let expected = T::signature();
    let found = reply.signature();
    if *found == expected {
        return from_body(reply);
    }
    if !found.is_empty() && expected.as_str() == format!("({})", found) {
        return from_parts(&expected, reply.data(), reply.endian());
    }
    Err(Error::ReplySignatureMismatch {
        expected: expected.to_string(),
        found: found.to_string(),
    })
}
