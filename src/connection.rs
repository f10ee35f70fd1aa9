//! Connections to a message bus and the routing of replies to their callers.
//!
//! Every connection owns one receiver thread, which is the only reader of the
//! transport. Callers register a channel under the serial of their call
//! before the call is written, then block on that channel; the receiver
//! thread resolves the entry named by each reply's reply serial. Replies may
//! therefore arrive in any order, and each caller only ever sees its own.

use crate::address;
use crate::body::Body;
use crate::error::{BusError, Error, Result};
use crate::proxy::Proxy;
use crate::transport::{Transport, UnixTransport};
use crate::wire::{self, Header, MessageType};

use log::{debug, error, trace, warn};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// How long a call waits for its reply unless told otherwise.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(25);

pub(crate) const BUS_NAME: &str = "org.freedesktop.DBus";
pub(crate) const BUS_PATH: &str = "/org/freedesktop/DBus";

/// Which well-known bus to connect to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BusScope {
    Session,
    System,
}

impl BusScope {
    fn address(self) -> Result<String> {
        match self {
            BusScope::Session => address::session_bus_address(),
            BusScope::System => Ok(address::system_bus_address()),
        }
    }
}

enum Target {
    Scope(BusScope),
    Address(String),
    Transport(Box<dyn Transport>),
}

/// Configures and opens a [`Connection`].
pub struct ConnectionBuilder {
    target: Target,
    timeout: Duration,
    hello: Option<bool>,
}

impl ConnectionBuilder {
    pub fn new(scope: BusScope) -> Self {
        Self {
            target: Target::Scope(scope),
            timeout: DEFAULT_TIMEOUT,
            hello: None,
        }
    }

    /// Connects to an explicit bus address instead of the scope's.
    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.target = Target::Address(address.into());
        self
    }

    /// Runs over an already established transport.
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.target = Target::Transport(Box::new(transport));
        self
    }

    /// Default deadline for calls made on this connection.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Whether to register with the bus before returning. Defaults to yes
    /// for bus addresses and no for custom transports.
    pub fn hello(mut self, hello: bool) -> Self {
        self.hello = Some(hello);
        self
    }

    pub fn build(self) -> Result<Connection> {
        let (transport, hello): (Box<dyn Transport>, bool) = match self.target {
            Target::Scope(scope) => {
                let address = scope.address()?;
                debug!("Connecting to {:?} bus at {}", scope, address);
                (Box::new(UnixTransport::connect(&address)?), true)
            }
            Target::Address(address) => {
                debug!("Connecting to bus at {}", address);
                (Box::new(UnixTransport::connect(&address)?), true)
            }
            Target::Transport(transport) => (transport, false),
        };

        let mut connection = Connection::start(transport, self.timeout)?;
        if self.hello.unwrap_or(hello) {
            let name: String = connection
                .get(BUS_NAME, BUS_PATH, BUS_NAME)
                .call("Hello")
                .run_typed()?;
            debug!("Registered on the bus as {}", name);
            connection.unique_name = Some(name);
        }
        Ok(connection)
    }
}

#[derive(Default)]
struct PendingCalls {
    closed: bool,
    waiters: HashMap<u32, Sender<Result<Body>>>,
}

struct Shared {
    transport: Box<dyn Transport>,
    pending: Mutex<PendingCalls>,
    serial: AtomicU32,
}

impl Shared {
    fn next_serial(&self) -> u32 {
        loop {
            let serial = self.serial.fetch_add(1, Ordering::Relaxed);
            if serial != 0 {
                return serial;
            }
        }
    }

    fn route(&self, header: Header, body: Body) {
        let result = match header.message_type {
            MessageType::MethodReturn => Ok(body),
            MessageType::Error => Err(Error::Bus(BusError {
                name: header.error_name.clone().unwrap_or_default(),
                message: wire::error_message(&body),
            })),
            MessageType::MethodCall | MessageType::Signal => {
                trace!(
                    "Ignoring {:?} {:?}.{:?}",
                    header.message_type,
                    header.interface,
                    header.member
                );
                return;
            }
        };

        let reply_serial = match header.reply_serial {
            Some(serial) => serial,
            None => {
                warn!("Dropping {:?} without a reply serial", header.message_type);
                return;
            }
        };

        let waiter = self.pending.lock().waiters.remove(&reply_serial);
        match waiter {
            Some(waiter) => {
                debug!("Resolving call {}", reply_serial);
                // The caller may have given up already.
                let _ = waiter.send(result);
            }
            None => warn!("Dropping reply to unknown call {}", reply_serial),
        }
    }

    fn fail_all(&self) {
        let waiters = {
            let mut pending = self.pending.lock();
            pending.closed = true;
            std::mem::take(&mut pending.waiters)
        };
        for (serial, waiter) in waiters {
            debug!("Failing call {}: connection closed", serial);
            let _ = waiter.send(Err(Error::ConnectionClosed));
        }
    }
}

fn receive_loop(shared: Arc<Shared>) {
    loop {
        let frame = match shared.transport.receive() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                debug!("Transport closed");
                break;
            }
            Err(e) => {
                error!("Receiving from transport failed: {}", e);
                break;
            }
        };
        match wire::decode(&frame) {
            Ok((header, body)) => shared.route(header, body),
            Err(e) => warn!("Dropping undecodable frame of {} bytes: {}", frame.len(), e),
        }
    }
    shared.fail_all();
}

/// A call that has been written and is waiting for its reply.
pub(crate) struct PendingReply {
    shared: Arc<Shared>,
    serial: u32,
    rx: Receiver<Result<Body>>,
}

impl PendingReply {
    pub(crate) fn serial(&self) -> u32 {
        self.serial
    }

    pub(crate) fn wait(self, timeout: Duration) -> Result<Body> {
        match self.rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                let removed = self.shared.pending.lock().waiters.remove(&self.serial);
                if removed.is_some() {
                    warn!("Call {} timed out after {:?}", self.serial, timeout);
                    return Err(Error::Timeout);
                }
                // Resolved while we were timing out; the result is on its way.
                self.rx.recv().unwrap_or(Err(Error::ConnectionClosed))
            }
            Err(RecvTimeoutError::Disconnected) => Err(Error::ConnectionClosed),
        }
    }
}

/// A connection to a message bus.
///
/// Calls may be made from several threads at once; each blocks only until
/// its own reply arrives. Dropping the connection closes it.
pub struct Connection {
    shared: Arc<Shared>,
    receiver: Mutex<Option<JoinHandle<()>>>,
    timeout: Duration,
    unique_name: Option<String>,
}

impl Connection {
    pub fn builder(scope: BusScope) -> ConnectionBuilder {
        ConnectionBuilder::new(scope)
    }

    pub fn open(scope: BusScope) -> Result<Self> {
        ConnectionBuilder::new(scope).build()
    }

    pub fn session() -> Result<Self> {
        Self::open(BusScope::Session)
    }

    pub fn system() -> Result<Self> {
        Self::open(BusScope::System)
    }

    fn start(transport: Box<dyn Transport>, timeout: Duration) -> Result<Self> {
        let shared = Arc::new(Shared {
            transport,
            pending: Mutex::new(PendingCalls::default()),
            serial: AtomicU32::new(1),
        });
        let receiver = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name("dbus-receiver".to_owned())
                .spawn(move || receive_loop(shared))?
        };
        Ok(Self {
            shared,
            receiver: Mutex::new(Some(receiver)),
            timeout,
            unique_name: None,
        })
    }

    /// A handle on a remote object. No I/O happens until a call is run.
    pub fn get<'c>(&'c self, name: &str, path: &str, interface: &str) -> Proxy<'c> {
        Proxy::new(self, name, path, interface)
    }

    /// The name the bus assigned to this connection, if it said hello.
    pub fn unique_name(&self) -> Option<&str> {
        self.unique_name.as_deref()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Writes a call and registers it for its reply.
    pub(crate) fn dispatch(&self, mut header: Header, body: &Body) -> Result<PendingReply> {
        header.serial = self.shared.next_serial();
        let serial = header.serial;
        let frame = wire::encode(&header, body)?;

        let (tx, rx) = mpsc::channel();
        {
            let mut pending = self.shared.pending.lock();
            if pending.closed {
                return Err(Error::ConnectionClosed);
            }
            pending.waiters.insert(serial, tx);
        }

        debug!(
            "Calling {:?}.{:?} on {:?} as {}",
            header.interface, header.member, header.destination, serial
        );
        if let Err(e) = self.shared.transport.send(&frame) {
            error!("Sending call {} failed: {}", serial, e);
            self.shared.pending.lock().waiters.remove(&serial);
            return Err(e);
        }

        Ok(PendingReply {
            shared: Arc::clone(&self.shared),
            serial,
            rx,
        })
    }

    /// Number of calls still waiting for a reply.
    pub fn pending_calls(&self) -> usize {
        self.shared.pending.lock().waiters.len()
    }

    /// Closes the transport. Calls still waiting fail with
    /// [`Error::ConnectionClosed`], as do any made afterwards.
    pub fn close(&self) -> Result<()> {
        let receiver = match self.receiver.lock().take() {
            Some(receiver) => receiver,
            None => return Ok(()),
        };
        debug!("Closing connection");
        self.shared.pending.lock().closed = true;
        let result = self.shared.transport.shutdown();
        if receiver.join().is_err() {
            error!("Receiver thread panicked");
        }
        self.shared.fail_all();
        result
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("unique_name", &self.unique_name)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Error closing connection: {}", e);
        }
    }
}
