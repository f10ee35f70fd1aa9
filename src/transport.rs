//! Byte transports carrying whole message frames.

use crate::address::{self, BusAddress};
use crate::error::{Error, Result};
use crate::wire::{frame_length, FIXED_HEADER_LEN};

use log::{debug, trace};
use parking_lot::Mutex;
use std::io::{self, ErrorKind, Read, Write};
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;

const MAX_AUTH_LINE: usize = 512;

/// A duplex carrier of complete frames.
///
/// `send` and `receive` are called from different threads at the same time,
/// so implementations must not serialize one behind the other.
pub trait Transport: Send + Sync {
    fn send(&self, frame: &[u8]) -> Result<()>;

    /// Blocks for the next frame. `None` means the peer has gone away or the
    /// transport was shut down.
    fn receive(&self) -> Result<Option<Vec<u8>>>;

    /// Wakes up a blocked `receive` and refuses further sends.
    fn shutdown(&self) -> Result<()>;
}

/// A unix domain socket to a message bus, authenticated with SASL
/// `EXTERNAL`.
pub struct UnixTransport {
    reader: Mutex<UnixStream>,
    writer: Mutex<UnixStream>,
}

impl UnixTransport {
    /// Connects to the first reachable candidate of a bus address string.
    pub fn connect(address: &str) -> Result<Self> {
        let mut last_error = None;
        for candidate in address::parse(address)? {
            match Self::connect_to(&candidate) {
                Ok(transport) => return Ok(transport),
                Err(e) => {
                    debug!("Cannot connect to {:?}: {}", candidate, e);
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| Error::UnsupportedAddress(address.to_owned())))
    }

    pub fn connect_to(address: &BusAddress) -> Result<Self> {
        let stream = match address {
            BusAddress::UnixPath(path) => UnixStream::connect(path)?,
            BusAddress::UnixAbstract(name) => connect_abstract(name)?,
        };
        Self::from_stream(stream)
    }

    /// Authenticates over an already connected stream.
    pub fn from_stream(mut stream: UnixStream) -> Result<Self> {
        authenticate(&mut stream)?;
        let writer = stream.try_clone()?;
        Ok(Self {
            reader: Mutex::new(stream),
            writer: Mutex::new(writer),
        })
    }
}

#[cfg(target_os = "linux")]
fn connect_abstract(name: &[u8]) -> io::Result<UnixStream> {
    use std::os::linux::net::SocketAddrExt;
    use std::os::unix::net::SocketAddr;

    let addr = SocketAddr::from_abstract_name(name)?;
    UnixStream::connect_addr(&addr)
}

#[cfg(not(target_os = "linux"))]
fn connect_abstract(_name: &[u8]) -> io::Result<UnixStream> {
    Err(io::Error::new(
        ErrorKind::Unsupported,
        "abstract sockets are only available on Linux",
    ))
}

fn authenticate(stream: &mut UnixStream) -> Result<()> {
    // SAFETY: getuid has no preconditions and always succeeds.
    let uid = unsafe { libc::getuid() };
    let auth = format!("AUTH EXTERNAL {}\r\n", hex::encode(uid.to_string()));
    stream.write_all(b"\0")?;
    stream.write_all(auth.as_bytes())?;

    let reply = read_auth_line(stream)?;
    trace!("Authentication reply: {:?}", reply);
    if !reply.starts_with("OK ") {
        return Err(Error::AuthenticationFailed(reply));
    }
    stream.write_all(b"BEGIN\r\n")?;
    Ok(())
}

// Read byte by byte, so nothing after the line is consumed.
fn read_auth_line(stream: &mut UnixStream) -> Result<String> {
    let mut line = Vec::new();
    let mut byte = [0u8];
    while !line.ends_with(b"\r\n") {
        if line.len() > MAX_AUTH_LINE {
            return Err(Error::AuthenticationFailed(
                String::from_utf8_lossy(&line).into_owned(),
            ));
        }
        stream.read_exact(&mut byte)?;
        line.push(byte[0]);
    }
    line.truncate(line.len() - 2);
    Ok(String::from_utf8_lossy(&line).into_owned())
}

impl Transport for UnixTransport {
    fn send(&self, frame: &[u8]) -> Result<()> {
        let mut writer = self.writer.lock();
        writer.write_all(frame)?;
        writer.flush()?;
        Ok(())
    }

    fn receive(&self) -> Result<Option<Vec<u8>>> {
        let mut reader = self.reader.lock();
        let mut frame = vec![0u8; FIXED_HEADER_LEN];
        match reader.read_exact(&mut frame) {
            Ok(()) => (),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }
        let len = frame_length(&frame)?;
        frame.resize(len, 0);
        reader.read_exact(&mut frame[FIXED_HEADER_LEN..])?;
        Ok(Some(frame))
    }

    fn shutdown(&self) -> Result<()> {
        // The reader shares the socket, so this also ends a blocked read.
        match self.writer.lock().shutdown(Shutdown::Both) {
            Err(e) if e.kind() != ErrorKind::NotConnected => Err(e.into()),
            _ => Ok(()),
        }
    }
}

type Packet = Option<Vec<u8>>;

/// One end of an in-process transport pair.
///
/// Frames sent on one end are received on the other. Dropping or shutting
/// down an end is seen by its peer as the connection closing.
pub struct ChannelTransport {
    tx: Mutex<mpsc::Sender<Packet>>,
    // Lets shutdown wake up our own blocked receive.
    wake: Mutex<mpsc::Sender<Packet>>,
    rx: Mutex<mpsc::Receiver<Packet>>,
    closed: AtomicBool,
}

impl ChannelTransport {
    pub fn pair() -> (Self, Self) {
        let (tx_a, rx_a) = mpsc::channel();
        let (tx_b, rx_b) = mpsc::channel();

        let a = Self {
            tx: Mutex::new(tx_a.clone()),
            wake: Mutex::new(tx_b.clone()),
            rx: Mutex::new(rx_b),
            closed: AtomicBool::new(false),
        };

        let b = Self {
            tx: Mutex::new(tx_b),
            wake: Mutex::new(tx_a),
            rx: Mutex::new(rx_a),
            closed: AtomicBool::new(false),
        };

        (a, b)
    }
}

impl Transport for ChannelTransport {
    fn send(&self, frame: &[u8]) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::ConnectionClosed);
        }
        self.tx
            .lock()
            .send(Some(frame.to_vec()))
            .map_err(|_| Error::ConnectionClosed)
    }

    fn receive(&self) -> Result<Option<Vec<u8>>> {
        if self.closed.load(Ordering::SeqCst) {
            return Ok(None);
        }
        match self.rx.lock().recv() {
            Ok(Some(frame)) => Ok(Some(frame)),
            Ok(None) | Err(_) => {
                self.closed.store(true, Ordering::SeqCst);
                Ok(None)
            }
        }
    }

    fn shutdown(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            let _ = self.wake.lock().send(None);
            let _ = self.tx.lock().send(None);
        }
        Ok(())
    }
}

impl Drop for ChannelTransport {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}
