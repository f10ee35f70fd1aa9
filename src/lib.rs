//! A strongly-typed DBus client.
//!
//! Argument and reply types are checked against DBus signatures derived
//! from their Rust types, so a call that would put the wrong thing on the
//! wire fails before anything is sent, and a reply of the wrong shape is
//! an error rather than a guess.
//!
//! ```no_run
//! use typed_dbus::Connection;
//!
//! # fn main() -> typed_dbus::Result<()> {
//! let connection = Connection::session()?;
//! let bus = connection.get(
//!     "org.freedesktop.DBus",
//!     "/org/freedesktop/DBus",
//!     "org.freedesktop.DBus",
//! );
//!
//! let features: Vec<String> = bus.get("Features")?;
//! let owner: String = bus
//!     .call("GetNameOwner")
//!     .args("org.freedesktop.DBus")?
//!     .run_typed()?;
//! # Ok(())
//! # }
//! ```
//!
//! Signatures come from the [`DbusType`] trait, implemented for the Rust
//! types with a DBus counterpart. Values themselves go through [serde]:
//! the [`ser`] module encodes any `Serialize` value in lock-step with a
//! signature, and the [`de`] module decodes any `Deserialize` value from a
//! message [`Body`]. Self-describing values are held in a [`Variant`].
//!
//! A [`Connection`] owns a receiver thread that routes each reply to the
//! call waiting for it, so calls may be made from several threads at once.
//!
//! [serde]: https://serde.rs
//! [`ser`]: crate::ser
//! [`de`]: crate::de

pub mod address;
mod align;
mod body;
mod connection;
pub mod de;
pub mod error;
mod message;
mod primitives;
mod proxy;
pub mod ser;
mod signature;
pub mod transport;
mod value;
pub mod wire;

#[cfg(test)]
mod test_bus;

pub use body::{Body, Endian};
pub use connection::{BusScope, Connection, ConnectionBuilder, DEFAULT_TIMEOUT};
pub use de::from_body;
pub use error::{BusError, Error, Result};
pub use message::{CallState, Message};
pub use proxy::Proxy;
pub use ser::{serialize, BodyBuilder};
pub use signature::{BasicType, DbusType, Signature, SingleTypes};
pub use transport::{ChannelTransport, Transport, UnixTransport};
pub use value::{Array, Dict, ObjectPath, Value, Variant};
