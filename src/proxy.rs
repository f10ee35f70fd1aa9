//! Handles on remote objects.

use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::message::Message;
use crate::signature::DbusType;
use crate::value::{ObjectPath, Variant};
use crate::wire::Header;

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;

const PROPERTIES_INTERFACE: &str = "org.freedesktop.DBus.Properties";
const INTROSPECTABLE_INTERFACE: &str = "org.freedesktop.DBus.Introspectable";

/// An interface of an object owned by some bus name.
///
/// Creating a proxy does no I/O and never fails; bad names are reported by
/// the bus when a call is made.
#[derive(Clone, Debug)]
pub struct Proxy<'c> {
    connection: &'c Connection,
    destination: String,
    path: ObjectPath,
    interface: String,
}

impl<'c> Proxy<'c> {
    pub(crate) fn new(connection: &'c Connection, name: &str, path: &str, interface: &str) -> Self {
        Self {
            connection,
            destination: name.to_owned(),
            path: ObjectPath::from(path),
            interface: interface.to_owned(),
        }
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn path(&self) -> &ObjectPath {
        &self.path
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    pub fn connection(&self) -> &'c Connection {
        self.connection
    }

    /// Starts a call of `member` on this interface.
    pub fn call(&self, member: &str) -> Message<'c> {
        self.call_on(&self.interface, member)
    }

    fn call_on(&self, interface: &str, member: &str) -> Message<'c> {
        let header = Header::method_call(
            Some(&self.destination),
            &self.path,
            Some(interface),
            member,
        );
        Message::new(self.connection, header)
    }

    /// Reads a property, which must hold exactly a `T`.
    pub fn get<T>(&self, property: &str) -> Result<T>
    where
        T: DbusType + DeserializeOwned,
    {
        let value: Variant = self
            .call_on(PROPERTIES_INTERFACE, "Get")
            .args(self.interface.as_str())?
            .args(property)?
            .run_typed()?;

        value.get().map_err(|e| match e {
            Error::VariantTypeMismatch { expected, found } => Error::PropertyTypeMismatch {
                property: property.to_owned(),
                expected,
                found,
            },
            other => other,
        })
    }

    /// Reads a property whatever its type.
    pub fn get_variant(&self, property: &str) -> Result<Variant> {
        self.call_on(PROPERTIES_INTERFACE, "Get")
            .args(self.interface.as_str())?
            .args(property)?
            .run_typed()
    }

    pub fn set<T>(&self, property: &str, value: &T) -> Result<()>
    where
        T: DbusType + Serialize + ?Sized,
    {
        let value = Variant::new(value)?;
        self.call_on(PROPERTIES_INTERFACE, "Set")
            .args(self.interface.as_str())?
            .args(property)?
            .args(&value)?
            .run()
    }

    pub fn get_all(&self) -> Result<HashMap<String, Variant>> {
        self.call_on(PROPERTIES_INTERFACE, "GetAll")
            .args(self.interface.as_str())?
            .run_typed()
    }

    /// The object's introspection XML.
    pub fn introspect(&self) -> Result<String> {
        self.call_on(INTROSPECTABLE_INTERFACE, "Introspect").run_typed()
    }
}

#[cfg(test)]
mod tests {
    use crate::error::{Error, Result};
    use crate::test_bus::{self, Reply};
    use crate::value::{Value, Variant};
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;
    use test_log::test;

    const BUS: &str = "org.freedesktop.DBus";

    fn serve_properties(
        store: Arc<Mutex<HashMap<String, Variant>>>,
    ) -> Result<(crate::Connection, std::thread::JoinHandle<()>)> {
        test_bus::serve(Duration::from_secs(5), move |call| {
            match call.header.member.as_deref() {
                Some("Get") => {
                    let (interface, name): (String, String) = call.args()?;
                    assert_eq!(interface, BUS);
                    match store.lock().get(&name) {
                        Some(value) => Reply::value(value),
                        None => Ok(Reply::error(
                            "org.freedesktop.DBus.Error.UnknownProperty",
                            &format!("No such property {:?}", name),
                        )),
                    }
                }
                Some("Set") => {
                    let (_, name, value): (String, String, Variant) = call.args()?;
                    store.lock().insert(name, value);
                    Ok(Reply::Return(crate::Body::empty()))
                }
                Some("GetAll") => Reply::value(&*store.lock()),
                Some("Introspect") => {
                    assert_eq!(
                        call.header.interface.as_deref(),
                        Some("org.freedesktop.DBus.Introspectable")
                    );
                    Reply::value("<node/>")
                }
                _ => Ok(Reply::Ignore),
            }
        })
    }

    fn features_store() -> Result<Arc<Mutex<HashMap<String, Variant>>>> {
        let mut store = HashMap::new();
        store.insert(
            "Features".to_owned(),
            Variant::new(&vec!["SystemdActivation".to_owned()])?,
        );
        store.insert("Interfaces".to_owned(), Variant::new(&Vec::<String>::new())?);
        Ok(Arc::new(Mutex::new(store)))
    }

    #[test]
    fn features_property() -> Result<()> {
        let (connection, _bus) = serve_properties(features_store()?)?;
        let proxy = connection.get(BUS, "/org/freedesktop/DBus", BUS);

        let features: Vec<String> = proxy.get("Features")?;
        assert_eq!(features, vec!["SystemdActivation".to_owned()]);

        match proxy.get::<String>("Features") {
            Err(Error::PropertyTypeMismatch {
                property,
                expected,
                found,
            }) => {
                assert_eq!(property, "Features");
                assert_eq!(expected, "s");
                assert_eq!(found, "as");
            }
            other => panic!("unexpected result {:?}", other),
        }

        let features = proxy.get_variant("Features")?;
        assert_eq!(features.to_string(), "<['SystemdActivation']>");
        Ok(())
    }

    #[test]
    fn unknown_property() -> Result<()> {
        let (connection, _bus) = serve_properties(features_store()?)?;
        let proxy = connection.get(BUS, "/org/freedesktop/DBus", BUS);

        let err = proxy.get::<u32>("Missing").unwrap_err();
        assert_eq!(
            err.bus_error_name(),
            Some("org.freedesktop.DBus.Error.UnknownProperty")
        );
        Ok(())
    }

    #[test]
    fn set_and_get_all() -> Result<()> {
        let store = features_store()?;
        let (connection, _bus) = serve_properties(Arc::clone(&store))?;
        let proxy = connection.get(BUS, "/org/freedesktop/DBus", BUS);

        proxy.set("Volume", &75u32)?;
        assert_eq!(proxy.get::<u32>("Volume")?, 75);

        let all = proxy.get_all()?;
        assert_eq!(all.len(), 3);
        assert_eq!(all["Volume"].value(), &Value::UInt32(75));
        assert_eq!(all["Interfaces"].get::<Vec<String>>()?, Vec::<String>::new());
        Ok(())
    }

    #[test]
    fn introspect() -> Result<()> {
        let (connection, _bus) = serve_properties(features_store()?)?;
        let proxy = connection.get(BUS, "/", BUS);
        assert_eq!(proxy.introspect()?, "<node/>");
        assert_eq!(proxy.path().as_str(), "/");
        assert_eq!(proxy.destination(), BUS);
        Ok(())
    }
}
