//! Bus addresses, as found in `DBUS_SESSION_BUS_ADDRESS` and friends.
//!
//! An address is a `;`-separated list of candidates such as
//! `unix:path=/run/user/1000/bus` or `unix:abstract=/tmp/dbus-x,guid=...`,
//! tried in order. Only unix socket transports are supported.

use crate::error::{Error, Result};

use log::debug;
use std::env;
use std::path::PathBuf;

pub(crate) const SESSION_BUS_VAR: &str = "DBUS_SESSION_BUS_ADDRESS";
pub(crate) const SYSTEM_BUS_VAR: &str = "DBUS_SYSTEM_BUS_ADDRESS";
const DEFAULT_SYSTEM_BUS: &str = "unix:path=/var/run/dbus/system_bus_socket";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BusAddress {
    UnixPath(PathBuf),
    /// A name in the Linux abstract socket namespace, without the leading
    /// NUL.
    UnixAbstract(Vec<u8>),
}

pub(crate) fn session_bus_address() -> Result<String> {
    env::var(SESSION_BUS_VAR).map_err(|_| Error::NoBusAddress(SESSION_BUS_VAR))
}

pub(crate) fn system_bus_address() -> String {
    env::var(SYSTEM_BUS_VAR).unwrap_or_else(|_| DEFAULT_SYSTEM_BUS.to_owned())
}

/// Parses every candidate we know how to connect to, in order.
pub fn parse(address: &str) -> Result<Vec<BusAddress>> {
    let mut candidates = Vec::new();
    for candidate in address.split(';').filter(|c| !c.is_empty()) {
        match parse_candidate(candidate)? {
            Some(parsed) => candidates.push(parsed),
            None => debug!("Skipping unsupported bus address {:?}", candidate),
        }
    }
    if candidates.is_empty() {
        return Err(Error::UnsupportedAddress(address.to_owned()));
    }
    Ok(candidates)
}

fn parse_candidate(candidate: &str) -> Result<Option<BusAddress>> {
    let malformed = || Error::UnsupportedAddress(candidate.to_owned());
    let (transport, params) = candidate.split_once(':').ok_or_else(malformed)?;
    if transport != "unix" {
        return Ok(None);
    }

    let mut path = None;
    let mut abstract_name = None;
    for param in params.split(',').filter(|p| !p.is_empty()) {
        let (key, value) = param.split_once('=').ok_or_else(malformed)?;
        let value = unescape(value).ok_or_else(malformed)?;
        match key {
            "path" => path = Some(value),
            "abstract" => abstract_name = Some(value),
            _ => (),
        }
    }

    match (path, abstract_name) {
        (Some(path), None) => {
            let path = String::from_utf8(path).map_err(|_| malformed())?;
            Ok(Some(BusAddress::UnixPath(PathBuf::from(path))))
        }
        (None, Some(name)) => Ok(Some(BusAddress::UnixAbstract(name))),
        (Some(_), Some(_)) => Err(malformed()),
        // tmpdir= and dir= are for servers only
        (None, None) => Ok(None),
    }
}

fn unescape(value: &str) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(value.len());
    let mut bytes = value.bytes();
    while let Some(b) = bytes.next() {
        if b == b'%' {
            let hi = bytes.next()?;
            let lo = bytes.next()?;
            let pair = [hi, lo];
            let hex = std::str::from_utf8(&pair).ok()?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
        } else {
            out.push(b);
        }
    }
    Some(out)
}
