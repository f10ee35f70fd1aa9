//! Prints one property of a bus object.
//!
//! ```text
//! busprop org.freedesktop.DBus /org/freedesktop/DBus org.freedesktop.DBus Features
//! ```

use clap::Parser;
use log::debug;
use std::process::ExitCode;
use std::time::Duration;
use typed_dbus::{BusScope, Connection};

#[derive(Parser, Debug)]
#[command(version, about = "Read a DBus property")]
struct Args {
    /// Use the system bus instead of the session bus.
    #[arg(long)]
    system: bool,

    /// Connect to this bus address instead.
    #[arg(long, conflicts_with = "system")]
    address: Option<String>,

    /// Call timeout in milliseconds.
    #[arg(long, default_value_t = 25_000)]
    timeout: u64,

    /// Bus name owning the object.
    name: String,
    path: String,
    interface: String,
    property: String,
}

fn run(args: &Args) -> typed_dbus::Result<()> {
    let scope = if args.system {
        BusScope::System
    } else {
        BusScope::Session
    };
    let mut builder = Connection::builder(scope).timeout(Duration::from_millis(args.timeout));
    if let Some(address) = &args.address {
        builder = builder.address(address.as_str());
    }

    let connection = builder.build()?;
    debug!("Connected as {:?}", connection.unique_name());

    let proxy = connection.get(&args.name, &args.path, &args.interface);
    let value = proxy.get_variant(&args.property)?;
    println!("{}", value);
    Ok(())
}

fn main() -> ExitCode {
    pretty_env_logger::init();
    let args = Args::parse();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("busprop: {}", e);
            ExitCode::FAILURE
        }
    }
}
