//! OS network-configuration boundary.
//!
//! [`NetworkOps`] is the seam between the reconciler and the operating
//! system. [`IfconfigOps`] implements it by running BSD-style `ifconfig(8)`
//! and `route(8)` commands; tests substitute a recording double.

use std::net::Ipv4Addr;
use std::process::Command;

use ipnet::Ipv4Net;

use crate::error::{Result, RouterError};

/// Administrative state of an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// Administratively up.
    Up,
    /// Administratively down.
    Down,
}

impl std::fmt::Display for LinkState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_arg())
    }
}

impl LinkState {
    const fn as_arg(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
        }
    }
}

/// Synchronous network-configuration primitives.
///
/// Every call blocks until the OS has accepted or rejected the change.
/// Routes are interface-scoped: `iface_addr` is the local address whose
/// interface carries the traffic, never a gateway.
pub trait NetworkOps {
    /// Sets the interface administratively up or down.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::Command`] if the OS rejects the change.
    fn set_link_state(&self, iface: &str, state: LinkState) -> Result<()>;

    /// Adds `addr` as an address alias on `iface`.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::Command`] if the OS rejects the change.
    fn add_alias(&self, iface: &str, addr: Ipv4Net) -> Result<()>;

    /// Removes the address alias `addr` from `iface`.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::Command`] if the OS rejects the change.
    fn del_alias(&self, iface: &str, addr: Ipv4Net) -> Result<()>;

    /// Adds an interface-scoped route for `dest`.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::Command`] if the OS rejects the change.
    fn add_route(&self, dest: Ipv4Net, iface_addr: Ipv4Addr) -> Result<()>;

    /// Removes the interface-scoped route for `dest`.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::Command`] if the OS rejects the change.
    fn del_route(&self, dest: Ipv4Net, iface_addr: Ipv4Addr) -> Result<()>;
}

/// [`NetworkOps`] backed by `ifconfig` and `route` subprocesses.
#[derive(Debug, Clone, Copy, Default)]
pub struct IfconfigOps;

impl IfconfigOps {
    /// Creates the subprocess-backed implementation.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl NetworkOps for IfconfigOps {
    fn set_link_state(&self, iface: &str, state: LinkState) -> Result<()> {
        run(&link_state_args(iface, state))
    }

    fn add_alias(&self, iface: &str, addr: Ipv4Net) -> Result<()> {
        run(&alias_args(iface, addr, true))
    }

    fn del_alias(&self, iface: &str, addr: Ipv4Net) -> Result<()> {
        run(&alias_args(iface, addr, false))
    }

    fn add_route(&self, dest: Ipv4Net, iface_addr: Ipv4Addr) -> Result<()> {
        run(&route_args("add", dest, iface_addr))
    }

    fn del_route(&self, dest: Ipv4Net, iface_addr: Ipv4Addr) -> Result<()> {
        run(&route_args("del", dest, iface_addr))
    }
}

// ---------------------------------------------------------------------------
// Command construction
// ---------------------------------------------------------------------------

fn link_state_args(iface: &str, state: LinkState) -> Vec<String> {
    vec![
        "ifconfig".to_string(),
        iface.to_string(),
        state.as_arg().to_string(),
    ]
}

fn alias_args(iface: &str, addr: Ipv4Net, add: bool) -> Vec<String> {
    vec![
        "ifconfig".to_string(),
        iface.to_string(),
        "inet".to_string(),
        addr.to_string(),
        if add { "alias" } else { "-alias" }.to_string(),
    ]
}

fn route_args(verb: &str, dest: Ipv4Net, iface_addr: Ipv4Addr) -> Vec<String> {
    vec![
        "route".to_string(),
        "-q".to_string(),
        "-n".to_string(),
        verb.to_string(),
        "-inet".to_string(),
        dest.to_string(),
        "-iface".to_string(),
        iface_addr.to_string(),
    ]
}

/// Runs `argv`, mapping a spawn failure or non-zero exit to
/// [`RouterError::Command`] with the combined output as diagnostic text.
fn run(argv: &[String]) -> Result<()> {
    let command = argv.join(" ");
    let Some((program, args)) = argv.split_first() else {
        return Err(RouterError::Command {
            command,
            output: "empty command line".to_string(),
        });
    };

    tracing::debug!(command = %command, "Running network command");

    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|e| RouterError::Command {
            command: command.clone(),
            output: e.to_string(),
        })?;

    if output.status.success() {
        return Ok(());
    }

    let mut diag = output.status.to_string();
    for stream in [&output.stdout, &output.stderr] {
        let text = String::from_utf8_lossy(stream);
        let text = text.trim();
        if !text.is_empty() {
            diag.push_str(": ");
            diag.push_str(text);
        }
    }

    Err(RouterError::Command {
        command,
        output: diag,
    })
}
