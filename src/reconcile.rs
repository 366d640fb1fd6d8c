//! Address and route reconciliation.
//!
//! The reconciler remembers the last *intended* configuration and, on each
//! [`apply`](Reconciler::apply), issues only the OS calls needed to move
//! from it to the new desired state.

use std::collections::BTreeSet;
use std::fmt;
use std::net::Ipv4Addr;

use ipnet::Ipv4Net;

use crate::config::Settings;
use crate::error::{ErrorCollector, Result, RouterError};
use crate::ops::NetworkOps;

/// Last-applied interface configuration.
///
/// Reflects what was asked for, not a read-back of the OS.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkState {
    local: Option<Ipv4Net>,
    routes: BTreeSet<Ipv4Net>,
}

impl NetworkState {
    /// Builds the target state for `settings`.
    ///
    /// Route prefixes are truncated to their network address, so
    /// `10.1.2.3/8` and `10.0.0.0/8` name the same route.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::UnsupportedConfiguration`] unless exactly one
    /// local address is given.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let [local] = settings.local_addrs.as_slice() else {
            return Err(RouterError::UnsupportedConfiguration(format!(
                "exactly one local address is supported, got {}",
                settings.local_addrs.len()
            )));
        };
        Ok(Self {
            local: Some(*local),
            routes: settings.routes.iter().map(Ipv4Net::trunc).collect(),
        })
    }

    /// The interface address, if one has been applied.
    #[must_use]
    pub const fn local(&self) -> Option<Ipv4Net> {
        self.local
    }

    /// Routed prefixes, in sorted order.
    #[must_use]
    pub const fn routes(&self) -> &BTreeSet<Ipv4Net> {
        &self.routes
    }

    /// Returns the changes that turn `self` into `target`.
    ///
    /// Address changes come first, then route deletions, then route
    /// additions; each group is in ascending prefix order. Route changes
    /// are bound to `target`'s local address and are omitted when it has
    /// none.
    #[must_use]
    pub fn changes_to(&self, target: &Self) -> Vec<Change> {
        let mut changes = Vec::new();

        if target.local != self.local {
            if let Some(old) = self.local {
                changes.push(Change::DelAlias(old));
                changes.push(Change::DelRoute {
                    dest: old,
                    via: old.addr(),
                });
            }
            if let Some(new) = target.local {
                changes.push(Change::AddAlias(new));
                changes.push(Change::AddRoute {
                    dest: new,
                    via: new.addr(),
                });
            }
        }

        let Some(via) = target.local.map(|l| l.addr()) else {
            return changes;
        };

        changes.extend(
            self.routes
                .difference(&target.routes)
                .map(|&dest| Change::DelRoute { dest, via }),
        );
        changes.extend(
            target
                .routes
                .difference(&self.routes)
                .map(|&dest| Change::AddRoute { dest, via }),
        );
        changes
    }
}

/// A single OS-level change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    /// Remove an address alias from the interface.
    DelAlias(Ipv4Net),
    /// Add an address alias to the interface.
    AddAlias(Ipv4Net),
    /// Remove the interface-scoped route for `dest`.
    DelRoute { dest: Ipv4Net, via: Ipv4Addr },
    /// Add an interface-scoped route for `dest`.
    AddRoute { dest: Ipv4Net, via: Ipv4Addr },
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DelAlias(addr) => write!(f, "- address {addr}"),
            Self::AddAlias(addr) => write!(f, "+ address {addr}"),
            Self::DelRoute { dest, via } => write!(f, "- route {dest} iface {via}"),
            Self::AddRoute { dest, via } => write!(f, "+ route {dest} iface {via}"),
        }
    }
}

/// Computes the changes needed to go from `current` to `desired`.
///
/// # Errors
///
/// Returns [`RouterError::UnsupportedConfiguration`] unless `desired` has
/// exactly one local address.
pub fn diff(current: &NetworkState, desired: &Settings) -> Result<Vec<Change>> {
    Ok(current.changes_to(&NetworkState::from_settings(desired)?))
}

/// Converges an interface's address and routes onto a desired state.
pub struct Reconciler<O> {
    iface: String,
    ops: O,
    state: NetworkState,
}

impl<O: NetworkOps> Reconciler<O> {
    /// Creates a reconciler for `iface` with an empty stored state.
    #[must_use]
    pub fn new(iface: impl Into<String>, ops: O) -> Self {
        Self {
            iface: iface.into(),
            ops,
            state: NetworkState::default(),
        }
    }

    /// The interface being managed.
    #[must_use]
    pub fn iface(&self) -> &str {
        &self.iface
    }

    /// The OS boundary in use.
    #[must_use]
    pub const fn ops(&self) -> &O {
        &self.ops
    }

    /// The last intended state.
    #[must_use]
    pub const fn state(&self) -> &NetworkState {
        &self.state
    }

    /// Applies `settings`.
    ///
    /// Every change is attempted even if earlier ones fail. The stored
    /// state becomes the desired state either way, so the next call diffs
    /// against what was intended.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::UnsupportedConfiguration`] (with nothing
    /// touched) unless exactly one local address is given, or
    /// [`RouterError::Partial`] listing every failed OS call, the first
    /// one as primary.
    pub fn apply(&mut self, settings: &Settings) -> Result<()> {
        let target = NetworkState::from_settings(settings)?;
        let changes = self.state.changes_to(&target);

        if changes.is_empty() {
            tracing::debug!(iface = %self.iface, "Network configuration unchanged");
            return Ok(());
        }

        let mut errors = ErrorCollector::default();
        for change in &changes {
            if let Err(e) = self.execute(change) {
                tracing::warn!(
                    iface = %self.iface,
                    change = %change,
                    error = %e,
                    "Network change failed"
                );
                errors.push(e);
            }
        }

        if let Some(local) = target.local.filter(|l| Some(*l) != self.state.local) {
            tracing::info!(iface = %self.iface, addr = %local, "Set interface address");
        }
        tracing::info!(
            iface = %self.iface,
            changes = changes.len(),
            routes = target.routes.len(),
            "Applied network configuration"
        );

        self.state = target;
        errors.finish()
    }

    fn execute(&self, change: &Change) -> Result<()> {
        match *change {
            Change::DelAlias(addr) => self.ops.del_alias(&self.iface, addr),
            Change::AddAlias(addr) => self.ops.add_alias(&self.iface, addr),
            Change::DelRoute { dest, via } => self.ops.del_route(dest, via),
            Change::AddRoute { dest, via } => self.ops.add_route(dest, via),
        }
    }
}
