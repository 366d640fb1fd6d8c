//! Interface lifecycle: bring up, configure, tear down.

use crate::config::{ResolvConfPaths, Settings};
use crate::error::{ErrorCollector, Result, RouterError};
use crate::ops::{IfconfigOps, LinkState, NetworkOps};
use crate::reconcile::Reconciler;
use crate::resolv_conf::ResolvConf;
use crate::util::interface_index;

/// Configures the host side of a tunnel interface.
pub trait Router {
    /// Brings the interface up.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the interface cannot be brought up.
    fn up(&mut self) -> Result<()>;

    /// Converges addresses, routes and DNS onto `settings`.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::UnsupportedConfiguration`] before touching
    /// anything, or [`RouterError::Partial`] once every step has been
    /// attempted.
    fn set(&mut self, settings: &Settings) -> Result<()>;

    /// Brings the interface down and restores DNS. Never fails; problems
    /// are logged.
    fn close(&mut self);
}

/// [`Router`] for a point-to-point tunnel interface.
///
/// # Example
///
/// ```rust,ignore
/// use tun_router::{Router, Settings, TunRouter};
///
/// let mut router = TunRouter::new("tun0");
/// router.up()?;
/// router.set(
///     &Settings::new("100.64.0.1/32".parse()?)
///         .with_route("10.0.0.0/8".parse()?)
///         .with_dns_server("100.100.100.100".parse()?),
/// )?;
/// // ...
/// router.close();
/// ```
pub struct TunRouter<O = IfconfigOps> {
    reconciler: Reconciler<O>,
    dns: ResolvConf,
}

impl TunRouter<IfconfigOps> {
    /// Creates a router for `iface` using `ifconfig`/`route` and the
    /// system resolver paths.
    #[must_use]
    pub fn new(iface: impl Into<String>) -> Self {
        Self::with_ops(iface, IfconfigOps::new(), ResolvConfPaths::default())
    }
}

impl<O: NetworkOps> TunRouter<O> {
    /// Creates a router with an explicit OS boundary and resolver paths.
    #[must_use]
    pub fn with_ops(iface: impl Into<String>, ops: O, paths: ResolvConfPaths) -> Self {
        Self {
            reconciler: Reconciler::new(iface, ops),
            dns: ResolvConf::new(paths),
        }
    }

    /// The interface being managed.
    #[must_use]
    pub fn iface(&self) -> &str {
        self.reconciler.iface()
    }

    /// The reconciler holding the last intended address and routes.
    #[must_use]
    pub const fn reconciler(&self) -> &Reconciler<O> {
        &self.reconciler
    }

    /// The resolver takeover manager.
    #[must_use]
    pub const fn dns(&self) -> &ResolvConf {
        &self.dns
    }
}

impl<O: NetworkOps> Router for TunRouter<O> {
    fn up(&mut self) -> Result<()> {
        let iface = self.reconciler.iface();
        if let Err(e) = self.reconciler.ops().set_link_state(iface, LinkState::Up) {
            if interface_index(iface).is_none() {
                tracing::warn!(iface = %iface, "Interface does not exist");
            }
            tracing::warn!(iface = %iface, error = %e, "Failed to bring interface up");
            return Err(e);
        }
        tracing::info!(iface = %iface, "Interface up");
        Ok(())
    }

    fn set(&mut self, settings: &Settings) -> Result<()> {
        let mut errors = ErrorCollector::default();
        match self.reconciler.apply(settings) {
            Ok(()) => {}
            Err(e @ RouterError::UnsupportedConfiguration(_)) => return Err(e),
            Err(e) => errors.push(e),
        }

        if let Err(e) = self
            .dns
            .replace(&settings.dns_servers, &settings.dns_search_domains)
        {
            tracing::warn!(
                iface = %self.iface(),
                error = %e,
                "Replacing resolv.conf failed"
            );
            errors.push(e);
        }

        errors.finish()
    }

    fn close(&mut self) {
        let iface = self.reconciler.iface();
        if let Err(e) = self.reconciler.ops().set_link_state(iface, LinkState::Down) {
            tracing::warn!(iface = %iface, error = %e, "Failed to bring interface down");
        }

        if let Err(e) = self.dns.restore() {
            tracing::warn!(error = %e, "Failed to restore system resolv.conf");
        }
    }
}
