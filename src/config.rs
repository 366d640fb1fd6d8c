//! Desired-state and path configuration.

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use ipnet::Ipv4Net;

/// Managed resolver file written by this crate.
const DEFAULT_MANAGED_PATH: &str = "/etc/resolv.tun-router.conf";

/// Backup slot for whatever `/etc/resolv.conf` was before takeover.
const DEFAULT_BACKUP_PATH: &str = "/etc/resolv.pre-tun-router-backup.conf";

/// System resolver configuration.
const DEFAULT_RESOLV_CONF_PATH: &str = "/etc/resolv.conf";

/// Desired network configuration for the tunnel interface.
///
/// # Example
///
/// ```
/// use tun_router::Settings;
///
/// let settings = Settings::new("100.64.0.1/32".parse().unwrap())
///     .with_route("10.0.0.0/8".parse().unwrap())
///     .with_dns_server("100.100.100.100".parse().unwrap())
///     .with_search_domain("corp.example");
///
/// assert_eq!(settings.local_addrs.len(), 1);
/// assert_eq!(settings.routes.len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    /// Addresses to assign to the interface. Exactly one is supported.
    pub local_addrs: Vec<Ipv4Net>,

    /// Prefixes routed through the interface.
    pub routes: Vec<Ipv4Net>,

    /// Nameservers, in resolver order. Empty disables DNS takeover.
    pub dns_servers: Vec<Ipv4Addr>,

    /// Search domains, in order.
    pub dns_search_domains: Vec<String>,
}

impl Settings {
    /// Creates settings with a single local address and nothing else.
    #[must_use]
    pub fn new(local_addr: Ipv4Net) -> Self {
        Self {
            local_addrs: vec![local_addr],
            ..Self::default()
        }
    }

    /// Adds a routed prefix.
    #[must_use]
    pub fn with_route(mut self, route: Ipv4Net) -> Self {
        self.routes.push(route);
        self
    }

    /// Adds several routed prefixes.
    #[must_use]
    pub fn with_routes(mut self, routes: impl IntoIterator<Item = Ipv4Net>) -> Self {
        self.routes.extend(routes);
        self
    }

    /// Appends a nameserver.
    #[must_use]
    pub fn with_dns_server(mut self, server: Ipv4Addr) -> Self {
        self.dns_servers.push(server);
        self
    }

    /// Appends several nameservers.
    #[must_use]
    pub fn with_dns_servers(mut self, servers: impl IntoIterator<Item = Ipv4Addr>) -> Self {
        self.dns_servers.extend(servers);
        self
    }

    /// Appends a search domain.
    #[must_use]
    pub fn with_search_domain(mut self, domain: impl Into<String>) -> Self {
        self.dns_search_domains.push(domain.into());
        self
    }

    /// Appends several search domains.
    #[must_use]
    pub fn with_search_domains<S: Into<String>>(
        mut self,
        domains: impl IntoIterator<Item = S>,
    ) -> Self {
        self.dns_search_domains
            .extend(domains.into_iter().map(Into::into));
        self
    }
}

/// Filesystem locations used by [`ResolvConf`](crate::ResolvConf).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvConfPaths {
    /// The resolver file generated and owned by this crate.
    pub managed: PathBuf,

    /// Single backup slot holding the pre-takeover file or symlink.
    pub backup: PathBuf,

    /// The system resolver path that gets symlinked to `managed`.
    pub resolv_conf: PathBuf,
}

impl ResolvConfPaths {
    /// Places all three files under `dir` (useful for testing).
    #[must_use]
    pub fn with_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            managed: dir.join("resolv.tun-router.conf"),
            backup: dir.join("resolv.pre-tun-router-backup.conf"),
            resolv_conf: dir.join("resolv.conf"),
        }
    }
}

impl Default for ResolvConfPaths {
    fn default() -> Self {
        Self {
            managed: PathBuf::from(DEFAULT_MANAGED_PATH),
            backup: PathBuf::from(DEFAULT_BACKUP_PATH),
            resolv_conf: PathBuf::from(DEFAULT_RESOLV_CONF_PATH),
        }
    }
}
