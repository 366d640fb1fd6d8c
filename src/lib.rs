//! # tun-router
//!
//! Reconcile a tunnel interface's host configuration (one IPv4 address,
//! a set of interface-scoped routes, and system DNS via `resolv.conf`)
//! against a desired state.
//!
//! Every change is idempotent and best effort: a second
//! [`Router::set`] with the same [`Settings`] issues no OS calls, and a
//! failing step never stops the remaining ones. There is no rollback.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use tun_router::{Router, Settings, TunRouter};
//!
//! // Requires root.
//! let mut router = TunRouter::new("tun0");
//! router.up()?;
//!
//! router.set(
//!     &Settings::new("100.64.0.1/32".parse()?)
//!         .with_routes(["10.0.0.0/8".parse()?, "192.168.0.0/16".parse()?])
//!         .with_dns_server("100.100.100.100".parse()?)
//!         .with_search_domain("corp.example"),
//! )?;
//!
//! // Interface down and resolv.conf restored.
//! router.close();
//! ```
//!
//! ## DNS takeover
//!
//! [`ResolvConf`] writes a managed resolver file and symlinks
//! `/etc/resolv.conf` to it, keeping whatever was there before in a single
//! backup slot. All state lives on disk, so a restarted process can still
//! restore:
//!
//! ```rust,ignore
//! use tun_router::{ResolvConf, ResolvConfPaths};
//!
//! ResolvConf::new(ResolvConfPaths::default()).restore()?;
//! ```
//!
//! ## Platform
//!
//! Commands are BSD `ifconfig(8)` / `route(8)`. Implement [`NetworkOps`]
//! to drive something else.
//!
//! ## Concurrency
//!
//! Everything is synchronous. Each process must own its interface and the
//! resolver paths exclusively; concurrent instances race.

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod ops;
pub mod reconcile;
pub mod resolv_conf;
pub mod router;
pub mod util;

pub use config::{ResolvConfPaths, Settings};
pub use error::{ErrorKind, Failures, Result, RouterError};
pub use ops::{IfconfigOps, LinkState, NetworkOps};
pub use reconcile::{Change, NetworkState, Reconciler, diff};
pub use resolv_conf::{Backup, ResolvConf, ResolvConfState, render};
pub use router::{Router, TunRouter};
