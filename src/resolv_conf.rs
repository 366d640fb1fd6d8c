//! `/etc/resolv.conf` takeover and restore.
//!
//! Takeover writes a managed resolver file and points the system resolver
//! path at it with a symlink. Whatever was there before (a regular file or
//! a symlink) is kept in a single backup slot so [`ResolvConf::restore`]
//! can put it back. The on-disk layout is the only state, so a restarted
//! process can still restore a takeover made by its predecessor.

use std::fs;
use std::io::{self, Write as _};
use std::net::Ipv4Addr;
use std::os::unix::fs::{PermissionsExt, symlink};
use std::path::{Path, PathBuf};

use crate::config::ResolvConfPaths;
use crate::error::{Result, RouterError};

/// Header written at the top of the managed file.
const MANAGED_HEADER: &str = "# resolv.conf(5) file generated by tun-router\n\
                              # DO NOT EDIT THIS FILE BY HAND -- CHANGES WILL BE OVERWRITTEN\n";

/// What the backup slot holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backup {
    /// The resolver path was a regular file with these bytes.
    Content(Vec<u8>),
    /// The resolver path was a symlink with this target.
    Symlink(PathBuf),
}

/// Resolver configuration state as found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvConfState {
    /// No takeover in effect.
    Unmanaged,
    /// The resolver path points at the managed file and there is nothing
    /// to restore.
    Managed,
    /// A takeover is in effect and the prior configuration is backed up.
    BackedUp(Backup),
}

/// Manages takeover of the system resolver configuration.
///
/// # Example
///
/// ```rust,ignore
/// use tun_router::{ResolvConf, ResolvConfPaths};
///
/// let dns = ResolvConf::new(ResolvConfPaths::default());
/// dns.replace(&["100.100.100.100".parse()?], &["corp.example".into()])?;
/// // ...
/// dns.restore()?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct ResolvConf {
    paths: ResolvConfPaths,
}

impl ResolvConf {
    /// Creates a manager for the given paths.
    #[must_use]
    pub const fn new(paths: ResolvConfPaths) -> Self {
        Self { paths }
    }

    /// Returns the paths in use.
    #[must_use]
    pub const fn paths(&self) -> &ResolvConfPaths {
        &self.paths
    }

    /// Installs a managed resolver configuration.
    ///
    /// With no `servers` this is exactly [`restore`](Self::restore).
    /// Otherwise the managed file is (re)written atomically, the current
    /// resolver path is backed up unless it already points at the managed
    /// file, and the resolver path is replaced with a symlink to it.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::Io`] if any write, rename, or symlink fails.
    /// The operation stops at the first such failure.
    pub fn replace(&self, servers: &[Ipv4Addr], domains: &[String]) -> Result<()> {
        if servers.is_empty() {
            return self.restore();
        }

        let ResolvConfPaths {
            managed,
            backup,
            resolv_conf,
        } = &self.paths;

        write_atomic(managed, render(servers, domains).as_bytes())?;

        match inspect(resolv_conf)? {
            Existing::Absent => {
                // Nothing to preserve; a stale backup would describe the
                // wrong prior state.
                remove_if_exists(backup)?;
            }
            Existing::File => {
                let contents = fs::read(resolv_conf)?;
                write_atomic(backup, &contents)?;
            }
            Existing::Symlink(target) if target == *managed => {
                tracing::debug!(
                    path = %resolv_conf.display(),
                    servers = servers.len(),
                    "resolv.conf already managed, updated nameservers"
                );
                return Ok(());
            }
            Existing::Symlink(target) => {
                remove_if_exists(backup)?;
                symlink(&target, backup)?;
            }
        }

        remove_if_exists(resolv_conf)?;
        symlink(managed, resolv_conf)?;

        tracing::info!(
            path = %resolv_conf.display(),
            managed = %managed.display(),
            servers = servers.len(),
            "Took over resolv.conf"
        );
        Ok(())
    }

    /// Puts back the configuration saved by the last takeover.
    ///
    /// If there is no backup, a resolver path that still points at the
    /// managed file (taken over while absent) is removed; anything else is
    /// left alone. On success the backup slot is empty and the managed
    /// file is removed (best effort).
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::InconsistentState`] without touching anything
    /// if the resolver path no longer points at the managed file, or
    /// [`RouterError::Io`] if the filesystem operations fail.
    pub fn restore(&self) -> Result<()> {
        let ResolvConfPaths {
            managed,
            backup,
            resolv_conf,
        } = &self.paths;

        if matches!(inspect(backup)?, Existing::Absent) {
            // Taken over while absent: put the absence back.
            match inspect(resolv_conf)? {
                Existing::Symlink(target) if target == *managed => {
                    fs::remove_file(resolv_conf)?;
                    remove_managed(managed);
                    tracing::info!(
                        path = %resolv_conf.display(),
                        "Removed managed resolv.conf symlink"
                    );
                }
                _ => {
                    tracing::debug!(path = %backup.display(), "No resolv.conf backup to restore");
                }
            }
            return Ok(());
        }

        match inspect(resolv_conf)? {
            Existing::Symlink(target) if target == *managed => {}
            _ => {
                return Err(RouterError::InconsistentState {
                    path: resolv_conf.clone(),
                    expected: managed.clone(),
                });
            }
        }

        fs::rename(backup, resolv_conf)?;
        remove_managed(managed);

        tracing::info!(path = %resolv_conf.display(), "Restored resolv.conf");
        Ok(())
    }

    /// Reads the current takeover state from disk.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::Io`] if a path cannot be inspected or the
    /// backup cannot be read.
    pub fn state(&self) -> Result<ResolvConfState> {
        let ResolvConfPaths {
            managed,
            backup,
            resolv_conf,
        } = &self.paths;

        let state = match inspect(backup)? {
            Existing::Symlink(target) => ResolvConfState::BackedUp(Backup::Symlink(target)),
            Existing::File => ResolvConfState::BackedUp(Backup::Content(fs::read(backup)?)),
            Existing::Absent => match inspect(resolv_conf)? {
                Existing::Symlink(target) if target == *managed => ResolvConfState::Managed,
                _ => ResolvConfState::Unmanaged,
            },
        };
        Ok(state)
    }
}

/// Renders the managed resolver file.
///
/// ```text
/// # resolv.conf(5) file generated by tun-router
/// # DO NOT EDIT THIS FILE BY HAND -- CHANGES WILL BE OVERWRITTEN
///
/// nameserver 100.100.100.100
/// search corp.example example.com
/// ```
#[must_use]
pub fn render(servers: &[Ipv4Addr], domains: &[String]) -> String {
    let mut out = String::from(MANAGED_HEADER);
    out.push('\n');
    for ns in servers {
        out.push_str(&format!("nameserver {ns}\n"));
    }
    if !domains.is_empty() {
        out.push_str(&format!("search {}\n", domains.join(" ")));
    }
    out
}

// ---------------------------------------------------------------------------
// Filesystem helpers
// ---------------------------------------------------------------------------

enum Existing {
    Absent,
    File,
    Symlink(PathBuf),
}

/// Classifies `path` without following symlinks.
fn inspect(path: &Path) -> io::Result<Existing> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_symlink() => Ok(Existing::Symlink(fs::read_link(path)?)),
        Ok(_) => Ok(Existing::File),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Existing::Absent),
        Err(e) => Err(e),
    }
}

/// Best-effort removal of the managed file once nothing points at it.
fn remove_managed(path: &Path) {
    if let Err(e) = remove_if_exists(path) {
        tracing::warn!(
            path = %path.display(),
            error = %e,
            "Failed to remove managed resolv.conf"
        );
    }
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Writes `contents` to a temp file beside `path`, then renames it into
/// place so readers never see a partial file.
fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let prefix = format!(
        ".{}.",
        path.file_name()
            .map_or_else(|| "resolv".into(), |n| n.to_string_lossy())
    );

    let mut tmp = tempfile::Builder::new().prefix(&prefix).tempfile_in(dir)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    fs::set_permissions(tmp.path(), fs::Permissions::from_mode(0o644))?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
