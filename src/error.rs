//! Error types.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias for router operations.
pub type Result<T> = std::result::Result<T, RouterError>;

/// Errors returned by router operations.
#[derive(Debug, Error)]
pub enum RouterError {
    /// The desired settings ask for something this router cannot do.
    /// Rejected before any side effect.
    #[error("unsupported configuration: {0}")]
    UnsupportedConfiguration(String),

    /// An OS network-configuration command failed or could not be spawned.
    #[error("`{command}` failed: {output}")]
    Command {
        /// The command line that was run.
        command: String,
        /// Exit status and combined stdout/stderr of the command.
        output: String,
    },

    /// Filesystem I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The resolver path was modified outside this crate.
    #[error("{} is not a symlink to {}", path.display(), expected.display())]
    InconsistentState {
        /// The resolver path that was inspected.
        path: PathBuf,
        /// The managed file it should point at.
        expected: PathBuf,
    },

    /// One or more operations failed while the rest were still attempted.
    #[error(transparent)]
    Partial(Failures),
}

/// Coarse classification of a [`RouterError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The requested settings are not supported.
    UnsupportedConfiguration,
    /// An OS network command failed.
    OsOperation,
    /// A filesystem operation failed.
    Io,
    /// The resolver path was changed by something else.
    InconsistentExternalState,
}

impl RouterError {
    /// Returns the kind of this error. For [`RouterError::Partial`] this is
    /// the kind of the primary (first) failure.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnsupportedConfiguration(_) => ErrorKind::UnsupportedConfiguration,
            Self::Command { .. } => ErrorKind::OsOperation,
            Self::Io(_) => ErrorKind::Io,
            Self::InconsistentState { .. } => ErrorKind::InconsistentExternalState,
            Self::Partial(failures) => failures.primary().kind(),
        }
    }

    /// Returns `true` if the underlying I/O error is `PermissionDenied`.
    #[must_use]
    pub fn is_permission_denied(&self) -> bool {
        match self {
            Self::Io(e) => e.kind() == std::io::ErrorKind::PermissionDenied,
            Self::Partial(failures) => failures.primary().is_permission_denied(),
            _ => false,
        }
    }
}

/// Every failure of a fail-soft run, in the order they happened.
///
/// Never empty. The first failure is the primary one and is what
/// [`Display`](fmt::Display) reports.
#[derive(Debug)]
pub struct Failures {
    errors: Vec<RouterError>,
}

impl Failures {
    /// Returns the first failure.
    #[must_use]
    pub fn primary(&self) -> &RouterError {
        &self.errors[0]
    }

    /// Returns all failures in order.
    #[must_use]
    pub fn all(&self) -> &[RouterError] {
        &self.errors
    }

    /// Number of failures (always at least one).
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Always `false`; present for API symmetry with [`len`](Self::len).
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// Consumes the aggregate, returning every failure.
    #[must_use]
    pub fn into_vec(self) -> Vec<RouterError> {
        self.errors
    }
}

impl fmt::Display for Failures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.primary())?;
        match self.errors.len() {
            1 => Ok(()),
            2 => write!(f, " (and 1 more failure)"),
            n => write!(f, " (and {} more failures)", n - 1),
        }
    }
}

impl std::error::Error for Failures {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.primary())
    }
}

/// Accumulates failures from a sequence of best-effort operations.
#[derive(Debug, Default)]
pub(crate) struct ErrorCollector {
    errors: Vec<RouterError>,
}

impl ErrorCollector {
    pub(crate) fn push(&mut self, err: RouterError) {
        match err {
            RouterError::Partial(failures) => self.errors.extend(failures.into_vec()),
            other => self.errors.push(other),
        }
    }

    /// `Ok(())` when nothing failed, otherwise [`RouterError::Partial`].
    pub(crate) fn finish(self) -> Result<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(RouterError::Partial(Failures {
                errors: self.errors,
            }))
        }
    }
}
