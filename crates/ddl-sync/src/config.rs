//! Synchronization options.

use crate::dialect::DialectKind;
use crate::error::Result;
use crate::literal::TimeZone;

/// Options applied to every collection of a synchronizer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// Zone timestamp literals are rendered in.
    pub time_zone: TimeZone,
}

impl SyncOptions {
    /// Default options: timestamps in the local zone.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the time zone for timestamp literals.
    #[must_use]
    pub const fn time_zone(mut self, time_zone: TimeZone) -> Self {
        self.time_zone = time_zone;
        self
    }
}

/// Picks the dialect for a connection.
///
/// An explicit dialect name wins; otherwise the URL scheme decides.
///
/// # Errors
///
/// Returns [`SyncError::UnsupportedDialect`](crate::error::SyncError::UnsupportedDialect)
/// if neither names a supported database.
pub fn resolve_dialect(url: &str, explicit: Option<&str>) -> Result<DialectKind> {
    match explicit {
        Some(name) => name.parse(),
        None => DialectKind::from_url(url),
    }
}
