//! Minimal instant and local-datetime types.
//!
//! The core only needs enough of a time representation to state its
//! lookup contracts; a full calendar is an external collaborator's
//! concern (see the crate root docs).

use std::fmt;

/// A point in time expressed as seconds since 1970-01-01T00:00:00Z.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Instant(i64);

impl Instant {
    #[must_use]
    pub fn from_unix_seconds(seconds: i64) -> Self {
        Self(seconds)
    }

    #[must_use]
    pub fn unix_seconds(self) -> i64 {
        self.0
    }
}

impl fmt::Display for Instant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A wall-clock reading together with the `fold` that disambiguates it
/// when it falls in a gap or an overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LocalDateTime {
    seconds: i64,
    fold: u8,
}

impl LocalDateTime {
    /// Construct a wall-clock reading with `fold=0`.
    #[must_use]
    pub fn from_unix_seconds(seconds: i64) -> Self {
        Self { seconds, fold: 0 }
    }

    /// Returns the same wall-clock reading tagged with `fold`.
    ///
    /// # Errors
    /// Returns a `Value`-kind error if `fold` is not `0` or `1`.
    pub fn with_fold(self, fold: u8) -> crate::error::TzResult<Self> {
        if fold > 1 {
            return Err(crate::error::TzError::value()
                .with_message("fold must be 0 or 1"));
        }
        Ok(Self {
            seconds: self.seconds,
            fold,
        })
    }

    #[must_use]
    pub fn unix_seconds(self) -> i64 {
        self.seconds
    }

    #[must_use]
    pub fn fold(self) -> u8 {
        self.fold
    }

    /// Like [`LocalDateTime::with_fold`], but for call sites that already
    /// know `fold` is `0` or `1` (e.g. a fold computed internally by the
    /// lookup engine), so they don't need to handle a validation error
    /// that can't occur.
    pub(crate) fn with_fold_unchecked(self, fold: u8) -> Self {
        debug_assert!(fold <= 1, "fold must be 0 or 1");
        Self {
            seconds: self.seconds,
            fold,
        }
    }
}
