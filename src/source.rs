//! Search-path collaborator: locates and loads raw TZif bytes for a key
//! such as `"America/Chicago"`.

use std::path::{Path, PathBuf};

use crate::error::{TzError, TzResult};

/// A source of raw TZif bytes, keyed by IANA identifier.
///
/// Split into a path-resolution step and a data-loading step so a
/// filesystem-backed collaborator can expose the resolved path while a
/// collaborator with no filesystem of its own (embedded data, a network
/// fetch) can still serve a key by implementing `load_tzdata` alone.
pub trait ZoneSource: Send + Sync {
    /// Resolve `key` to a backing file path, if this collaborator has
    /// one. Returns `Ok(None)` when `key` is well-formed but this
    /// collaborator has no path for it, in which case `load_tzdata` is
    /// tried instead.
    ///
    /// # Errors
    /// Returns an `InvalidKey`-kind error if `key` is malformed, or an
    /// `Io`-kind error if checking for the path fails for another reason.
    fn find_tzfile(&self, key: &str) -> TzResult<Option<PathBuf>>;

    /// Load the raw TZif bytes for `key` directly, bypassing path
    /// resolution. Called when `find_tzfile` returns `None`.
    ///
    /// # Errors
    /// Returns a `NoSuchZone`-kind error if no data exists for `key`, or
    /// an `Io`-kind error if reading fails for another reason.
    fn load_tzdata(&self, key: &str) -> TzResult<Vec<u8>>;
}

/// Load `key` from `source`: try its resolved path first, falling back
/// to `load_tzdata` when the collaborator doesn't have one.
pub(crate) fn load(source: &dyn ZoneSource, key: &str) -> TzResult<Vec<u8>> {
    match source.find_tzfile(key)? {
        Some(path) => std::fs::read(&path)
            .map_err(|err| TzError::from(err).with_message(format!("reading {}", path.display()))),
        None => source.load_tzdata(key),
    }
}

/// The default collaborator: reads from a filesystem zoneinfo tree,
/// rooted at `$TZDIR` if set, otherwise `/usr/share/zoneinfo`.
#[derive(Debug, Clone)]
pub struct FsZoneSource {
    root: PathBuf,
}

impl FsZoneSource {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Build a collaborator rooted at `$TZDIR`, falling back to
    /// `/usr/share/zoneinfo`.
    #[must_use]
    pub fn from_env() -> Self {
        let root = std::env::var_os("TZDIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("/usr/share/zoneinfo"));
        Self::new(root)
    }

    fn resolve(&self, key: &str) -> TzResult<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }
}

impl Default for FsZoneSource {
    fn default() -> Self {
        Self::from_env()
    }
}

impl ZoneSource for FsZoneSource {
    fn find_tzfile(&self, key: &str) -> TzResult<Option<PathBuf>> {
        let path = self.resolve(key)?;
        match std::fs::metadata(&path) {
            Ok(_) => Ok(Some(path)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(TzError::from(err).with_message(format!("reading {}", path.display()))),
        }
    }

    fn load_tzdata(&self, key: &str) -> TzResult<Vec<u8>> {
        Err(TzError::no_such_zone().with_message(format!("no zoneinfo file for {key:?}")))
    }
}

/// Rejects keys that could escape the zoneinfo root via an absolute
/// path or a `..` segment.
fn validate_key(key: &str) -> TzResult<()> {
    if key.is_empty() {
        return Err(TzError::invalid_key().with_message("zone key must not be empty"));
    }
    let path = Path::new(key);
    if path.is_absolute() {
        return Err(TzError::invalid_key().with_message("zone key must be relative"));
    }
    if path
        .components()
        .any(|c| matches!(c, std::path::Component::ParentDir))
    {
        return Err(TzError::invalid_key().with_message("zone key must not contain '..'"));
    }
    Ok(())
}
