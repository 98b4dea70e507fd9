//! The `Zone` handle: a cheap, `Clone`-able reference to a fully
//! reconciled time zone.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::builder::{self, TypeRecord};
use crate::cache::{ZoneCache, ZoneData};
use crate::error::TzResult;
use crate::lookup;
use crate::source::{FsZoneSource, ZoneSource};
use crate::time::{Instant, LocalDateTime};
use crate::tzif;

/// The offset, DST status, and lookup operations common to a resolved
/// time zone.
pub trait TimeZone {
    /// Offset east of UTC, in seconds, at `instant`.
    fn utc_offset(&self, instant: Instant) -> i32;
    /// Whether `instant` falls within this zone's DST period.
    fn is_dst(&self, instant: Instant) -> bool;
    /// The abbreviation in effect at `instant` (e.g. `"EST"`, `"EEST"`).
    fn abbreviation(&self, instant: Instant) -> Arc<str>;
    /// Project a UTC instant to the wall-clock reading it corresponds to
    /// in this zone, tagged with the fold that recovers the same type
    /// from [`TimeZone::resolve_local`] (set to `1` when the projected
    /// wall reading also occurs under a different, earlier-applying
    /// offset).
    fn fromutc(&self, instant: Instant) -> LocalDateTime;
    /// Resolve a wall-clock reading to the type in effect, disambiguating
    /// a gap or an overlap by the reading's own `fold`.
    fn resolve_local(&self, local: LocalDateTime) -> TypeRecord;
}

/// A resolved time zone, cheaply cloneable and shared through the
/// keyed cache.
#[derive(Clone)]
pub struct Zone(Arc<ZoneData>);

impl Zone {
    /// Look up `key` in the default filesystem source, consulting (and
    /// populating) the process-wide cache.
    pub fn new(key: &str) -> TzResult<Self> {
        let source = FsZoneSource::from_env();
        Self::with_source(key, &source)
    }

    /// Like [`Zone::new`], but against an arbitrary collaborator.
    pub fn with_source(key: &str, source: &dyn ZoneSource) -> TzResult<Self> {
        ZoneCache::global()
            .get_or_construct(key, source)
            .map(Zone)
    }

    /// Load and build `key` fresh, bypassing the cache entirely.
    pub fn no_cache(key: &str, source: &dyn ZoneSource) -> TzResult<Self> {
        let bytes = crate::source::load(source, key)?;
        Self::from_bytes(key, &bytes)
    }

    /// Build a zone directly from raw TZif bytes, without consulting
    /// any search path or cache.
    pub fn from_bytes(key: &str, bytes: &[u8]) -> TzResult<Self> {
        let decoded = tzif::decode(bytes)?;
        let built = builder::build(&decoded)?;
        Ok(Self(Arc::new(ZoneData {
            key: key.to_string(),
            built,
        })))
    }

    /// The IANA identifier this zone was constructed from.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.0.key
    }

    /// Evict every cached zone from the process-wide cache.
    pub fn clear_cache() {
        ZoneCache::global().clear();
    }

    /// Evict only the named keys from the process-wide cache.
    pub fn clear_cache_for(keys: &[String]) {
        ZoneCache::global().clear_keys(keys);
    }

    fn type_for_utc(&self, instant: Instant) -> TypeRecord {
        lookup::type_for_utc(&self.0.built, instant.unix_seconds())
    }
}

impl TimeZone for Zone {
    fn utc_offset(&self, instant: Instant) -> i32 {
        self.type_for_utc(instant).utc_offset()
    }

    fn is_dst(&self, instant: Instant) -> bool {
        self.type_for_utc(instant).is_dst()
    }

    fn abbreviation(&self, instant: Instant) -> Arc<str> {
        // `TypeRecord::abbr` borrows from an `Arc<str>` we don't expose
        // directly; a cheap reference-count bump keeps the API simple.
        Arc::from(self.type_for_utc(instant).abbr())
    }

    fn fromutc(&self, instant: Instant) -> LocalDateTime {
        let (_, wall_seconds, fold) = lookup::fromutc(&self.0.built, instant.unix_seconds());
        LocalDateTime::from_unix_seconds(wall_seconds).with_fold_unchecked(fold)
    }

    fn resolve_local(&self, local: LocalDateTime) -> TypeRecord {
        lookup::resolve_local(&self.0.built, local.unix_seconds(), local.fold())
    }
}

impl fmt::Debug for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Zone").field("key", &self.0.key).finish()
    }
}

impl PartialEq for Zone {
    fn eq(&self, other: &Self) -> bool {
        self.0.key == other.0.key && Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Zone {}

impl Hash for Zone {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.key.hash(state);
        (Arc::as_ptr(&self.0) as usize).hash(state);
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Zone {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.key())
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Zone {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let key = String::deserialize(deserializer)?;
        Zone::new(&key).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc_tzif_bytes() -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(b"TZif");
        data.push(0);
        data.extend_from_slice(&[0u8; 15]);
        data.extend_from_slice(&0u32.to_be_bytes());
        data.extend_from_slice(&0u32.to_be_bytes());
        data.extend_from_slice(&0u32.to_be_bytes());
        data.extend_from_slice(&0u32.to_be_bytes());
        data.extend_from_slice(&1u32.to_be_bytes());
        data.extend_from_slice(&4u32.to_be_bytes());
        data.extend_from_slice(&0i32.to_be_bytes());
        data.push(0);
        data.push(0);
        data.extend_from_slice(b"UTC\0");
        data
    }

    #[test]
    fn from_bytes_builds_a_usable_zone() {
        let zone = Zone::from_bytes("Etc/UTC", &utc_tzif_bytes()).unwrap();
        assert_eq!(zone.key(), "Etc/UTC");
        assert_eq!(zone.utc_offset(Instant::from_unix_seconds(0)), 0);
        assert!(!zone.is_dst(Instant::from_unix_seconds(0)));
        assert_eq!(&*zone.abbreviation(Instant::from_unix_seconds(0)), "UTC");
    }

    #[test]
    fn fromutc_projects_the_current_offset() {
        let zone = Zone::from_bytes("Etc/UTC", &utc_tzif_bytes()).unwrap();
        let local = zone.fromutc(Instant::from_unix_seconds(1_000));
        assert_eq!(local.unix_seconds(), 1_000);
        assert_eq!(local.fold(), 0);
    }

    /// A two-transition zone built directly from a `BuiltZone`, the way
    /// `lookup.rs`'s tests do, so `fromutc`'s fold lookahead can be
    /// exercised against a real fall-back overlap without hand-assembling
    /// TZif bytes.
    fn fall_back_zone() -> Zone {
        let decoded = crate::tzif::DecodedTzif {
            version: 2,
            trans_utc: vec![1_000_000, 2_000_000],
            trans_type_idx: vec![1, 0],
            types: vec![
                crate::tzif::RawType {
                    utc_offset: -5 * 3600,
                    is_dst: false,
                    abbr_index: 0,
                },
                crate::tzif::RawType {
                    utc_offset: -4 * 3600,
                    is_dst: true,
                    abbr_index: 4,
                },
            ],
            abbrs: b"STD\0DST\0".to_vec(),
            leap_table: Vec::new(),
            tail_rule_bytes: None,
        };
        let built = builder::build(&decoded).unwrap();
        Zone(Arc::new(ZoneData {
            key: "Test/FallBack".to_string(),
            built,
        }))
    }

    #[test]
    fn fromutc_round_trips_through_resolve_local_across_a_fall_back() {
        let zone = fall_back_zone();

        // Straddle transition 1 (-4h -> -5h), the fall-back overlap.
        for offset_seconds in [-1_800_i64, 1_800] {
            let instant = Instant::from_unix_seconds(2_000_000 + offset_seconds);
            let local = zone.fromutc(instant);
            let recovered = zone.resolve_local(local);
            assert_eq!(recovered.utc_offset(), zone.utc_offset(instant));
        }
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serializes_as_its_key_and_round_trips_via_the_cache() {
        let zone = Zone::from_bytes("Etc/UTC", &utc_tzif_bytes()).unwrap();
        let json = serde_json::to_string(&zone).unwrap();
        assert_eq!(json, "\"Etc/UTC\"");
    }
}
