//! Keyed cache of constructed zones: a weak map for identity/reuse plus
//! a bounded strong FIFO that keeps recently used zones alive.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, OnceLock, Weak};

use rustc_hash::FxHashMap;

use crate::builder::{self, BuiltZone};
use crate::error::TzResult;
use crate::source::ZoneSource;
use crate::tzif;

/// Default number of zones kept alive by strong references once
/// constructed.
pub const DEFAULT_STRONG_CACHE_CAPACITY: usize = 8;

/// Everything a `Zone` handle shares via `Arc`.
#[derive(Debug)]
pub struct ZoneData {
    pub key: String,
    pub built: BuiltZone,
}

struct CacheState {
    weak: FxHashMap<String, Weak<ZoneData>>,
    strong: VecDeque<Arc<ZoneData>>,
}

/// A keyed cache of [`ZoneData`], trading memory for avoiding repeated
/// parses of the same zone.
pub struct ZoneCache {
    state: Mutex<CacheState>,
    capacity: usize,
}

impl ZoneCache {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_STRONG_CACHE_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: Mutex::new(CacheState {
                weak: FxHashMap::default(),
                strong: VecDeque::new(),
            }),
            capacity,
        }
    }

    /// The process-wide default cache.
    pub fn global() -> &'static ZoneCache {
        static CACHE: OnceLock<ZoneCache> = OnceLock::new();
        CACHE.get_or_init(ZoneCache::new)
    }

    /// Return the cached zone for `key`, constructing and inserting it
    /// via `source` if it isn't already present. The load and decode
    /// happen outside the cache's lock; if two callers race to build
    /// the same key, the second one discards its own work and reuses
    /// whichever finished first.
    pub fn get_or_construct(&self, key: &str, source: &dyn ZoneSource) -> TzResult<Arc<ZoneData>> {
        if let Some(existing) = self.try_get(key) {
            return Ok(existing);
        }
        let constructed = Arc::new(construct(key, source)?);
        Ok(self.settle(key, constructed))
    }

    fn try_get(&self, key: &str) -> Option<Arc<ZoneData>> {
        let mut state = self.state.lock().expect("cache mutex poisoned");
        let existing = state.weak.get(key)?.upgrade()?;
        touch(&mut state.strong, &existing, self.capacity);
        Some(existing)
    }

    fn settle(&self, key: &str, constructed: Arc<ZoneData>) -> Arc<ZoneData> {
        let mut state = self.state.lock().expect("cache mutex poisoned");
        if let Some(existing) = state.weak.get(key).and_then(Weak::upgrade) {
            touch(&mut state.strong, &existing, self.capacity);
            return existing;
        }
        state.weak.insert(key.to_string(), Arc::downgrade(&constructed));
        push(&mut state.strong, constructed.clone(), self.capacity);
        constructed
    }

    /// Evict every entry.
    pub fn clear(&self) {
        let mut state = self.state.lock().expect("cache mutex poisoned");
        state.weak.clear();
        state.strong.clear();
    }

    /// Evict only the named keys.
    pub fn clear_keys(&self, keys: &[String]) {
        let mut state = self.state.lock().expect("cache mutex poisoned");
        for key in keys {
            state.weak.remove(key);
        }
        state.strong.retain(|z| !keys.iter().any(|k| k == &z.key));
    }
}

impl Default for ZoneCache {
    fn default() -> Self {
        Self::new()
    }
}

fn construct(key: &str, source: &dyn ZoneSource) -> TzResult<ZoneData> {
    let bytes = crate::source::load(source, key)?;
    let decoded = tzif::decode(&bytes)?;
    let built = builder::build(&decoded)?;
    Ok(ZoneData {
        key: key.to_string(),
        built,
    })
}

fn push(strong: &mut VecDeque<Arc<ZoneData>>, value: Arc<ZoneData>, capacity: usize) {
    strong.push_back(value);
    while strong.len() > capacity {
        strong.pop_front();
    }
}

fn touch(strong: &mut VecDeque<Arc<ZoneData>>, value: &Arc<ZoneData>, capacity: usize) {
    if let Some(pos) = strong.iter().position(|s| Arc::ptr_eq(s, value)) {
        if let Some(found) = strong.remove(pos) {
            strong.push_back(found);
        }
    } else {
        push(strong, value.clone(), capacity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, TzError};

    struct FixedSource(Vec<u8>);

    impl ZoneSource for FixedSource {
        fn find_tzfile(&self, _key: &str) -> TzResult<Option<std::path::PathBuf>> {
            Ok(None)
        }

        fn load_tzdata(&self, key: &str) -> TzResult<Vec<u8>> {
            if key == "Missing/Zone" {
                return Err(TzError::no_such_zone());
            }
            Ok(self.0.clone())
        }
    }

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
    fn get_or_construct_reuses_the_same_allocation() {
        let cache = ZoneCache::new();
        let source = FixedSource(utc_tzif_bytes());
        let a = cache.get_or_construct("Etc/UTC", &source).unwrap();
        let b = cache.get_or_construct("Etc/UTC", &source).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn propagates_source_errors() {
        let cache = ZoneCache::new();
        let source = FixedSource(utc_tzif_bytes());
        let err = cache.get_or_construct("Missing/Zone", &source).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoSuchZone);
    }

    #[test]
    fn clear_drops_the_weak_entry() {
        let cache = ZoneCache::new();
        let source = FixedSource(utc_tzif_bytes());
        let a = cache.get_or_construct("Etc/UTC", &source).unwrap();
        cache.clear();
        drop(a);
        let b = cache.get_or_construct("Etc/UTC", &source).unwrap();
        assert_eq!(Arc::strong_count(&b), 2); // held here + in the strong FIFO
    }

    #[test]
    fn strong_fifo_respects_capacity() {
        let cache = ZoneCache::with_capacity(2);
        let source = FixedSource(utc_tzif_bytes());
        let keys = ["Etc/UTC", "Etc/UTC1", "Etc/UTC2"];
        // Each distinct key gets its own weak entry; only `capacity`
        // stay strongly referenced by the cache itself.
        let mut handles = Vec::new();
        for key in keys {
            handles.push(cache.get_or_construct(key, &source).unwrap());
        }
        let state = cache.state.lock().unwrap();
        assert_eq!(state.strong.len(), 2);
    }
}
