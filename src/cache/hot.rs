//! In-memory hot tiers (spec §3 ProtocolState, §9 "In-memory hot caches").
//!
//! Plain mappings with no eviction — acceptable because keys are
//! content-addressed and entries are small (spec §9). These are
//! process-local optimizations only; the SQLite-backed `ContinuityStore` is
//! always the source of truth (spec §5 resource policy).

use crate::store::models::{FileSummaryEntry, PackCacheEntry, SearchCacheEntry};
use std::collections::HashMap;
use std::sync::Mutex;

/// Process-local mirror of the four persistent cache tables, plus
/// `ProtocolState` (sub_session_id -> last CacheKey), which has no
/// persistent counterpart at all (spec §3: "(in-memory)").
pub struct HotCache {
    pack: Mutex<HashMap<String, PackCacheEntry>>,
    file_summary: Mutex<HashMap<String, FileSummaryEntry>>,
    search: Mutex<HashMap<String, SearchCacheEntry>>,
    protocol_state: Mutex<HashMap<String, String>>,
}

impl Default for HotCache {
    fn default() -> Self {
        Self::new()
    }
}

impl HotCache {
    pub fn new() -> Self {
        Self {
            pack: Mutex::new(HashMap::new()),
            file_summary: Mutex::new(HashMap::new()),
            search: Mutex::new(HashMap::new()),
            protocol_state: Mutex::new(HashMap::new()),
        }
    }

    pub fn get_pack(&self, key: &str) -> Option<PackCacheEntry> {
        self.pack.lock().ok()?.get(key).cloned()
    }

    pub fn put_pack(&self, entry: PackCacheEntry) {
        if let Ok(mut map) = self.pack.lock() {
            map.insert(entry.key.clone(), entry);
        }
    }

    pub fn get_file_summary(&self, key: &str) -> Option<FileSummaryEntry> {
        self.file_summary.lock().ok()?.get(key).cloned()
    }

    pub fn put_file_summary(&self, entry: FileSummaryEntry) {
        if let Ok(mut map) = self.file_summary.lock() {
            map.insert(entry.key.clone(), entry);
        }
    }

    pub fn get_search(&self, key: &str) -> Option<SearchCacheEntry> {
        self.search.lock().ok()?.get(key).cloned()
    }

    pub fn put_search(&self, entry: SearchCacheEntry) {
        if let Ok(mut map) = self.search.lock() {
            map.insert(entry.key.clone(), entry);
        }
    }

    /// Last CacheKey used by this sub-session, for the delta-only-vs-full
    /// envelope decision (spec §4.8 step 4).
    pub fn last_cache_key(&self, sub_session_id: &str) -> Option<String> {
        self.protocol_state.lock().ok()?.get(sub_session_id).cloned()
    }

    pub fn set_last_cache_key(&self, sub_session_id: &str, cache_key: &str) {
        if let Ok(mut map) = self.protocol_state.lock() {
            map.insert(sub_session_id.to_string(), cache_key.to_string());
        }
    }

    /// Entry counts across the three hot tiers, for `Engine::report`.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            pack_entries: self.pack.lock().map(|m| m.len()).unwrap_or(0),
            file_summary_entries: self.file_summary.lock().map(|m| m.len()).unwrap_or(0),
            search_entries: self.search.lock().map(|m| m.len()).unwrap_or(0),
            tracked_sub_sessions: self.protocol_state.lock().map(|m| m.len()).unwrap_or(0),
        }
    }
}

/// Snapshot of hot-tier entry counts (spec.md §6 "cache statistics").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub pack_entries: usize,
    pub file_summary_entries: usize,
    pub search_entries: usize,
    pub tracked_sub_sessions: usize,
}
