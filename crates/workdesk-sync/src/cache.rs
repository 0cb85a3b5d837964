use std::collections::HashMap;
use std::time::{Duration, Instant};

use workdesk_types::models::Message;

/// Last fetched copy of each thread, used to render instantly while a fresh
/// fetch is in flight. Never authoritative: every successful fetch replaces
/// the entry wholesale.
#[derive(Debug)]
pub struct ThreadCache {
    ttl: Duration,
    entries: HashMap<String, CachedThread>,
}

#[derive(Debug, Clone)]
struct CachedThread {
    messages: Vec<Message>,
    fetched_at: Instant,
}

/// A cached thread as handed to the UI.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedView {
    pub messages: Vec<Message>,
    /// Older than the cache TTL; still shown, but flagged.
    pub stale: bool,
}

impl ThreadCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    pub fn get(&self, conversation_key: &str) -> Option<CachedView> {
        self.get_at(conversation_key, Instant::now())
    }

    fn get_at(&self, conversation_key: &str, now: Instant) -> Option<CachedView> {
        self.entries.get(conversation_key).map(|entry| CachedView {
            messages: entry.messages.clone(),
            stale: now.saturating_duration_since(entry.fetched_at) > self.ttl,
        })
    }

    pub fn put(&mut self, conversation_key: &str, messages: Vec<Message>) {
        self.entries.insert(
            conversation_key.to_string(),
            CachedThread {
                messages,
                fetched_at: Instant::now(),
            },
        );
    }

    /// Drop expired entries, keeping `keep` (the open thread) regardless.
    pub fn evict_expired(&mut self, keep: Option<&str>) -> usize {
        self.evict_expired_at(keep, Instant::now())
    }

    fn evict_expired_at(&mut self, keep: Option<&str>, now: Instant) -> usize {
        let ttl = self.ttl;
        let before = self.entries.len();
        self.entries.retain(|key, entry| {
            Some(key.as_str()) == keep || now.saturating_duration_since(entry.fetched_at) <= ttl
        });
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_entries_are_not_stale() {
        let mut cache = ThreadCache::new(Duration::from_secs(60));
        cache.put("dm:1:5", Vec::new());
        let view = cache.get("dm:1:5").unwrap();
        assert!(!view.stale);
        assert!(cache.get("dm:1:7").is_none());
    }

    #[test]
    fn put_replaces_previous_copy() {
        let mut cache = ThreadCache::new(Duration::from_secs(60));
        cache.put("dm:1:5", Vec::new());
        cache.put("dm:1:5", Vec::new());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn expired_entries_are_flagged_and_evicted_except_open_thread() {
        let mut cache = ThreadCache::new(Duration::from_secs(60));
        cache.put("dm:1:5", Vec::new());
        cache.put("dm:1:7", Vec::new());

        let later = Instant::now() + Duration::from_secs(61);
        assert!(cache.get_at("dm:1:5", later).unwrap().stale);

        assert_eq!(cache.evict_expired_at(Some("dm:1:5"), later), 1);
        assert!(cache.get("dm:1:5").is_some());
        assert!(cache.get("dm:1:7").is_none());
    }
}
