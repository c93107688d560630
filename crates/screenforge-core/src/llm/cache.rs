//! In-memory response cache (C4).
//!
//! Keyed on a SHA-256 digest of the canonicalized request (provider,
//! model, system prompt, user message, and the generation params that
//! affect output). Only responses that parsed into a valid decision are
//! cached — a provider error or an unparseable body is never stored, so a
//! transient failure can't poison future calls for the same key.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};

use super::{GenerationParams, RawCompletion};

const DEFAULT_TTL: Duration = Duration::from_secs(3600);
const DEFAULT_MAX_SIZE: usize = 1000;

struct Entry {
    completion: RawCompletion,
    inserted_at: Instant,
    last_used: Instant,
}

pub struct ResponseCache {
    ttl: Duration,
    max_size: usize,
    entries: Mutex<HashMap<String, Entry>>,
}

impl ResponseCache {
    pub fn new(ttl: Duration, max_size: usize) -> Self {
        Self {
            ttl,
            max_size,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Build the cache key for one call. Exposed so the dispatcher can
    /// compute it once and reuse it for both `get` and `put`.
    ///
    /// Folds in every output-affecting generation param (§4.4's
    /// `sorted(params)`) — currently `max_tokens` and `temperature` — so two
    /// calls that differ only in sampling settings never collide.
    pub fn key(
        provider: &str,
        model_id: &str,
        system_prompt: &str,
        user_message: &str,
        params: &GenerationParams,
    ) -> String {
        let mut hasher = Sha256::new();
        hasher.update(provider.as_bytes());
        hasher.update(b"\0");
        hasher.update(model_id.as_bytes());
        hasher.update(b"\0");
        hasher.update(system_prompt.as_bytes());
        hasher.update(b"\0");
        hasher.update(user_message.as_bytes());
        hasher.update(b"\0");
        hasher.update(params.max_tokens.to_le_bytes());
        hasher.update(b"\0");
        match params.temperature {
            Some(t) => hasher.update(t.to_le_bytes()),
            None => hasher.update(b"none"),
        }
        hex::encode(hasher.finalize())
    }

    pub fn get(&self, key: &str) -> Option<RawCompletion> {
        let mut entries = self.entries.lock().expect("cache mutex poisoned");
        let hit = entries.get_mut(key)?;
        if hit.inserted_at.elapsed() > self.ttl {
            entries.remove(key);
            return None;
        }
        hit.last_used = Instant::now();
        Some(hit.completion.clone())
    }

    pub fn put(&self, key: String, completion: RawCompletion) {
        let mut entries = self.entries.lock().expect("cache mutex poisoned");
        if entries.len() >= self.max_size && !entries.contains_key(&key) {
            Self::evict_lru(&mut entries);
        }
        let now = Instant::now();
        entries.insert(
            key,
            Entry {
                completion,
                inserted_at: now,
                last_used: now,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("cache mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn evict_lru(entries: &mut HashMap<String, Entry>) {
        if let Some(oldest_key) = entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_used)
            .map(|(k, _)| k.clone())
        {
            entries.remove(&oldest_key);
        }
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL, DEFAULT_MAX_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completion(text: &str) -> RawCompletion {
        RawCompletion {
            raw_text: text.to_string(),
            latency_ms: 10,
        }
    }

    fn params(max_tokens: u32) -> GenerationParams {
        GenerationParams {
            max_tokens,
            ..GenerationParams::default()
        }
    }

    #[test]
    fn key_is_deterministic() {
        let k1 = ResponseCache::key("anthropic", "claude-3-5", "sys", "user", &params(512));
        let k2 = ResponseCache::key("anthropic", "claude-3-5", "sys", "user", &params(512));
        assert_eq!(k1, k2);
    }

    #[test]
    fn key_differs_on_any_input_change() {
        let base = ResponseCache::key("anthropic", "claude-3-5", "sys", "user", &params(512));
        assert_ne!(base, ResponseCache::key("openai", "claude-3-5", "sys", "user", &params(512)));
        assert_ne!(base, ResponseCache::key("anthropic", "gpt-4o", "sys", "user", &params(512)));
        assert_ne!(base, ResponseCache::key("anthropic", "claude-3-5", "sys", "user", &params(256)));
    }

    #[test]
    fn key_differs_on_temperature_change() {
        let base = ResponseCache::key("anthropic", "claude-3-5", "sys", "user", &params(512));
        let mut hot = params(512);
        hot.temperature = Some(0.7);
        assert_ne!(base, ResponseCache::key("anthropic", "claude-3-5", "sys", "user", &hot));
    }

    #[test]
    fn put_then_get_roundtrips() {
        let cache = ResponseCache::new(Duration::from_secs(60), 10);
        let key = ResponseCache::key("p", "m", "s", "u", &params(1));
        cache.put(key.clone(), completion("cached"));
        assert_eq!(cache.get(&key).unwrap().raw_text, "cached");
    }

    #[test]
    fn expired_entry_is_not_returned() {
        let cache = ResponseCache::new(Duration::from_millis(10), 10);
        let key = ResponseCache::key("p", "m", "s", "u", &params(1));
        cache.put(key.clone(), completion("stale"));
        std::thread::sleep(Duration::from_millis(20));
        assert!(cache.get(&key).is_none());
    }

    #[test]
    fn evicts_least_recently_used_when_full() {
        let cache = ResponseCache::new(Duration::from_secs(60), 2);
        let k1 = ResponseCache::key("p", "m", "s", "u1", &params(1));
        let k2 = ResponseCache::key("p", "m", "s", "u2", &params(1));
        let k3 = ResponseCache::key("p", "m", "s", "u3", &params(1));
        cache.put(k1.clone(), completion("one"));
        cache.put(k2.clone(), completion("two"));
        // touch k1 so k2 becomes the least recently used
        cache.get(&k1);
        cache.put(k3.clone(), completion("three"));
        assert!(cache.get(&k2).is_none());
        assert!(cache.get(&k1).is_some());
        assert!(cache.get(&k3).is_some());
    }
}
