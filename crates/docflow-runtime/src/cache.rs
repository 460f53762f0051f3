//! Response cache for completion calls.
//!
//! Completions run at temperature 0, so the same prompt against the same
//! model yields the same answer. Re-processing a document then costs no
//! provider calls.

use moka::future::Cache;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;

/// Cache key: model name plus a hash of the prompt text.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    model: String,
    prompt_hash: u64,
}

impl CacheKey {
    pub fn new(model: &str, prompt: &str) -> Self {
        let mut hasher = DefaultHasher::new();
        prompt.hash(&mut hasher);
        Self {
            model: model.to_string(),
            prompt_hash: hasher.finish(),
        }
    }
}

pub struct CompletionCache {
    cache: Cache<CacheKey, String>,
}

impl CompletionCache {
    pub fn new(max_entries: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(ttl)
            .build();

        Self { cache }
    }

    pub async fn get(&self, key: &CacheKey) -> Option<String> {
        self.cache.get(key).await
    }

    pub async fn insert(&self, key: CacheKey, answer: String) {
        self.cache.insert(key, answer).await;
    }

    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

impl Default for CompletionCache {
    fn default() -> Self {
        Self::new(1_000, Duration::from_secs(3600))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cache_operations() {
        let cache = CompletionCache::default();
        let key = CacheKey::new("llama3.2", "Classify this document type.");

        assert!(cache.get(&key).await.is_none());

        cache.insert(key.clone(), "invoice".to_string()).await;
        assert_eq!(cache.get(&key).await.as_deref(), Some("invoice"));
    }

    #[test]
    fn test_key_depends_on_model_and_prompt() {
        let base = CacheKey::new("llama3.2", "prompt");
        assert_eq!(base, CacheKey::new("llama3.2", "prompt"));
        assert_ne!(base, CacheKey::new("gpt-4o-mini", "prompt"));
        assert_ne!(base, CacheKey::new("llama3.2", "prompt "));
    }
}
