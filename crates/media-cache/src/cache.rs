use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::backend::MediaBackend;
use crate::error::Result;

const DEFAULT_TTL: Duration = Duration::from_secs(3600);

struct Entry {
    url: String,
    expires_at: Instant,
}

/// C9: a bounded map from media id to `{signed URL, expires-at}`, mutex
/// guarded per §5, with eviction performed opportunistically on read rather
/// than a background sweep.
pub struct MediaUrlCache {
    entries: Mutex<HashMap<String, Entry>>,
    ttl: Duration,
}

impl MediaUrlCache {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Returns a fresh URL for `media_id`, fetching from `backend` when the
    /// entry is absent or expired.
    pub async fn get_or_fetch(&self, media_id: &str, backend: &dyn MediaBackend) -> Result<String> {
        if let Some(url) = self.peek(media_id) {
            return Ok(url);
        }
        let url = backend.fetch_signed_url(media_id).await?;
        self.entries.lock().unwrap().insert(
            media_id.to_string(),
            Entry {
                url: url.clone(),
                expires_at: Instant::now() + self.ttl,
            },
        );
        Ok(url)
    }

    fn peek(&self, media_id: &str) -> Option<String> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(media_id) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.url.clone()),
            Some(_) => {
                entries.remove(media_id);
                None
            }
            None => None,
        }
    }

    /// Removes a cached entry outright, e.g. on deletion of the underlying
    /// media item.
    pub fn delete(&self, media_id: &str) {
        self.entries.lock().unwrap().remove(media_id);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MediaUrlCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingBackend {
        calls: AtomicU32,
    }

    #[async_trait]
    impl MediaBackend for CountingBackend {
        async fn fetch_signed_url(&self, media_id: &str) -> Result<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("https://cdn.example/{media_id}?v={n}"))
        }
    }

    #[tokio::test]
    async fn caches_until_ttl_expires() {
        let backend = CountingBackend { calls: AtomicU32::new(0) };
        let cache = MediaUrlCache::with_ttl(Duration::from_millis(20));

        let first = cache.get_or_fetch("m1", &backend).await.unwrap();
        let second = cache.get_or_fetch("m1", &backend).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_millis(30)).await;
        let third = cache.get_or_fetch("m1", &backend).await.unwrap();
        assert_ne!(first, third);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn delete_removes_entry() {
        let backend = CountingBackend { calls: AtomicU32::new(0) };
        let cache = MediaUrlCache::new();
        cache.get_or_fetch("m1", &backend).await.unwrap();
        assert_eq!(cache.len(), 1);
        cache.delete("m1");
        assert!(cache.is_empty());
    }
}
