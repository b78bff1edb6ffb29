//! Short-lived cache for the public listing.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;

#[derive(Debug)]
struct CacheEntry<T> {
    value: T,
    generation: u64,
    expires_at: Instant,
}

#[derive(Debug)]
struct CacheState<T> {
    generation: u64,
    entry: Option<CacheEntry<T>>,
}

/// A single-slot TTL cache that can be invalidated from anywhere.
///
/// Writers capture [`generation`](Self::generation) before fetching and pass
/// it back to [`store`](Self::store). An invalidation in between bumps the
/// generation, so the late result is dropped instead of resurrecting data
/// older than the invalidating write.
#[derive(Debug)]
pub struct ListingCache<T> {
    ttl: Duration,
    state: Arc<RwLock<CacheState<T>>>,
}

impl<T> Clone for ListingCache<T> {
    fn clone(&self) -> Self {
        Self {
            ttl: self.ttl,
            state: Arc::clone(&self.state),
        }
    }
}

impl<T: Clone + Send + Sync> ListingCache<T> {
    /// Create an empty cache. A zero TTL disables caching.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            state: Arc::new(RwLock::new(CacheState {
                generation: 0,
                entry: None,
            })),
        }
    }

    /// The cached value, if fresh.
    pub async fn get(&self) -> Option<T> {
        let state = self.state.read().await;
        state
            .entry
            .as_ref()
            .filter(|e| e.generation == state.generation && e.expires_at > Instant::now())
            .map(|e| e.value.clone())
    }

    /// Current generation, to be handed back to [`store`](Self::store).
    pub async fn generation(&self) -> u64 {
        self.state.read().await.generation
    }

    /// Store a value fetched under `generation`.
    ///
    /// Returns false when the cache was invalidated since, in which case the
    /// value is discarded.
    pub async fn store(&self, generation: u64, value: T) -> bool {
        if self.ttl.is_zero() {
            return false;
        }
        let mut state = self.state.write().await;
        if state.generation != generation {
            return false;
        }
        state.entry = Some(CacheEntry {
            value,
            generation,
            expires_at: Instant::now() + self.ttl,
        });
        true
    }

    /// Drop the cached value and reject in-flight stores.
    pub async fn invalidate(&self) {
        let mut state = self.state.write().await;
        state.generation = state.generation.wrapping_add(1);
        state.entry = None;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_store_then_get() {
        let cache = ListingCache::new(Duration::from_secs(60));
        assert!(cache.get().await.is_none());

        let generation = cache.generation().await;
        assert!(cache.store(generation, vec![1, 2, 3]).await);
        assert_eq!(cache.get().await, Some(vec![1, 2, 3]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires() {
        let cache = ListingCache::new(Duration::from_secs(60));
        let generation = cache.generation().await;
        cache.store(generation, "listing").await;

        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(cache.get().await, Some("listing"));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(cache.get().await.is_none());
    }

    #[tokio::test]
    async fn test_invalidate_clears_entry() {
        let cache = ListingCache::new(Duration::from_secs(60));
        let generation = cache.generation().await;
        cache.store(generation, 1_u32).await;

        cache.invalidate().await;
        assert!(cache.get().await.is_none());
    }

    #[tokio::test]
    async fn test_stale_store_is_rejected() {
        let cache = ListingCache::new(Duration::from_secs(60));
        let before = cache.generation().await;

        cache.invalidate().await;
        assert!(!cache.store(before, "stale").await);
        assert!(cache.get().await.is_none());

        let after = cache.generation().await;
        assert!(cache.store(after, "fresh").await);
        assert_eq!(cache.get().await, Some("fresh"));
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let cache = ListingCache::new(Duration::from_secs(60));
        let other = cache.clone();
        let generation = cache.generation().await;
        cache.store(generation, 7_u8).await;

        other.invalidate().await;
        assert!(cache.get().await.is_none());
    }

    #[tokio::test]
    async fn test_zero_ttl_disables_caching() {
        let cache = ListingCache::new(Duration::ZERO);
        let generation = cache.generation().await;
        assert!(!cache.store(generation, 1_u8).await);
        assert!(cache.get().await.is_none());
    }
}
