use moka::future::Cache;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::time::Duration;

pub const PRICE_TTL: Duration = Duration::from_secs(300);
pub const WEATHER_TTL: Duration = Duration::from_secs(600);

/// Fetch results memoized per request key for a fixed time-to-live.
///
/// Failures are cached like successes, so a rate-limited feed is not hammered
/// again until the entry expires or is invalidated.
#[derive(Clone)]
pub struct TtlCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    cache: Cache<K, V>,
}

impl<K, V> TtlCache<K, V>
where
    K: Hash + Eq + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(16)
            .time_to_live(ttl)
            .build();

        Self { cache }
    }

    /// Return the stored value for `key` if it is younger than the TTL,
    /// otherwise await `fetch`, store its output and return it.
    ///
    /// Concurrent callers for the same key share one `fetch`.
    pub async fn get_or_fetch<F>(&self, key: K, fetch: F) -> V
    where
        F: Future<Output = V>,
    {
        let entry = self.cache.entry(key).or_insert_with(fetch).await;

        if entry.is_fresh() {
            tracing::debug!("Cache miss for {:?}, fetched fresh value", entry.key());
        } else {
            tracing::debug!("Cache hit for {:?}", entry.key());
        }

        entry.into_value()
    }

    /// Drop any stored value so the next `get_or_fetch` goes upstream
    pub async fn invalidate(&self, key: &K) {
        self.cache.invalidate(key).await;
        tracing::debug!("Invalidated cache entry {:?}", key);
    }

    #[cfg(test)]
    pub async fn contains(&self, key: &K) -> bool {
        self.cache.get(key).await.is_some()
    }
}
