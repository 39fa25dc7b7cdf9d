// Cache-aside storage for list responses and rate limit counters.

pub mod keys;
pub mod memory;
pub mod redis_cache;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

pub use memory::MemoryCache;
pub use redis_cache::RedisCache;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("redis: {0}")]
    Redis(#[from] redis::RedisError),
}

#[async_trait]
pub trait Cache: Send + Sync {
    /// `Ok(None)` on a miss.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Deletes every key matching a glob pattern and returns how many went.
    async fn clear_pattern(&self, pattern: &str) -> Result<u64, CacheError>;

    /// Increments a counter. The window starts when the counter is created.
    async fn incr(&self, key: &str, window: Duration) -> Result<u64, CacheError>;
}

/// Returns the cached value for `key`, or runs `load` and caches its result.
///
/// Cache failures never fail the read: an unreachable cache or an entry that
/// no longer deserializes is treated as a miss.
pub async fn get_or_load<T, F, Fut, E>(
    cache: &dyn Cache,
    key: &str,
    ttl: Duration,
    load: F,
) -> Result<T, E>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    match cache.get(key).await {
        Ok(Some(cached)) => match serde_json::from_str(&cached) {
            Ok(value) => {
                tracing::debug!(key, "cache hit");
                return Ok(value);
            }
            Err(e) => tracing::warn!(key, error = %e, "discarding undecodable cache entry"),
        },
        Ok(None) => tracing::debug!(key, "cache miss"),
        Err(e) => tracing::warn!(key, error = %e, "cache read failed"),
    }

    let value = load().await?;

    match serde_json::to_string(&value) {
        Ok(json) => {
            if let Err(e) = cache.set(key, &json, ttl).await {
                tracing::warn!(key, error = %e, "cache write failed");
            }
        }
        Err(e) => tracing::warn!(key, error = %e, "failed to encode cache entry"),
    }

    Ok(value)
}

/// Redis-style glob matching supporting `*` and `?`.
pub fn glob_match(pattern: &str, key: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let k: Vec<char> = key.chars().collect();

    let (mut pi, mut ki) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while ki < k.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == k[ki]) {
            pi += 1;
            ki += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ki));
            pi += 1;
        } else if let Some((sp, sk)) = star {
            pi = sp + 1;
            ki = sk + 1;
            star = Some((sp, sk + 1));
        } else {
            return false;
        }
    }

    p[pi..].iter().all(|c| *c == '*')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn glob_prefixes() {
        assert!(glob_match("get_all_users_*", "get_all_users_page=1"));
        assert!(glob_match("get_all_users_*", "get_all_users_"));
        assert!(!glob_match("get_all_users_*", "get_payroll_users_page=1"));
        assert!(glob_match(
            "get_all_users__wise_sell_report*",
            "get_all_users__wise_sell_report"
        ));
        assert!(glob_match("rate_limit:?.?.?.?", "rate_limit:1.2.3.4"));
        assert!(glob_match("*report*", "get_all_users__wise_sell_report_x"));
        assert!(!glob_match("user", "users"));
    }

    #[tokio::test]
    async fn loads_once_then_serves_from_cache() {
        let cache = MemoryCache::new();
        let calls = AtomicUsize::new(0);
        let ttl = Duration::from_secs(60);

        for _ in 0..3 {
            let value: Vec<i64> = get_or_load(&cache, "k", ttl, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, CacheError>(vec![1, 2, 3])
            })
            .await
            .unwrap();
            assert_eq!(value, vec![1, 2, 3]);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn undecodable_entry_is_a_miss() {
        let cache = MemoryCache::new();
        cache.set("k", "{not json", Duration::from_secs(60)).await.unwrap();

        let value: Vec<i64> = get_or_load(&cache, "k", Duration::from_secs(60), || async {
            Ok::<_, CacheError>(vec![9])
        })
        .await
        .unwrap();

        assert_eq!(value, vec![9]);
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("[9]"));
    }

    #[tokio::test]
    async fn load_errors_are_not_cached() {
        let cache = MemoryCache::new();
        let result: Result<Vec<i64>, &str> =
            get_or_load(&cache, "k", Duration::from_secs(60), || async { Err("boom") }).await;

        assert_eq!(result.unwrap_err(), "boom");
        assert!(cache.get("k").await.unwrap().is_none());
    }
}
