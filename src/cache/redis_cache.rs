use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use redis::{AsyncCommands, Client as RedisClient};

use super::{Cache, CacheError};

const SCAN_BATCH: usize = 200;

// INCR and EXPIRE run as one unit. A counter found without a TTL gets one,
// so a key can never outlive its window.
static INCR_WITH_WINDOW: LazyLock<redis::Script> = LazyLock::new(|| {
    redis::Script::new(
        r"
        local count = redis.call('INCR', KEYS[1])
        if count == 1 or redis.call('TTL', KEYS[1]) == -1 then
            redis.call('EXPIRE', KEYS[1], ARGV[1])
        end
        return count
        ",
    )
});

#[derive(Clone)]
pub struct RedisCache {
    redis: Arc<RedisClient>,
}

impl RedisCache {
    pub fn new(redis: Arc<RedisClient>) -> Self {
        Self { redis }
    }

    pub fn open(url: &str) -> Result<Self, CacheError> {
        let client = RedisClient::open(url)?;
        Ok(Self::new(Arc::new(client)))
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.redis.get_multiplexed_async_connection().await?;
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.redis.get_multiplexed_async_connection().await?;
        // SETEX rejects a zero TTL
        let _: () = conn.set_ex(key, value, ttl.as_secs().max(1)).await?;
        Ok(())
    }

    async fn clear_pattern(&self, pattern: &str) -> Result<u64, CacheError> {
        let mut conn = self.redis.get_multiplexed_async_connection().await?;

        // walk the keyspace in SCAN batches; a zero cursor ends the walk
        let mut keys: Vec<String> = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        // DEL with no keys is a syntax error
        if keys.is_empty() {
            return Ok(0);
        }

        // one DEL for the whole set; duplicates from SCAN are counted once
        let removed: u64 = conn.del(&keys).await?;
        tracing::debug!(pattern, removed, "cleared cache keys");
        Ok(removed)
    }

    async fn incr(&self, key: &str, window: Duration) -> Result<u64, CacheError> {
        let mut conn = self.redis.get_multiplexed_async_connection().await?;

        let count: u64 = INCR_WITH_WINDOW
            .key(key)
            .arg(window.as_secs().max(1))
            .invoke_async(&mut conn)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Needs a running Redis: REDIS_URI=redis://127.0.0.1:6379 cargo test -- --ignored
    fn cache() -> RedisCache {
        let url = std::env::var("REDIS_URI").unwrap_or_else(|_| "redis://127.0.0.1:6379".into());
        RedisCache::open(&url).unwrap()
    }

    #[tokio::test]
    #[ignore]
    async fn counter_always_carries_a_ttl() {
        let cache = cache();
        let key = format!("rate_limit:test-{}", uuid::Uuid::new_v4());
        let mut conn = cache.redis.get_multiplexed_async_connection().await.unwrap();

        assert_eq!(cache.incr(&key, Duration::from_secs(30)).await.unwrap(), 1);
        let ttl: i64 = conn.ttl(&key).await.unwrap();
        assert!((1..=30).contains(&ttl));

        // a counter left behind without an expiry gets one on the next hit
        let _: () = conn.persist(&key).await.unwrap();
        assert_eq!(cache.incr(&key, Duration::from_secs(30)).await.unwrap(), 2);
        let ttl: i64 = conn.ttl(&key).await.unwrap();
        assert!((1..=30).contains(&ttl));

        let _: () = conn.del(&key).await.unwrap();
    }

    #[tokio::test]
    #[ignore]
    async fn clear_pattern_scans_every_batch() {
        let cache = cache();
        let prefix = format!("get_all_users_test{}_", uuid::Uuid::new_v4().simple());
        for page in 0..(SCAN_BATCH + 50) {
            cache
                .set(&format!("{prefix}{page}"), "[]", Duration::from_secs(60))
                .await
                .unwrap();
        }

        let removed = cache.clear_pattern(&format!("{prefix}*")).await.unwrap();
        assert_eq!(removed, (SCAN_BATCH + 50) as u64);
    }
}
