use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::{DirectoryError, DirectoryResolver};

struct CacheEntry {
    users: Vec<String>,
    fetched_at: Instant,
}

/// Wraps a [`DirectoryResolver`] with a per-group TTL cache. There is no
/// background refresh; expiry is checked lazily on access, mirroring the
/// `Mutex<HashMap<..>>` shared-state pattern used for reconciler context in
/// `storage-operator/src/shards/reconcile.rs`.
pub struct CachingResolver<R> {
    inner: R,
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl<R: DirectoryResolver> CachingResolver<R> {
    pub fn new(inner: R, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl<R: DirectoryResolver> DirectoryResolver for CachingResolver<R> {
    async fn members_of(&self, group_name: &str) -> Result<Vec<String>, DirectoryError> {
        {
            let entries = self.entries.lock().await;
            if let Some(entry) = entries.get(group_name)
                && entry.fetched_at.elapsed() < self.ttl
            {
                return Ok(entry.users.clone());
            }
        }
        let users = self.inner.members_of(group_name).await?;
        let mut entries = self.entries.lock().await;
        entries.insert(
            group_name.to_string(),
            CacheEntry {
                users: users.clone(),
                fetched_at: Instant::now(),
            },
        );
        Ok(users)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    struct CountingResolver {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl DirectoryResolver for CountingResolver {
        async fn members_of(&self, group_name: &str) -> Result<Vec<String>, DirectoryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![format!("{group_name}-user")])
        }
    }

    #[tokio::test]
    async fn second_lookup_within_ttl_hits_cache() {
        let calls = Arc::new(AtomicUsize::new(0));
        let resolver = CachingResolver::new(
            CountingResolver {
                calls: calls.clone(),
            },
            Duration::from_secs(60),
        );
        resolver.members_of("all@ex.com").await.unwrap();
        resolver.members_of("all@ex.com").await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn lookup_after_ttl_refreshes() {
        let calls = Arc::new(AtomicUsize::new(0));
        let resolver = CachingResolver::new(
            CountingResolver {
                calls: calls.clone(),
            },
            Duration::from_millis(1),
        );
        resolver.members_of("all@ex.com").await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        resolver.members_of("all@ex.com").await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
