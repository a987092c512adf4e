//! Pairwise similarity cache
//!
//! Records are keyed by [`PairKey`], so lookups are symmetric. Writes are
//! unconditional upserts (last write wins) and records never expire. Both
//! directions go through protected execution; a store outage shows up as a
//! miss on read and a dropped write, never as an error.

use crate::ids::{PairKey, UserId};
use crate::similarity::SimilarityScores;
use crate::sources::ScoreStore;
use chrono::{DateTime, Utc};
use review_guard::{Command, ProtectedExecutor};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Persisted scores of one user pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreRecord {
    pub pair: PairKey,
    pub product_similarity: f64,
    pub rating_similarity: f64,
    pub combined_similarity: f64,
    pub computed_at: DateTime<Utc>,
}

impl ScoreRecord {
    pub fn new(pair: PairKey, scores: SimilarityScores) -> Self {
        Self {
            pair,
            product_similarity: scores.product_similarity,
            rating_similarity: scores.rating_similarity,
            combined_similarity: scores.combined_similarity,
            computed_at: Utc::now(),
        }
    }

    pub fn scores(&self) -> SimilarityScores {
        SimilarityScores {
            product_similarity: self.product_similarity,
            rating_similarity: self.rating_similarity,
            combined_similarity: self.combined_similarity,
        }
    }
}

#[derive(Clone)]
pub struct SimilarityCache {
    store: Arc<dyn ScoreStore>,
    executor: ProtectedExecutor,
    read: Command,
    write: Command,
}

impl SimilarityCache {
    pub fn new(
        store: Arc<dyn ScoreStore>,
        executor: ProtectedExecutor,
        read: Command,
        write: Command,
    ) -> Self {
        Self {
            store,
            executor,
            read,
            write,
        }
    }

    /// Cached record for the pair, in either order
    ///
    /// `force_recalculate` always reports a miss without touching the store.
    pub async fn get(&self, a: &UserId, b: &UserId, force_recalculate: bool) -> Option<ScoreRecord> {
        if force_recalculate {
            return None;
        }

        let key = PairKey::new(a, b);
        let store = Arc::clone(&self.store);
        let lookup = key.clone();

        let result = self
            .executor
            .execute(
                &self.read,
                async move { store.load(&lookup).await },
                |_| Ok(None),
            )
            .await;

        match result {
            Ok(Some(record)) => {
                tracing::debug!(pair = %key, "similarity cache hit");
                Some(record)
            }
            Ok(None) => {
                tracing::debug!(pair = %key, "similarity cache miss");
                None
            }
            Err(e) => {
                tracing::warn!(pair = %key, error = %e, "similarity cache unavailable, treating as miss");
                None
            }
        }
    }

    /// Upsert the scores of the pair
    pub async fn put(&self, a: &UserId, b: &UserId, scores: SimilarityScores) {
        let record = ScoreRecord::new(PairKey::new(a, b), scores);
        let pair = record.pair.clone();
        let store = Arc::clone(&self.store);

        let result = self
            .executor
            .execute(
                &self.write,
                async move { store.upsert(record).await },
                |_| Ok(()),
            )
            .await;

        if let Err(e) = result {
            tracing::warn!(pair = %pair, error = %e, "similarity cache write dropped");
        }
    }
}

impl std::fmt::Debug for SimilarityCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimilarityCache")
            .field("read", &self.read.key())
            .field("write", &self.write.key())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryStore, StoreOperation};
    use crate::operations::{SIMILARITY_CACHE_READ, SIMILARITY_CACHE_WRITE};

    fn cache(store: Arc<MemoryStore>) -> SimilarityCache {
        SimilarityCache::new(
            store,
            ProtectedExecutor::default(),
            Command::builder(SIMILARITY_CACHE_READ).build().unwrap(),
            Command::builder(SIMILARITY_CACHE_WRITE)
                .fallback_enabled(false)
                .build()
                .unwrap(),
        )
    }

    fn scores(combined: f64) -> SimilarityScores {
        SimilarityScores {
            product_similarity: combined,
            rating_similarity: combined,
            combined_similarity: combined,
        }
    }

    #[tokio::test]
    async fn test_lookup_is_symmetric() {
        let cache = cache(Arc::new(MemoryStore::new()));
        let alice = UserId::from("alice");
        let bob = UserId::from("bob");

        cache.put(&bob, &alice, scores(0.4)).await;

        let forward = cache.get(&alice, &bob, false).await.unwrap();
        let backward = cache.get(&bob, &alice, false).await.unwrap();
        assert_eq!(forward, backward);
        assert_eq!(forward.pair.first(), &alice);
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let cache = cache(Arc::new(MemoryStore::new()));
        let alice = UserId::from("alice");
        let bob = UserId::from("bob");

        cache.put(&alice, &bob, scores(0.2)).await;
        cache.put(&bob, &alice, scores(0.7)).await;

        let record = cache.get(&alice, &bob, false).await.unwrap();
        assert_eq!(record.combined_similarity, 0.7);
    }

    #[tokio::test]
    async fn test_force_recalculate_reports_miss() {
        let store = Arc::new(MemoryStore::new());
        let cache = cache(store.clone());
        let alice = UserId::from("alice");
        let bob = UserId::from("bob");

        cache.put(&alice, &bob, scores(0.5)).await;
        let reads = store.calls(StoreOperation::LoadScore);

        assert!(cache.get(&alice, &bob, true).await.is_none());
        assert_eq!(store.calls(StoreOperation::LoadScore), reads);
    }

    #[tokio::test]
    async fn test_store_outage_degrades_to_miss() {
        let store = Arc::new(MemoryStore::new());
        let cache = cache(store.clone());
        let alice = UserId::from("alice");
        let bob = UserId::from("bob");

        cache.put(&alice, &bob, scores(0.5)).await;
        store.fail(StoreOperation::LoadScore);
        assert!(cache.get(&alice, &bob, false).await.is_none());

        // Write path has fallback disabled: the error is logged and dropped
        store.fail(StoreOperation::UpsertScore);
        cache.put(&alice, &bob, scores(0.9)).await;

        store.recover(StoreOperation::LoadScore);
        let record = cache.get(&alice, &bob, false).await.unwrap();
        assert_eq!(record.combined_similarity, 0.5);
    }
}
