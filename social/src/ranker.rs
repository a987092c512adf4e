//! Similar-user recommendations

use crate::ids::UserId;
use crate::scoring::Scorer;
use crate::similarity::SimilarityScores;
use crate::sources::CandidateSource;
use futures::stream::{self, StreamExt};
use review_guard::{Command, GuardError, ProtectedExecutor};
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

/// One ranked candidate; scores are rounded to 3 decimals when serialized
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarUser {
    pub id: UserId,
    #[serde(serialize_with = "round3")]
    pub combined_similarity: f64,
    #[serde(serialize_with = "round3")]
    pub product_similarity: f64,
    #[serde(serialize_with = "round3")]
    pub rating_similarity: f64,
}

impl SimilarUser {
    pub fn new(id: UserId, scores: SimilarityScores) -> Self {
        Self {
            id,
            combined_similarity: scores.combined_similarity,
            product_similarity: scores.product_similarity,
            rating_similarity: scores.rating_similarity,
        }
    }
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn round3<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64((value * 1000.0).round() / 1000.0)
}

/// Keep candidates at or above `min_similarity`, best first, at most `limit`
///
/// Equal scores are ordered by user id so results are stable across runs.
pub fn rank(mut candidates: Vec<SimilarUser>, limit: usize, min_similarity: f64) -> Vec<SimilarUser> {
    candidates.retain(|c| c.combined_similarity >= min_similarity);
    candidates.sort_by(|a, b| {
        b.combined_similarity
            .partial_cmp(&a.combined_similarity)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
    candidates.truncate(limit);
    candidates
}

#[derive(Clone)]
pub struct Ranker {
    candidates: Arc<dyn CandidateSource>,
    scorer: Scorer,
    executor: ProtectedExecutor,
    active_users: Command,
    pool_size: usize,
    concurrency: usize,
}

impl Ranker {
    pub fn new(
        candidates: Arc<dyn CandidateSource>,
        scorer: Scorer,
        executor: ProtectedExecutor,
        active_users: Command,
    ) -> Self {
        Self {
            candidates,
            scorer,
            executor,
            active_users,
            pool_size: 100,
            concurrency: 8,
        }
    }

    pub fn pool_size(mut self, size: usize) -> Self {
        self.pool_size = size.max(1);
        self
    }

    /// Candidates scored at the same time
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Users most similar to `seed`
    ///
    /// Arguments are expected to be validated by the caller. An unavailable
    /// candidate pool yields an empty list, an unavailable score counts as 0.
    pub async fn find_similar(
        &self,
        seed: &UserId,
        limit: usize,
        min_similarity: f64,
    ) -> Result<Vec<SimilarUser>, GuardError> {
        let pool = self.candidate_pool(seed).await?;
        tracing::debug!(seed = %seed, candidates = pool.len(), "scoring candidate pool");

        let scored: Vec<Result<SimilarUser, GuardError>> = stream::iter(pool)
            .map(|candidate| async move {
                self.scorer
                    .score_pair(seed, &candidate, false)
                    .await
                    .map(|scores| SimilarUser::new(candidate, scores))
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let scored = scored.into_iter().collect::<Result<Vec<_>, _>>()?;
        Ok(rank(scored, limit, min_similarity))
    }

    async fn candidate_pool(&self, seed: &UserId) -> Result<Vec<UserId>, GuardError> {
        let candidates = Arc::clone(&self.candidates);
        let excluding = seed.clone();
        let limit = self.pool_size;

        let users = self
            .executor
            .execute(
                &self.active_users,
                async move { candidates.active_users(&excluding, limit).await },
                |_| Ok(Vec::new()),
            )
            .await?;

        let mut seen = HashSet::new();
        Ok(users
            .into_iter()
            .filter(|user| user != seed && seen.insert(user.clone()))
            .take(self.pool_size)
            .collect())
    }
}

impl std::fmt::Debug for Ranker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ranker")
            .field("pool_size", &self.pool_size)
            .field("concurrency", &self.concurrency)
            .finish_non_exhaustive()
    }
}
