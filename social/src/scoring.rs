//! Cache-aware scoring of one user pair
//!
//! One scoring run is itself a protected `calculate-similarity` call: the
//! inner fetches each have their own circuit, the outer one bounds the whole
//! computation with the (longer) similarity timeout.

use crate::cache::SimilarityCache;
use crate::ids::{EngagementSet, RatingMap, UserId};
use crate::operations::Commands;
use crate::similarity::SimilarityScores;
use crate::sources::EngagementSource;
use review_guard::{BoxError, GuardError, ProtectedExecutor};
use std::sync::Arc;

#[derive(Clone)]
pub struct Scorer {
    engagement: Arc<dyn EngagementSource>,
    cache: SimilarityCache,
    executor: ProtectedExecutor,
    commands: Arc<Commands>,
}

impl Scorer {
    pub fn new(
        engagement: Arc<dyn EngagementSource>,
        cache: SimilarityCache,
        executor: ProtectedExecutor,
        commands: Arc<Commands>,
    ) -> Self {
        Self {
            engagement,
            cache,
            executor,
            commands,
        }
    }

    /// Scores of the pair, from cache unless `force_recalculate`
    ///
    /// Degrades to [`SimilarityScores::ZERO`] when scoring times out or its
    /// circuit is open.
    pub async fn score_pair(
        &self,
        a: &UserId,
        b: &UserId,
        force_recalculate: bool,
    ) -> Result<SimilarityScores, GuardError> {
        let scorer = self.clone();
        let (a, b) = (a.clone(), b.clone());

        self.executor
            .execute(
                &self.commands.calculate_similarity,
                async move {
                    Ok::<_, BoxError>(scorer.compute(&a, &b, force_recalculate).await)
                },
                |_| Ok(SimilarityScores::ZERO),
            )
            .await
    }

    async fn compute(&self, a: &UserId, b: &UserId, force_recalculate: bool) -> SimilarityScores {
        if let Some(record) = self.cache.get(a, b, force_recalculate).await {
            return record.scores();
        }

        let profile_a = self.profile(a).await;
        let profile_b = self.profile(b).await;
        let scores = SimilarityScores::compute(
            &profile_a.products,
            &profile_b.products,
            &profile_a.ratings,
            &profile_b.ratings,
        );

        // A degraded fetch or an empty side may be an outage masked as "no reviews"
        if profile_a.is_cacheable() && profile_b.is_cacheable() {
            self.cache.put(a, b, scores).await;
        } else {
            tracing::debug!(a = %a, b = %b, "incomplete profiles, score not cached");
        }

        scores
    }

    /// Engagement set and rating map, each empty when unavailable
    async fn profile(&self, user: &UserId) -> Profile {
        let engagement = Arc::clone(&self.engagement);
        let owner = user.clone();
        let products = self
            .executor
            .execute(
                &self.commands.fetch_engagement,
                async move { engagement.engagement_set(&owner).await.map(Some) },
                |_| Ok(None),
            )
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(user = %user, error = %e, "engagement unavailable");
                None
            });

        let engagement = Arc::clone(&self.engagement);
        let owner = user.clone();
        let ratings = self
            .executor
            .execute(
                &self.commands.fetch_ratings,
                async move { engagement.rating_map(&owner).await.map(Some) },
                |_| Ok(None),
            )
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(user = %user, error = %e, "ratings unavailable");
                None
            });

        Profile {
            degraded: products.is_none() || ratings.is_none(),
            products: products.unwrap_or_default(),
            ratings: ratings.unwrap_or_default(),
        }
    }
}

/// One user's side of a comparison
struct Profile {
    products: EngagementSet,
    ratings: RatingMap,
    /// A fetch was served by its fallback
    degraded: bool,
}

impl Profile {
    fn is_cacheable(&self) -> bool {
        !self.degraded && !self.products.is_empty() && !self.ratings.is_empty()
    }
}

impl std::fmt::Debug for Scorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scorer")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}
