//! In-memory collaborator backend
//!
//! Implements every source trait over `DashMap`s. Each operation can be made
//! to fail or to stall, which is how tests and the demo simulate a struggling
//! database and watch the circuits react.

use crate::cache::ScoreRecord;
use crate::error::SourceError;
use crate::ids::{EngagementSet, MAX_RATING, MIN_RATING, PairKey, ProductId, Rating, RatingMap, UserId};
use crate::sources::{CandidateSource, EngagementSource, FollowDirection, RelationSource, ScoreStore};
use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use std::collections::BTreeSet;
use std::time::Duration;

/// Backend operations that can be instrumented
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOperation {
    Engagement,
    Ratings,
    FollowEdges,
    ActiveUsers,
    LoadScore,
    UpsertScore,
}

impl StoreOperation {
    pub fn name(self) -> &'static str {
        match self {
            StoreOperation::Engagement => "engagement",
            StoreOperation::Ratings => "ratings",
            StoreOperation::FollowEdges => "follow edges",
            StoreOperation::ActiveUsers => "active users",
            StoreOperation::LoadScore => "score load",
            StoreOperation::UpsertScore => "score upsert",
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    reviews: DashMap<UserId, RatingMap>,
    following: DashMap<UserId, BTreeSet<UserId>>,
    followers: DashMap<UserId, BTreeSet<UserId>>,
    scores: DashMap<PairKey, ScoreRecord>,
    failing: DashSet<StoreOperation>,
    latency: DashMap<StoreOperation, Duration>,
    calls: DashMap<StoreOperation, usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a review; a second review of the same product replaces the rating
    pub fn add_review(
        &self,
        user: impl Into<UserId>,
        product: i64,
        rating: Rating,
    ) -> Result<(), SourceError> {
        if !(MIN_RATING..=MAX_RATING).contains(&rating) {
            return Err(SourceError::InvalidData(format!(
                "rating {rating} outside [{MIN_RATING}, {MAX_RATING}]"
            )));
        }

        self.reviews
            .entry(user.into())
            .or_default()
            .insert(ProductId(product), rating);
        Ok(())
    }

    pub fn follow(&self, follower: impl Into<UserId>, followee: impl Into<UserId>) {
        let follower = follower.into();
        let followee = followee.into();

        self.followers
            .entry(followee.clone())
            .or_default()
            .insert(follower.clone());
        self.following.entry(follower).or_default().insert(followee);
    }

    /// Seed a cached score directly
    pub fn insert_score(&self, record: ScoreRecord) {
        self.scores.insert(record.pair.clone(), record);
    }

    pub fn score(&self, a: &UserId, b: &UserId) -> Option<ScoreRecord> {
        self.scores
            .get(&PairKey::new(a, b))
            .map(|entry| entry.value().clone())
    }

    pub fn score_count(&self) -> usize {
        self.scores.len()
    }

    /// Make `operation` fail until [`recover`](Self::recover)
    pub fn fail(&self, operation: StoreOperation) {
        self.failing.insert(operation);
    }

    pub fn recover(&self, operation: StoreOperation) {
        self.failing.remove(&operation);
    }

    /// Delay every call of `operation`
    pub fn set_latency(&self, operation: StoreOperation, latency: Duration) {
        self.latency.insert(operation, latency);
    }

    pub fn clear_latency(&self, operation: StoreOperation) {
        self.latency.remove(&operation);
    }

    /// Calls made to `operation`, including failed ones
    pub fn calls(&self, operation: StoreOperation) -> usize {
        self.calls.get(&operation).map(|c| *c).unwrap_or(0)
    }

    async fn enter(&self, operation: StoreOperation) -> Result<(), SourceError> {
        *self.calls.entry(operation).or_insert(0) += 1;

        let latency = self.latency.get(&operation).map(|d| *d);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        if self.failing.contains(&operation) {
            return Err(SourceError::Unavailable {
                operation: operation.name(),
                reason: "simulated failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl EngagementSource for MemoryStore {
    async fn engagement_set(&self, user: &UserId) -> Result<EngagementSet, SourceError> {
        self.enter(StoreOperation::Engagement).await?;
        Ok(self
            .reviews
            .get(user)
            .map(|ratings| ratings.keys().copied().collect())
            .unwrap_or_default())
    }

    async fn rating_map(&self, user: &UserId) -> Result<RatingMap, SourceError> {
        self.enter(StoreOperation::Ratings).await?;
        Ok(self
            .reviews
            .get(user)
            .map(|ratings| ratings.value().clone())
            .unwrap_or_default())
    }
}

#[async_trait]
impl RelationSource for MemoryStore {
    async fn follow_edges(
        &self,
        user: &UserId,
        direction: FollowDirection,
    ) -> Result<Vec<UserId>, SourceError> {
        self.enter(StoreOperation::FollowEdges).await?;

        let edges = match direction {
            FollowDirection::Following => &self.following,
            FollowDirection::Followers => &self.followers,
        };
        Ok(edges
            .get(user)
            .map(|users| users.iter().cloned().collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl CandidateSource for MemoryStore {
    async fn active_users(
        &self,
        excluding: &UserId,
        limit: usize,
    ) -> Result<Vec<UserId>, SourceError> {
        self.enter(StoreOperation::ActiveUsers).await?;

        let mut active = BTreeSet::new();
        for entry in self.reviews.iter() {
            if !entry.value().is_empty() {
                active.insert(entry.key().clone());
            }
        }
        for entry in self.following.iter().chain(self.followers.iter()) {
            if !entry.value().is_empty() {
                active.insert(entry.key().clone());
            }
        }

        Ok(active
            .into_iter()
            .filter(|user| user != excluding)
            .take(limit)
            .collect())
    }
}

#[async_trait]
impl ScoreStore for MemoryStore {
    async fn load(&self, key: &PairKey) -> Result<Option<ScoreRecord>, SourceError> {
        self.enter(StoreOperation::LoadScore).await?;
        Ok(self.scores.get(key).map(|entry| entry.value().clone()))
    }

    async fn upsert(&self, record: ScoreRecord) -> Result<(), SourceError> {
        self.enter(StoreOperation::UpsertScore).await?;
        self.scores.insert(record.pair.clone(), record);
        Ok(())
    }
}
