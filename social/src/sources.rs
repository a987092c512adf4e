//! Storage collaborators consumed by the analytics core
//!
//! Implementations live with the persistence layer; [`MemoryStore`](crate::MemoryStore)
//! implements all of them for tests and demos.

use crate::cache::ScoreRecord;
use crate::error::SourceError;
use crate::ids::{EngagementSet, PairKey, RatingMap, UserId};
use async_trait::async_trait;
use std::sync::Arc;

/// Which side of the follow relation to read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FollowDirection {
    /// Users that `user` follows
    Following,
    /// Users that follow `user`
    Followers,
}

#[async_trait]
pub trait EngagementSource: Send + Sync {
    async fn engagement_set(&self, user: &UserId) -> Result<EngagementSet, SourceError>;

    async fn rating_map(&self, user: &UserId) -> Result<RatingMap, SourceError>;
}

#[async_trait]
pub trait RelationSource: Send + Sync {
    async fn follow_edges(
        &self,
        user: &UserId,
        direction: FollowDirection,
    ) -> Result<Vec<UserId>, SourceError>;
}

#[async_trait]
pub trait CandidateSource: Send + Sync {
    /// Users with at least one engagement or follow edge, `excluding` left out,
    /// at most `limit` of them
    async fn active_users(
        &self,
        excluding: &UserId,
        limit: usize,
    ) -> Result<Vec<UserId>, SourceError>;
}

/// Backing table of the similarity cache
#[async_trait]
pub trait ScoreStore: Send + Sync {
    async fn load(&self, key: &PairKey) -> Result<Option<ScoreRecord>, SourceError>;

    /// Insert or overwrite; last write wins
    async fn upsert(&self, record: ScoreRecord) -> Result<(), SourceError>;
}

/// The full set of collaborators behind one analytics instance
#[derive(Clone)]
pub struct Sources {
    pub engagement: Arc<dyn EngagementSource>,
    pub relations: Arc<dyn RelationSource>,
    pub candidates: Arc<dyn CandidateSource>,
    pub scores: Arc<dyn ScoreStore>,
}

impl Sources {
    /// Use one backend for every collaborator
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: EngagementSource + RelationSource + CandidateSource + ScoreStore + 'static,
    {
        Self {
            engagement: backend.clone(),
            relations: backend.clone(),
            candidates: backend.clone(),
            scores: backend,
        }
    }
}

impl std::fmt::Debug for Sources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sources").finish_non_exhaustive()
    }
}
