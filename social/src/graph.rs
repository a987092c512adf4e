//! Bounded traversal of the directed follow graph

use crate::ids::UserId;
use crate::sources::{FollowDirection, RelationSource};
use review_guard::{Command, GuardError, ProtectedExecutor};
use std::collections::HashSet;
use std::sync::Arc;

/// Deepest level searched by degree of separation
pub const MAX_DEPTH: u32 = 6;

#[derive(Clone)]
pub struct FollowGraph {
    relations: Arc<dyn RelationSource>,
    executor: ProtectedExecutor,
    following: Command,
    followers: Command,
    max_depth: u32,
}

impl FollowGraph {
    pub fn new(
        relations: Arc<dyn RelationSource>,
        executor: ProtectedExecutor,
        following: Command,
        followers: Command,
    ) -> Self {
        Self {
            relations,
            executor,
            following,
            followers,
            max_depth: MAX_DEPTH,
        }
    }

    /// Search fewer levels; values above [`MAX_DEPTH`] are capped
    pub fn with_max_depth(mut self, depth: u32) -> Self {
        self.max_depth = depth.min(MAX_DEPTH);
        self
    }

    /// Users `user` follows; empty when the relation store is unavailable
    pub async fn following(&self, user: &UserId) -> Result<Vec<UserId>, GuardError> {
        self.edges(user, FollowDirection::Following).await
    }

    /// Users following `user`; empty when the relation store is unavailable
    pub async fn followers(&self, user: &UserId) -> Result<Vec<UserId>, GuardError> {
        self.edges(user, FollowDirection::Followers).await
    }

    async fn edges(
        &self,
        user: &UserId,
        direction: FollowDirection,
    ) -> Result<Vec<UserId>, GuardError> {
        let command = match direction {
            FollowDirection::Following => &self.following,
            FollowDirection::Followers => &self.followers,
        };
        let relations = Arc::clone(&self.relations);
        let user = user.clone();

        self.executor
            .execute(
                command,
                async move { relations.follow_edges(&user, direction).await },
                |_| Ok(Vec::new()),
            )
            .await
    }

    /// Minimum number of follow hops from `from` to `to`
    ///
    /// `Some(0)` for the same user, `None` when `to` is not reached within the
    /// depth bound. Edges are directed, so the result is not symmetric. The
    /// search is level by level with a visited set, so cycles terminate.
    pub async fn degree_of_separation(
        &self,
        from: &UserId,
        to: &UserId,
    ) -> Result<Option<u32>, GuardError> {
        if from == to {
            return Ok(Some(0));
        }

        let mut visited: HashSet<UserId> = HashSet::from([from.clone()]);
        let mut frontier = vec![from.clone()];

        for depth in 1..=self.max_depth {
            let mut next = Vec::new();

            for user in &frontier {
                for followee in self.following(user).await? {
                    if &followee == to {
                        tracing::debug!(from = %from, to = %to, depth, "degree of separation found");
                        return Ok(Some(depth));
                    }
                    if visited.insert(followee.clone()) {
                        next.push(followee);
                    }
                }
            }

            if next.is_empty() {
                break;
            }
            frontier = next;
        }

        tracing::debug!(from = %from, to = %to, visited = visited.len(), "no path within depth bound");
        Ok(None)
    }
}

impl std::fmt::Debug for FollowGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FollowGraph")
            .field("max_depth", &self.max_depth)
            .finish_non_exhaustive()
    }
}
