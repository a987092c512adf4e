//! The analytics facade handed to request handlers

use crate::cache::SimilarityCache;
use crate::config::AnalyticsConfig;
use crate::error::AnalyticsError;
use crate::graph::FollowGraph;
use crate::ids::UserId;
use crate::operations::Commands;
use crate::ranker::{Ranker, SimilarUser};
use crate::scoring::Scorer;
use crate::similarity::SimilarityScores;
use crate::sources::Sources;
use review_guard::{CircuitRegistry, CircuitSnapshot, ProtectedExecutor};
use std::sync::Arc;

/// Similarity, recommendations and follow-graph queries behind circuits
///
/// Storage failures are masked: a struggling database yields empty lists,
/// `None` or `0.0`, the same values a user without data would get. Use
/// [`circuit_statuses`](Self::circuit_statuses) to tell the two apart.
#[derive(Debug, Clone)]
pub struct SocialAnalytics {
    config: AnalyticsConfig,
    executor: ProtectedExecutor,
    scorer: Scorer,
    graph: FollowGraph,
    ranker: Ranker,
}

impl SocialAnalytics {
    /// Build with a fresh registry using the configured rolling window
    pub fn new(config: AnalyticsConfig, sources: Sources) -> Result<Self, AnalyticsError> {
        config.validate()?;
        let metrics = config.metrics.build()?;
        let registry = CircuitRegistry::builder().metrics(Arc::new(metrics)).build();
        Self::with_registry(config, sources, Arc::new(registry))
    }

    /// Build on an existing registry, sharing its circuits
    pub fn with_registry(
        config: AnalyticsConfig,
        sources: Sources,
        registry: Arc<CircuitRegistry>,
    ) -> Result<Self, AnalyticsError> {
        config.validate()?;
        let commands = Arc::new(Commands::from_config(&config)?);
        for command in commands.all() {
            registry.register(command);
        }

        let executor = ProtectedExecutor::new(registry);
        let cache = SimilarityCache::new(
            sources.scores,
            executor.clone(),
            commands.cache_read.clone(),
            commands.cache_write.clone(),
        );
        let scorer = Scorer::new(sources.engagement, cache, executor.clone(), commands.clone());
        let graph = FollowGraph::new(
            sources.relations,
            executor.clone(),
            commands.fetch_following.clone(),
            commands.fetch_followers.clone(),
        )
        .with_max_depth(config.max_depth);
        let ranker = Ranker::new(
            sources.candidates,
            scorer.clone(),
            executor.clone(),
            commands.fetch_active_users.clone(),
        )
        .pool_size(config.candidate_pool_size)
        .concurrency(config.scoring_concurrency);

        Ok(Self {
            config,
            executor,
            scorer,
            graph,
            ranker,
        })
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<CircuitRegistry> {
        self.executor.registry()
    }

    /// Combined similarity of two users in `[0, 1]`
    pub async fn calculate_combined_similarity(
        &self,
        a: &UserId,
        b: &UserId,
        force_recalculate: bool,
    ) -> Result<f64, AnalyticsError> {
        Ok(self
            .similarity_breakdown(a, b, force_recalculate)
            .await?
            .combined_similarity)
    }

    /// Product, rating and combined similarity of two users
    pub async fn similarity_breakdown(
        &self,
        a: &UserId,
        b: &UserId,
        force_recalculate: bool,
    ) -> Result<SimilarityScores, AnalyticsError> {
        Ok(self.scorer.score_pair(a, b, force_recalculate).await?)
    }

    pub async fn find_similar_users(
        &self,
        seed: &UserId,
        limit: usize,
        min_similarity: f64,
    ) -> Result<Vec<SimilarUser>, AnalyticsError> {
        if limit == 0 || limit > self.config.max_limit {
            return Err(AnalyticsError::InvalidLimit {
                limit,
                max: self.config.max_limit,
            });
        }
        if !(0.0..=1.0).contains(&min_similarity) {
            return Err(AnalyticsError::InvalidMinSimilarity(min_similarity));
        }

        Ok(self.ranker.find_similar(seed, limit, min_similarity).await?)
    }

    pub async fn degree_of_separation(
        &self,
        from: &UserId,
        to: &UserId,
    ) -> Result<Option<u32>, AnalyticsError> {
        Ok(self.graph.degree_of_separation(from, to).await?)
    }

    pub async fn following(&self, user: &UserId) -> Result<Vec<UserId>, AnalyticsError> {
        Ok(self.graph.following(user).await?)
    }

    pub async fn followers(&self, user: &UserId) -> Result<Vec<UserId>, AnalyticsError> {
        Ok(self.graph.followers(user).await?)
    }

    /// Snapshots of every operation key, sorted by key
    pub fn circuit_statuses(&self) -> Vec<CircuitSnapshot> {
        self.registry().statuses()
    }

    pub fn circuit_status(&self, key: &str) -> Option<CircuitSnapshot> {
        self.registry().status(key)
    }

    /// Force a circuit closed; false for an unknown key
    pub fn reset_circuit(&self, key: &str) -> bool {
        self.registry().reset(key)
    }
}
