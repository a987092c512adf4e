//! ReviewSocial - similarity, recommendations and follow-graph analytics
//!
//! Every storage access goes through [`review_guard`]: each operation key has
//! its own circuit, timeout and fallback, so an outage degrades results
//! (empty lists, `None`, `0.0`) instead of failing requests.
//!
//! - [`similarity`] - Jaccard product similarity, rating agreement, combined score
//! - [`SimilarityCache`] - symmetric pairwise score cache with write-through
//! - [`FollowGraph`] - bounded breadth-first degree of separation
//! - [`Ranker`] - filtered, sorted similar-user recommendations
//! - [`SocialAnalytics`] - facade tying the above together
//!
//! # Example
//!
//! ```rust
//! use review_social::{AnalyticsConfig, MemoryStore, SocialAnalytics, Sources, UserId};
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(MemoryStore::new());
//! store.add_review("alice", 1, 5)?;
//! store.add_review("bob", 1, 4)?;
//! store.follow("alice", "bob");
//!
//! let analytics = SocialAnalytics::new(AnalyticsConfig::default(), Sources::from_backend(store))?;
//! let alice = UserId::from("alice");
//! let bob = UserId::from("bob");
//!
//! assert_eq!(analytics.calculate_combined_similarity(&alice, &bob, false).await?, 1.0);
//! assert_eq!(analytics.degree_of_separation(&alice, &bob).await?, Some(1));
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod graph;
pub mod ids;
pub mod memory;
pub mod operations;
pub mod ranker;
pub mod scoring;
pub mod service;
pub mod similarity;
pub mod sources;

pub use cache::{ScoreRecord, SimilarityCache};
pub use config::AnalyticsConfig;
pub use error::{AnalyticsError, SourceError};
pub use graph::{FollowGraph, MAX_DEPTH};
pub use ids::{EngagementSet, PairKey, ProductId, Rating, RatingMap, UserId};
pub use memory::{MemoryStore, StoreOperation};
pub use operations::Commands;
pub use ranker::{Ranker, SimilarUser};
pub use scoring::Scorer;
pub use service::SocialAnalytics;
pub use similarity::SimilarityScores;
pub use sources::{
    CandidateSource, EngagementSource, FollowDirection, RelationSource, ScoreStore, Sources,
};
