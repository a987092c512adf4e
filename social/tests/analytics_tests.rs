//! End-to-end behaviour of the analytics facade over the in-memory store

use chrono::Utc;
use review_guard::{CircuitRegistry, CircuitStatus};
use review_social::{
    AnalyticsConfig, AnalyticsError, MemoryStore, PairKey, ScoreRecord, SocialAnalytics,
    Sources, StoreOperation, UserId,
    operations::{CALCULATE_SIMILARITY, FETCH_ACTIVE_USERS, FETCH_FOLLOWING},
};
use std::sync::Arc;
use std::time::Duration;

fn analytics(store: &Arc<MemoryStore>) -> SocialAnalytics {
    SocialAnalytics::new(AnalyticsConfig::default(), Sources::from_backend(store.clone())).unwrap()
}

fn cached(store: &MemoryStore, a: &str, b: &str, combined: f64) {
    store.insert_score(ScoreRecord {
        pair: PairKey::new(&UserId::from(a), &UserId::from(b)),
        product_similarity: combined,
        rating_similarity: combined,
        combined_similarity: combined,
        computed_at: Utc::now(),
    });
}

#[tokio::test]
async fn test_ranker_filters_sorts_and_truncates() {
    let store = Arc::new(MemoryStore::new());
    for user in ["seed", "u1", "u2", "u3"] {
        store.add_review(user, 1, 3).unwrap();
    }
    cached(&store, "seed", "u1", 0.5);
    cached(&store, "u2", "seed", 0.9);
    cached(&store, "seed", "u3", 0.2);
    let analytics = analytics(&store);

    let similar = analytics
        .find_similar_users(&UserId::from("seed"), 2, 0.3)
        .await
        .unwrap();

    let ranked: Vec<(&str, f64)> = similar
        .iter()
        .map(|u| (u.id.as_str(), u.combined_similarity))
        .collect();
    assert_eq!(ranked, vec![("u2", 0.9), ("u1", 0.5)]);
}

#[tokio::test]
async fn test_ranker_computes_misses_and_writes_through() {
    let store = Arc::new(MemoryStore::new());
    for (product, rating) in [(1, 5), (2, 4), (3, 2)] {
        store.add_review("alice", product, rating).unwrap();
    }
    for (product, rating) in [(1, 5), (2, 4), (3, 2)] {
        store.add_review("twin", product, rating).unwrap();
    }
    store.add_review("stranger", 99, 1).unwrap();
    let analytics = analytics(&store);

    let similar = analytics
        .find_similar_users(&UserId::from("alice"), 10, 0.0)
        .await
        .unwrap();

    assert_eq!(similar.len(), 2);
    assert_eq!(similar[0].id, UserId::from("twin"));
    assert_eq!(similar[0].combined_similarity, 1.0);
    assert_eq!(similar[1].combined_similarity, 0.0);
    assert_eq!(store.score_count(), 2);
}

#[tokio::test]
async fn test_seed_never_recommended() {
    let store = Arc::new(MemoryStore::new());
    store.add_review("alice", 1, 5).unwrap();
    store.add_review("bob", 1, 5).unwrap();
    let analytics = analytics(&store);

    let similar = analytics
        .find_similar_users(&UserId::from("alice"), 50, 0.0)
        .await
        .unwrap();

    assert!(similar.iter().all(|u| u.id != UserId::from("alice")));
    assert_eq!(similar.len(), 1);
}

#[tokio::test]
async fn test_invalid_ranker_arguments() {
    let store = Arc::new(MemoryStore::new());
    let analytics = analytics(&store);
    let seed = UserId::from("alice");

    assert!(matches!(
        analytics.find_similar_users(&seed, 0, 0.5).await,
        Err(AnalyticsError::InvalidLimit { limit: 0, max: 50 })
    ));
    assert!(matches!(
        analytics.find_similar_users(&seed, 51, 0.5).await,
        Err(AnalyticsError::InvalidLimit { .. })
    ));
    assert!(matches!(
        analytics.find_similar_users(&seed, 10, 1.5).await,
        Err(AnalyticsError::InvalidMinSimilarity(_))
    ));
    assert_eq!(store.calls(StoreOperation::ActiveUsers), 0);
}

#[tokio::test]
async fn test_candidate_outage_yields_empty_list() {
    let store = Arc::new(MemoryStore::new());
    store.add_review("alice", 1, 5).unwrap();
    store.add_review("bob", 1, 5).unwrap();
    store.fail(StoreOperation::ActiveUsers);
    let analytics = analytics(&store);

    let similar = analytics
        .find_similar_users(&UserId::from("alice"), 10, 0.0)
        .await
        .unwrap();

    assert!(similar.is_empty());
    let status = analytics.circuit_status(FETCH_ACTIVE_USERS).unwrap();
    assert_eq!(status.error_count, 1);
}

#[tokio::test]
async fn test_similarity_is_symmetric_and_cached_once() {
    let store = Arc::new(MemoryStore::new());
    for product in [1, 2, 3] {
        store.add_review("a", product, 4).unwrap();
    }
    for product in [2, 3, 4] {
        store.add_review("b", product, 5).unwrap();
    }
    let analytics = analytics(&store);
    let a = UserId::from("a");
    let b = UserId::from("b");

    let forward = analytics.similarity_breakdown(&a, &b, false).await.unwrap();
    let backward = analytics.similarity_breakdown(&b, &a, false).await.unwrap();

    assert_eq!(forward, backward);
    assert_eq!(forward.product_similarity, 0.5);
    assert_eq!(forward.rating_similarity, 1.0);
    assert_eq!(forward.combined_similarity, 0.75);
    assert_eq!(store.score_count(), 1);
    assert_eq!(store.score(&b, &a), store.score(&a, &b));
}

#[tokio::test]
async fn test_force_recalculate_refreshes_cache() {
    let store = Arc::new(MemoryStore::new());
    store.add_review("a", 1, 4).unwrap();
    store.add_review("b", 1, 4).unwrap();
    cached(&store, "a", "b", 0.1);
    let analytics = analytics(&store);
    let a = UserId::from("a");
    let b = UserId::from("b");

    assert_eq!(
        analytics.calculate_combined_similarity(&a, &b, false).await.unwrap(),
        0.1
    );
    assert_eq!(
        analytics.calculate_combined_similarity(&a, &b, true).await.unwrap(),
        1.0
    );
    assert_eq!(store.score(&a, &b).unwrap().combined_similarity, 1.0);
}

#[tokio::test]
async fn test_cache_outage_computes_uncached() {
    let store = Arc::new(MemoryStore::new());
    store.add_review("a", 1, 4).unwrap();
    store.add_review("b", 1, 4).unwrap();
    store.fail(StoreOperation::LoadScore);
    store.fail(StoreOperation::UpsertScore);
    let analytics = analytics(&store);

    let combined = analytics
        .calculate_combined_similarity(&UserId::from("a"), &UserId::from("b"), false)
        .await
        .unwrap();

    assert_eq!(combined, 1.0);
    assert_eq!(store.score_count(), 0);
}

#[tokio::test]
async fn test_degree_of_separation_is_directed() {
    let store = Arc::new(MemoryStore::new());
    store.follow("a", "b");
    store.follow("b", "c");
    let analytics = analytics(&store);
    let a = UserId::from("a");
    let c = UserId::from("c");

    assert_eq!(analytics.degree_of_separation(&a, &a).await.unwrap(), Some(0));
    assert_eq!(analytics.degree_of_separation(&a, &c).await.unwrap(), Some(2));
    assert_eq!(analytics.degree_of_separation(&c, &a).await.unwrap(), None);
}

#[tokio::test]
async fn test_following_and_followers() {
    let store = Arc::new(MemoryStore::new());
    store.follow("alice", "bob");
    store.follow("carol", "bob");
    let analytics = analytics(&store);
    let bob = UserId::from("bob");

    assert_eq!(
        analytics.followers(&bob).await.unwrap(),
        vec![UserId::from("alice"), UserId::from("carol")]
    );
    assert!(analytics.following(&bob).await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_relation_outage_trips_then_recovers() {
    let store = Arc::new(MemoryStore::new());
    store.follow("alice", "bob");
    let analytics = analytics(&store);
    let alice = UserId::from("alice");

    store.fail(StoreOperation::FollowEdges);
    for _ in 0..10 {
        assert!(analytics.following(&alice).await.unwrap().is_empty());
    }
    assert_eq!(
        analytics.circuit_status(FETCH_FOLLOWING).unwrap().status,
        CircuitStatus::Open
    );

    // Open circuit: store not called, fallback served
    store.recover(StoreOperation::FollowEdges);
    let calls = store.calls(StoreOperation::FollowEdges);
    assert!(analytics.following(&alice).await.unwrap().is_empty());
    assert_eq!(store.calls(StoreOperation::FollowEdges), calls);
    assert_eq!(
        analytics.circuit_status(FETCH_FOLLOWING).unwrap().short_circuited,
        1
    );

    tokio::time::advance(Duration::from_secs(6)).await;
    assert_eq!(
        analytics.following(&alice).await.unwrap(),
        vec![UserId::from("bob")]
    );
    let status = analytics.circuit_status(FETCH_FOLLOWING).unwrap();
    assert_eq!(status.status, CircuitStatus::Closed);
    assert_eq!(status.total_requests, 0);
}

#[tokio::test]
async fn test_reset_circuit_closes_it() {
    let store = Arc::new(MemoryStore::new());
    store.fail(StoreOperation::FollowEdges);
    let analytics = analytics(&store);
    let alice = UserId::from("alice");

    for _ in 0..10 {
        analytics.following(&alice).await.unwrap();
    }
    assert_eq!(
        analytics.circuit_status(FETCH_FOLLOWING).unwrap().status,
        CircuitStatus::Open
    );

    assert!(analytics.reset_circuit(FETCH_FOLLOWING));
    assert!(!analytics.reset_circuit("no-such-operation"));
    let status = analytics.circuit_status(FETCH_FOLLOWING).unwrap();
    assert_eq!(status.status, CircuitStatus::Closed);
    assert_eq!(status.error_count, 0);
}

#[tokio::test(start_paused = true)]
async fn test_slow_storage_times_out_to_zero() {
    let store = Arc::new(MemoryStore::new());
    store.add_review("a", 1, 4).unwrap();
    store.add_review("b", 1, 4).unwrap();
    store.set_latency(StoreOperation::Engagement, Duration::from_secs(30));
    store.set_latency(StoreOperation::Ratings, Duration::from_secs(30));
    let analytics = analytics(&store);

    let combined = analytics
        .calculate_combined_similarity(&UserId::from("a"), &UserId::from("b"), false)
        .await
        .unwrap();

    assert_eq!(combined, 0.0);
    let status = analytics
        .circuit_status(review_social::operations::FETCH_ENGAGEMENT)
        .unwrap();
    assert_eq!(status.timeouts, 2);
    // Four 3s fetch timeouts overrun the 10s scoring budget
    assert_eq!(
        analytics.circuit_status(CALCULATE_SIMILARITY).unwrap().timeouts,
        1
    );
    assert_eq!(store.score_count(), 0);
}

#[test]
fn test_every_operation_key_registered_up_front() {
    let store = Arc::new(MemoryStore::new());
    let analytics = analytics(&store);

    let keys: Vec<String> = analytics
        .circuit_statuses()
        .into_iter()
        .map(|s| s.key)
        .collect();
    assert_eq!(keys.len(), 8);
    assert!(keys.contains(&CALCULATE_SIMILARITY.to_string()));
    assert!(keys.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn test_invalid_config_rejected_before_registration() {
    let registry = Arc::new(CircuitRegistry::new());
    let mut config = AnalyticsConfig::default();
    config.database.request_volume_threshold = 0;

    let result = SocialAnalytics::with_registry(
        config,
        Sources::from_backend(Arc::new(MemoryStore::new())),
        registry.clone(),
    );

    assert!(matches!(result, Err(AnalyticsError::Config(_))));
    assert!(registry.is_empty());
}

#[test]
fn test_shared_registry_shares_circuits() {
    let registry = Arc::new(CircuitRegistry::new());
    let store = Arc::new(MemoryStore::new());

    let first = SocialAnalytics::with_registry(
        AnalyticsConfig::default(),
        Sources::from_backend(store.clone()),
        registry.clone(),
    )
    .unwrap();
    let second = SocialAnalytics::with_registry(
        AnalyticsConfig::default(),
        Sources::from_backend(store),
        registry.clone(),
    )
    .unwrap();

    assert!(Arc::ptr_eq(first.registry(), second.registry()));
    assert_eq!(registry.len(), 8);
}
