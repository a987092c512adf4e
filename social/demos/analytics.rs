//! Social analytics walkthrough with a simulated database outage
//!
//! Run with `RUST_LOG=review_guard=info,review_social=debug` to watch the
//! circuits. Pass a TOML file path to override the default configuration.

use review_social::{
    AnalyticsConfig, MemoryStore, SocialAnalytics, Sources, StoreOperation, UserId,
    operations::FETCH_FOLLOWING,
};
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const DEMO_CONFIG: &str = r#"
candidate_pool_size = 50
scoring_concurrency = 4

[database]
request_volume_threshold = 4
error_threshold_percent = 50.0
sleep_window_ms = 500
execution_timeout_ms = 200
"#;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => AnalyticsConfig::load(Path::new(&path))?,
        None => AnalyticsConfig::from_toml(DEMO_CONFIG)?,
    };

    let store = Arc::new(MemoryStore::new());
    seed(&store)?;
    let analytics = SocialAnalytics::new(config, Sources::from_backend(store.clone()))?;

    let alice = UserId::from("alice");
    let erin = UserId::from("erin");

    println!("=== Similarity ===\n");
    for other in ["bob", "carol", "dave"] {
        let other = UserId::from(other);
        let scores = analytics.similarity_breakdown(&alice, &other, false).await?;
        println!(
            "alice ~ {other}: combined {:.3} (products {:.3}, ratings {:.3})",
            scores.combined_similarity, scores.product_similarity, scores.rating_similarity
        );
    }

    println!("\n=== Similar to alice ===\n");
    let similar = analytics.find_similar_users(&alice, 3, 0.1).await?;
    println!("{}", serde_json::to_string_pretty(&similar)?);

    println!("\n=== Degree of separation ===\n");
    println!(
        "alice -> erin: {:?}",
        analytics.degree_of_separation(&alice, &erin).await?
    );
    println!(
        "erin -> alice: {:?}",
        analytics.degree_of_separation(&erin, &alice).await?
    );

    println!("\n=== Relation store outage ===\n");
    store.fail(StoreOperation::FollowEdges);
    for i in 1..=6 {
        let following = analytics.following(&alice).await?;
        let status = analytics
            .circuit_status(FETCH_FOLLOWING)
            .map(|s| s.status);
        println!("call {i}: {} followees, circuit {:?}", following.len(), status);
    }

    store.recover(StoreOperation::FollowEdges);
    tokio::time::sleep(std::time::Duration::from_millis(600)).await;
    println!(
        "after sleep window: {} followees",
        analytics.following(&alice).await?.len()
    );

    println!("\n=== Circuits ===\n");
    println!("{}", serde_json::to_string_pretty(&analytics.circuit_statuses())?);

    Ok(())
}

fn seed(store: &MemoryStore) -> Result<(), Box<dyn std::error::Error>> {
    let reviews: [(&str, &[(i64, u8)]); 4] = [
        ("alice", &[(1, 5), (2, 4), (3, 2), (4, 5)]),
        ("bob", &[(1, 4), (2, 5), (3, 1), (5, 3)]),
        ("carol", &[(2, 2), (6, 5), (7, 4)]),
        ("dave", &[(8, 3)]),
    ];
    for (user, ratings) in reviews {
        for &(product, rating) in ratings {
            store.add_review(user, product, rating)?;
        }
    }

    for (follower, followee) in [
        ("alice", "bob"),
        ("bob", "carol"),
        ("carol", "dave"),
        ("dave", "erin"),
    ] {
        store.follow(follower, followee);
    }
    Ok(())
}
