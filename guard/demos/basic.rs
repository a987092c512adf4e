//! Protected execution walkthrough: trip, short-circuit, trial, recovery

use review_guard::{CircuitRegistry, Command, ProtectedExecutor};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Protected Execution Basic Example ===\n");

    let registry = CircuitRegistry::builder()
        .on_open(|key| println!("🔴 Circuit '{}' opened!", key))
        .on_close(|key| println!("🟢 Circuit '{}' closed!", key))
        .on_half_open(|key| println!("🟡 Circuit '{}' half-open, testing...", key))
        .build();
    let executor = ProtectedExecutor::new(Arc::new(registry));

    let command = Command::builder("fetch-ratings")
        .request_volume_threshold(4)
        .error_threshold_percent(50.0)
        .sleep_window(Duration::from_millis(500))
        .execution_timeout(Duration::from_millis(100))
        .build()?;

    println!("--- Successful calls ---");
    for i in 1..=2 {
        let value = executor
            .execute(&command, async move { Ok::<_, String>(format!("rating row {}", i)) }, |_| {
                Ok("fallback".to_string())
            })
            .await?;
        println!("✓ {}", value);
    }

    println!("\n--- Failures and a timeout ---");
    for i in 1..=2 {
        let value = executor
            .execute(
                &command,
                async move { Err::<String, _>(format!("query {} failed", i)) },
                |ctx| Ok(format!("fallback ({:?})", ctx.reason)),
            )
            .await?;
        println!("✗ {}", value);
    }
    let value = executor
        .execute(
            &command,
            async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok::<_, String>("too late".to_string())
            },
            |ctx| Ok(format!("fallback ({:?})", ctx.reason)),
        )
        .await?;
    println!("✗ {}", value);

    println!("\n--- Attempting call while open ---");
    let value = executor
        .execute(&command, async { Ok::<_, String>("never runs".to_string()) }, |ctx| {
            Ok(format!("fallback ({:?})", ctx.reason))
        })
        .await?;
    println!("✗ {}", value);

    println!("\n--- Waiting out the sleep window ---");
    tokio::time::sleep(Duration::from_millis(600)).await;
    let value = executor
        .execute(&command, async { Ok::<_, String>("rating row 3".to_string()) }, |_| {
            Ok("fallback".to_string())
        })
        .await?;
    println!("✓ {}", value);

    if let Some(status) = executor.registry().status("fetch-ratings") {
        println!("\nStatus: {:?}", status);
    }
    Ok(())
}
