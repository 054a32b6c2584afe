//! memorable demo entry point.
//!
//! Runs two slow computations through a configured protocol, three rounds
//! each, and prints every result as one JSON line on stdout. Logging goes to
//! stderr so stdout stays machine-readable.
//!
//! Try it with the stale-while-revalidate reconciler and a file store:
//!
//! ```text
//! MEMORABLE_STORAGE=file MEMORABLE_RECONCILER=stale_while_revalidate \
//! MEMORABLE_STRICT_KEYS='[my-computation-result]' MEMORABLE_TTL_MS=1500 \
//! RUST_LOG=debug memorable-demo
//! ```

use std::time::Duration;

use anyhow::Result;
use memorable::{MemoRequest, MemoResult, Protocol};
use memorable_core::MemorableConfig;
use tracing_subscriber::EnvFilter;

mod computations;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = MemorableConfig::load()?;
    let protocol = Protocol::from_config(&config).await?;

    for round in 1..=3 {
        tracing::info!(round, "starting round");

        let strict = protocol
            .memo(MemoRequest::new("my-computation-result").fetch(computations::time_expensive))
            .await?;
        print_result(&strict)?;

        let revalidated = protocol
            .memo(MemoRequest::new("another-computation-result").fetch(computations::another_time_expensive))
            .await?;
        print_result(&revalidated)?;

        tokio::time::sleep(Duration::from_secs(2)).await;
    }

    Ok(())
}

fn print_result<T: serde::Serialize>(result: &MemoResult<T>) -> Result<()> {
    println!("{}", serde_json::to_string(result)?);
    Ok(())
}
