//! Stand-ins for slow work.

use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Output of the simulated computations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Computation {
    pub message: String,
    pub computed_at: String,
}

/// A computation whose result never changes, so strict TTL is the right fit.
pub async fn time_expensive() -> anyhow::Result<Computation> {
    tokio::time::sleep(Duration::from_secs(1)).await;
    Ok(Computation { message: "Done".into(), computed_at: Utc::now().to_rfc3339() })
}

/// A computation whose result changes every time it runs.
pub async fn another_time_expensive() -> anyhow::Result<Computation> {
    tokio::time::sleep(Duration::from_secs(1)).await;
    let now = Utc::now();
    Ok(Computation { message: format!("Done at second {}", now.timestamp()), computed_at: now.to_rfc3339() })
}
