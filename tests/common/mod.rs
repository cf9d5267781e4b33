pub mod mock_engine;

use std::time::Duration;

/// Let spawned listener tasks drain their event channels.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

pub fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}
