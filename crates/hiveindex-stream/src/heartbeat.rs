//! Best-effort liveness ping sent after each productive cycle.

use std::time::Duration;

/// Fire-and-forget heartbeat: `GET {url}{elapsed_ms}`, where the cycle time
/// is counted in whole seconds and sent in milliseconds.
#[derive(Clone)]
pub struct Heartbeat {
    http: reqwest::Client,
    url: String,
}

impl Heartbeat {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.into(),
        }
    }

    /// Target URL for a cycle that took `elapsed`.
    pub fn target(&self, elapsed: Duration) -> String {
        format!("{}{}", self.url, elapsed.as_secs() * 1_000)
    }

    /// Spawn the ping. The task is never awaited; failures are only logged.
    pub fn ping(&self, elapsed: Duration) {
        let http = self.http.clone();
        let target = self.target(elapsed);
        tokio::spawn(async move {
            match http.get(&target).send().await {
                Ok(resp) if !resp.status().is_success() => {
                    tracing::warn!(url = %target, status = resp.status().as_u16(), "heartbeat rejected");
                }
                Ok(_) => tracing::trace!(url = %target, "heartbeat sent"),
                Err(e) => tracing::warn!(url = %target, error = %e, "heartbeat failed"),
            }
        });
    }
}
