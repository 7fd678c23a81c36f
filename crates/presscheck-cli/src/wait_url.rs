//! Poll a URL until it answers with a non-5xx status.

use anyhow::{bail, Result};
use std::time::Duration;
use tracing::debug;

/// One probe: reachable and not a server error.
///
/// 4xx counts as up (the server is answering); connection failures and 5xx
/// do not.
fn is_up(result: &std::result::Result<reqwest::Response, reqwest::Error>) -> bool {
    match result {
        Ok(response) => response.status().as_u16() < 500,
        Err(_) => false,
    }
}

/// Polls `url` every `interval` until it is up or `timeout` elapses.
pub async fn wait_for_url(url: &str, timeout: Duration, interval: Duration) -> Result<()> {
    let client = reqwest::Client::builder()
        .timeout(interval.max(Duration::from_secs(1)))
        .build()?;
    let deadline = tokio::time::Instant::now() + timeout;

    loop {
        let result = client.get(url).send().await;
        if is_up(&result) {
            return Ok(());
        }
        match &result {
            Ok(response) => debug!(url, status = %response.status(), "still down"),
            Err(e) => debug!(url, error = %e, "not reachable yet"),
        }
        if tokio::time::Instant::now() >= deadline {
            bail!("{} did not come up within {:?}", url, timeout);
        }
        tokio::time::sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_timeout() {
        // Nothing listens on this port; the probe can only fail.
        let result = wait_for_url(
            "http://127.0.0.1:1",
            Duration::from_millis(300),
            Duration::from_millis(100),
        )
        .await;
        assert!(result.is_err());
        let message = result.unwrap_err().to_string();
        assert!(message.contains("did not come up"), "{message}");
    }
}
