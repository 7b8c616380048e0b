//! Helpers shared by the bridge integration tests.

use anyhow::Context as _;
use std::net::TcpListener;
use std::process::Child;
use std::time::{Duration, Instant};

/// Kills the wrapped child process when the test scope ends.
pub struct KillOnDrop(pub Child);

impl Drop for KillOnDrop {
    fn drop(&mut self) {
        let _ = self.0.kill();
    }
}

/// Pick a currently unused localhost TCP port.
///
/// The port is not reserved: another process may still grab it between this
/// call and the eventual bind.
///
/// # Errors
///
/// Returns an error if no ephemeral port can be bound.
pub fn pick_unused_port() -> anyhow::Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0").context("bind ephemeral port")?;
    Ok(listener.local_addr()?.port())
}

/// Poll `url` until it answers with a success status.
///
/// # Errors
///
/// Returns an error when `timeout_dur` elapses first.
pub async fn wait_http_ok(url: &str, timeout_dur: Duration) -> anyhow::Result<()> {
    let client = reqwest::Client::new();
    retry_until(timeout_dur, || async {
        matches!(client.get(url).send().await, Ok(resp) if resp.status().is_success())
    })
    .await
    .with_context(|| format!("timed out waiting for {url}"))
}

/// Re-run `check` until it returns true or `timeout_dur` elapses.
///
/// # Errors
///
/// Returns an error when the timeout elapses with `check` still false.
pub async fn retry_until<F, Fut>(timeout_dur: Duration, mut check: F) -> anyhow::Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let start = Instant::now();
    loop {
        if check().await {
            return Ok(());
        }
        if start.elapsed() > timeout_dur {
            anyhow::bail!("condition not met within {timeout_dur:?}");
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}
