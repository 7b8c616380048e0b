use anyhow::Context as _;
use futures::StreamExt as _;
use futures::stream::BoxStream;
use serde_json::{Value, json};
use std::time::Duration;

type EventStream = BoxStream<'static, Result<sse_stream::Sse, sse_stream::Error>>;

/// One client-side event-stream session: the long-lived SSE stream plus the
/// command endpoint it was told to use.
pub struct SseSession {
    client: reqwest::Client,
    stream: EventStream,
    pub session_id: String,
    pub message_url: String,
}

impl SseSession {
    /// Open the stream and consume the connection-established `endpoint`
    /// event.
    pub async fn connect(base: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::new();
        let resp = client
            .get(format!("{base}/sse"))
            .send()
            .await
            .context("open event stream")?;
        anyhow::ensure!(
            resp.status().is_success(),
            "event stream rejected: {}",
            resp.status()
        );

        let mut stream: EventStream =
            sse_stream::SseStream::from_byte_stream(resp.bytes_stream()).boxed();

        let endpoint = next_event(&mut stream, "endpoint", Duration::from_secs(10)).await?;
        let session_id = endpoint
            .split("sessionId=")
            .nth(1)
            .context("endpoint event missing sessionId")?
            .to_string();

        Ok(Self {
            client,
            stream,
            session_id,
            message_url: format!("{base}{endpoint}"),
        })
    }

    /// Post one request frame and wait for the matching `message` event.
    pub async fn request(
        &mut self,
        id: u64,
        method: &str,
        params: Value,
        timeout_dur: Duration,
    ) -> anyhow::Result<Value> {
        let frame = json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params });
        let resp = self
            .client
            .post(&self.message_url)
            .json(&frame)
            .send()
            .await
            .context("post command frame")?;
        anyhow::ensure!(
            resp.status() == reqwest::StatusCode::ACCEPTED,
            "command endpoint returned {}",
            resp.status()
        );
        self.next_message(timeout_dur).await
    }

    /// Wait for the next `message` event and parse it as JSON.
    pub async fn next_message(&mut self, timeout_dur: Duration) -> anyhow::Result<Value> {
        let payload = next_event(&mut self.stream, "message", timeout_dur).await?;
        serde_json::from_str(&payload).context("parse message event JSON")
    }
}

async fn next_event(
    stream: &mut EventStream,
    kind: &str,
    timeout_dur: Duration,
) -> anyhow::Result<String> {
    let waited = tokio::time::timeout(timeout_dur, async {
        while let Some(evt) = stream.next().await {
            let evt = evt.context("read SSE event")?;
            if evt.event.as_deref() == Some(kind) {
                return Ok(evt.data.unwrap_or_default());
            }
        }
        anyhow::bail!("event stream ended before '{kind}' event")
    })
    .await;
    waited.with_context(|| format!("timed out waiting for '{kind}' event"))?
}
