//! Event-stream (SSE) binding.
//!
//! One long-lived outbound stream per client, paired with a command endpoint
//! correlated by a `sessionId` query parameter. The stream opens with an
//! `endpoint` event naming the command URL for the freshly allocated session;
//! every later frame is a `message` event. Dropping the stream (either peer)
//! closes the session and releases its registry entry.

use crate::error::{BridgeError, Result};
use crate::service::BridgeService;
use crate::session::BindingKind;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, KeepAliveStream, Sse};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::Stream;
use serde::Deserialize;
use serde_json::{Value, json};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

/// Build the binding's router: the event-stream endpoint, the command
/// endpoint, and the admin surface. Everything else is a 404.
pub fn router(service: Arc<BridgeService>) -> Router {
    let sse_path = service.config.sse_path.clone();
    let message_path = service.config.message_path.clone();
    Router::new()
        .route(&sse_path, get(open_stream))
        .route(&message_path, post(deliver_message))
        .with_state(Arc::clone(&service))
        .merge(crate::admin::router(service))
}

/// Serve the event-stream binding until `shutdown` fires.
///
/// # Errors
///
/// Returns a startup error if the listener cannot bind; serving errors are
/// transport errors.
pub async fn serve(
    service: Arc<BridgeService>,
    bind: SocketAddr,
    shutdown: CancellationToken,
) -> Result<()> {
    let app = router(Arc::clone(&service));
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .map_err(|e| BridgeError::Startup(format!("failed to bind {bind}: {e}")))?;
    let local = listener.local_addr().map_err(BridgeError::Io)?;
    tracing::info!(addr = %local, "event-stream binding listening");
    service.events.server_started(BindingKind::EventStream.as_str());

    // Close every session as soon as shutdown fires; the open event streams
    // end when their sessions drop, which is what lets graceful shutdown
    // finish.
    let closer = {
        let service = Arc::clone(&service);
        let token = shutdown.clone();
        tokio::spawn(async move {
            token.cancelled().await;
            service.shutdown();
        })
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(BridgeError::Io)?;

    closer.abort();
    // Idempotent: covers serve() ending without the token firing.
    service.shutdown();
    service.events.server_stopped(BindingKind::EventStream.as_str());
    Ok(())
}

#[derive(Debug, Deserialize)]
struct MessageQuery {
    #[serde(rename = "sessionId")]
    session_id: Option<String>,
}

async fn open_stream(
    State(service): State<Arc<BridgeService>>,
) -> std::result::Result<Sse<KeepAliveStream<SessionStream>>, (StatusCode, Json<Value>)> {
    let (session, outbound_rx) = service
        .open_session(BindingKind::EventStream)
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, "rejecting event-stream connection");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
        })?;

    let endpoint = format!("{}?sessionId={}", service.config.message_path, session.id);
    let stream = SessionStream {
        endpoint: Some(endpoint),
        frames: ReceiverStream::new(outbound_rx),
        _guard: SessionGuard {
            service,
            session_id: session.id.clone(),
        },
    };

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    ))
}

async fn deliver_message(
    State(service): State<Arc<BridgeService>>,
    Query(query): Query<MessageQuery>,
    Json(frame): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let Some(session_id) = query.session_id else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Missing sessionId query parameter" })),
        );
    };

    match service.route_frame(&session_id, frame).await {
        Ok(()) => (StatusCode::ACCEPTED, Json(json!({ "status": "accepted" }))),
        // Unknown session or a session mid-close: a client error either way,
        // with no effect on any other session.
        Err(e) => (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() }))),
    }
}

/// Outbound SSE stream for one session. The first item is the
/// connection-established `endpoint` event; dropping the stream closes the
/// session.
struct SessionStream {
    endpoint: Option<String>,
    frames: ReceiverStream<Value>,
    _guard: SessionGuard,
}

impl Stream for SessionStream {
    type Item = std::result::Result<Event, Infallible>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if let Some(endpoint) = this.endpoint.take() {
            return Poll::Ready(Some(Ok(Event::default().event("endpoint").data(endpoint))));
        }
        match Pin::new(&mut this.frames).poll_next(cx) {
            Poll::Ready(Some(frame)) => Poll::Ready(Some(Ok(
                Event::default().event("message").data(frame.to_string())
            ))),
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Removes the session from the registry when the outbound stream goes away,
/// whichever peer caused it.
struct SessionGuard {
    service: Arc<BridgeService>,
    session_id: String,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.service.close_session(&self.session_id);
    }
}
