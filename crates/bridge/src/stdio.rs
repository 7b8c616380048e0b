//! Standard-stream binding.
//!
//! A single implicit session for the process lifetime: JSON-RPC frames are
//! exchanged one per line on stdin/stdout. EOF on stdin or transport shutdown
//! closes the session; there is never more than one.

use crate::error::{BridgeError, Result};
use crate::service::BridgeService;
use crate::session::BindingKind;
use serde_json::Value;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt as _, AsyncWriteExt as _, BufReader};
use tokio_util::sync::CancellationToken;

/// Serve the standard-stream binding until EOF or `shutdown` fires.
///
/// # Errors
///
/// Returns an error if the session cannot be opened (publish failure) or
/// stdout becomes unwritable.
pub async fn serve(service: Arc<BridgeService>, shutdown: CancellationToken) -> Result<()> {
    let (session, mut outbound_rx) = service.open_session(BindingKind::Stdio).await?;
    service.events.server_started(BindingKind::Stdio.as_str());
    tracing::info!(session_id = %session.id, "stdio binding ready");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        tokio::select! {
            () = shutdown.cancelled() => break,
            frame = outbound_rx.recv() => {
                let Some(frame) = frame else { break };
                let mut line = frame.to_string();
                line.push('\n');
                stdout.write_all(line.as_bytes()).await.map_err(BridgeError::Io)?;
                stdout.flush().await.map_err(BridgeError::Io)?;
            }
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        match serde_json::from_str::<Value>(line) {
                            Ok(frame) => {
                                if let Err(e) = service.route_frame(&session.id, frame).await {
                                    tracing::warn!(error = %e, "failed to route stdio frame");
                                }
                            }
                            // A malformed frame is scoped to itself.
                            Err(e) => tracing::warn!(error = %e, "ignoring malformed stdio frame"),
                        }
                    }
                    // EOF: the peer closed its end; the session's lifetime is over.
                    Ok(None) => break,
                    Err(e) => return Err(BridgeError::Io(e)),
                }
            }
        }
    }

    service.close_session(&session.id);
    service.events.server_stopped(BindingKind::Stdio.as_str());
    Ok(())
}
