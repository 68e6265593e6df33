//! Worker serve loop.
//!
//! Emits the tool manifest, then answers invoke frames until the parent
//! closes the channel. Invokes run concurrently; each response carries the
//! message id of its request, so the parent tolerates out-of-order
//! completion.

use std::sync::Arc;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{info, warn};

use errand_rpc::{Frame, Payload, WireErrorKind};

use crate::tools::ToolSet;

/// Errors that end the serve loop.
#[derive(Debug, Error)]
pub enum ServeError {
    /// Channel I/O failed.
    #[error("Channel I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A frame could not be encoded.
    #[error("Frame codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Serve the toolset over the given channel halves until EOF.
pub async fn serve<R, W>(reader: R, writer: W, toolset: ToolSet) -> Result<(), ServeError>
where
    R: AsyncRead + Send + Unpin,
    W: AsyncWrite + Send + Unpin + 'static,
{
    let toolset = Arc::new(toolset);
    let writer = Arc::new(Mutex::new(writer));

    // The manifest is the first frame on the wire; the parent will not
    // route any invoke before it arrives.
    let manifest = Frame::manifest(toolset.manifest());
    write_frame(&writer, &manifest).await?;
    info!(
        domain = %toolset.domain(),
        tool_count = toolset.manifest().len(),
        "Manifest sent, serving invokes"
    );

    let mut reader = BufReader::new(reader);
    let mut line = String::new();
    let mut inflight = JoinSet::new();

    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let frame = match Frame::from_line(trimmed) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "Discarding unparseable frame");
                continue;
            }
        };

        match frame.payload {
            Payload::Invoke { tool_name, arguments } => {
                let toolset = Arc::clone(&toolset);
                let writer = Arc::clone(&writer);
                let request_id = frame.message_id;
                inflight.spawn(async move {
                    let response = match toolset.get(&tool_name) {
                        Some(tool) => match tool.call(arguments).await {
                            Ok(value) => Frame::result(request_id, value),
                            Err(e) => Frame::error(request_id, e.wire_kind(), e.to_string()),
                        },
                        None => Frame::error(
                            request_id,
                            WireErrorKind::UnknownTool,
                            format!("no such tool: {tool_name}"),
                        ),
                    };
                    if let Err(e) = write_frame(&writer, &response).await {
                        warn!(error = %e, tool = %tool_name, "Failed to write response");
                    }
                });
            }
            other => {
                warn!(?other, "Unexpected frame kind on worker channel");
            }
        }
    }

    // Drain in-flight calls so their responses are not lost on shutdown.
    while inflight.join_next().await.is_some() {}

    Ok(())
}

async fn write_frame<W>(writer: &Arc<Mutex<W>>, frame: &Frame) -> Result<(), ServeError>
where
    W: AsyncWrite + Send + Unpin,
{
    let line = frame.to_line()?;
    let mut writer = writer.lock().await;
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}
