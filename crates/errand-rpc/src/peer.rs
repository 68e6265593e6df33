//! Request/response peer for the orchestrator side of the channel.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex as StdMutex;
use std::sync::Arc;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, trace, warn};

use errand_core::{MessageId, ToolDescriptor};

use crate::error::RpcError;
use crate::frame::{Frame, Payload};

type PendingMap = HashMap<MessageId, oneshot::Sender<Result<Value, RpcError>>>;

/// Orchestrator-side peer for one worker channel.
///
/// Owns the write half of the worker's stdin and runs a background read
/// loop over its stdout. Invokes are matched to responses by `message_id`,
/// so out-of-order replies are fine. When the worker closes its stdout (or
/// crashes), every outstanding invoke resolves with
/// [`RpcError::ChannelClosed`].
pub struct RpcPeer {
    /// `None` once [`RpcPeer::close`] has dropped the write half.
    writer: Mutex<Option<Box<dyn AsyncWrite + Send + Unpin>>>,
    /// `None` once the channel is closed; no new invokes are accepted.
    pending: Arc<StdMutex<Option<PendingMap>>>,
    manifest_rx: StdMutex<Option<oneshot::Receiver<Vec<ToolDescriptor>>>>,
}

impl RpcPeer {
    /// Take ownership of the channel halves and start the read loop.
    pub fn spawn<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let pending: Arc<StdMutex<Option<PendingMap>>> =
            Arc::new(StdMutex::new(Some(HashMap::new())));
        let (manifest_tx, manifest_rx) = oneshot::channel();

        let loop_pending = Arc::clone(&pending);
        tokio::spawn(async move {
            if let Err(e) = Self::read_loop(reader, manifest_tx, &loop_pending).await {
                warn!(error = %e, "RPC read loop ended with error");
            }
            // Fail everything still outstanding and refuse new invokes.
            let drained = loop_pending.lock().expect("pending lock").take();
            if let Some(map) = drained {
                for (_, tx) in map {
                    let _ = tx.send(Err(RpcError::ChannelClosed));
                }
            }
        });

        Self {
            writer: Mutex::new(Some(Box::new(writer))),
            pending,
            manifest_rx: StdMutex::new(Some(manifest_rx)),
        }
    }

    /// Wait for the worker's manifest frame. Consumable once; the caller
    /// applies its own timeout.
    pub async fn manifest(&self) -> Result<Vec<ToolDescriptor>, RpcError> {
        let rx = self
            .manifest_rx
            .lock()
            .expect("manifest lock")
            .take()
            .ok_or(RpcError::ManifestTaken)?;
        rx.await.map_err(|_| RpcError::ChannelClosed)
    }

    /// Invoke a tool and wait for its matched response.
    pub async fn invoke(
        &self,
        tool_name: &str,
        arguments: BTreeMap<String, Value>,
    ) -> Result<Value, RpcError> {
        let frame = Frame::invoke(tool_name, arguments);
        let message_id = frame.message_id.clone();

        let (tx, rx) = oneshot::channel();
        {
            let mut guard = self.pending.lock().expect("pending lock");
            match guard.as_mut() {
                Some(map) => {
                    map.insert(message_id.clone(), tx);
                }
                None => return Err(RpcError::ChannelClosed),
            }
        }

        if let Err(e) = self.send(&frame).await {
            if let Some(map) = self.pending.lock().expect("pending lock").as_mut() {
                map.remove(&message_id);
            }
            return Err(e);
        }

        trace!(message_id = %message_id, tool = %tool_name, "Invoke sent");
        rx.await.map_err(|_| RpcError::ChannelClosed)?
    }

    /// Close the write half, signalling the worker to exit.
    ///
    /// The writer is flushed, shut down, and then dropped, so the worker
    /// actually sees EOF on its stdin (a process stdin handle only closes
    /// its descriptor on drop). Outstanding invokes resolve as the worker
    /// drains and closes its stdout; invokes sent after this fail with
    /// [`RpcError::ChannelClosed`]. Idempotent.
    pub async fn close(&self) -> Result<(), RpcError> {
        let taken = self.writer.lock().await.take();
        if let Some(mut writer) = taken {
            writer.flush().await?;
            writer.shutdown().await?;
        }
        Ok(())
    }

    /// Write one frame as a line.
    async fn send(&self, frame: &Frame) -> Result<(), RpcError> {
        let line = frame.to_line()?;
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(RpcError::ChannelClosed)?;
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        Ok(())
    }

    /// Read frames until EOF, completing pending invokes by message id.
    async fn read_loop<R>(
        reader: R,
        manifest_tx: oneshot::Sender<Vec<ToolDescriptor>>,
        pending: &StdMutex<Option<PendingMap>>,
    ) -> Result<(), RpcError>
    where
        R: AsyncRead + Send + Unpin,
    {
        let mut reader = BufReader::new(reader);
        let mut line = String::new();
        let mut manifest_tx = Some(manifest_tx);

        loop {
            line.clear();
            let bytes_read = reader.read_line(&mut line).await?;
            if bytes_read == 0 {
                debug!("Worker channel closed (EOF)");
                return Ok(());
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let frame = match Frame::from_line(trimmed) {
                Ok(frame) => frame,
                Err(e) => {
                    let preview: String = trimmed.chars().take(200).collect();
                    warn!(error = %e, preview = %preview, "Discarding unparseable frame");
                    continue;
                }
            };

            // The handshake contract: nothing else is valid before the
            // manifest, so a worker that speaks out of turn loses the
            // channel.
            if manifest_tx.is_some() && !matches!(frame.payload, Payload::Manifest { .. }) {
                return Err(RpcError::Protocol(
                    "first frame from the worker was not a manifest".to_string(),
                ));
            }

            match frame.payload {
                Payload::Manifest { tools } => match manifest_tx.take() {
                    Some(tx) => {
                        debug!(tool_count = tools.len(), "Manifest received");
                        let _ = tx.send(tools);
                    }
                    None => warn!("Duplicate manifest frame ignored"),
                },
                Payload::Result { value } => {
                    Self::complete(pending, &frame.message_id, Ok(value));
                }
                Payload::Error { error, detail } => {
                    Self::complete(
                        pending,
                        &frame.message_id,
                        Err(RpcError::Worker { kind: error, detail }),
                    );
                }
                Payload::Invoke { tool_name, .. } => {
                    warn!(tool = %tool_name, "Worker sent an invoke frame; ignoring");
                }
            }
        }
    }

    fn complete(
        pending: &StdMutex<Option<PendingMap>>,
        message_id: &MessageId,
        result: Result<Value, RpcError>,
    ) {
        let tx = pending
            .lock()
            .expect("pending lock")
            .as_mut()
            .and_then(|map| map.remove(message_id));
        match tx {
            Some(tx) => {
                let _ = tx.send(result);
            }
            None => warn!(message_id = %message_id, "Response for unknown message id"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::WireErrorKind;
    use errand_core::{catalog, Domain};
    use serde_json::json;
    use tokio::io::{duplex, split, AsyncBufReadExt, AsyncWriteExt, BufReader};

    async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, frame: &Frame) {
        let line = frame.to_line().unwrap();
        writer.write_all(line.as_bytes()).await.unwrap();
        writer.write_all(b"\n").await.unwrap();
        writer.flush().await.unwrap();
    }

    #[tokio::test]
    async fn test_manifest_then_out_of_order_responses() {
        let (orchestrator_side, worker_side) = duplex(4096);
        let (read_half, write_half) = split(orchestrator_side);
        let peer = RpcPeer::spawn(read_half, write_half);

        // Fake worker: emit manifest, then answer invokes in reverse order.
        let (worker_read, mut worker_write) = split(worker_side);
        let worker = tokio::spawn(async move {
            write_frame(
                &mut worker_write,
                &Frame::manifest(catalog::domain_tools(Domain::Mail)),
            )
            .await;

            let mut reader = BufReader::new(worker_read);
            let mut ids = Vec::new();
            let mut line = String::new();
            for _ in 0..2 {
                line.clear();
                reader.read_line(&mut line).await.unwrap();
                let frame = Frame::from_line(line.trim()).unwrap();
                ids.push(frame.message_id);
            }
            // Answer the second invoke first.
            write_frame(&mut worker_write, &Frame::result(ids[1].clone(), json!("second")))
                .await;
            write_frame(&mut worker_write, &Frame::result(ids[0].clone(), json!("first")))
                .await;
        });

        let tools = peer.manifest().await.unwrap();
        assert_eq!(tools, catalog::domain_tools(Domain::Mail));

        let (first, second) = tokio::join!(
            peer.invoke("mail.send_message", BTreeMap::new()),
            peer.invoke("mail.create_draft", BTreeMap::new()),
        );
        assert_eq!(first.unwrap(), json!("first"));
        assert_eq!(second.unwrap(), json!("second"));

        worker.await.unwrap();
    }

    #[tokio::test]
    async fn test_error_frame_maps_to_worker_error() {
        let (orchestrator_side, worker_side) = duplex(4096);
        let (read_half, write_half) = split(orchestrator_side);
        let peer = RpcPeer::spawn(read_half, write_half);

        let (worker_read, mut worker_write) = split(worker_side);
        tokio::spawn(async move {
            let mut reader = BufReader::new(worker_read);
            let mut line = String::new();
            reader.read_line(&mut line).await.unwrap();
            let frame = Frame::from_line(line.trim()).unwrap();
            write_frame(
                &mut worker_write,
                &Frame::error(frame.message_id, WireErrorKind::ToolFailed, "provider 500"),
            )
            .await;
        });

        let err = peer
            .invoke("mail.send_message", BTreeMap::new())
            .await
            .unwrap_err();
        match err {
            RpcError::Worker { kind, detail } => {
                assert_eq!(kind, WireErrorKind::ToolFailed);
                assert_eq!(detail, "provider 500");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_close_delivers_eof_to_worker() {
        let (orchestrator_side, worker_side) = duplex(4096);
        let (read_half, write_half) = split(orchestrator_side);
        let peer = RpcPeer::spawn(read_half, write_half);

        let (worker_read, _worker_write) = split(worker_side);
        peer.close().await.unwrap();

        // The worker's read side must observe EOF, not just a flush.
        let mut reader = BufReader::new(worker_read);
        let mut line = String::new();
        let bytes_read = reader.read_line(&mut line).await.unwrap();
        assert_eq!(bytes_read, 0);

        // Closing again is a no-op, and later invokes fail at the write.
        peer.close().await.unwrap();
        let err = peer.invoke("mail.send_message", BTreeMap::new()).await;
        assert!(matches!(err, Err(RpcError::ChannelClosed)));
    }

    #[tokio::test]
    async fn test_first_frame_must_be_a_manifest() {
        let (orchestrator_side, worker_side) = duplex(4096);
        let (read_half, write_half) = split(orchestrator_side);
        let peer = RpcPeer::spawn(read_half, write_half);

        let (_worker_read, mut worker_write) = split(worker_side);
        write_frame(
            &mut worker_write,
            &Frame::result(errand_core::MessageId::generate(), json!("out of turn")),
        )
        .await;

        // The read loop drops the channel, so the manifest never arrives.
        let err = peer.manifest().await.unwrap_err();
        assert!(matches!(err, RpcError::ChannelClosed));
    }

    #[tokio::test]
    async fn test_peer_drops_pending_on_worker_crash() {
        let (orchestrator_side, worker_side) = duplex(4096);
        let (read_half, write_half) = split(orchestrator_side);
        let peer = RpcPeer::spawn(read_half, write_half);

        let (worker_read, worker_write) = split(worker_side);
        tokio::spawn(async move {
            let mut reader = BufReader::new(worker_read);
            let mut line = String::new();
            reader.read_line(&mut line).await.unwrap();
            // Simulate a crash: drop both halves without answering.
            drop(reader);
            drop(worker_write);
        });

        let err = peer
            .invoke("calendar.create_event", BTreeMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RpcError::ChannelClosed));

        // The channel stays unusable afterwards.
        let err = peer.invoke("calendar.list_events", BTreeMap::new()).await;
        assert!(matches!(err, Err(RpcError::ChannelClosed)));
    }
}
