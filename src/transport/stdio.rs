//! Newline-delimited JSON envelopes over byte streams.

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::LinesStream;
use tokio_stream::StreamExt;

use super::Transport;
use crate::error::Result;
use crate::types::Envelope;

/// Writes each outbound envelope as one JSON line.
pub struct StdioTransport<W = tokio::io::Stdout> {
    writer: Mutex<W>,
}

impl StdioTransport {
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

impl<W> StdioTransport<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

#[async_trait]
impl<W> Transport for StdioTransport<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn send(&self, envelope: Envelope) -> Result<()> {
        let mut line = serde_json::to_vec(&envelope)?;
        line.push(b'\n');
        let mut writer = self.writer.lock().await;
        writer.write_all(&line).await?;
        writer.flush().await?;
        Ok(())
    }
}

/// Read JSON-line envelopes from `reader` into a channel.
///
/// Blank and malformed lines are skipped. The channel closes at end of input.
pub fn spawn_line_reader<R>(reader: R, capacity: usize) -> (mpsc::Receiver<Envelope>, JoinHandle<()>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let handle = tokio::spawn(async move {
        let mut lines = LinesStream::new(BufReader::new(reader).lines());
        while let Some(line) = lines.next().await {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    tracing::warn!(error = %e, "inbound stream read failed");
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Envelope>(&line) {
                Ok(envelope) => {
                    if tx.send(envelope).await.is_err() {
                        break;
                    }
                }
                Err(e) => tracing::warn!(error = %e, "dropping malformed envelope line"),
            }
        }
    });
    (rx, handle)
}
