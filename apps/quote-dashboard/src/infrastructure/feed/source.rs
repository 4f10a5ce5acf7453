//! Line Feed Source
//!
//! [`FeedSource`] over any newline-delimited byte stream (stdin, a replay
//! file, an in-memory buffer). A reader task decodes lines into a bounded
//! channel; the source holds a drop guard on the task's cancellation token,
//! so the reader stops when the source is closed or dropped.

use std::path::Path;

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};

use super::codec::EnvelopeCodec;
use crate::application::ports::{FeedError, FeedEvent, FeedSource};

type FeedItem = Result<FeedEvent, FeedError>;

/// Feed source reading NDJSON envelopes line by line.
pub struct LineFeedSource {
    rx: mpsc::Receiver<FeedItem>,
    cancel: CancellationToken,
    reader: Option<JoinHandle<()>>,
    _guard: DropGuard,
}

impl LineFeedSource {
    /// Start reading from `reader` on a background task.
    ///
    /// At most `buffer` decoded events are held ahead of the consumer.
    #[must_use]
    pub fn spawn<R>(reader: R, buffer: usize) -> Self
    where
        R: AsyncBufRead + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let cancel = CancellationToken::new();
        let reader = tokio::spawn(read_lines(reader, tx, cancel.clone()));

        Self {
            rx,
            _guard: cancel.clone().drop_guard(),
            cancel,
            reader: Some(reader),
        }
    }

    /// Read from standard input.
    #[must_use]
    pub fn stdin(buffer: usize) -> Self {
        Self::spawn(BufReader::new(tokio::io::stdin()), buffer)
    }

    /// Read a replay file.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Transport`] if the file cannot be opened.
    pub async fn open(path: &Path, buffer: usize) -> Result<Self, FeedError> {
        let file = tokio::fs::File::open(path)
            .await
            .map_err(|e| FeedError::Transport(format!("{}: {e}", path.display())))?;
        Ok(Self::spawn(BufReader::new(file), buffer))
    }
}

#[async_trait]
impl FeedSource for LineFeedSource {
    async fn next_event(&mut self) -> Result<Option<FeedEvent>, FeedError> {
        self.rx.recv().await.transpose()
    }

    async fn close(&mut self) {
        self.cancel.cancel();
        self.rx.close();
        if let Some(reader) = self.reader.take() {
            if let Err(e) = reader.await {
                tracing::warn!(error = %e, "feed reader task failed");
            }
        }
        tracing::debug!("feed source closed");
    }
}

impl std::fmt::Debug for LineFeedSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineFeedSource")
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

async fn read_lines<R>(mut reader: R, tx: mpsc::Sender<FeedItem>, cancel: CancellationToken)
where
    R: AsyncBufRead + Unpin,
{
    let codec = EnvelopeCodec::new();
    let mut buf = Vec::new();
    let mut line_no: u64 = 0;

    loop {
        buf.clear();
        let read = tokio::select! {
            () = cancel.cancelled() => break,
            read = reader.read_until(b'\n', &mut buf) => read,
        };

        let (item, last) = match read {
            Ok(0) => break,
            Ok(_) => {
                line_no += 1;
                match decode_line(&codec, &buf) {
                    Ok(Some(event)) => (Ok(event), false),
                    Ok(None) => continue,
                    Err(message) => (
                        Err(FeedError::Decode {
                            line: line_no,
                            message,
                        }),
                        false,
                    ),
                }
            }
            Err(e) => (Err(FeedError::Transport(e.to_string())), true),
        };

        tokio::select! {
            () = cancel.cancelled() => break,
            sent = tx.send(item) => {
                if sent.is_err() || last {
                    break;
                }
            }
        }
    }

    tracing::debug!(lines = line_no, "feed reader finished");
}

/// Decode one raw line, without its `\n` or `\r\n` terminator.
fn decode_line(codec: &EnvelopeCodec, raw: &[u8]) -> Result<Option<FeedEvent>, String> {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);

    let line = std::str::from_utf8(raw).map_err(|e| format!("invalid UTF-8: {e}"))?;
    codec.decode(line).map_err(|e| e.to_string())
}

// =============================================================================
// Tests
// =============================================================================
