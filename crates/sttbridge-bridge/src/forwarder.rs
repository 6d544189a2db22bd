use crate::connection::TranscriptSink;
use futures::StreamExt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use sttbridge_backend::ResponseStream;
use sttbridge_core::{BackendError, TranscriptResult};

/// How forwarding stopped, when it stopped without a backend error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardEnd {
    /// The backend finished its response stream.
    BackendDone,
    /// The client could no longer be written to.
    SinkClosed,
}

/// Drains backend responses and writes the best transcript of every result
/// to the sink, one at a time and in emission order.
pub struct ResponseForwarder<S> {
    sink: S,
    forwarded: Arc<AtomicUsize>,
}

impl<S: TranscriptSink> ResponseForwarder<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            forwarded: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn forwarded(&self) -> usize {
        self.forwarded.load(Ordering::Acquire)
    }

    /// Live view of the forwarded count, readable after the forwarder is gone.
    pub fn forwarded_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.forwarded)
    }

    /// Run until the backend stream ends, fails, or the sink goes away.
    ///
    /// The response stream is consumed here and dropped on return, which
    /// closes the backend call. Transcripts sent before a backend error
    /// stay delivered.
    pub async fn run(
        &mut self,
        mut responses: ResponseStream,
    ) -> Result<ForwardEnd, BackendError> {
        while let Some(item) = responses.next().await {
            let response = match item {
                Ok(response) => response,
                Err(e) => return Err(e),
            };
            for result in &response.results {
                let Some(transcript) = TranscriptResult::from_result(result) else {
                    tracing::trace!("result without alternatives skipped");
                    continue;
                };
                if let Err(e) = self.sink.send_transcript(&transcript).await {
                    tracing::warn!(forwarded = self.forwarded(), "stopped forwarding: {e}");
                    return Ok(ForwardEnd::SinkClosed);
                }
                self.forwarded.fetch_add(1, Ordering::AcqRel);
                tracing::trace!(is_final = transcript.is_final, "forwarded: {}", transcript.text);
            }
        }
        Ok(ForwardEnd::BackendDone)
    }

    pub async fn close(mut self) {
        self.sink.close().await;
    }
}
