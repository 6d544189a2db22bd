use crate::relay::{RelayItem, RelayReceiver};
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::task::{Context, Poll};
use sttbridge_backend::RequestStream;
use sttbridge_core::RecognizeRequest;

/// Turns relay items into backend requests, one per chunk.
///
/// Ends on `EndOfAudio` or when the relay closes, and never restarts.
pub struct RequestEmitter {
    relay: RelayReceiver,
    finished: bool,
    emitted: usize,
}

impl RequestEmitter {
    pub fn new(relay: RelayReceiver) -> Self {
        Self {
            relay,
            finished: false,
            emitted: 0,
        }
    }

    pub fn into_request_stream(self) -> RequestStream {
        self.boxed()
    }
}

impl Stream for RequestEmitter {
    type Item = RecognizeRequest;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.finished {
            return Poll::Ready(None);
        }
        match self.relay.poll_pull(cx) {
            Poll::Ready(Some(RelayItem::Chunk(audio))) => {
                self.emitted += 1;
                Poll::Ready(Some(RecognizeRequest { audio }))
            }
            Poll::Ready(Some(RelayItem::EndOfAudio)) => {
                tracing::debug!(requests = self.emitted, "end of audio, request stream done");
                self.finish();
                Poll::Ready(None)
            }
            Poll::Ready(None) => {
                tracing::debug!(
                    requests = self.emitted,
                    "relay closed without end of audio"
                );
                self.finish();
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl RequestEmitter {
    fn finish(&mut self) {
        self.finished = true;
        self.relay.close();
    }
}
