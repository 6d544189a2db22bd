use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};
use sttbridge_core::AudioChunk;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayItem {
    Chunk(AudioChunk),
    EndOfAudio,
}

/// Create the per-session audio hand-off: unbounded, FIFO, single producer.
pub fn relay_channel() -> (RelaySender, RelayReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        RelaySender {
            tx,
            ended: AtomicBool::new(false),
        },
        RelayReceiver { rx },
    )
}

/// Producer side. Pushing never waits.
///
/// Once `EndOfAudio` has been pushed every later push is refused, so the
/// marker is always the last item the consumer sees.
pub struct RelaySender {
    tx: mpsc::UnboundedSender<RelayItem>,
    ended: AtomicBool,
}

impl RelaySender {
    /// Returns `false` when the chunk was dropped: either the stream already
    /// ended or the consumer has gone away. Neither is an error.
    pub fn push_chunk(&self, chunk: AudioChunk) -> bool {
        if self.ended.load(Ordering::Acquire) {
            tracing::trace!("relay ended, dropping {} byte chunk", chunk.len());
            return false;
        }
        self.tx.send(RelayItem::Chunk(chunk)).is_ok()
    }

    /// Push `EndOfAudio`. Only the first call has any effect.
    pub fn end(&self) -> bool {
        if self.ended.swap(true, Ordering::AcqRel) {
            return false;
        }
        if self.tx.send(RelayItem::EndOfAudio).is_err() {
            tracing::trace!("relay consumer gone before end-of-audio");
        }
        true
    }

}

/// Consumer side. `None` from a pull means the channel is closed: the
/// sender was dropped without ending the stream.
pub struct RelayReceiver {
    rx: mpsc::UnboundedReceiver<RelayItem>,
}

impl RelayReceiver {
    pub fn poll_pull(&mut self, cx: &mut Context<'_>) -> Poll<Option<RelayItem>> {
        self.rx.poll_recv(cx)
    }

    /// Refuse further pushes. Items already queued can still be pulled.
    pub fn close(&mut self) {
        self.rx.close();
    }
}
