//! Streaming bridge between a client audio connection and a speech backend.
//!
//! Audio flows `FrameSource -> relay -> RequestEmitter -> backend`, and
//! transcripts flow `backend -> ResponseForwarder -> TranscriptSink`. A
//! [`BridgeSession`] owns both directions for one connection.

pub mod connection;
pub mod emitter;
pub mod forwarder;
pub mod relay;
pub mod session;

pub use connection::{FrameSource, TranscriptSink};
pub use emitter::RequestEmitter;
pub use forwarder::{ForwardEnd, ResponseForwarder};
pub use relay::{relay_channel, RelayItem, RelayReceiver, RelaySender};
pub use session::{
    BridgeSession, EgressOutcome, IngressEnd, SessionReport, SessionSettings, SessionState,
};
