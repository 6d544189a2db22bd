use crate::connection::{FrameSource, TranscriptSink};
use crate::emitter::RequestEmitter;
use crate::forwarder::{ForwardEnd, ResponseForwarder};
use crate::relay::{relay_channel, RelayReceiver, RelaySender};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use sttbridge_backend::SpeechBackend;
use sttbridge_core::{AppConfig, BackendError, IngressError, RecognitionConfig};
use tokio::sync::oneshot;
use tokio::task::JoinError;

/// Extra time the egress task gets to close the sink after its own drain
/// deadline, before it is aborted outright.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Active,
    Draining,
    Closed,
}

/// Why the ingress loop stopped.
#[derive(Debug)]
pub enum IngressEnd {
    Disconnected,
    ReceiveFailed(IngressError),
    /// The backend side finished first.
    EgressFinished,
}

/// Result of the egress task: the backend call plus forwarding.
#[derive(Debug)]
pub enum EgressOutcome {
    Completed { forwarded: usize },
    SinkClosed { forwarded: usize },
    Failed { error: BackendError, forwarded: usize },
    /// The backend did not finish within the drain timeout. Its call was
    /// dropped; transcripts sent before that stay delivered.
    TimedOut { forwarded: usize },
}

impl EgressOutcome {
    pub fn forwarded(&self) -> usize {
        match self {
            Self::Completed { forwarded }
            | Self::SinkClosed { forwarded }
            | Self::Failed { forwarded, .. }
            | Self::TimedOut { forwarded } => *forwarded,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. } | Self::TimedOut { .. })
    }
}

#[derive(Debug)]
pub struct SessionReport {
    pub session_id: u64,
    pub chunks_received: usize,
    pub ingress: IngressEnd,
    pub egress: EgressOutcome,
    /// Always `Closed` once `run` returns.
    pub final_state: SessionState,
}

/// Per-session parameters, copied out of the app config at accept time.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub recognition: RecognitionConfig,
    pub drain_timeout: Duration,
}

impl SessionSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            recognition: config.recognition.clone(),
            drain_timeout: config.bridge.drain_timeout(),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            recognition: RecognitionConfig::default(),
            drain_timeout: Duration::from_secs(10),
        }
    }
}

/// State machine half of a session: owns the relay producer.
struct Lifecycle {
    id: u64,
    state: SessionState,
    relay: RelaySender,
}

impl Lifecycle {
    fn begin_draining(&mut self) -> bool {
        if self.state != SessionState::Active {
            return false;
        }
        self.state = SessionState::Draining;
        self.relay.end();
        tracing::debug!(session_id = self.id, "session draining");
        true
    }

    fn close(&mut self) {
        self.begin_draining();
        self.state = SessionState::Closed;
    }
}

/// One client connection bridged to one backend streaming call.
///
/// Created on accept, driven to completion by [`run`](Self::run), never reused.
pub struct BridgeSession {
    lifecycle: Lifecycle,
    relay_rx: RelayReceiver,
    backend: Arc<dyn SpeechBackend>,
    settings: SessionSettings,
}

impl BridgeSession {
    pub fn new(id: u64, backend: Arc<dyn SpeechBackend>, settings: SessionSettings) -> Self {
        let (relay, relay_rx) = relay_channel();
        Self {
            lifecycle: Lifecycle {
                id,
                state: SessionState::Active,
                relay,
            },
            relay_rx,
            backend,
            settings,
        }
    }

    pub fn id(&self) -> u64 {
        self.lifecycle.id
    }

    pub fn state(&self) -> SessionState {
        self.lifecycle.state
    }

    /// Enter Draining and push end-of-audio. Returns `false` if the session
    /// had already left Active, in which case nothing happens.
    pub fn begin_draining(&mut self) -> bool {
        self.lifecycle.begin_draining()
    }

    /// Pump `source` into the backend and backend results into `sink` until
    /// either side finishes, then tear down.
    pub async fn run<Src, Snk>(self, mut source: Src, sink: Snk) -> SessionReport
    where
        Src: FrameSource,
        Snk: TranscriptSink + 'static,
    {
        let BridgeSession {
            mut lifecycle,
            relay_rx,
            backend,
            settings,
        } = self;
        let session_id = lifecycle.id;

        tracing::info!(session_id, backend = %backend.name(), "session started");

        let emitter = RequestEmitter::new(relay_rx);
        let forwarder = ResponseForwarder::new(sink);
        let forwarded = forwarder.forwarded_counter();
        let (drain_tx, drain_rx) = oneshot::channel();
        let mut egress = tokio::spawn(run_egress(
            session_id,
            backend,
            settings.recognition,
            emitter,
            forwarder,
            DrainDeadline {
                started: drain_rx,
                timeout: settings.drain_timeout,
            },
        ));

        let mut chunks_received = 0usize;
        let mut finished_egress = None;

        let ingress = if lifecycle.state != SessionState::Active {
            IngressEnd::Disconnected
        } else {
            loop {
                tokio::select! {
                    frame = source.next_frame() => match frame {
                        Ok(Some(chunk)) => {
                            chunks_received += 1;
                            if !lifecycle.relay.push_chunk(chunk) {
                                tracing::trace!(session_id, "chunk dropped, backend side gone");
                            }
                        }
                        Ok(None) => break IngressEnd::Disconnected,
                        Err(e) => break IngressEnd::ReceiveFailed(e),
                    },
                    joined = &mut egress => {
                        finished_egress = Some(joined_outcome(joined, forwarded.load(Ordering::Acquire)));
                        break IngressEnd::EgressFinished;
                    }
                }
            }
        };
        drop(source);

        match &ingress {
            IngressEnd::Disconnected => {
                tracing::info!(session_id, chunks = chunks_received, "client disconnected")
            }
            IngressEnd::ReceiveFailed(e) => {
                tracing::warn!(session_id, chunks = chunks_received, "receive failed: {e}")
            }
            IngressEnd::EgressFinished => {
                tracing::debug!(session_id, "backend finished before client")
            }
        }

        lifecycle.begin_draining();
        // Egress may already be done, in which case nobody is listening
        let _ = drain_tx.send(());

        let egress_outcome = match finished_egress {
            Some(outcome) => outcome,
            None => {
                let limit = settings.drain_timeout + CLOSE_GRACE;
                match tokio::time::timeout(limit, &mut egress).await {
                    Ok(joined) => joined_outcome(joined, forwarded.load(Ordering::Acquire)),
                    Err(_) => {
                        tracing::warn!(session_id, "egress stuck closing the client, aborting");
                        egress.abort();
                        let _ = egress.await;
                        EgressOutcome::TimedOut {
                            forwarded: forwarded.load(Ordering::Acquire),
                        }
                    }
                }
            }
        };

        lifecycle.close();
        log_outcome(session_id, &egress_outcome);

        SessionReport {
            session_id,
            chunks_received,
            ingress,
            egress: egress_outcome,
            final_state: lifecycle.state,
        }
    }
}

/// Bounds how long the backend may keep running once draining has begun.
struct DrainDeadline {
    started: oneshot::Receiver<()>,
    timeout: Duration,
}

impl DrainDeadline {
    async fn expired(self) {
        // A dropped sender means the session is tearing down: start counting
        let _ = self.started.await;
        tokio::time::sleep(self.timeout).await;
    }
}

async fn run_egress<S: TranscriptSink>(
    session_id: u64,
    backend: Arc<dyn SpeechBackend>,
    recognition: RecognitionConfig,
    emitter: RequestEmitter,
    mut forwarder: ResponseForwarder<S>,
    deadline: DrainDeadline,
) -> EgressOutcome {
    let streamed = tokio::select! {
        outcome = stream_responses(session_id, backend, recognition, emitter, &mut forwarder) => Some(outcome),
        _ = deadline.expired() => None,
    };
    let outcome = streamed.unwrap_or_else(|| EgressOutcome::TimedOut {
        forwarded: forwarder.forwarded(),
    });
    // The backend call is dropped by now; the client still gets a clean close
    forwarder.close().await;
    outcome
}

async fn stream_responses<S: TranscriptSink>(
    session_id: u64,
    backend: Arc<dyn SpeechBackend>,
    recognition: RecognitionConfig,
    emitter: RequestEmitter,
    forwarder: &mut ResponseForwarder<S>,
) -> EgressOutcome {
    let responses = match backend
        .start_streaming(recognition, emitter.into_request_stream())
        .await
    {
        Ok(responses) => responses,
        Err(error) => {
            return EgressOutcome::Failed {
                error,
                forwarded: 0,
            }
        }
    };
    tracing::debug!(session_id, "backend stream open");

    match forwarder.run(responses).await {
        Ok(ForwardEnd::BackendDone) => EgressOutcome::Completed {
            forwarded: forwarder.forwarded(),
        },
        Ok(ForwardEnd::SinkClosed) => EgressOutcome::SinkClosed {
            forwarded: forwarder.forwarded(),
        },
        Err(error) => EgressOutcome::Failed {
            error,
            forwarded: forwarder.forwarded(),
        },
    }
}

fn joined_outcome(joined: Result<EgressOutcome, JoinError>, forwarded: usize) -> EgressOutcome {
    joined.unwrap_or_else(|e| EgressOutcome::Failed {
        error: BackendError::TaskFailed(e.to_string()),
        forwarded,
    })
}

fn log_outcome(session_id: u64, outcome: &EgressOutcome) {
    match outcome {
        EgressOutcome::Completed { forwarded } => {
            tracing::info!(session_id, forwarded, "session closed")
        }
        EgressOutcome::SinkClosed { forwarded } => {
            tracing::info!(session_id, forwarded, "session closed, client stopped receiving")
        }
        EgressOutcome::Failed { error, forwarded } => {
            tracing::error!(session_id, forwarded, "session closed on backend error: {error}")
        }
        EgressOutcome::TimedOut { forwarded } => {
            tracing::warn!(session_id, forwarded, "session closed, backend did not drain in time")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use sttbridge_backend::{NullBackend, RequestStream, ResponseStream};
    use sttbridge_core::{AudioChunk, EgressSendError, TranscriptResult};
    use tokio::sync::mpsc;

    struct ChannelSource(mpsc::UnboundedReceiver<Vec<u8>>);

    #[async_trait]
    impl FrameSource for ChannelSource {
        async fn next_frame(&mut self) -> Result<Option<AudioChunk>, IngressError> {
            Ok(self.0.recv().await.map(AudioChunk::new))
        }
    }

    #[derive(Clone, Default)]
    struct VecSink(Arc<Mutex<Vec<String>>>);

    #[async_trait]
    impl TranscriptSink for VecSink {
        async fn send_transcript(
            &mut self,
            transcript: &TranscriptResult,
        ) -> Result<(), EgressSendError> {
            self.0.lock().unwrap().push(transcript.text.clone());
            Ok(())
        }
    }

    struct RefusingBackend;

    #[async_trait]
    impl SpeechBackend for RefusingBackend {
        fn name(&self) -> &str {
            "refusing"
        }

        async fn initialize(&mut self, _config: toml::Value) -> Result<(), BackendError> {
            Ok(())
        }

        async fn start_streaming(
            &self,
            _config: RecognitionConfig,
            _requests: RequestStream,
        ) -> Result<ResponseStream, BackendError> {
            Err(BackendError::Connect("connection refused".to_string()))
        }
    }

    fn null_session() -> BridgeSession {
        BridgeSession::new(1, Arc::new(NullBackend::new()), SessionSettings::default())
    }

    #[test]
    fn test_new_session_is_active() {
        let session = null_session();
        assert_eq!(session.id(), 1);
        assert_eq!(session.state(), SessionState::Active);
    }

    #[test]
    fn test_begin_draining_only_once() {
        let mut session = null_session();
        assert!(session.begin_draining());
        assert_eq!(session.state(), SessionState::Draining);
        assert!(!session.begin_draining());
        assert_eq!(session.state(), SessionState::Draining);
    }

    #[test]
    fn test_settings_from_config_copies_recognition() {
        let config = AppConfig::from_toml_str(
            r#"
[bridge]
drain_timeout_ms = 1500

[recognition]
language_code = "en-US"
"#,
        )
        .unwrap();
        let settings = SessionSettings::from_config(&config);
        assert_eq!(settings.recognition.language_code, "en-US");
        assert_eq!(settings.drain_timeout, Duration::from_millis(1500));
    }

    #[tokio::test]
    async fn test_run_forwards_null_results_and_closes() {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = VecSink::default();
        let sent = Arc::clone(&sink.0);

        tx.send(vec![0; 10]).unwrap();
        tx.send(vec![0; 20]).unwrap();
        drop(tx);

        let report = tokio::time::timeout(
            Duration::from_secs(2),
            null_session().run(ChannelSource(rx), sink),
        )
        .await
        .expect("session hung");

        assert_eq!(report.chunks_received, 2);
        assert_eq!(report.final_state, SessionState::Closed);
        assert!(matches!(report.ingress, IngressEnd::Disconnected));
        assert!(matches!(report.egress, EgressOutcome::Completed { forwarded: 2 }));
        assert_eq!(
            *sent.lock().unwrap(),
            vec!["[null] 10 bytes", "[null] 20 bytes"]
        );
    }

    #[tokio::test]
    async fn test_run_backend_refusal_ends_session_while_client_idle() {
        let (tx, rx) = mpsc::unbounded_channel::<Vec<u8>>();
        let session = BridgeSession::new(7, Arc::new(RefusingBackend), SessionSettings::default());

        let report = tokio::time::timeout(
            Duration::from_secs(2),
            session.run(ChannelSource(rx), VecSink::default()),
        )
        .await
        .expect("session hung");

        assert!(matches!(report.ingress, IngressEnd::EgressFinished));
        assert!(matches!(
            report.egress,
            EgressOutcome::Failed {
                error: BackendError::Connect(_),
                forwarded: 0
            }
        ));
        assert!(report.egress.is_failure());
        // The client side is still open; sending must not panic or block
        let _ = tx.send(vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_run_after_draining_skips_ingress() {
        let (_tx, rx) = mpsc::unbounded_channel::<Vec<u8>>();
        let mut session = null_session();
        session.begin_draining();

        let report = tokio::time::timeout(
            Duration::from_secs(2),
            session.run(ChannelSource(rx), VecSink::default()),
        )
        .await
        .expect("session hung");

        assert_eq!(report.chunks_received, 0);
        assert!(matches!(report.egress, EgressOutcome::Completed { forwarded: 0 }));
    }

    #[test]
    fn test_joined_outcome_maps_panic_to_failure() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let joined = rt.block_on(async {
            tokio::spawn(async { panic!("boom") })
                .await
                .map(|()| EgressOutcome::Completed { forwarded: 0 })
        });
        assert!(matches!(
            joined_outcome(joined, 3),
            EgressOutcome::Failed {
                error: BackendError::TaskFailed(_),
                forwarded: 3
            }
        ));
    }
}
