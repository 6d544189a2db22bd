use async_trait::async_trait;
use futures::stream::BoxStream;
use sttbridge_core::{BackendError, RecognitionConfig, RecognitionResponse, RecognizeRequest};

/// Outbound half of a streaming call. The backend pulls from it at its own pace.
pub type RequestStream = BoxStream<'static, RecognizeRequest>;

/// Inbound half of a streaming call. Dropping it closes the call.
pub type ResponseStream = BoxStream<'static, Result<RecognitionResponse, BackendError>>;

/// A streaming speech-recognition service.
///
/// Implementations are created through [`BackendRegistry`](crate::BackendRegistry),
/// initialised once with plugin-specific TOML, and then shared by every
/// session. Per-stream parameters arrive with each
/// [`start_streaming`](Self::start_streaming) call, so a backend keeps no
/// per-session state of its own.
#[async_trait]
pub trait SpeechBackend: Send + Sync {
    /// Returns the backend's plugin name (e.g. `"null"`, `"google"`).
    fn name(&self) -> &str;
    /// One-time initialisation with backend-specific TOML configuration.
    async fn initialize(&mut self, config: toml::Value) -> Result<(), BackendError>;
    /// Open a bidirectional stream fed by `requests`.
    ///
    /// The returned stream yields responses in emission order and ends when
    /// the backend finishes, which normally happens after `requests` ends.
    async fn start_streaming(
        &self,
        config: RecognitionConfig,
        requests: RequestStream,
    ) -> Result<ResponseStream, BackendError>;
}
