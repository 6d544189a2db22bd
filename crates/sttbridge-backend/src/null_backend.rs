use crate::backend_trait::{RequestStream, ResponseStream, SpeechBackend};
use async_trait::async_trait;
use futures::StreamExt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use sttbridge_core::{
    Alternative, BackendError, RecognitionConfig, RecognitionResponse, SpeechResult,
};

/// Credential-free backend: answers each request with one final result
/// describing the chunk size, and ends when the request stream ends.
pub struct NullBackend {
    stream_count: AtomicUsize,
    request_count: Arc<AtomicUsize>,
}

impl NullBackend {
    pub fn new() -> Self {
        Self {
            stream_count: AtomicUsize::new(0),
            request_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn stream_count(&self) -> usize {
        self.stream_count.load(Ordering::Relaxed)
    }

    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::Relaxed)
    }
}

impl Default for NullBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SpeechBackend for NullBackend {
    fn name(&self) -> &str {
        "null"
    }

    async fn initialize(&mut self, _config: toml::Value) -> Result<(), BackendError> {
        Ok(())
    }

    async fn start_streaming(
        &self,
        config: RecognitionConfig,
        requests: RequestStream,
    ) -> Result<ResponseStream, BackendError> {
        let stream_no = self.stream_count.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::debug!(
            stream = stream_no,
            language = %config.language_code,
            "NullBackend stream opened"
        );

        let counter = Arc::clone(&self.request_count);
        let responses = requests.map(move |req| {
            let n = counter.fetch_add(1, Ordering::Relaxed) + 1;
            tracing::trace!("NullBackend request #{n}, {} bytes", req.audio.len());
            Ok(RecognitionResponse {
                results: vec![SpeechResult {
                    alternatives: vec![Alternative {
                        transcript: format!("[null] {} bytes", req.audio.len()),
                        confidence: 1.0,
                    }],
                    is_final: true,
                }],
            })
        });
        Ok(responses.boxed())
    }
}
