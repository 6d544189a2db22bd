pub mod proto;

use crate::backend_trait::{RequestStream, ResponseStream, SpeechBackend};
use async_trait::async_trait;
use futures::{stream, StreamExt};
use proto::streaming_recognize_request::StreamingRequest;
use sttbridge_core::{
    Alternative, AudioEncoding, BackendError, RecognitionConfig, RecognitionResponse,
    SpeechResult,
};
use tonic::codec::ProstCodec;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::metadata::{Ascii, MetadataValue};
use tonic::transport::{Channel, ClientTlsConfig, Endpoint};

const STREAMING_RECOGNIZE_PATH: &str =
    "/google.cloud.speech.v1p1beta1.Speech/StreamingRecognize";
const DEFAULT_ENDPOINT: &str = "https://speech.googleapis.com";

/// Cloud Speech `StreamingRecognize` over gRPC.
///
/// Authentication is a bearer token taken from config; obtaining and
/// refreshing it is left to whoever writes the config.
pub struct GoogleBackend {
    endpoint: Option<String>,
    authorization: Option<MetadataValue<Ascii>>,
    channel: Option<Channel>,
}

impl GoogleBackend {
    pub fn new() -> Self {
        Self {
            endpoint: None,
            authorization: None,
            channel: None,
        }
    }
}

impl Default for GoogleBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SpeechBackend for GoogleBackend {
    fn name(&self) -> &str {
        "google"
    }

    async fn initialize(&mut self, config: toml::Value) -> Result<(), BackendError> {
        let token = config
            .get("access_token")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                BackendError::InitializationFailed(
                    "missing 'access_token' in google config".to_string(),
                )
            })?;
        let authorization: MetadataValue<Ascii> =
            format!("Bearer {token}").parse().map_err(|_| {
                BackendError::InitializationFailed(
                    "access_token is not valid header text".to_string(),
                )
            })?;

        let endpoint_uri = config
            .get("endpoint")
            .and_then(|v| v.as_str())
            .unwrap_or(DEFAULT_ENDPOINT)
            .to_string();

        let mut endpoint = Endpoint::from_shared(endpoint_uri.clone())
            .map_err(|e| BackendError::InitializationFailed(format!("bad endpoint: {e}")))?;
        if endpoint_uri.starts_with("https://") {
            endpoint = endpoint
                .tls_config(ClientTlsConfig::new().with_native_roots())
                .map_err(|e| BackendError::InitializationFailed(format!("tls: {e}")))?;
        }

        self.channel = Some(endpoint.connect_lazy());
        self.authorization = Some(authorization);
        tracing::info!(endpoint = %endpoint_uri, "GoogleBackend initialized");
        self.endpoint = Some(endpoint_uri);
        Ok(())
    }

    async fn start_streaming(
        &self,
        config: RecognitionConfig,
        requests: RequestStream,
    ) -> Result<ResponseStream, BackendError> {
        let (channel, authorization) = match (&self.channel, &self.authorization) {
            (Some(channel), Some(auth)) => (channel.clone(), auth.clone()),
            _ => {
                return Err(BackendError::InitializationFailed(
                    "google backend not initialized".to_string(),
                ))
            }
        };

        // The first message carries the config; audio follows.
        let first = proto::StreamingRecognizeRequest {
            streaming_request: Some(StreamingRequest::StreamingConfig(streaming_config(
                &config,
            )?)),
        };
        let outbound = stream::once(async move { first }).chain(requests.map(|req| {
            proto::StreamingRecognizeRequest {
                streaming_request: Some(StreamingRequest::AudioContent(req.audio.into_bytes())),
            }
        }));

        let mut request = tonic::Request::new(outbound);
        request.metadata_mut().insert("authorization", authorization);

        let mut grpc = tonic::client::Grpc::new(channel);
        grpc.ready()
            .await
            .map_err(|e| BackendError::Connect(e.to_string()))?;

        let codec: ProstCodec<proto::StreamingRecognizeRequest, proto::StreamingRecognizeResponse> =
            ProstCodec::default();
        let response = grpc
            .streaming(
                request,
                PathAndQuery::from_static(STREAMING_RECOGNIZE_PATH),
                codec,
            )
            .await
            .map_err(status_to_error)?;

        tracing::debug!(
            endpoint = ?self.endpoint,
            language = %config.language_code,
            "StreamingRecognize call open"
        );

        let inbound = response.into_inner().map(|item| match item {
            Ok(resp) => convert_response(resp),
            Err(status) => Err(status_to_error(status)),
        });
        Ok(inbound.boxed())
    }
}

fn encoding_value(encoding: AudioEncoding) -> i32 {
    match encoding {
        AudioEncoding::Linear16 => 1,
        AudioEncoding::Flac => 2,
        AudioEncoding::Mulaw => 3,
        AudioEncoding::OggOpus => 6,
        AudioEncoding::Mp3 => 8,
        AudioEncoding::WebmOpus => 9,
    }
}

fn proto_int(field: &str, value: u32) -> Result<i32, BackendError> {
    i32::try_from(value).map_err(|_| {
        BackendError::InitializationFailed(format!("{field} out of range: {value}"))
    })
}

fn streaming_config(
    config: &RecognitionConfig,
) -> Result<proto::StreamingRecognitionConfig, BackendError> {
    Ok(proto::StreamingRecognitionConfig {
        config: Some(proto::RecognitionConfig {
            encoding: encoding_value(config.encoding),
            sample_rate_hertz: proto_int("sample_rate_hertz", config.sample_rate_hertz)?,
            language_code: config.language_code.clone(),
            max_alternatives: proto_int("max_alternatives", config.max_alternatives)?,
            enable_automatic_punctuation: config.enable_automatic_punctuation,
            model: config.model.clone().unwrap_or_default(),
            use_enhanced: config.use_enhanced,
        }),
        single_utterance: false,
        interim_results: config.interim_results,
    })
}

fn convert_response(
    resp: proto::StreamingRecognizeResponse,
) -> Result<RecognitionResponse, BackendError> {
    if let Some(status) = resp.error.filter(|s| s.code != 0) {
        return Err(BackendError::Rejected {
            code: status.code,
            message: status.message,
        });
    }
    let results = resp
        .results
        .into_iter()
        .map(|r| SpeechResult {
            alternatives: r
                .alternatives
                .into_iter()
                .map(|a| Alternative {
                    transcript: a.transcript,
                    confidence: a.confidence,
                })
                .collect(),
            is_final: r.is_final,
        })
        .collect();
    Ok(RecognitionResponse { results })
}

fn status_to_error(status: tonic::Status) -> BackendError {
    BackendError::Stream(format!("{:?}: {}", status.code(), status.message()))
}
