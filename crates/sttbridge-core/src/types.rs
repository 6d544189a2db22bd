use serde::Serialize;

/// Opaque slice of raw audio, exactly as received from the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunk {
    data: Vec<u8>,
}

impl AudioChunk {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

impl From<Vec<u8>> for AudioChunk {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

/// One outbound message on the backend request stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognizeRequest {
    pub audio: AudioChunk,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Alternative {
    pub transcript: String,
    pub confidence: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpeechResult {
    /// Ranked best-first.
    pub alternatives: Vec<Alternative>,
    pub is_final: bool,
}

impl SpeechResult {
    pub fn best_transcript(&self) -> Option<&str> {
        self.alternatives.first().map(|a| a.transcript.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecognitionResponse {
    pub results: Vec<SpeechResult>,
}

/// What the client receives: `{"text": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscriptResult {
    pub text: String,
    #[serde(skip)]
    pub is_final: bool,
}

impl TranscriptResult {
    pub fn from_result(result: &SpeechResult) -> Option<Self> {
        result.best_transcript().map(|text| Self {
            text: text.to_string(),
            is_final: result.is_final,
        })
    }
}
