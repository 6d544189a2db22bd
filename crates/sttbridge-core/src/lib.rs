pub mod config;
pub mod error;
pub mod types;

pub use config::{AppConfig, AudioEncoding, BackendConfig, GoogleConfig, RecognitionConfig};
pub use error::{BackendError, ConfigError, EgressSendError, IngressError};
pub use types::{
    Alternative, AudioChunk, RecognitionResponse, RecognizeRequest, SpeechResult,
    TranscriptResult,
};

#[cfg(test)]
mod tests {
    use super::*;

    fn alt(text: &str) -> Alternative {
        Alternative {
            transcript: text.to_string(),
            confidence: 0.9,
        }
    }

    #[test]
    fn test_audio_chunk_creation() {
        let chunk = AudioChunk::new(vec![1, 2, 3, 4]);
        assert_eq!(chunk.len(), 4);
        assert!(!chunk.is_empty());
        assert_eq!(chunk.as_bytes(), &[1, 2, 3, 4]);
        assert_eq!(chunk.into_bytes(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_best_transcript_takes_first_alternative() {
        let result = SpeechResult {
            alternatives: vec![alt("hola mundo"), alt("ola mundo")],
            is_final: true,
        };
        assert_eq!(result.best_transcript(), Some("hola mundo"));
    }

    #[test]
    fn test_best_transcript_none_without_alternatives() {
        let result = SpeechResult {
            alternatives: Vec::new(),
            is_final: false,
        };
        assert_eq!(result.best_transcript(), None);
        assert!(TranscriptResult::from_result(&result).is_none());
    }

    #[test]
    fn test_transcript_result_serializes_text_only() {
        let result = SpeechResult {
            alternatives: vec![alt("hola")],
            is_final: false,
        };
        let transcript = TranscriptResult::from_result(&result).unwrap();
        assert!(!transcript.is_final);
        assert_eq!(
            serde_json::to_string(&transcript).unwrap(),
            r#"{"text":"hola"}"#
        );
    }
}
