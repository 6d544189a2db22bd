use crate::error::ConfigError;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub bridge: BridgeConfig,

    #[serde(default)]
    pub recognition: RecognitionConfig,

    #[serde(default)]
    pub backend: BackendConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_ws_path")]
    pub ws_path: String,

    #[serde(default)]
    pub static_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            ws_path: default_ws_path(),
            static_dir: None,
        }
    }
}

impl ServerConfig {
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct BridgeConfig {
    /// Upper bound on how long a draining session waits for the backend.
    #[serde(default = "default_drain_timeout_ms")]
    pub drain_timeout_ms: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            drain_timeout_ms: default_drain_timeout_ms(),
        }
    }
}

impl BridgeConfig {
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AudioEncoding {
    Linear16,
    Flac,
    Mulaw,
    OggOpus,
    WebmOpus,
    Mp3,
}

/// Recognition parameters handed to the backend when a stream starts.
/// Cloned into every session; never shared mutably.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct RecognitionConfig {
    #[serde(default = "default_encoding")]
    pub encoding: AudioEncoding,

    #[serde(default = "default_sample_rate")]
    pub sample_rate_hertz: u32,

    #[serde(default = "default_language_code")]
    pub language_code: String,

    #[serde(default = "default_true")]
    pub enable_automatic_punctuation: bool,

    #[serde(default = "default_model")]
    pub model: Option<String>,

    #[serde(default = "default_true")]
    pub use_enhanced: bool,

    #[serde(default = "default_true")]
    pub interim_results: bool,

    #[serde(default = "default_max_alternatives")]
    pub max_alternatives: u32,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            encoding: default_encoding(),
            sample_rate_hertz: default_sample_rate(),
            language_code: default_language_code(),
            enable_automatic_punctuation: true,
            model: default_model(),
            use_enhanced: true,
            interim_results: true,
            max_alternatives: default_max_alternatives(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackendConfig {
    #[serde(default = "default_backend_name")]
    pub name: String,

    #[serde(default)]
    pub google: Option<GoogleConfig>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            name: default_backend_name(),
            google: None,
        }
    }
}

impl BackendConfig {
    /// Plugin-specific table passed to the backend's `initialize`.
    pub fn plugin_config(&self) -> Result<toml::Value, ConfigError> {
        let value = match (self.name.as_str(), &self.google) {
            ("google", Some(google)) => toml::Value::try_from(google)
                .map_err(|e| ConfigError::Invalid(format!("google backend config: {e}")))?,
            _ => toml::Value::Table(Default::default()),
        };
        Ok(value)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GoogleConfig {
    #[serde(default = "default_google_endpoint")]
    pub endpoint: String,

    pub access_token: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_ws_path() -> String {
    "/ws/transcribe".to_string()
}

fn default_drain_timeout_ms() -> u64 {
    10_000
}

fn default_encoding() -> AudioEncoding {
    AudioEncoding::Linear16
}

fn default_sample_rate() -> u32 {
    48000
}

fn default_language_code() -> String {
    "es-MX".to_string()
}

fn default_model() -> Option<String> {
    Some("phone_call".to_string())
}

fn default_true() -> bool {
    true
}

fn default_max_alternatives() -> u32 {
    1
}

fn default_backend_name() -> String {
    "null".to_string()
}

fn default_google_endpoint() -> String {
    "https://speech.googleapis.com".to_string()
}

const MAX_SAMPLE_RATE_HERTZ: u32 = 192_000;
const MAX_ALTERNATIVES: u32 = 30;

/// Interpolate `${VAR}` patterns with environment variable values.
///
/// Full-line comments are left untouched. Inserted values are escaped for
/// a TOML basic string, so a quote or backslash in a secret cannot break
/// the surrounding `"..."`.
fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let re = Regex::new(r"\$\{([^}]+)\}").unwrap();
    let mut missing: Option<String> = None;
    let mut lines = Vec::new();

    for line in input.lines() {
        if line.trim_start().starts_with('#') {
            lines.push(line.to_string());
            continue;
        }
        let replaced = re.replace_all(line, |cap: &Captures| match std::env::var(&cap[1]) {
            Ok(val) => escape_basic_string(&val),
            Err(_) => {
                missing.get_or_insert_with(|| cap[1].to_string());
                String::new()
            }
        });
        lines.push(replaced.into_owned());
    }

    if let Some(first_missing) = missing {
        return Err(ConfigError::EnvVarNotFound(first_missing));
    }

    Ok(lines.join("\n"))
}

fn escape_basic_string(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

impl AppConfig {
    /// Load configuration from a TOML file, with environment variable interpolation.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!(path = %path.display(), backend = %config.backend.name, "config loaded");
        Ok(config)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let interpolated = interpolate_env_vars(s)?;
        let config: AppConfig = toml::from_str(&interpolated)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.recognition.sample_rate_hertz == 0 {
            return Err(ConfigError::Invalid(
                "recognition.sample_rate_hertz must be positive".to_string(),
            ));
        }
        if self.recognition.sample_rate_hertz > MAX_SAMPLE_RATE_HERTZ {
            return Err(ConfigError::Invalid(format!(
                "recognition.sample_rate_hertz must be at most {MAX_SAMPLE_RATE_HERTZ}"
            )));
        }
        if self.recognition.max_alternatives > MAX_ALTERNATIVES {
            return Err(ConfigError::Invalid(format!(
                "recognition.max_alternatives must be at most {MAX_ALTERNATIVES}"
            )));
        }
        if self.recognition.language_code.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "recognition.language_code must not be empty".to_string(),
            ));
        }
        if !self.server.ws_path.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "server.ws_path must start with '/': {:?}",
                self.server.ws_path
            )));
        }
        Ok(())
    }
}
