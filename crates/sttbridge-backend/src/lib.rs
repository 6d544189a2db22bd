pub mod backend_trait;
#[cfg(feature = "google")]
pub mod google;
pub mod null_backend;
pub mod registry;

pub use backend_trait::{RequestStream, ResponseStream, SpeechBackend};
#[cfg(feature = "google")]
pub use google::GoogleBackend;
pub use null_backend::NullBackend;
pub use registry::BackendRegistry;
