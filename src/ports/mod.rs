pub mod cache;
pub mod media;
pub mod queue;
pub mod transcriber;
pub mod voice;

/// Error type shared by all port traits; adapters box whatever they produce.
pub type PortError = Box<dyn std::error::Error + Send + Sync>;
