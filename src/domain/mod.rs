pub mod error;
pub mod jobs;
pub mod session;
pub mod transcript;
pub mod video;
