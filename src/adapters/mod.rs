pub mod eleven;
pub mod http;
pub mod media;
pub mod memory;
pub mod redis;
pub mod whisper_api;
