//! Vocero - Conversational Video Companion
//!
//! Hexagonal Architecture:
//! - domain/: Pure business logic (video ids, transcripts, jobs, sessions)
//! - ports/: Trait definitions
//! - adapters/: Concrete implementations (Redis, subprocess media, HTTP APIs)
//! - application/: Generic services (pipeline, worker, relay)
//! - config: Environment configuration

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

// Re-exports for convenience
pub use config::Config;
pub use domain::session::SessionStore;
