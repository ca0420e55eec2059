pub mod adapter;
pub mod classify;
pub mod config;
pub mod correlation;
pub mod error;
pub mod session;
pub mod telemetry;

// Re-export specific items for convenient access
pub use adapter::{Collaborators, TelemetryContext};
pub use config::TelemetryConfig;
pub use error::{Result, TelemetryError};
