//! testgen-oracle: generation oracle access for testgen
//!
//! Sends source text plus free-text instructions to a text-generation
//! service and returns the code it answers with.
//!
//! ## Key Components
//!
//! - `OracleClient`: the transformation seam used by the pipeline
//! - `GeminiClient`: `generateContent` over HTTPS
//! - `fence`: structural fenced-block recognition
//! - `credentials`: API key loading and validation

pub mod client;
pub mod credentials;
mod error;
pub mod fakes;
pub mod fence;
pub mod gemini;

pub use client::OracleClient;
pub use credentials::{load_api_key, validate_api_key, API_KEY_PREFIX, API_KEY_VAR};
pub use error::{CredentialError, OracleError};
pub use gemini::{GeminiClient, GeminiConfig};
