//! Error types for the mailbox client.

use reqwest::StatusCode;
use thiserror::Error;

/// Errors surfaced by provisioning and authentication.
///
/// Listing, fetching and polling never return these; they degrade to an
/// empty result instead.
#[derive(Debug, Error)]
pub enum Error {
    /// Transport failure, timeout, or client construction error.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The provider returned JSON that could not be decoded.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A non-success status that no other variant covers.
    #[error("unexpected status {status}: {body}")]
    Status { status: StatusCode, body: String },

    /// Credentials were rejected or no token was issued.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Account creation kept failing until the retry bound was reached.
    #[error("failed to create account after {attempts} attempts: {reason}")]
    AccountCreation { attempts: u32, reason: String },

    /// A required field was missing from an otherwise valid response.
    #[error("failed to parse response: {0}")]
    ResponseParse(&'static str),
}
