//! Error types for the authentication pipeline.

use std::time::Duration;

use thiserror::Error;

/// Errors produced while driving the portal and exchanging the assertion.
#[derive(Debug, Error)]
pub enum Error {
    /// The Chrome process or its browsing context could not be created.
    #[error("failed to launch browser: {0}")]
    Launch(String),

    /// A UI wait step exceeded its deadline.
    #[error("timed out after {timeout:?} waiting for {waiting_for}")]
    NavigationTimeout {
        waiting_for: String,
        timeout: Duration,
    },

    /// A driver action failed while walking through the login flow.
    #[error("login flow failed: {0}")]
    Login(String),

    /// A numeric app selector pointed past the end of the catalog.
    #[error("app index {index} is out of range ({len} apps discovered)")]
    IndexOutOfRange { index: usize, len: usize },

    /// A named app selector matched no discovered tile.
    #[error("app \"{selector}\" not found; discovered apps:\n{known}")]
    AppNotFound { selector: String, known: String },

    /// The captured assertion was not valid base64.
    #[error("failed to decode SAML response: {0}")]
    Decode(#[from] base64::DecodeError),

    /// The decoded assertion was not the expected XML document shape.
    #[error("failed to parse SAML response: {0}")]
    Parse(String),

    /// No recognized role attribute, or its value was not a role/principal
    /// ARN pair.
    #[error("no usable role attribute found in SAML assertion")]
    RoleNotFound,

    /// The STS exchange failed; carries the underlying cause verbatim.
    #[error("credential exchange failed")]
    Exchange(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
}

/// Convenience Result type for the authentication pipeline.
pub type Result<T, E = Error> = std::result::Result<T, E>;
