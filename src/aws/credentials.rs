//! Rendering of exchanged credentials for the caller's shell.

use aws_smithy_types::date_time::Format;

use crate::aws::Credentials;

/// Render credentials as shell export lines, suitable for
/// `eval "$(authing-aws auth ...)"`.
pub fn format_export(credentials: &Credentials) -> String {
    format!(
        "export AWS_ACCESS_KEY_ID={}\nexport AWS_SECRET_ACCESS_KEY={}\nexport AWS_SESSION_TOKEN={}",
        credentials.access_key_id, credentials.secret_access_key, credentials.session_token
    )
}

/// Human-readable expiration timestamp for log output.
pub fn format_expiration(credentials: &Credentials) -> String {
    credentials
        .expiration
        .fmt(Format::DateTime)
        .unwrap_or_else(|_| "unknown".to_string())
}
