use std::{env, path::PathBuf};

/// AWS SAML endpoint for the commercial partition.
pub const AWS_SAML_ENDPOINT: &str = "https://signin.aws.amazon.com/saml";

/// AWS SAML endpoint for the China partition.
pub const AWS_CN_SAML_ENDPOINT: &str = "https://signin.amazonaws.cn/saml";

/// AWS SAML endpoint for the GovCloud partition.
pub const AWS_GOV_SAML_ENDPOINT: &str = "https://signin.amazonaws-us-gov.com/saml";

/// Every federation endpoint the interceptor recognizes.
pub const SAML_ENDPOINTS: [&str; 3] = [
    AWS_SAML_ENDPOINT,
    AWS_CN_SAML_ENDPOINT,
    AWS_GOV_SAML_ENDPOINT,
];

/// Browser profile directory name under the user's home directory.
pub const PROFILE_DIR_NAME: &str = ".authing";

/// Default region for the STS call.
pub const DEFAULT_REGION: &str = "cn-north-1";

/// Default session duration in seconds (10 hours).
pub const DEFAULT_SESSION_DURATION_SECS: i32 = 36_000;

/// Default browser profile directory path, `.authing` under the home
/// directory. `None` when no home directory can be determined.
pub fn default_profile_dir() -> Option<PathBuf> {
    profile_dir_under(dirs::home_dir().or_else(home_from_env))
}

// Fallback to environment variables if the dirs crate comes up empty.
fn home_from_env() -> Option<PathBuf> {
    env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .ok()
        .map(PathBuf::from)
}

fn profile_dir_under(home: Option<PathBuf>) -> Option<PathBuf> {
    home.map(|home| home.join(PROFILE_DIR_NAME))
}
