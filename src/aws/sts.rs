//! The STS credential exchange.

use aws_config::{BehaviorVersion, Region};
use aws_sdk_sts::{Client as StsClient, config::Config as StsConfig};
use tracing::{debug, info};

use crate::aws::Credentials;
use crate::error::{Error, Result};

/// Exchange the captured assertion for temporary credentials via
/// `AssumeRoleWithSAML`. One call per run, no retry, no caching.
///
/// The assertion is forwarded still base64-encoded, exactly as captured;
/// decoding elsewhere only serves role extraction.
pub async fn assume_role_with_saml(
    region: &str,
    role_arn: &str,
    principal_arn: &str,
    saml_assertion: &str,
    duration_seconds: i32,
) -> Result<Credentials> {
    info!("calling AWS STS AssumeRoleWithSAML");
    debug!("region: {region}");
    debug!("role ARN: {role_arn}");
    debug!("principal ARN: {principal_arn}");
    debug!("duration: {duration_seconds} seconds");

    // The assertion itself authenticates the call; no local credentials.
    let config = StsConfig::builder()
        .behavior_version(BehaviorVersion::latest())
        .region(Region::new(region.to_owned()))
        .build();
    let client = StsClient::from_conf(config);

    let response = client
        .assume_role_with_saml()
        .role_arn(role_arn)
        .principal_arn(principal_arn)
        .saml_assertion(saml_assertion)
        .duration_seconds(duration_seconds)
        .send()
        .await
        .map_err(|e| Error::Exchange(Box::new(e)))?;

    let sts_creds = response
        .credentials()
        .ok_or_else(|| Error::Exchange("AWS STS returned no credentials".into()))?;

    let credentials = Credentials {
        access_key_id: sts_creds.access_key_id().to_string(),
        secret_access_key: sts_creds.secret_access_key().to_string(),
        session_token: sts_creds.session_token().to_string(),
        expiration: *sts_creds.expiration(),
    };

    info!("successfully obtained AWS credentials");
    Ok(credentials)
}
