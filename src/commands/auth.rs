use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::Args;
use tokio::{signal, time};
use tracing::info;

use crate::{
    aws::{self, RoleMapping},
    browser::{BrowserSession, DEFAULT_STEP_TIMEOUT, SESSION_TIMEOUT, SessionOptions},
    capture, constants,
    error::Error,
    portal::{self, LoginCredentials, PortalSelectors},
    saml::SamlAssertion,
};

/// How long after the landing page is ready the capture channel is given to
/// deliver. The federation POST precedes the landing marker, so this only
/// covers channel latency.
const CAPTURE_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Args)]
pub struct AuthCommand {
    #[arg(long, help = "Portal entry URL")]
    pub url: String,

    #[arg(short = 'u', long, help = "Portal username")]
    pub username: String,

    #[arg(short = 'p', long, help = "Portal password")]
    pub password: String,

    #[arg(
        short = 'a',
        long,
        help = "Application tile to open: zero-based index or exact display name"
    )]
    pub app: String,

    #[arg(long, default_value_t = constants::DEFAULT_SESSION_DURATION_SECS, help = "Session duration in seconds")]
    pub duration: i32,

    #[arg(long, default_value = constants::DEFAULT_REGION, help = "Region the STS call is made against")]
    pub region: String,

    #[arg(long, help = "Log low-level browser protocol errors")]
    pub debug: bool,

    #[arg(long, help = "Disable headless mode to show the browser window")]
    pub disable_headless: bool,

    #[arg(long, help = "Browser profile directory (defaults to ~/.authing)")]
    pub profile_dir: Option<PathBuf>,
}

impl AuthCommand {
    pub async fn execute(self) -> Result<()> {
        let profile_dir = match self.profile_dir.clone() {
            Some(dir) => dir,
            None => constants::default_profile_dir()
                .context("failed to determine home directory for the browser profile")?,
        };

        let session = BrowserSession::start(SessionOptions {
            profile_dir,
            headless: !self.disable_headless,
            debug: self.debug,
            step_timeout: DEFAULT_STEP_TIMEOUT,
        })
        .await
        .context("failed to start browser session")?;

        // The session is closed on every path out of the browser phase:
        // success, failure, timeout and Ctrl-C alike. Anything captured on a
        // cancelled run is discarded with the channel.
        let outcome = tokio::select! {
            result = time::timeout(SESSION_TIMEOUT, self.browse(&session)) => match result {
                Ok(assertion) => assertion,
                Err(_) => Err(anyhow!("authentication timed out after {SESSION_TIMEOUT:?}")),
            },
            _ = signal::ctrl_c() => Err(anyhow!("authentication interrupted")),
        };
        session.close().await;
        let raw_assertion = outcome?;

        let assertion = SamlAssertion::from_base64(&raw_assertion)
            .context("failed to decode captured SAML response")?;
        let mapping = RoleMapping::from_assertion(&assertion)
            .context("failed to resolve role from SAML assertion")?;
        info!(
            role = %mapping.role_arn,
            principal = %mapping.principal_arn,
            issuer = %assertion.issuer,
            "resolved federation role"
        );

        let credentials = aws::sts::assume_role_with_saml(
            &self.region,
            &mapping.role_arn,
            &mapping.principal_arn,
            &raw_assertion,
            self.duration,
        )
        .await
        .context("failed to exchange SAML assertion for credentials")?;

        info!(
            expiration = %aws::credentials::format_expiration(&credentials),
            "credentials issued"
        );
        println!("{}", aws::credentials::format_export(&credentials));

        Ok(())
    }

    /// The browser-driven phase: interception, login, app selection and the
    /// read of the captured assertion. The interceptor runs concurrently
    /// with the sequential flow for the whole phase.
    async fn browse(&self, session: &BrowserSession) -> Result<String> {
        let (interceptor, captured) = capture::start(session.browser())
            .await
            .context("failed to start assertion capture")?;

        let flow = async {
            let selectors = PortalSelectors::default();
            let credentials = LoginCredentials {
                username: self.username.clone(),
                password: self.password.clone(),
            };

            let page = session.open(&self.url).await?;
            portal::login(&page, &selectors, &credentials, session.step_timeout()).await?;

            let catalog = portal::discover_apps(&page, &selectors).await?;
            let tile = catalog.resolve(&self.app)?;
            let _tab = portal::open_app(session, tile, &selectors).await?;

            // Landing marker reached; the federation POST, if it happened,
            // already went through the interceptor.
            time::timeout(CAPTURE_GRACE, captured)
                .await
                .map_err(|_| {
                    Error::Login("login completed but no SAML response was captured".to_string())
                })?
                .map_err(|_| Error::Login("assertion capture channel closed".to_string()))
        };

        tokio::select! {
            result = flow => result
                .context("browser authentication flow failed"),
            err = interceptor => Err(err)
                .context("request interception failed"),
        }
    }
}
