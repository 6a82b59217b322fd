//! Chrome session ownership: process launch, target attachment, teardown.

use std::{path::PathBuf, time::Duration};

use chromiumoxide::cdp::browser_protocol::target::TargetId;
use chromiumoxide::{Browser, BrowserConfig, Element, Page};
use futures::StreamExt;
use tokio::{fs, task::JoinHandle, time};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Upper bound for the whole browser-driven phase of a run.
pub const SESSION_TIMEOUT: Duration = Duration::from_secs(300);

/// Default deadline for a single UI wait step.
pub const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(120);

/// How often UI wait steps re-check the page.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Hardened launch flags, after Puppeteer's defaults. Headless is controlled
/// separately through [`SessionOptions`].
const LAUNCH_ARGS: [&str; 24] = [
    "--no-first-run",
    "--no-default-browser-check",
    "--disable-background-networking",
    "--enable-features=NetworkService,NetworkServiceInProcess",
    "--disable-background-timer-throttling",
    "--disable-backgrounding-occluded-windows",
    "--disable-breakpad",
    "--disable-client-side-phishing-detection",
    "--disable-default-apps",
    "--disable-dev-shm-usage",
    "--disable-extensions",
    "--disable-features=site-per-process,Translate,BlinkGenPropertyTrees",
    "--disable-hang-monitor",
    "--disable-ipc-flooding-protection",
    "--disable-popup-blocking",
    "--disable-prompt-on-repost",
    "--disable-renderer-backgrounding",
    "--disable-sync",
    "--force-color-profile=srgb",
    "--metrics-recording-only",
    "--safebrowsing-disable-auto-update",
    "--enable-automation",
    "--password-store=basic",
    "--use-mock-keychain",
];

/// How a [`BrowserSession`] is launched.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Persistent profile directory; cookies survive across runs.
    pub profile_dir: PathBuf,
    /// Run without a visible window. On by default.
    pub headless: bool,
    /// Surface low-level protocol handler errors in the logs.
    pub debug: bool,
    /// Deadline applied to each individual UI wait step.
    pub step_timeout: Duration,
}

/// Exclusive owner of the Chrome process, its profile-bound browsing context
/// and every tab attached to it. Torn down as a unit by [`close`].
///
/// [`close`]: BrowserSession::close
pub struct BrowserSession {
    browser: Browser,
    handler_task: JoinHandle<()>,
    step_timeout: Duration,
}

impl BrowserSession {
    /// Launch Chrome bound to the profile directory, creating it with
    /// owner-only permissions if absent.
    pub async fn start(options: SessionOptions) -> Result<Self> {
        info!(
            profile_dir = %options.profile_dir.display(),
            headless = options.headless,
            "launching browser"
        );

        if !options.profile_dir.exists() {
            fs::create_dir_all(&options.profile_dir)
                .await
                .map_err(|e| Error::Launch(format!("failed to create profile directory: {e}")))?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let metadata = fs::metadata(&options.profile_dir)
                    .await
                    .map_err(|e| Error::Launch(e.to_string()))?;
                let mut permissions = metadata.permissions();
                permissions.set_mode(0o700);
                fs::set_permissions(&options.profile_dir, permissions)
                    .await
                    .map_err(|e| Error::Launch(e.to_string()))?;
            }
        }

        let mut builder = BrowserConfig::builder()
            .user_data_dir(&options.profile_dir)
            .viewport(None)
            .args(LAUNCH_ARGS.to_vec());
        if !options.headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(Error::Launch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| Error::Launch(format!("failed to launch Chrome: {e}")))?;

        let protocol_debug = options.debug;
        let handler_task = tokio::spawn(async move {
            while let Some(result) = handler.next().await {
                if let Err(err) = result {
                    if protocol_debug {
                        debug!("browser protocol handler: {err}");
                    }
                }
            }
        });

        Ok(Self {
            browser,
            handler_task,
            step_timeout: options.step_timeout,
        })
    }

    /// Handle to the underlying browser, for event subscription and
    /// browser-scope commands.
    pub fn browser(&self) -> &Browser {
        &self.browser
    }

    /// Deadline applied to each UI wait step.
    pub fn step_timeout(&self) -> Duration {
        self.step_timeout
    }

    /// Open a fresh tab and navigate it to `url`.
    pub async fn open(&self, url: &str) -> Result<Page> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| Error::Login(format!("failed to open tab: {e}")))?;
        page.goto(url)
            .await
            .map_err(|e| Error::Login(format!("failed to navigate to {url}: {e}")))?;
        Ok(page)
    }

    /// Attach a tab context to an already-open browser target; used for the
    /// window the selected application opens.
    pub async fn attach(&self, target_id: TargetId) -> Result<Page> {
        self.browser
            .get_page(target_id)
            .await
            .map_err(|e| Error::Login(format!("failed to attach to new target: {e}")))
    }

    /// Scoped release: tabs, then the browsing context, then the process.
    /// Best effort; runs on every exit path.
    pub async fn close(mut self) {
        self.browser.close().await.ok();
        self.browser.wait().await.ok();
        self.handler_task.abort();
    }
}

/// Block until `selector` matches an element or the deadline passes.
pub(crate) async fn wait_for(page: &Page, selector: &str, timeout: Duration) -> Result<Element> {
    let deadline = time::Instant::now() + timeout;
    loop {
        if let Ok(element) = page.find_element(selector).await {
            return Ok(element);
        }
        if time::Instant::now() >= deadline {
            return Err(Error::NavigationTimeout {
                waiting_for: selector.to_string(),
                timeout,
            });
        }
        time::sleep(POLL_INTERVAL).await;
    }
}

/// Block until `selector` matches nothing or the deadline passes.
pub(crate) async fn wait_gone(page: &Page, selector: &str, timeout: Duration) -> Result<()> {
    let deadline = time::Instant::now() + timeout;
    loop {
        if page.find_element(selector).await.is_err() {
            return Ok(());
        }
        if time::Instant::now() >= deadline {
            return Err(Error::NavigationTimeout {
                waiting_for: format!("absence of {selector}"),
                timeout,
            });
        }
        time::sleep(POLL_INTERVAL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn launch_args_are_well_formed() {
        let mut seen = HashSet::new();
        for arg in LAUNCH_ARGS {
            assert!(arg.starts_with("--"), "malformed flag: {arg}");
            assert!(seen.insert(arg), "duplicate flag: {arg}");
        }
    }

    #[test]
    fn launch_args_disable_first_run_and_extensions() {
        assert!(LAUNCH_ARGS.contains(&"--no-first-run"));
        assert!(LAUNCH_ARGS.contains(&"--no-default-browser-check"));
        assert!(LAUNCH_ARGS.contains(&"--disable-extensions"));
    }
}
