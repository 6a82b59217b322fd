//! Drives the Authing portal UI: the login flow and application selection.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chromiumoxide::cdp::browser_protocol::target::{
    EventTargetCreated, EventTargetInfoChanged, TargetId,
};
use chromiumoxide::error::CdpError;
use chromiumoxide::{Element, Page};
use futures::{Stream, StreamExt};
use tokio::time;
use tracing::{debug, info};

use crate::browser::{self, BrowserSession};
use crate::error::{Error, Result};

/// CSS selectors for one portal layout. A single explicit set; every UI step
/// goes through it.
#[derive(Debug, Clone)]
pub struct PortalSelectors {
    /// Spinner shown while the portal bootstraps itself.
    pub loading_indicator: &'static str,
    /// Password login form. Credential entry is gated on this one.
    pub password_form: &'static str,
    /// Phone-code challenge form; its presence skips credential entry.
    pub phone_code_form: &'static str,
    pub username_input: &'static str,
    pub password_input: &'static str,
    pub password_login_button: &'static str,
    /// Application grid on the portal main page; doubles as the
    /// logged-in marker.
    pub app_grid: &'static str,
    pub app_tile: &'static str,
    /// Icon that marks a tile as an AWS application.
    pub aws_icon: &'static str,
    pub app_name: &'static str,
    /// Element that confirms the downstream console has loaded.
    pub console_marker: &'static str,
}

impl Default for PortalSelectors {
    fn default() -> Self {
        Self {
            loading_indicator: "div[class^=styles_g2-init-setting-loading]",
            // The missing "d" is faithful to the portal markup.
            password_form: "#passworLogin",
            phone_code_form: "#phoneCode",
            username_input: "input[type=text][placeholder*=\"username\" i]",
            password_input: "input[type=password][placeholder*=\"password\" i]",
            password_login_button: "div.authing-ant-tabs-tabpane-active button.password",
            app_grid: "div[class^=styles_sortContainer]",
            app_tile: "div[class^=styles_appItem]",
            aws_icon: "img[src*=aws]",
            app_name: "p[class^=styles_appName]",
            console_marker: "#nav-logo",
        }
    }
}

/// Portal credentials, held in memory for the duration of one run only.
#[derive(Clone)]
pub struct LoginCredentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for LoginCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Walk the login flow on an already-navigated portal page.
///
/// Waits for the bootstrap spinner to clear and for one of the three
/// possible prompts to appear. Credentials are entered only when the
/// password form specifically is what appeared; a live session or a
/// phone-code challenge skips entry entirely. Completes once the app grid
/// is visible. One pass, no retries.
pub async fn login(
    page: &Page,
    selectors: &PortalSelectors,
    credentials: &LoginCredentials,
    step_timeout: Duration,
) -> Result<()> {
    info!("waiting for the sign-in page to settle");
    browser::wait_gone(page, selectors.loading_indicator, step_timeout).await?;

    let any_prompt = format!(
        "{},{},{}",
        selectors.password_form, selectors.phone_code_form, selectors.app_grid
    );
    browser::wait_for(page, &any_prompt, step_timeout).await?;

    if page.find_element(selectors.password_form).await.is_ok() {
        info!("submitting password credentials");
        page.find_element(selectors.username_input)
            .await
            .map_err(login_err)?
            .click()
            .await
            .map_err(login_err)?
            .type_str(&credentials.username)
            .await
            .map_err(login_err)?;
        page.find_element(selectors.password_input)
            .await
            .map_err(login_err)?
            .click()
            .await
            .map_err(login_err)?
            .type_str(&credentials.password)
            .await
            .map_err(login_err)?;
        page.find_element(selectors.password_login_button)
            .await
            .map_err(login_err)?
            .click()
            .await
            .map_err(login_err)?;
    } else {
        info!("password form not present; skipping credential entry");
    }

    browser::wait_for(page, selectors.app_grid, step_timeout).await?;
    info!("signed in; application grid is visible");
    Ok(())
}

/// Insertion-ordered catalog of discovered application tiles. Duplicate
/// display names overwrite in place, so positional indexes count distinct
/// names.
#[derive(Debug, Default)]
pub struct AppCatalog<T> {
    entries: Vec<(String, T)>,
}

impl<T> AppCatalog<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn insert(&mut self, name: String, handle: T) {
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = handle,
            None => self.entries.push((name, handle)),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// Resolve a selector to exactly one tile handle. A selector that parses
    /// as a non-negative integer is a zero-based index into insertion order;
    /// anything else is an exact display-name lookup.
    pub fn resolve(&self, selector: &str) -> Result<&T> {
        if let Ok(index) = selector.parse::<usize>() {
            return match self.entries.get(index) {
                Some((_, handle)) => Ok(handle),
                None => Err(Error::IndexOutOfRange {
                    index,
                    len: self.entries.len(),
                }),
            };
        }

        match self.entries.iter().find(|(name, _)| name == selector) {
            Some((_, handle)) => Ok(handle),
            None => Err(Error::AppNotFound {
                selector: selector.to_string(),
                known: self.listing(),
            }),
        }
    }

    fn listing(&self) -> String {
        self.entries
            .iter()
            .enumerate()
            .map(|(index, (name, _))| format!("{index:02}. \"{name}\""))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Enumerate the app tiles on the portal main page, keeping only those that
/// carry an AWS icon, keyed by display name.
pub async fn discover_apps(
    page: &Page,
    selectors: &PortalSelectors,
) -> Result<AppCatalog<Element>> {
    let tiles = page
        .find_elements(selectors.app_tile)
        .await
        .map_err(login_err)?;

    let mut catalog = AppCatalog::new();
    for tile in tiles {
        if tile.find_element(selectors.aws_icon).await.is_err() {
            continue;
        }
        let name = tile
            .find_element(selectors.app_name)
            .await
            .map_err(login_err)?
            .inner_text()
            .await
            .map_err(login_err)?
            .unwrap_or_default()
            .trim()
            .to_string();
        debug!(app = %name, "discovered AWS application tile");
        catalog.insert(name, tile);
    }

    info!(count = catalog.len(), "discovered AWS applications");
    Ok(catalog)
}

/// Click the resolved tile and attach to the window it opens, returning the
/// new tab once its console landing marker is visible.
///
/// The new-target subscription is established before the click; clicking
/// first risks missing the notification entirely.
pub async fn open_app(
    session: &BrowserSession,
    tile: &Element,
    selectors: &PortalSelectors,
) -> Result<Page> {
    let browser = session.browser();

    let mut created = browser
        .event_listener::<EventTargetCreated>()
        .await
        .map_err(login_err)?;
    let mut changed = browser
        .event_listener::<EventTargetInfoChanged>()
        .await
        .map_err(login_err)?;

    tile.click().await.map_err(login_err)?;
    info!("clicked application tile; waiting for the new window");

    let target_id = wait_new_target(&mut created, &mut changed, session.step_timeout()).await?;
    let tab = session.attach(target_id).await?;

    browser::wait_for(&tab, selectors.console_marker, session.step_timeout()).await?;
    info!("application landing page is ready");
    Ok(tab)
}

/// Resolve the next browser target whose URL is non-empty. Targets are often
/// announced with an empty URL first and filled in by a later info-change
/// event, so both streams are watched.
async fn wait_new_target<C, U>(
    created: &mut C,
    changed: &mut U,
    timeout: Duration,
) -> Result<TargetId>
where
    C: Stream<Item = Arc<EventTargetCreated>> + Unpin,
    U: Stream<Item = Arc<EventTargetInfoChanged>> + Unpin,
{
    let mut pending: HashSet<TargetId> = HashSet::new();
    let deadline = time::sleep(timeout);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            Some(event) = created.next() => {
                let info = &event.target_info;
                if !info.url.is_empty() {
                    return Ok(info.target_id.clone());
                }
                pending.insert(info.target_id.clone());
            }
            Some(event) = changed.next() => {
                let info = &event.target_info;
                if !info.url.is_empty() && pending.contains(&info.target_id) {
                    return Ok(info.target_id.clone());
                }
            }
            _ = &mut deadline => {
                return Err(Error::NavigationTimeout {
                    waiting_for: "new browser target".to_string(),
                    timeout,
                });
            }
        }
    }
}

fn login_err(err: CdpError) -> Error {
    Error::Login(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog(names: &[&str]) -> AppCatalog<usize> {
        let mut catalog = AppCatalog::new();
        for (tile, name) in names.iter().enumerate() {
            catalog.insert((*name).to_string(), tile);
        }
        catalog
    }

    #[test]
    fn duplicate_names_overwrite_in_place() {
        let catalog = catalog(&["Prod", "Dev", "Prod"]);
        assert_eq!(catalog.names().collect::<Vec<_>>(), vec!["Prod", "Dev"]);
        // The later tile won, but kept the original position.
        assert_eq!(catalog.resolve("Prod").unwrap(), &2);
    }

    #[test]
    fn numeric_selector_is_a_zero_based_index() {
        let catalog = catalog(&["Prod", "Dev", "Prod"]);
        assert_eq!(catalog.resolve("1").unwrap(), &1);
        assert_eq!(catalog.resolve("0").unwrap(), &2);
    }

    #[test]
    fn out_of_range_index_fails() {
        let catalog = catalog(&["Prod", "Dev", "Prod"]);
        match catalog.resolve("5") {
            Err(Error::IndexOutOfRange { index: 5, len: 2 }) => {}
            other => panic!("expected IndexOutOfRange, got {other:?}"),
        }
    }

    #[test]
    fn unknown_name_fails_and_lists_known_apps() {
        let catalog = catalog(&["Prod", "Dev", "Prod"]);
        match catalog.resolve("Stage") {
            Err(Error::AppNotFound { selector, known }) => {
                assert_eq!(selector, "Stage");
                assert!(known.contains("\"Prod\""));
                assert!(known.contains("\"Dev\""));
            }
            other => panic!("expected AppNotFound, got {other:?}"),
        }
    }

    #[test]
    fn name_lookup_is_exact() {
        let catalog = catalog(&["Prod", "Dev"]);
        assert_eq!(catalog.resolve("Dev").unwrap(), &1);
        assert!(catalog.resolve("dev").is_err());
    }

    #[test]
    fn empty_catalog_resolves_nothing() {
        let catalog: AppCatalog<usize> = AppCatalog::new();
        assert!(catalog.is_empty());
        assert!(matches!(
            catalog.resolve("0"),
            Err(Error::IndexOutOfRange { index: 0, len: 0 })
        ));
    }

    #[test]
    fn credentials_debug_redacts_password() {
        let credentials = LoginCredentials {
            username: "alice".to_string(),
            password: "hunter2".to_string(),
        };
        let rendered = format!("{credentials:?}");
        assert!(rendered.contains("alice"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn default_selectors_keep_the_portal_markup_quirks() {
        let selectors = PortalSelectors::default();
        assert_eq!(selectors.password_form, "#passworLogin");
        assert!(selectors.aws_icon.contains("aws"));
    }
}
