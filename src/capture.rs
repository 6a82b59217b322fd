//! Browser-scope interception of the federation POST carrying the SAML
//! response.
//!
//! Interception is enabled on the browser target rather than a single tab so
//! the POST is seen no matter which window issues it; the selected
//! application opens the federation endpoint in a tab that does not exist
//! yet when interception starts.

use std::{future::Future, str};

use base64::{Engine as _, engine::general_purpose::STANDARD};
use chromiumoxide::Browser;
use chromiumoxide::cdp::browser_protocol::fetch::{
    ContinueRequestParams, EnableParams, EventRequestPaused, RequestId,
};
use chromiumoxide::error::CdpError;
use futures::{Stream, StreamExt};
use tokio::sync::oneshot;
use tracing::{debug, warn};
use url::form_urlencoded;

use crate::constants::SAML_ENDPOINTS;
use crate::error::{Error, Result};

/// Start intercepting every outbound request in the session. Must run before
/// the first navigation so no federation POST can slip past.
///
/// Returns the interceptor future, to be driven concurrently with the main
/// flow for the whole session, and the receiving end of the one-shot channel
/// the captured assertion is delivered on. The future only resolves on
/// failure (the event stream closing mid-session); every paused request is
/// resumed whether or not it matched, since an unresumed request stalls its
/// page indefinitely.
pub async fn start(
    browser: &Browser,
) -> Result<(impl Future<Output = Error> + '_, oneshot::Receiver<String>)> {
    browser
        .execute(EnableParams::default())
        .await
        .map_err(|e| Error::Launch(format!("failed to enable request interception: {e}")))?;

    let events = browser
        .event_listener::<EventRequestPaused>()
        .await
        .map_err(|e| Error::Launch(format!("failed to subscribe to intercepted requests: {e}")))?;

    let (tx, rx) = oneshot::channel();

    let interceptor = pump(
        events.map(|event| PausedRequest::from(&*event)),
        tx,
        move |id| async move {
            browser
                .execute(ContinueRequestParams::new(id))
                .await
                .map(|_| ())
        },
    );

    Ok((interceptor, rx))
}

/// One intercepted request, reduced to what dispatch needs.
struct PausedRequest {
    id: RequestId,
    url: String,
    body: Option<String>,
}

impl From<&EventRequestPaused> for PausedRequest {
    fn from(event: &EventRequestPaused) -> Self {
        let body = event.request.post_data_entries.as_ref().map(|entries| {
            entries
                .iter()
                .filter_map(|entry| entry.bytes.as_ref())
                .filter_map(|bytes| str::from_utf8(bytes.as_ref()).ok())
                .collect()
        });
        Self {
            id: event.request_id.clone(),
            url: event.request.url.clone(),
            body,
        }
    }
}

/// Drive the intercepted-request stream to exhaustion. Every request is
/// resumed exactly once, matched or not; an unresumed request stalls its
/// page indefinitely. The assertion from the first matching request goes
/// out on `tx`; later matches are logged and dropped.
async fn pump<S, F, Fut>(mut requests: S, tx: oneshot::Sender<String>, mut resume: F) -> Error
where
    S: Stream<Item = PausedRequest> + Unpin,
    F: FnMut(RequestId) -> Fut,
    Fut: Future<Output = Result<(), CdpError>>,
{
    let mut tx = Some(tx);
    while let Some(request) = requests.next().await {
        if is_federation_endpoint(&request.url) {
            if let Some(assertion) = request.body.as_deref().and_then(assertion_from_body) {
                match tx.take() {
                    Some(tx) => {
                        debug!(url = %request.url, "captured SAML response");
                        tx.send(assertion).ok();
                    }
                    None => debug!("further federation POST observed after capture; ignored"),
                }
            }
        }
        // Resume failure must not take down the run; it only affects
        // this one request.
        if let Err(err) = resume(request.id).await {
            warn!("failed to resume intercepted request: {err}");
        }
    }
    Error::Login("request interception ended before the session completed".to_string())
}

fn is_federation_endpoint(url: &str) -> bool {
    SAML_ENDPOINTS.contains(&url)
}

/// The response body arrives either URL-encoded
/// (`SAMLResponse=xxx&RelayState=yyy`) or as that same form wrapped in one
/// more layer of base64, depending on the server. Try plain first.
fn assertion_from_body(body: &str) -> Option<String> {
    parse_form(body).or_else(|| decode_and_parse(body))
}

fn parse_form(body: &str) -> Option<String> {
    form_urlencoded::parse(body.as_bytes())
        .find(|(key, _)| key == "SAMLResponse")
        .map(|(_, value)| value.to_string())
}

fn decode_and_parse(body: &str) -> Option<String> {
    STANDARD
        .decode(body)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .as_deref()
        .and_then(parse_form)
}
