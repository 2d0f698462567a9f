use crate::scrapers::card::extract_listing;
use crate::scrapers::traits::ListingExtractor;
use crate::scrapers::types::{BrowserSettings, ExtractedFields, ExtractionError, SiteProfile};
use anyhow::{Context, Result};
use async_trait::async_trait;
use headless_chrome::browser::tab::{RequestInterceptor, RequestPausedDecision};
use headless_chrome::browser::transport::{SessionId, Transport};
use headless_chrome::protocol::cdp::Fetch::events::RequestPausedEvent;
use headless_chrome::protocol::cdp::Fetch::{FailRequest, RequestPattern, RequestStage};
use headless_chrome::protocol::cdp::Network::{ErrorReason, ResourceType};
use headless_chrome::util::Timeout;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::collections::HashMap;
use std::ffi::OsStr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";

const EXTRA_HEADERS: [(&str, &str); 5] = [
    (
        "Accept",
        "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
    ),
    (
        "sec-ch-ua",
        "\"Not_A Brand\";v=\"8\", \"Chromium\";v=\"120\", \"Google Chrome\";v=\"120\"",
    ),
    ("sec-ch-ua-mobile", "?0"),
    ("sec-ch-ua-platform", "\"Windows\""),
    ("Upgrade-Insecure-Requests", "1"),
];

const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Open requests tolerated while the network still counts as idle
const MAX_IDLE_CONNECTIONS: usize = 2;

/// Browser-based single listing extractor using headless Chrome.
///
/// Holds no browser between calls: every `extract` launches its own
/// [`BrowserSession`] on a blocking thread and drops it before returning.
pub struct BrowserExtractor {
    profile: Arc<SiteProfile>,
    settings: BrowserSettings,
}

impl BrowserExtractor {
    pub fn new(profile: SiteProfile, settings: BrowserSettings) -> Self {
        Self {
            profile: Arc::new(profile),
            settings,
        }
    }
}

#[async_trait]
impl ListingExtractor for BrowserExtractor {
    async fn extract(&self, url: &str) -> Result<ExtractedFields, ExtractionError> {
        let profile = Arc::clone(&self.profile);
        let settings = self.settings.clone();
        let url = url.to_string();

        tokio::task::spawn_blocking(move || extract_blocking(&url, &profile, &settings))
            .await
            .map_err(|e| ExtractionError::failed(format!("extraction task aborted: {}", e)))?
    }

    fn source_name(&self) -> &'static str {
        self.profile.name
    }
}

/// One browser process plus the tab it drives. Dropping it closes both.
struct BrowserSession {
    tab: Arc<Tab>,
    // Chrome is killed when the Browser handle drops
    _browser: Browser,
}

impl BrowserSession {
    fn launch(settings: &BrowserSettings) -> Result<Self> {
        info!("Launching headless Chrome...");

        let options = LaunchOptions::default_builder()
            .headless(settings.headless)
            .sandbox(false)
            .window_size(Some(settings.window_size))
            .args(vec![
                OsStr::new("--disable-setuid-sandbox"),
                OsStr::new("--disable-features=IsolateOrigins"),
                OsStr::new("--disable-site-isolation-trials"),
            ])
            .build()
            .context("Failed to build launch options")?;

        let browser = Browser::new(options).context("Failed to launch Chrome browser")?;
        let tab = browser.new_tab().context("Failed to open tab")?;

        Ok(Self {
            tab,
            _browser: browser,
        })
    }

    /// Identifying headers plus the resource filter
    fn configure(&self, activity: Arc<NetworkActivity>) -> Result<()> {
        self.tab
            .set_user_agent(USER_AGENT, Some(ACCEPT_LANGUAGE), Some("Win32"))
            .context("Failed to set user agent")?;

        let headers: HashMap<&str, &str> = EXTRA_HEADERS.iter().copied().collect();
        self.tab
            .set_extra_http_headers(headers)
            .context("Failed to set extra headers")?;

        let patterns = [
            RequestPattern {
                url_pattern: None,
                resource_Type: None,
                request_stage: Some(RequestStage::Request),
            },
            RequestPattern {
                url_pattern: None,
                resource_Type: None,
                request_stage: Some(RequestStage::Response),
            },
        ];
        self.tab
            .enable_fetch(Some(&patterns[..]), None)
            .context("Failed to enable request interception")?;
        self.tab
            .enable_request_interception(Arc::new(ResourceFilter { activity }))
            .context("Failed to install request filter")?;

        Ok(())
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        if let Err(e) = self.tab.close(false) {
            debug!("Tab close failed during teardown: {:#}", e);
        }
        debug!("Browser session closed");
    }
}

/// Requests still open, and when that count last exceeded the idle allowance
struct NetworkActivity {
    started: Instant,
    in_flight: AtomicUsize,
    last_busy_ms: AtomicU64,
}

impl NetworkActivity {
    fn new() -> Self {
        Self {
            started: Instant::now(),
            in_flight: AtomicUsize::new(0),
            last_busy_ms: AtomicU64::new(0),
        }
    }

    fn request_started(&self) {
        let before = self.in_flight.fetch_add(1, Ordering::SeqCst);
        self.mark_if_busy(before, before + 1);
    }

    fn request_finished(&self) {
        let before = self
            .in_flight
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| Some(n.saturating_sub(1)))
            .unwrap_or(0);
        self.mark_if_busy(before, before.saturating_sub(1));
    }

    /// The quiet window restarts whenever the page is, or just stopped being, over the allowance
    fn mark_if_busy(&self, before: usize, after: usize) {
        if before > MAX_IDLE_CONNECTIONS || after > MAX_IDLE_CONNECTIONS {
            let elapsed = self.started.elapsed().as_millis() as u64;
            self.last_busy_ms.store(elapsed, Ordering::SeqCst);
        }
    }

    fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    fn is_idle(&self, window: Duration) -> bool {
        if self.in_flight() > MAX_IDLE_CONNECTIONS {
            return false;
        }
        let last = Duration::from_millis(self.last_busy_ms.load(Ordering::SeqCst));
        self.started.elapsed().saturating_sub(last) >= window
    }
}

/// Aborts images, stylesheets and fonts; lets everything else through.
///
/// Intercepts at both the request and the response stage so the response
/// pause marks a continued request as done. Aborted requests are never counted.
struct ResourceFilter {
    activity: Arc<NetworkActivity>,
}

impl ResourceFilter {
    /// `true` to let the paused request continue
    fn admit(&self, resource: &ResourceType, at_response: bool) -> bool {
        if at_response {
            self.activity.request_finished();
            return true;
        }
        if is_blocked(resource) {
            return false;
        }
        self.activity.request_started();
        true
    }
}

impl RequestInterceptor for ResourceFilter {
    fn intercept(
        &self,
        _transport: Arc<Transport>,
        _session_id: SessionId,
        event: RequestPausedEvent,
    ) -> RequestPausedDecision {
        let params = event.params;
        let at_response =
            params.response_status_code.is_some() || params.response_error_reason.is_some();

        if self.admit(&params.resource_Type, at_response) {
            RequestPausedDecision::Continue(None)
        } else {
            RequestPausedDecision::Fail(FailRequest {
                request_id: params.request_id,
                error_reason: ErrorReason::BlockedByClient,
            })
        }
    }
}

fn is_blocked(resource: &ResourceType) -> bool {
    matches!(
        resource,
        ResourceType::Image | ResourceType::Stylesheet | ResourceType::Font
    )
}

/// The whole extraction, run on a blocking thread.
/// `session` lives until the end of this function, so every `?` tears it down.
fn extract_blocking(
    url: &str,
    profile: &SiteProfile,
    settings: &BrowserSettings,
) -> Result<ExtractedFields, ExtractionError> {
    let session = BrowserSession::launch(settings)
        .map_err(|e| ExtractionError::failed(format!("{:#}", e)))?;

    let activity = Arc::new(NetworkActivity::new());
    session
        .configure(Arc::clone(&activity))
        .map_err(|e| ExtractionError::failed(format!("{:#}", e)))?;

    navigate(&session.tab, url, settings, &activity)?;

    info!(selector = %profile.content_anchor, "Waiting for listing content...");
    session
        .tab
        .wait_for_element_with_custom_timeout(&profile.content_anchor, settings.content_timeout)
        .map_err(|e| {
            warn!(url = %url, "Content anchor never rendered: {:#}", e);
            ExtractionError::ContentNotFound {
                selector: profile.content_anchor.clone(),
                timeout: settings.content_timeout,
            }
        })?;

    let html = session
        .tab
        .get_content()
        .map_err(|e| ExtractionError::failed(format!("could not read page HTML: {:#}", e)))?;
    debug!("Captured {} bytes of rendered HTML", html.len());

    let fields = extract_listing(&html, profile)?;
    info!(url = %url, title = %fields.title, "Extracted listing");
    Ok(fields)
}

/// Navigate and then wait for a quiet network window, all inside the navigation budget
fn navigate(
    tab: &Tab,
    url: &str,
    settings: &BrowserSettings,
    activity: &NetworkActivity,
) -> Result<(), ExtractionError> {
    let deadline = Instant::now() + settings.navigation_timeout;

    info!(url = %url, "Navigating to listing page...");
    tab.set_default_timeout(settings.navigation_timeout);
    tab.navigate_to(url)
        .map_err(|e| navigation_error(e, url, settings.navigation_timeout))?;

    tab.set_default_timeout(deadline.saturating_duration_since(Instant::now()));
    tab.wait_until_navigated()
        .map_err(|e| navigation_error(e, url, settings.navigation_timeout))?;

    while !activity.is_idle(settings.network_idle) {
        if Instant::now() >= deadline {
            return Err(ExtractionError::NavigationTimeout {
                url: url.to_string(),
                timeout: settings.navigation_timeout,
                reason: format!("{} requests still open", activity.in_flight()),
            });
        }
        thread::sleep(IDLE_POLL_INTERVAL);
    }

    debug!("Network idle after navigation");
    Ok(())
}

/// Only a wait that ran out is a timeout; DNS or connection errors are plain failures
fn navigation_error(err: anyhow::Error, url: &str, timeout: Duration) -> ExtractionError {
    if err.downcast_ref::<Timeout>().is_some() {
        ExtractionError::NavigationTimeout {
            url: url.to_string(),
            timeout,
            reason: format!("{:#}", err),
        }
    } else {
        ExtractionError::failed(format!("navigation to {} failed: {:#}", url, err))
    }
}
