//! Chromium-based browser sessions using chromiumoxide.

use std::collections::HashSet;
use std::io;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use super::{BrowserLauncher, BrowserSession};
use crate::config::BrowserSettings;
use crate::error::BrowserError;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{
    EventLoadingFailed, EventLoadingFinished, EventRequestWillBeSent, SetUserAgentOverrideParams,
};
use chromiumoxide::error::CdpError;
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::listeners::EventStream;
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Returns `JSON.stringify(window.runParams.data)`, or `null` when absent.
const RUN_PARAMS_SCRIPT: &str = r#"(() => {
    const params = window.runParams;
    if (!params || !params.data) {
        return null;
    }
    return JSON.stringify(params.data);
})()"#;

const READY_STATE_SCRIPT: &str = "document.readyState";

/// In-flight requests still tolerated as "idle" (`networkidle2`).
const IDLE_MAX_IN_FLIGHT: usize = 2;
/// How long the in-flight count must stay at or below the limit.
const NETWORK_IDLE_WINDOW: Duration = Duration::from_millis(500);
const POLL_INTERVAL: Duration = Duration::from_millis(100);
/// Bound on reaping the child process after close or kill.
const REAP_TIMEOUT: Duration = Duration::from_secs(5);

/// Find a Chromium binary on `PATH`.
pub fn find_chromium() -> Option<PathBuf> {
    ["google-chrome", "chromium", "chromium-browser", "chrome"]
        .into_iter()
        .find_map(|name| which::which(name).ok())
}

/// Launches a fresh headless Chromium for every session.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChromiumLauncher;

impl ChromiumLauncher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    async fn launch(
        &self,
        settings: &BrowserSettings,
    ) -> Result<Box<dyn BrowserSession>, BrowserError> {
        let mut builder = BrowserConfig::builder()
            .viewport(Viewport {
                width: settings.viewport_width,
                height: settings.viewport_height,
                device_scale_factor: None,
                emulating_mobile: false,
                is_landscape: true,
                has_touch: false,
            })
            .window_size(settings.viewport_width, settings.viewport_height);

        if let Some(ref path) = settings.chrome_path {
            builder = builder.chrome_executable(path);
        }
        for arg in &settings.launch_args {
            builder = builder.arg(arg);
        }

        let config = builder
            .build()
            .map_err(|e| BrowserError::LaunchFailed(format!("failed to build browser config: {e}")))?;

        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::LaunchFailed(e.to_string()))?;

        let events = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "browser handler event error");
                }
            }
        });

        info!(
            user_agent = %settings.user_agent,
            width = settings.viewport_width,
            height = settings.viewport_height,
            "configuring browser page"
        );

        let page = match open_page(&browser, settings).await {
            Ok(page) => page,
            Err(e) => {
                // The process is already up; take it down before reporting.
                if let Err(close_err) = shutdown(&mut browser, REAP_TIMEOUT).await {
                    warn!(error = %close_err, "failed to close browser after page setup error");
                }
                events.abort();
                return Err(e);
            }
        };

        Ok(Box::new(ChromiumSession {
            browser,
            page,
            events,
        }))
    }
}

async fn open_page(browser: &Browser, settings: &BrowserSettings) -> Result<Page, BrowserError> {
    let page = browser.new_page("about:blank").await?;
    page.execute(SetUserAgentOverrideParams::new(settings.user_agent.clone()))
        .await?;
    Ok(page)
}

/// Poll until the document reports `complete`.
///
/// Evaluation errors while the old document is torn down count as not ready.
async fn wait_for_load(page: &Page) {
    loop {
        let complete = page
            .evaluate(READY_STATE_SCRIPT)
            .await
            .ok()
            .is_some_and(|r| r.value().and_then(Value::as_str) == Some("complete"));
        if complete {
            return;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Request ids seen in `requestWillBeSent` and not yet finished or failed.
#[derive(Debug)]
struct InFlight {
    requests: HashSet<String>,
    idle_since: Option<Instant>,
}

impl InFlight {
    fn new(now: Instant) -> Self {
        Self {
            requests: HashSet::new(),
            idle_since: Some(now),
        }
    }

    fn started(&mut self, id: &str, now: Instant) {
        // Redirects reuse the id of the request they replace.
        self.requests.insert(id.to_string());
        self.update(now);
    }

    fn finished(&mut self, id: &str, now: Instant) {
        self.requests.remove(id);
        self.update(now);
    }

    fn update(&mut self, now: Instant) {
        if self.requests.len() > IDLE_MAX_IN_FLIGHT {
            self.idle_since = None;
        } else if self.idle_since.is_none() {
            self.idle_since = Some(now);
        }
    }

    fn is_idle(&self, now: Instant) -> bool {
        self.idle_since
            .is_some_and(|since| now.duration_since(since) >= NETWORK_IDLE_WINDOW)
    }

    fn len(&self) -> usize {
        self.requests.len()
    }
}

/// Network events of one page, subscribed before navigation starts.
struct NetworkEvents {
    sent: EventStream<EventRequestWillBeSent>,
    finished: EventStream<EventLoadingFinished>,
    failed: EventStream<EventLoadingFailed>,
}

impl NetworkEvents {
    async fn subscribe(page: &Page) -> Result<Self, BrowserError> {
        Ok(Self {
            sent: page.event_listener::<EventRequestWillBeSent>().await?,
            finished: page.event_listener::<EventLoadingFinished>().await?,
            failed: page.event_listener::<EventLoadingFailed>().await?,
        })
    }

    /// Return once at most two requests have been in flight for 500 ms.
    async fn wait_for_idle(self) {
        let Self {
            mut sent,
            mut finished,
            mut failed,
        } = self;
        let mut in_flight = InFlight::new(Instant::now());
        let mut tick = tokio::time::interval(POLL_INTERVAL);

        loop {
            // Queued events are applied before the idle check looks at the count.
            tokio::select! {
                biased;
                Some(event) = sent.next() => {
                    in_flight.started(event.request_id.inner(), Instant::now());
                }
                Some(event) = finished.next() => {
                    in_flight.finished(event.request_id.inner(), Instant::now());
                }
                Some(event) = failed.next() => {
                    in_flight.finished(event.request_id.inner(), Instant::now());
                }
                _ = tick.tick() => {
                    if in_flight.is_idle(Instant::now()) {
                        debug!(in_flight = in_flight.len(), "network idle");
                        return;
                    }
                }
            }
        }
    }
}

/// Process control `shutdown` needs from a launched browser.
#[async_trait]
trait BrowserProcess: Send {
    async fn close(&mut self) -> Result<(), BrowserError>;
    async fn kill(&mut self) -> Option<io::Result<()>>;
    async fn wait(&mut self) -> io::Result<()>;
}

#[async_trait]
impl BrowserProcess for Browser {
    async fn close(&mut self) -> Result<(), BrowserError> {
        Browser::close(self).await.map(|_| ()).map_err(BrowserError::from)
    }

    async fn kill(&mut self) -> Option<io::Result<()>> {
        Browser::kill(self).await
    }

    async fn wait(&mut self) -> io::Result<()> {
        Browser::wait(self).await.map(|_| ())
    }
}

/// Close the browser and reap its process.
///
/// A failed close kills the process; a process that does not exit within
/// `reap_timeout` is killed as well. Returns the close result.
async fn shutdown<P>(process: &mut P, reap_timeout: Duration) -> Result<(), BrowserError>
where
    P: BrowserProcess + ?Sized,
{
    let closed = process.close().await;
    if let Err(e) = &closed {
        debug!(error = %e, "close command failed, killing browser process");
        kill(&mut *process).await;
    }

    match tokio::time::timeout(reap_timeout, process.wait()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!(error = %e, "failed to reap browser process"),
        Err(_) => {
            warn!(
                timeout_ms = reap_timeout.as_millis() as u64,
                "browser process did not exit, killing"
            );
            kill(&mut *process).await;
        }
    }
    closed
}

async fn kill<P: BrowserProcess + ?Sized>(process: &mut P) {
    if let Some(Err(e)) = process.kill().await {
        warn!(error = %e, "failed to kill browser process");
    }
}

/// A launched Chromium process and its single page.
pub struct ChromiumSession {
    browser: Browser,
    page: Page,
    events: JoinHandle<()>,
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn navigate(&mut self, url: &str) -> Result<(), BrowserError> {
        let start = Instant::now();
        let network = NetworkEvents::subscribe(&self.page).await?;

        // chromiumoxide gives up on the navigate command after its own fixed
        // request timeout. The page keeps loading; the caller's timeout is
        // the only deadline.
        match self.page.goto(url).await {
            Ok(_) => {}
            Err(CdpError::Timeout) => {
                debug!(url, "navigate command timed out, waiting for load");
            }
            Err(e) => return Err(BrowserError::NavigationFailed(e.to_string())),
        }

        wait_for_load(&self.page).await;
        network.wait_for_idle().await;

        debug!(
            url,
            load_time_ms = start.elapsed().as_millis() as u64,
            "page loaded"
        );
        Ok(())
    }

    async fn run_params_data(&mut self) -> Result<Option<Value>, BrowserError> {
        let result = self
            .page
            .evaluate(RUN_PARAMS_SCRIPT)
            .await
            .map_err(|e| BrowserError::JsEvalFailed(e.to_string()))?;

        match result.value() {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(json)) => Ok(Some(serde_json::from_str(json)?)),
            Some(other) => Ok(Some(other.clone())),
        }
    }

    async fn close(self: Box<Self>) -> Result<(), BrowserError> {
        let mut this = *self;
        let closed = shutdown(&mut this.browser, REAP_TIMEOUT).await;
        this.events.abort();
        closed
    }
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        self.events.abort();
    }
}
