//! Headless Chromium renderer.
//!
//! The browser is located (or downloaded) and launched on the first render,
//! then shared by every later render of the process. Each render opens its
//! own page with a desktop Chrome user agent, JavaScript on and certificate
//! errors ignored, navigates, waits for the ready selector and scrolls to the
//! bottom until the document height stops growing.

use super::{RenderPage, ScrapeError};
use crate::config::ScrapeConfig;
use chromiumoxide::Page;
use chromiumoxide::browser::{Browser, BrowserConfigBuilder, HeadlessMode};
use chromiumoxide::cdp::browser_protocol::emulation::{
    SetScriptExecutionDisabledParams, SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::security::SetIgnoreCertificateErrorsParams;
use chromiumoxide::fetcher::{BrowserFetcher, BrowserFetcherOptions};
use futures::StreamExt;
use rand::seq::IndexedRandom;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, instrument, trace, warn};

/// Desktop Chrome user agents; one is picked per page.
///
/// Keep within a few releases of current stable.
pub const CHROME_USER_AGENTS: [&str; 4] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.6834.160 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.6834.160 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.6778.204 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.6778.264 Safari/537.36",
];

const HEIGHT_SCRIPT: &str = "document.body.scrollHeight";
const SCROLL_SCRIPT: &str = "window.scrollTo(0, document.body.scrollHeight);";

pub fn random_user_agent() -> &'static str {
    CHROME_USER_AGENTS
        .choose(&mut rand::rng())
        .copied()
        .unwrap_or(CHROME_USER_AGENTS[0])
}

/// A launched browser plus the task pumping its DevTools events.
#[derive(Debug)]
struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
    user_data_dir: Option<PathBuf>,
}

impl BrowserSession {
    async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!(error = %e, "Browser close failed");
        }
        if let Err(e) = self.browser.wait().await {
            warn!(error = %e, "Waiting for browser exit failed");
        }
        self.cleanup_user_data_dir();
    }

    fn cleanup_user_data_dir(&mut self) {
        if let Some(path) = self.user_data_dir.take() {
            if let Err(e) = std::fs::remove_dir_all(&path) {
                warn!(path = %path.display(), error = %e, "Failed to remove browser profile dir");
            } else {
                debug!(path = %path.display(), "Removed browser profile dir");
            }
        }
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        self.handler.abort();
        self.cleanup_user_data_dir();
    }
}

/// [`RenderPage`] implementation backed by a lazily launched Chromium.
pub struct ChromeRenderer {
    config: ScrapeConfig,
    session: Mutex<Option<BrowserSession>>,
}

impl std::fmt::Debug for ChromeRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChromeRenderer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ChromeRenderer {
    pub fn new(config: ScrapeConfig) -> Self {
        Self {
            config,
            session: Mutex::new(None),
        }
    }

    /// Close the browser if one was launched.
    pub async fn shutdown(&self) {
        let session = self.session.lock().await.take();
        if let Some(session) = session {
            info!("Shutting down browser");
            session.close().await;
        }
    }

    /// Open a fresh page configured for scraping, launching the browser if needed.
    async fn open_page(&self) -> Result<Page, ScrapeError> {
        let mut guard = self.session.lock().await;
        if guard.is_none() {
            *guard = Some(launch(&self.config).await?);
        }
        let Some(session) = guard.as_ref() else {
            return Err(ScrapeError::Launch("browser session unavailable".into()));
        };

        let page = session.browser.new_page("about:blank").await?;
        drop(guard);

        prepared(page).await
    }

    /// Navigate, wait for the ready selector and scroll until the height settles.
    async fn load_and_scroll(&self, page: &Page, url: &str) -> Result<String, ScrapeError> {
        let nav_secs = self.config.navigation_timeout_secs;
        timeout(Duration::from_secs(nav_secs), page.goto(url))
            .await
            .map_err(|_| ScrapeError::Timeout {
                stage: "navigating",
                secs: nav_secs,
            })??;

        wait_for_element(
            page,
            &self.config.ready_selector,
            Duration::from_secs(nav_secs),
        )
        .await?;

        scroll_until_stable(
            page,
            Duration::from_millis(self.config.scroll_settle_ms),
            self.config.max_scroll_rounds,
        )
        .await?;

        Ok(page.content().await?)
    }
}

impl RenderPage for ChromeRenderer {
    #[instrument(level = "debug", skip_all, fields(%url))]
    async fn render(&self, url: &str) -> Result<String, ScrapeError> {
        let page = self.open_page().await?;

        let secs = self.config.render_timeout_secs;
        let result = timeout(Duration::from_secs(secs), self.load_and_scroll(&page, url)).await;

        if let Err(e) = page.close().await {
            debug!(error = %e, "Failed to close page");
        }

        match result {
            Ok(rendered) => rendered,
            Err(_) => Err(ScrapeError::Timeout {
                stage: "rendering",
                secs,
            }),
        }
    }
}

/// A freshly opened tab that must be configured before use.
pub(crate) trait FreshPage: Sized {
    async fn prepare(&self) -> Result<(), ScrapeError>;
    async fn discard(self) -> Result<(), ScrapeError>;
}

impl FreshPage for Page {
    /// Random desktop user agent, JavaScript on, certificate errors ignored.
    async fn prepare(&self) -> Result<(), ScrapeError> {
        let user_agent = random_user_agent();
        self.execute(SetUserAgentOverrideParams::new(user_agent))
            .await?;
        self.execute(SetIgnoreCertificateErrorsParams::new(true))
            .await?;
        self.execute(SetScriptExecutionDisabledParams::new(false))
            .await?;
        trace!(user_agent, "Page prepared");
        Ok(())
    }

    async fn discard(self) -> Result<(), ScrapeError> {
        Ok(Page::close(self).await?)
    }
}

/// Prepare `page`, closing it if preparation fails.
pub(crate) async fn prepared<P: FreshPage>(page: P) -> Result<P, ScrapeError> {
    match page.prepare().await {
        Ok(()) => Ok(page),
        Err(e) => {
            if let Err(close_err) = page.discard().await {
                debug!(error = %close_err, "Failed to close unprepared page");
            }
            Err(e)
        }
    }
}

/// A document that can be scrolled to its bottom and measured.
pub(crate) trait Scrollable {
    async fn scroll_height(&self) -> Result<i64, ScrapeError>;
    async fn scroll_to_bottom(&self) -> Result<(), ScrapeError>;
}

impl Scrollable for Page {
    async fn scroll_height(&self) -> Result<i64, ScrapeError> {
        Ok(self.evaluate(HEIGHT_SCRIPT).await?.into_value::<i64>()?)
    }

    async fn scroll_to_bottom(&self) -> Result<(), ScrapeError> {
        self.evaluate(SCROLL_SCRIPT).await?;
        Ok(())
    }
}

/// Scroll to the bottom until the height stops growing or `max_rounds` is hit.
///
/// Returns the number of scrolls performed.
pub(crate) async fn scroll_until_stable<S: Scrollable>(
    target: &S,
    settle: Duration,
    max_rounds: usize,
) -> Result<usize, ScrapeError> {
    let mut previous = target.scroll_height().await?;
    let mut rounds = 0usize;
    while rounds < max_rounds {
        target.scroll_to_bottom().await?;
        sleep(settle).await;
        rounds += 1;

        let current = target.scroll_height().await?;
        trace!(rounds, previous, current, "Scrolled");
        if current == previous {
            return Ok(rounds);
        }
        previous = current;
    }
    debug!(rounds, "Scroll limit reached; page may still be growing");
    Ok(rounds)
}

/// Poll for `selector` with exponential backoff (100ms doubling, capped at 1s).
async fn wait_for_element(page: &Page, selector: &str, limit: Duration) -> Result<(), ScrapeError> {
    let start = std::time::Instant::now();
    let mut poll_interval = Duration::from_millis(100);
    let max_interval = Duration::from_secs(1);

    loop {
        if page.find_element(selector).await.is_ok() {
            return Ok(());
        }
        if start.elapsed() >= limit {
            return Err(ScrapeError::MissingElement {
                selector: selector.to_string(),
            });
        }
        sleep(poll_interval).await;
        poll_interval = (poll_interval * 2).min(max_interval);
    }
}

/// Launch Chromium according to `config`.
#[instrument(level = "info", skip_all)]
async fn launch(config: &ScrapeConfig) -> Result<BrowserSession, ScrapeError> {
    let executable = match &config.chrome_executable {
        Some(path) if path.exists() => path.clone(),
        Some(path) => {
            return Err(ScrapeError::Launch(format!(
                "configured browser {} does not exist",
                path.display()
            )));
        }
        None => match find_browser_executable() {
            Some(path) => path,
            None => download_managed_browser().await?,
        },
    };

    static LAUNCHES: AtomicUsize = AtomicUsize::new(0);
    let user_data_dir = std::env::temp_dir().join(format!(
        "competitor_analyst_chrome_{}_{}",
        std::process::id(),
        LAUNCHES.fetch_add(1, Ordering::Relaxed)
    ));
    launch_with_profile(config, &executable, user_data_dir).await
}

/// Launch `executable` with `user_data_dir` as its profile.
///
/// The profile dir is created here and removed again if the launch fails.
async fn launch_with_profile(
    config: &ScrapeConfig,
    executable: &Path,
    user_data_dir: PathBuf,
) -> Result<BrowserSession, ScrapeError> {
    std::fs::create_dir_all(&user_data_dir)
        .map_err(|e| ScrapeError::Launch(format!("profile dir: {e}")))?;

    match start_browser(config, executable, &user_data_dir).await {
        Ok((browser, handler)) => Ok(BrowserSession {
            browser,
            handler,
            user_data_dir: Some(user_data_dir),
        }),
        Err(e) => {
            if let Err(rm) = std::fs::remove_dir_all(&user_data_dir) {
                warn!(path = %user_data_dir.display(), error = %rm, "Failed to remove browser profile dir");
            }
            Err(e)
        }
    }
}

async fn start_browser(
    config: &ScrapeConfig,
    executable: &Path,
    user_data_dir: &Path,
) -> Result<(Browser, JoinHandle<()>), ScrapeError> {
    let mut builder = BrowserConfigBuilder::default()
        .request_timeout(Duration::from_secs(config.navigation_timeout_secs))
        .window_size(1920, 1080)
        .user_data_dir(user_data_dir)
        .chrome_executable(executable);

    builder = if config.headless {
        builder.headless_mode(HeadlessMode::default())
    } else {
        builder.with_head()
    };

    for arg in launch_args(in_container()) {
        builder = builder.arg(arg);
    }

    let browser_config = builder.build().map_err(ScrapeError::Launch)?;

    info!(executable = %executable.display(), "Launching browser");
    let (browser, mut handler) = Browser::launch(browser_config)
        .await
        .map_err(|e| ScrapeError::Launch(e.to_string()))?;

    let handler = tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if let Err(e) = event {
                let msg = e.to_string();
                // chromiumoxide does not know every CDP event Chrome emits
                if msg.contains("data did not match any variant of untagged enum Message")
                    || msg.contains("Failed to deserialize WS response")
                {
                    trace!(error = %msg, "Ignored unknown CDP message");
                } else {
                    error!(error = %msg, "Browser handler error");
                }
            }
        }
        debug!("Browser handler task finished");
    });

    Ok((browser, handler))
}

/// Command-line switches passed to Chromium.
pub fn launch_args(disable_sandbox: bool) -> Vec<&'static str> {
    let mut args = vec![
        "--ignore-certificate-errors",
        "--disable-blink-features=AutomationControlled",
        "--disable-infobars",
        "--disable-notifications",
        "--disable-extensions",
        "--disable-popup-blocking",
        "--disable-background-networking",
        "--disable-breakpad",
        "--disable-features=TranslateUI",
        "--no-first-run",
        "--no-default-browser-check",
        "--password-store=basic",
        "--use-mock-keychain",
        "--hide-scrollbars",
        "--mute-audio",
    ];
    if disable_sandbox {
        args.extend(["--no-sandbox", "--disable-setuid-sandbox"]);
    }
    args
}

/// Setuid sandboxing does not work inside containers.
fn in_container() -> bool {
    Path::new("/.dockerenv").exists()
        || std::env::var("container").is_ok()
        || std::env::var("KUBERNETES_SERVICE_HOST").is_ok()
}

/// Locate a Chrome/Chromium binary: `CHROMIUM_PATH`, well-known paths, then `which`.
pub fn find_browser_executable() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("CHROMIUM_PATH") {
        let path = PathBuf::from(path);
        if path.exists() {
            info!(path = %path.display(), "Using browser from CHROMIUM_PATH");
            return Some(path);
        }
        warn!(path = %path.display(), "CHROMIUM_PATH points to a missing file");
    }

    let candidates: &[&str] = if cfg!(target_os = "windows") {
        &[
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files\Chromium\Application\chrome.exe",
        ]
    } else if cfg!(target_os = "macos") {
        &[
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
            "/opt/homebrew/bin/chromium",
        ]
    } else {
        &[
            "/usr/bin/google-chrome",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/snap/bin/chromium",
            "/usr/local/bin/chromium",
            "/opt/google/chrome/chrome",
        ]
    };

    if let Some(path) = candidates.iter().map(PathBuf::from).find(|p| p.exists()) {
        info!(path = %path.display(), "Found browser");
        return Some(path);
    }

    if !cfg!(target_os = "windows") {
        for cmd in ["chromium", "chromium-browser", "google-chrome", "chrome"] {
            if let Ok(output) = Command::new("which").arg(cmd).output()
                && output.status.success()
            {
                let found = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !found.is_empty() {
                    info!(path = %found, "Found browser on PATH");
                    return Some(PathBuf::from(found));
                }
            }
        }
    }

    None
}

/// Download a managed Chromium into the user cache directory.
#[instrument(level = "info")]
async fn download_managed_browser() -> Result<PathBuf, ScrapeError> {
    let cache_dir = dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("competitor_analyst")
        .join("chromium");
    std::fs::create_dir_all(&cache_dir)
        .map_err(|e| ScrapeError::Launch(format!("browser cache dir: {e}")))?;

    warn!(path = %cache_dir.display(), "No local Chrome/Chromium found; downloading one");
    let options = BrowserFetcherOptions::builder()
        .with_path(&cache_dir)
        .build()
        .map_err(|e| ScrapeError::Launch(format!("fetcher options: {e}")))?;
    let installation = BrowserFetcher::new(options)
        .fetch()
        .await
        .map_err(|e| ScrapeError::Launch(format!("browser download: {e}")))?;

    info!(path = %installation.executable_path.display(), "Downloaded Chromium");
    Ok(installation.executable_path)
}
