//! chromiumoxide implementation of the browser session capability.
//!
//! One Chrome process is shared by the whole service and lazily
//! launched on the first request; every acquired session is a fresh
//! page on that browser. The provider health-checks the browser before
//! handing out pages and relaunches it after a crash.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfigBuilder, HeadlessMode};
use chromiumoxide::error::CdpError;
use chromiumoxide::fetcher::{BrowserFetcher, BrowserFetcherOptions};
use chromiumoxide::{Element, Page};
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::{self, JoinHandle};
use tracing::{debug, info, warn};

use super::{BrowserSession, DomElement, SessionError, SessionProvider, SessionResult};

/// User agent presented to the listing sites.
const CHROME_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/132.0.6834.160 Safari/537.36";

/// Poll interval while waiting for a selector to appear.
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Distinguishes user-data dirs across relaunches within one process.
static LAUNCH_SEQ: AtomicU64 = AtomicU64::new(0);

// =============================================================================
// Error classification
// =============================================================================

/// Classify a CDP error into the session error taxonomy.
///
/// chromiumoxide surfaces most DevTools protocol failures as message
/// strings, so classification is by substring, the same way retryable
/// errors are recognized in browser automation generally.
fn classify(err: &CdpError) -> SessionError {
    if matches!(err, CdpError::Timeout) {
        return SessionError::Backend("cdp request timed out".to_string());
    }

    let msg = err.to_string();
    let lower = msg.to_lowercase();

    if lower.contains("node with given id does not belong")
        || lower.contains("no node with given id")
        || lower.contains("stale")
    {
        SessionError::Stale
    } else if lower.contains("could not find node") || lower.contains("could not find element") {
        SessionError::NotFound
    } else if lower.contains("net::err") || lower.contains("navigation") {
        SessionError::Navigation(msg)
    } else {
        SessionError::Backend(msg)
    }
}

// =============================================================================
// Element and session wrappers
// =============================================================================

struct ChromeElement {
    inner: Element,
}

#[async_trait]
impl DomElement for ChromeElement {
    async fn find_one(&self, query: &str) -> SessionResult<Option<Box<dyn DomElement>>> {
        match self.inner.find_element(query).await {
            Ok(el) => Ok(Some(Box::new(ChromeElement { inner: el }))),
            Err(e) => match classify(&e) {
                SessionError::NotFound => Ok(None),
                other => Err(other),
            },
        }
    }

    async fn text(&self) -> SessionResult<String> {
        let text = self.inner.inner_text().await.map_err(|e| classify(&e))?;
        Ok(text.unwrap_or_default())
    }

    async fn send_keys(&self, text: &str) -> SessionResult<()> {
        self.inner.type_str(text).await.map_err(|e| classify(&e))?;
        Ok(())
    }

    async fn click(&self) -> SessionResult<()> {
        self.inner.click().await.map_err(|e| classify(&e))?;
        Ok(())
    }
}

/// One Chrome page implementing the session capability contract.
pub struct ChromeSession {
    page: Page,
}

#[async_trait]
impl BrowserSession for ChromeSession {
    async fn navigate(&self, url: &str) -> SessionResult<()> {
        self.page
            .goto(url)
            .await
            .map_err(|e| SessionError::Navigation(e.to_string()))?;
        self.page
            .wait_for_navigation()
            .await
            .map_err(|e| SessionError::Navigation(e.to_string()))?;
        Ok(())
    }

    /// Poll for `query` until it matches or `timeout` elapses.
    ///
    /// `wait_for_navigation` returns when the HTTP response arrives,
    /// but the listing sites render results via JavaScript afterwards,
    /// so presence in the DOM has to be verified by polling.
    async fn wait_for(&self, query: &str, timeout: Duration) -> SessionResult<bool> {
        let start = Instant::now();
        loop {
            match self.page.find_element(query).await {
                Ok(_) => {
                    debug!(%query, elapsed = ?start.elapsed(), "selector appeared");
                    return Ok(true);
                }
                Err(e) => {
                    if let SessionError::Backend(msg) = classify(&e) {
                        // A broken browser channel will not recover by
                        // polling; report it instead of spinning.
                        if !msg.contains("timed out") {
                            return Err(SessionError::Backend(msg));
                        }
                    }
                }
            }
            if start.elapsed() >= timeout {
                debug!(%query, ?timeout, "selector did not appear in time");
                return Ok(false);
            }
            tokio::time::sleep(WAIT_POLL_INTERVAL).await;
        }
    }

    async fn find_all(&self, query: &str) -> SessionResult<Vec<Box<dyn DomElement>>> {
        let elements = self
            .page
            .find_elements(query)
            .await
            .map_err(|e| classify(&e))?;
        Ok(elements
            .into_iter()
            .map(|inner| Box::new(ChromeElement { inner }) as Box<dyn DomElement>)
            .collect())
    }

    async fn close(&self) -> SessionResult<()> {
        self.page
            .clone()
            .close()
            .await
            .map_err(|e| SessionError::Backend(e.to_string()))?;
        Ok(())
    }
}

// =============================================================================
// Browser lifecycle
// =============================================================================

/// Wrapper for the Browser and its event handler task.
///
/// The handler MUST be aborted when the browser goes away, otherwise
/// it runs indefinitely after the Chrome process exits. The temp
/// profile directory is removed once Chrome has released its file
/// handles.
struct BrowserHandle {
    browser: Browser,
    handler: JoinHandle<()>,
    user_data_dir: Option<PathBuf>,
}

impl BrowserHandle {
    fn browser(&self) -> &Browser {
        &self.browser
    }

    fn browser_mut(&mut self) -> &mut Browser {
        &mut self.browser
    }

    /// Remove the temp profile directory. Blocking on purpose: this is
    /// also called from Drop where async is not available.
    fn cleanup_temp_dir(&mut self) {
        if let Some(path) = self.user_data_dir.take() {
            info!("Removing browser profile directory: {}", path.display());
            if let Err(e) = std::fs::remove_dir_all(&path) {
                warn!(
                    "Failed to remove profile directory {}: {}",
                    path.display(),
                    e
                );
            }
        }
    }
}

impl Drop for BrowserHandle {
    fn drop(&mut self) {
        self.handler.abort();
        if self.user_data_dir.is_some() {
            warn!("BrowserHandle dropped without explicit shutdown, cleaning up in Drop");
            self.cleanup_temp_dir();
        }
    }
}

/// Find a Chrome/Chromium executable on the system.
///
/// The `CHROMIUM_PATH` environment variable overrides all other
/// search locations.
async fn find_browser_executable() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("CHROMIUM_PATH") {
        let path = PathBuf::from(path);
        if path.exists() {
            info!("Using browser from CHROMIUM_PATH: {}", path.display());
            return Ok(path);
        }
        warn!(
            "CHROMIUM_PATH points to a non-existent file: {}",
            path.display()
        );
    }

    let candidates: Vec<PathBuf> = if cfg!(target_os = "macos") {
        vec![
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"),
            PathBuf::from("/Applications/Chromium.app/Contents/MacOS/Chromium"),
            PathBuf::from("/opt/homebrew/bin/chromium"),
        ]
    } else {
        vec![
            PathBuf::from("/usr/bin/google-chrome"),
            PathBuf::from("/usr/bin/google-chrome-stable"),
            PathBuf::from("/usr/bin/chromium"),
            PathBuf::from("/usr/bin/chromium-browser"),
            PathBuf::from("/snap/bin/chromium"),
            PathBuf::from("/opt/google/chrome/chrome"),
        ]
    };

    for path in candidates {
        if path.exists() {
            info!("Found browser at: {}", path.display());
            return Ok(path);
        }
    }

    Err(anyhow::anyhow!("Chrome/Chromium executable not found"))
}

/// Download a managed Chromium into the cache directory and return the
/// executable path. Used when no system browser is found.
async fn download_managed_browser() -> Result<PathBuf> {
    info!("No system browser found, downloading managed Chromium");

    let cache_dir = dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("autovitrine")
        .join("chromium");
    std::fs::create_dir_all(&cache_dir).context("Failed to create browser cache directory")?;

    let fetcher = BrowserFetcher::new(
        BrowserFetcherOptions::builder()
            .with_path(&cache_dir)
            .build()
            .context("Failed to build fetcher options")?,
    );
    let revision_info = fetcher.fetch().await.context("Failed to fetch browser")?;

    info!(
        "Downloaded Chromium to: {}",
        revision_info.folder_path.display()
    );
    Ok(revision_info.executable_path)
}

/// Launch Chrome with an isolated profile directory and a tracked
/// event handler task.
async fn launch_browser(headless: bool) -> Result<BrowserHandle> {
    let chrome_path = match find_browser_executable().await {
        Ok(path) => path,
        Err(_) => download_managed_browser().await?,
    };

    let user_data_dir = std::env::temp_dir().join(format!(
        "autovitrine_chrome_{}_{}",
        std::process::id(),
        LAUNCH_SEQ.fetch_add(1, Ordering::Relaxed)
    ));
    std::fs::create_dir_all(&user_data_dir).context("Failed to create user data directory")?;

    let mut config_builder = BrowserConfigBuilder::default()
        .request_timeout(Duration::from_secs(30))
        .window_size(1920, 1080)
        .user_data_dir(user_data_dir.clone())
        .chrome_executable(chrome_path);

    if headless {
        config_builder = config_builder.headless_mode(HeadlessMode::default());
    } else {
        config_builder = config_builder.with_head();
    }

    config_builder = config_builder
        .arg(format!("--user-agent={CHROME_USER_AGENT}"))
        .arg("--disable-blink-features=AutomationControlled")
        .arg("--disable-infobars")
        .arg("--disable-notifications")
        .arg("--disable-dev-shm-usage")
        .arg("--disable-extensions")
        .arg("--disable-popup-blocking")
        .arg("--disable-background-networking")
        .arg("--disable-background-timer-throttling")
        .arg("--no-first-run")
        .arg("--no-default-browser-check")
        .arg("--no-sandbox")
        .arg("--ignore-certificate-errors")
        .arg("--hide-scrollbars")
        .arg("--mute-audio");

    let browser_config = config_builder
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build browser config: {e}"))?;

    info!(headless, "Launching browser");
    let (browser, mut handler) = Browser::launch(browser_config)
        .await
        .context("Failed to launch browser")?;

    let handler_task = task::spawn(async move {
        while let Some(event) = handler.next().await {
            if let Err(e) = event {
                let msg = e.to_string();
                // Chrome sends CDP events chromiumoxide does not
                // recognize; those deserialization failures are benign.
                if msg.contains("data did not match any variant of untagged enum Message") {
                    tracing::trace!("Suppressed benign CDP serialization error: {msg}");
                } else {
                    tracing::error!("Browser handler error: {msg}");
                }
            }
        }
        info!("Browser event handler task completed");
    });

    Ok(BrowserHandle {
        browser,
        handler: handler_task,
        user_data_dir: Some(user_data_dir),
    })
}

// =============================================================================
// Provider
// =============================================================================

/// Session provider backed by one shared, lazily launched Chrome.
///
/// # Lifecycle
/// - Chrome is NOT launched on construction; the first `session()`
///   call launches it (~2-3 s).
/// - Subsequent calls reuse the running browser after a health check
///   via the `version()` CDP command; a crashed browser is cleaned up
///   and relaunched automatically.
/// - `shutdown()` closes Chrome gracefully on service exit.
#[derive(Clone)]
pub struct ChromeSessionProvider {
    browser: Arc<Mutex<Option<BrowserHandle>>>,
    headless: bool,
}

impl ChromeSessionProvider {
    #[must_use]
    pub fn new(headless: bool) -> Self {
        Self {
            browser: Arc::new(Mutex::new(None)),
            headless,
        }
    }

    /// Open a fresh page on the shared browser, launching or
    /// relaunching Chrome when needed.
    async fn open_page(&self) -> Result<Page> {
        let mut guard = self.browser.lock().await;

        if let Some(handle) = guard.as_ref() {
            match handle.browser().version().await {
                Ok(_) => debug!("Browser health check passed"),
                Err(e) => {
                    warn!("Browser health check failed: {e}. Relaunching");
                    if let Some(mut crashed) = guard.take() {
                        let _ = crashed.browser_mut().close().await;
                        let _ = crashed.browser_mut().wait().await;
                        crashed.cleanup_temp_dir();
                    }
                }
            }
        }

        if guard.is_none() {
            *guard = Some(launch_browser(self.headless).await?);
        }

        let handle = guard
            .as_ref()
            .context("browser handle missing after launch")?;
        let page = handle
            .browser()
            .new_page("about:blank")
            .await
            .context("Failed to create page")?;
        Ok(page)
    }

    /// Shut the browser down if it is running. Safe to call more than
    /// once; subsequent calls are no-ops.
    pub async fn shutdown(&self) -> Result<()> {
        let mut guard = self.browser.lock().await;
        if let Some(mut handle) = guard.take() {
            info!("Shutting down browser");
            if let Err(e) = handle.browser_mut().close().await {
                warn!("Failed to close browser cleanly: {e}");
            }
            if let Err(e) = handle.browser_mut().wait().await {
                warn!("Failed to wait for browser exit: {e}");
            }
            handle.cleanup_temp_dir();
        }
        Ok(())
    }
}

#[async_trait]
impl SessionProvider for ChromeSessionProvider {
    async fn session(&self) -> SessionResult<Box<dyn BrowserSession>> {
        let page = self
            .open_page()
            .await
            .map_err(|e| SessionError::Backend(format!("{e:#}")))?;
        Ok(Box::new(ChromeSession { page }))
    }
}
