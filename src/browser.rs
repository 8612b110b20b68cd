use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig as LaunchConfig};
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::handler::Handler;
use futures::StreamExt;

use crate::config::{BrowserBuilder, BrowserConfig};
use crate::error::{Error, Result};
use crate::page::Page;

/// Flags for a browser launched only to fill a form.
const LAUNCH_FLAGS: &[&str] = &[
    "no-first-run",
    "no-default-browser-check",
    "disable-extensions",
    "disable-gpu",
    "mute-audio",
    "disable-popup-blocking",
    "disable-prompt-on-repost",
];

/// Time given to an attached browser to report its existing tabs.
const ATTACH_SETTLE: Duration = Duration::from_millis(500);

/// A browser session the filler drives, either launched by us or attached to
/// one the applicant already has open.
pub struct AutofillBrowser {
    cdp: Browser,
    timeout: Duration,
    _events: tokio::task::JoinHandle<()>,
}

impl AutofillBrowser {
    pub fn builder() -> BrowserBuilder {
        BrowserBuilder::new()
    }

    /// Start a fresh Chrome with `config`.
    pub async fn launch(config: BrowserConfig) -> Result<Self> {
        let (cdp, handler) = Browser::launch(launch_config(&config)?)
            .await
            .map_err(|e| Error::LaunchError(format!("chrome did not start: {e}")))?;

        tracing::info!(headless = config.headless, "browser launched");
        Ok(Self::drive(cdp, handler, config.default_timeout()))
    }

    /// Attach to a running browser through its DevTools endpoint, e.g. one
    /// started with `--remote-debugging-port=9222`.
    pub async fn connect(url: &str, config: BrowserConfig) -> Result<Self> {
        let (cdp, handler) = Browser::connect(url)
            .await
            .map_err(|e| Error::LaunchError(format!("cannot attach to {url}: {e}")))?;

        let mut session = Self::drive(cdp, handler, config.default_timeout());
        // Tabs opened before we attached are unknown until their targets are fetched.
        let targets = session.cdp.fetch_targets().await?;
        tokio::time::sleep(ATTACH_SETTLE).await;

        tracing::info!(%url, targets = targets.len(), "attached to running browser");
        Ok(session)
    }

    /// Pump CDP events in the background for as long as the session lives.
    fn drive(cdp: Browser, mut handler: Handler, timeout: Duration) -> Self {
        let events = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!(error = %e, "cdp handler event failed");
                }
            }
        });
        Self {
            cdp,
            timeout,
            _events: events,
        }
    }

    /// Open `url` in a new tab.
    pub async fn new_page(&self, url: &str) -> Result<Page> {
        let tab = self
            .cdp
            .new_page(url)
            .await
            .map_err(|e| Error::LaunchError(format!("cannot open {url}: {e}")))?;
        Ok(Page::new(tab, self.timeout))
    }

    /// The first open tab, typically the application the user navigated to
    /// before attaching.
    pub async fn active_page(&self) -> Result<Page> {
        self.pages()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::ElementNotFound("no open tabs".into()))
    }

    pub async fn pages(&self) -> Result<Vec<Page>> {
        let tabs = self.cdp.pages().await?;
        Ok(tabs
            .into_iter()
            .map(|tab| Page::new(tab, self.timeout))
            .collect())
    }
}

fn launch_config(config: &BrowserConfig) -> Result<LaunchConfig> {
    let mut builder = LaunchConfig::builder().no_sandbox().viewport(Viewport {
        width: config.viewport_width,
        height: config.viewport_height,
        device_scale_factor: None,
        emulating_mobile: false,
        is_landscape: false,
        has_touch: false,
    });
    builder = if config.headless {
        builder.new_headless_mode()
    } else {
        builder.with_head()
    };
    builder = builder.args(LAUNCH_FLAGS.iter().copied());
    if let Some(ref path) = config.chrome_path {
        builder = builder.chrome_executable(path);
    }
    builder.build().map_err(Error::LaunchError)
}
