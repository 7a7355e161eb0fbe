// Browser module
// Renders JavaScript-built pages in headless Chrome and expands collapsed toggles


use anyhow::Context;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::ffi::OsStr;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::PageSource;
use crate::{ChatError, Result};

/// Collapsed blocks in a Notion page are `div`s acting as buttons
pub const TOGGLE_SELECTOR: &str = r#"div[role="button"]"#;

const CLICK_FUNCTION: &str = "function() { this.click(); }";

/// Configuration for rendering pages
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// Whether to run the browser in headless mode
    pub headless: bool,
    pub window_width: u32,
    pub window_height: u32,
    /// Additional Chrome arguments
    pub chrome_args: Vec<String>,
    pub user_agent: String,
    /// Timeout for navigation and element lookups in seconds
    pub navigation_timeout_seconds: u64,
    /// How long to wait for the content container to be rendered
    pub content_timeout_seconds: u64,
    /// Pause after each toggle click so the expanded block can render
    pub toggle_delay_ms: u64,
    /// Browser is shut down after this long without a request
    pub idle_timeout_seconds: u64,
}

impl Default for BrowserConfig {
    #[inline]
    fn default() -> Self {
        Self {
            headless: true,
            window_width: 1280,
            window_height: 720,
            chrome_args: vec![
                "--no-sandbox".to_string(),
                "--disable-dev-shm-usage".to_string(),
                "--disable-gpu".to_string(),
                "--disable-extensions".to_string(),
                "--disable-plugins".to_string(),
                "--disable-background-timer-throttling".to_string(),
                "--disable-renderer-backgrounding".to_string(),
            ],
            user_agent: "api-docs-chat/0.1.0 (Documentation Scraper)".to_string(),
            navigation_timeout_seconds: 30,
            content_timeout_seconds: 20,
            toggle_delay_ms: 1000,
            idle_timeout_seconds: 60,
        }
    }
}

/// Selector for the toggles inside every alternative of `container_selector`
#[inline]
pub fn toggle_selector(container_selector: &str) -> String {
    container_selector
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| format!("{} {}", part, TOGGLE_SELECTOR))
        .collect::<Vec<_>>()
        .join(", ")
}

/// One headless Chrome instance serving page renders
pub struct BrowserRenderer {
    browser: Browser,
    config: BrowserConfig,
}

impl BrowserRenderer {
    /// Launch a browser; fails when no Chrome or Chromium can be started
    #[inline]
    pub fn launch(config: BrowserConfig) -> Result<Self> {
        let args: Vec<&OsStr> = config.chrome_args.iter().map(OsStr::new).collect();
        let launch_options = LaunchOptions {
            headless: config.headless,
            window_size: Some((config.window_width, config.window_height)),
            args,
            idle_browser_timeout: Duration::from_secs(config.idle_timeout_seconds),
            ..Default::default()
        };

        let browser = Browser::new(launch_options)
            .map_err(|e| ChatError::Scraper(format!("Failed to launch browser: {:#}", e)))?;
        info!("Launched headless browser");

        Ok(Self { browser, config })
    }

    fn render(&self, url: &str, container_selector: &str) -> anyhow::Result<String> {
        let tab = self
            .browser
            .new_tab()
            .context("Failed to create browser tab")?;
        tab.set_default_timeout(Duration::from_secs(self.config.navigation_timeout_seconds));
        tab.set_user_agent(&self.config.user_agent, None, None)
            .context("Failed to set user agent")?;

        tab.navigate_to(url)
            .with_context(|| format!("Failed to navigate to {}", url))?;
        tab.wait_until_navigated()
            .with_context(|| format!("Navigation to {} did not complete", url))?;
        tab.wait_for_element_with_custom_timeout(
            container_selector,
            Duration::from_secs(self.config.content_timeout_seconds),
        )
        .with_context(|| format!("'{}' was not rendered on {}", container_selector, url))?;

        let expanded = self.expand_toggles(&tab, container_selector);
        debug!("Expanded {} toggles on {}", expanded, url);

        let content = tab.get_content().context("Failed to get page content")?;
        debug!("Rendered {} bytes from {}", content.len(), url);

        if let Err(e) = tab.close(true) {
            debug!("Failed to close tab: {}", e);
        }
        Ok(content)
    }

    /// Click every toggle found inside the container, once each, in page
    /// order. A toggle that fails to click is skipped.
    fn expand_toggles(&self, tab: &Tab, container_selector: &str) -> usize {
        let selector = toggle_selector(container_selector);
        let toggles = match tab.find_elements(&selector) {
            Ok(toggles) => toggles,
            Err(e) => {
                debug!("No toggles matched '{}': {}", selector, e);
                return 0;
            }
        };

        let delay = Duration::from_millis(self.config.toggle_delay_ms);
        let mut clicked = 0;
        for toggle in &toggles {
            match toggle.call_js_fn(CLICK_FUNCTION, vec![], false) {
                Ok(_) => {
                    clicked += 1;
                    thread::sleep(delay);
                }
                Err(e) => warn!("Failed to expand toggle: {}", e),
            }
        }
        clicked
    }
}

impl PageSource for BrowserRenderer {
    #[inline]
    fn fetch(&self, url: &str, container_selector: &str) -> Result<String> {
        info!("Rendering {}", url);
        self.render(url, container_selector)
            .map_err(|e| ChatError::Scraper(format!("{:#}", e)))
    }
}
