// Scrape module
// Turns a rendered documentation page into one text file per <h3> section

pub mod browser;


use fancy_regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, info};

use crate::http::RetryingAgent;
use crate::{ChatError, Result};

pub use browser::{BrowserConfig, BrowserRenderer};

/// Content root of a published Notion page
pub const DEFAULT_CONTAINER_SELECTOR: &str = ".notion-page-content";

const FETCH_TIMEOUT_SECONDS: u64 = 30;

static TITLE_CLEANUP_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9]").expect("valid regex"));

/// Text gathered under one `<h3>` heading
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// Heading text with every non-alphanumeric character replaced by `_`
    pub title: String,
    /// Distinct element texts in document order, the heading first
    pub lines: Vec<String>,
}

impl Section {
    #[inline]
    pub fn file_name(&self) -> String {
        format!("{}.txt", self.title)
    }

    #[inline]
    pub fn content(&self) -> String {
        self.lines.join("\n")
    }
}

/// File-name-safe form of a heading
#[inline]
pub fn clean_title(heading: &str) -> String {
    TITLE_CLEANUP_REGEX.replace_all(heading, "_").into_owned()
}

/// Split the element matched by `container_selector` into sections.
///
/// Every element below the container is visited in document order and
/// contributes its trimmed text content, which includes the text of its
/// children. An `<h3>` opens a section (or reopens one with the same
/// cleaned title); text before the first `<h3>` is dropped, and a text
/// already present in the current section is not repeated.
#[inline]
pub fn extract_sections(html: &str, container_selector: &str) -> Result<Vec<Section>> {
    let selector = Selector::parse(container_selector).map_err(|e| {
        ChatError::Scraper(format!("Invalid selector '{}': {}", container_selector, e))
    })?;

    let document = Html::parse_document(html);
    let container = document.select(&selector).next().ok_or_else(|| {
        ChatError::Scraper(format!(
            "No element matches '{}' on the page",
            container_selector
        ))
    })?;

    let mut sections: Vec<Section> = Vec::new();
    let mut current: Option<usize> = None;

    for element in container.descendants().skip(1).filter_map(ElementRef::wrap) {
        let text = element.text().collect::<String>();
        let text = text.trim();
        if text.is_empty() {
            continue;
        }

        if element.value().name() == "h3" {
            let title = clean_title(text);
            let position = match sections.iter().position(|s| s.title == title) {
                Some(position) => position,
                None => {
                    sections.push(Section {
                        title,
                        lines: Vec::new(),
                    });
                    sections.len() - 1
                }
            };
            current = Some(position);
        }

        if let Some(section) = current.and_then(|position| sections.get_mut(position)) {
            if !section.lines.iter().any(|line| line == text) {
                section.lines.push(text.to_string());
            }
        }
    }

    debug!("Extracted {} sections", sections.len());
    Ok(sections)
}

/// Write each section to `<dir>/<title>.txt`, creating `dir` if needed.
/// Returns the written paths in section order.
#[inline]
pub fn write_sections(dir: &Path, sections: &[Section]) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;

    sections
        .iter()
        .map(|section| {
            let path = dir.join(section.file_name());
            fs::write(&path, section.content())?;
            debug!("Wrote {}", path.display());
            Ok(path)
        })
        .collect()
}

/// Where page HTML comes from
pub trait PageSource {
    /// HTML of `url` once the element matched by `container_selector` holds
    /// the page content
    fn fetch(&self, url: &str, container_selector: &str) -> Result<String>;
}

/// Static fetch: the page exactly as served, for documentation that does
/// not need JavaScript to render
impl PageSource for RetryingAgent {
    #[inline]
    fn fetch(&self, url: &str, _container_selector: &str) -> Result<String> {
        info!("Fetching {}", url);
        self.get(url, &[("Accept", "text/html")])
    }
}

/// How [`scrape_page`] obtains the page
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FetchMode {
    /// Render in headless Chrome and expand collapsed toggles
    #[default]
    Rendered,
    /// Plain HTTP GET
    Static,
}

/// Load `url`, extract its sections and write them under `out_dir`
#[inline]
pub fn scrape_page(
    url: &str,
    container_selector: &str,
    out_dir: &Path,
    mode: FetchMode,
) -> Result<Vec<PathBuf>> {
    match mode {
        FetchMode::Rendered => {
            let renderer = BrowserRenderer::launch(BrowserConfig::default())?;
            scrape_page_with(&renderer, url, container_selector, out_dir)
        }
        FetchMode::Static => scrape_page_with(
            &RetryingAgent::new(Duration::from_secs(FETCH_TIMEOUT_SECONDS)),
            url,
            container_selector,
            out_dir,
        ),
    }
}

/// [`scrape_page`] with a caller-supplied page source
#[inline]
pub fn scrape_page_with(
    source: &dyn PageSource,
    url: &str,
    container_selector: &str,
    out_dir: &Path,
) -> Result<Vec<PathBuf>> {
    let html = source.fetch(url, container_selector)?;

    let sections = extract_sections(&html, container_selector)?;
    let written = write_sections(out_dir, &sections)?;

    info!(
        "Saved {} sections from {} to {}",
        written.len(),
        url,
        out_dir.display()
    );
    Ok(written)
}
