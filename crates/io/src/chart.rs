//! Rendered chart source: opens an HTML report in a browser and reads the
//! table back out of the rendered SVG.
//!
//! Extraction is split in two. The browser side only returns raw strings
//! (text nodes, slice labels, a column count); turning those into a
//! [`Table`] is pure and lives in the `parse_*` functions below.

use std::path::PathBuf;
use std::str::FromStr;
use std::thread;
use std::time::{Duration, Instant};

use crosscheck_recon::{Table, Value};
use serde::de::value::{Error as ValueError, StrDeserializer};
use serde::de::IntoDeserializer;
use serde::Deserialize;
use url::Url;

use crate::browser::{evaluate_as, ChartBrowser, ChromeConfig, ChromiumBrowser};
use crate::source::{RowFilter, Source, SourceError};

pub const DEFAULT_MIN_TEXT_NODES: usize = 10;

/// How the rendered chart lays out its data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartLayout {
    /// Table whose text nodes list each column's values, then its header.
    ValuesBeforeHeader,
    /// Table split into `g.y-column` groups, header first in each group.
    HeaderFirst,
    /// Pie or doughnut slices labelled `<label><br><value>`.
    PieSlices,
}

impl ChartLayout {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ValuesBeforeHeader => "values_before_header",
            Self::HeaderFirst => "header_first",
            Self::PieSlices => "pie_slices",
        }
    }

    /// CSS selector whose presence means the chart has rendered.
    pub fn ready_selector(&self) -> &'static str {
        match self {
            Self::ValuesBeforeHeader => "g.table text",
            Self::HeaderFirst => "g.y-column",
            Self::PieSlices => "g.pielayer g.slice",
        }
    }

    fn ready_script(&self) -> String {
        format!("document.querySelectorAll('{}').length", self.ready_selector())
    }
}

/// Parses the snake_case names used in run configs.
impl FromStr for ChartLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let de: StrDeserializer<'_, ValueError> = s.into_deserializer();
        Self::deserialize(de).map_err(|e| format!("invalid layout: {e}"))
    }
}

const TABLE_TEXTS_SCRIPT: &str = "\
(() => {
  const table = document.querySelector('g.table');
  if (!table) return [];
  return Array.from(table.querySelectorAll('text')).map(t => t.textContent);
})()";

const PIE_LABELS_SCRIPT: &str = "\
Array.from(document.querySelectorAll('g.pielayer g.slice')).map(s => {
  const t = s.querySelector('g.slicetext text');
  return t ? t.getAttribute('data-unformatted') : null;
})";

// ---------------------------------------------------------------------------
// Report handle
// ---------------------------------------------------------------------------

/// Where the rendered report lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportHandle {
    File(PathBuf),
    Url(Url),
}

impl ReportHandle {
    /// `http(s)://` and `file://` strings are URLs; anything else is a path.
    pub fn parse(s: &str) -> Self {
        match Url::parse(s) {
            Ok(url) if matches!(url.scheme(), "http" | "https" | "file") => Self::Url(url),
            _ => Self::File(PathBuf::from(s)),
        }
    }

    pub fn to_url(&self) -> Result<Url, SourceError> {
        match self {
            Self::Url(url) => Ok(url.clone()),
            Self::File(path) => {
                let abs = path.canonicalize().map_err(|_| {
                    SourceError::unavailable(format!("report {} not found", path.display()))
                })?;
                Url::from_file_path(&abs).map_err(|()| {
                    SourceError::unavailable(format!("report {} is not a valid file path", abs.display()))
                })
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ChartSource {
    pub chrome: ChromeConfig,
    pub layout: ChartLayout,
    /// Expected headers (`values_before_header`) or output headers (`pie_slices`).
    pub headers: Vec<String>,
    pub min_text_nodes: usize,
    pub ready_timeout: Duration,
    pub poll_interval: Duration,
    pub filter: Option<RowFilter>,
}

impl ChartSource {
    pub fn new(chrome: ChromeConfig, layout: ChartLayout, headers: Vec<String>) -> Self {
        Self {
            chrome,
            layout,
            headers,
            min_text_nodes: DEFAULT_MIN_TEXT_NODES,
            ready_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(250),
            filter: None,
        }
    }

    /// Read the chart at `url` with an already running browser, then close
    /// it whatever the outcome.
    pub fn load_with(&self, browser: &mut dyn ChartBrowser, url: &Url) -> Result<Table, SourceError> {
        let extracted = self.extract(browser, url);
        if let Err(e) = browser.close() {
            tracing::warn!(error = %e, "browser close failed");
        }

        let table = match &self.filter {
            Some(filter) => filter.apply(&extracted?)?,
            None => extracted?,
        };
        tracing::info!(%url, layout = self.layout.as_str(), rows = table.len(), "loaded chart");
        Ok(table)
    }

    fn extract(&self, browser: &mut dyn ChartBrowser, url: &Url) -> Result<Table, SourceError> {
        browser.navigate(url)?;
        wait_for_render(browser, self.layout, self.ready_timeout, self.poll_interval)?;

        match self.layout {
            ChartLayout::ValuesBeforeHeader => {
                let texts: Vec<String> = evaluate_as(browser, TABLE_TEXTS_SCRIPT)?;
                parse_values_before_header(&texts, &self.headers, self.min_text_nodes)
            }
            ChartLayout::HeaderFirst => {
                let texts: Vec<String> = evaluate_as(browser, TABLE_TEXTS_SCRIPT)?;
                let columns: usize = evaluate_as(browser, &ChartLayout::HeaderFirst.ready_script())?;
                parse_header_first(&texts, columns)
            }
            ChartLayout::PieSlices => {
                let labels: Vec<Option<String>> = evaluate_as(browser, PIE_LABELS_SCRIPT)?;
                parse_pie_slices(&labels, &self.headers)
            }
        }
    }
}

impl Source for ChartSource {
    type Locator = ReportHandle;

    fn load(&self, handle: &ReportHandle) -> Result<Table, SourceError> {
        let url = handle.to_url()?;
        let mut browser = ChromiumBrowser::launch(&self.chrome)?;
        self.load_with(&mut browser, &url)
    }
}

/// Poll until the layout's elements exist or `timeout` elapses. Returns the
/// element count seen.
pub fn wait_for_render(
    browser: &mut dyn ChartBrowser,
    layout: ChartLayout,
    timeout: Duration,
    poll: Duration,
) -> Result<usize, SourceError> {
    let script = layout.ready_script();
    let started = Instant::now();
    loop {
        let count: usize = evaluate_as(browser, &script)?;
        if count > 0 {
            tracing::debug!(selector = layout.ready_selector(), count, "chart rendered");
            return Ok(count);
        }
        if started.elapsed() >= timeout {
            return Err(SourceError::unavailable(format!(
                "rendered element absent: no '{}' after {:.1}s",
                layout.ready_selector(),
                timeout.as_secs_f64()
            )));
        }
        thread::sleep(poll);
    }
}

// ---------------------------------------------------------------------------
// Layout parsing
// ---------------------------------------------------------------------------

fn clean(texts: &[String]) -> Vec<&str> {
    texts.iter().map(|t| t.trim()).filter(|t| !t.is_empty()).collect()
}

fn text_row<'a>(values: impl IntoIterator<Item = &'a str>) -> Vec<Value> {
    values.into_iter().map(Value::text).collect()
}

/// Column k holds the texts between header k-1 and header k.
pub fn parse_values_before_header(
    texts: &[String],
    headers: &[String],
    min_text_nodes: usize,
) -> Result<Table, SourceError> {
    let texts = clean(texts);
    if texts.len() < min_text_nodes {
        return Err(SourceError::malformed(format!(
            "extracted too few text nodes ({} < {min_text_nodes}): {texts:?}",
            texts.len()
        )));
    }
    if headers.is_empty() {
        return Err(SourceError::malformed("no expected headers given"));
    }

    let mut columns: Vec<&[&str]> = Vec::with_capacity(headers.len());
    let mut start = 0;
    for header in headers {
        let offset = texts[start..]
            .iter()
            .position(|t| t == header)
            .ok_or_else(|| {
                SourceError::malformed(format!("header '{header}' not found in: {texts:?}"))
            })?;
        columns.push(&texts[start..start + offset]);
        start += offset + 1;
    }

    let row_count = columns.iter().map(|c| c.len()).min().unwrap_or(0);
    if columns.iter().any(|c| c.len() != row_count) {
        let lengths: Vec<usize> = columns.iter().map(|c| c.len()).collect();
        tracing::warn!(?lengths, row_count, "chart columns differ in length, truncating");
    }

    let mut table = Table::new(headers.iter().cloned())?;
    for r in 0..row_count {
        table.push_row(text_row(columns.iter().map(|c| c[r])))?;
    }
    Ok(table)
}

/// Texts split evenly into `column_count` chunks; each chunk is a header
/// followed by its values. Blank cells are positional here, so they are kept
/// and read back as null.
pub fn parse_header_first(texts: &[String], column_count: usize) -> Result<Table, SourceError> {
    let texts: Vec<&str> = texts.iter().map(|t| t.trim()).collect();
    if column_count == 0 {
        return Err(SourceError::malformed("no rendered table columns"));
    }
    if texts.is_empty() || texts.len() % column_count != 0 {
        return Err(SourceError::malformed(format!(
            "{} text nodes do not split into {column_count} columns",
            texts.len()
        )));
    }

    let per_column = texts.len() / column_count;
    let chunks: Vec<&[&str]> = texts.chunks(per_column).collect();
    if let Some(i) = chunks.iter().position(|c| c[0].is_empty()) {
        return Err(SourceError::malformed(format!("column {i} has a blank header")));
    }
    let mut table = Table::new(chunks.iter().map(|c| c[0]))?;
    for r in 1..per_column {
        table.push_row(
            chunks
                .iter()
                .map(|c| if c[r].is_empty() { Value::Null } else { Value::text(c[r]) })
                .collect(),
        )?;
    }
    Ok(table)
}

/// One row per slice from `"<label><br><value>"` strings.
pub fn parse_pie_slices(labels: &[Option<String>], headers: &[String]) -> Result<Table, SourceError> {
    if headers.len() != 2 {
        return Err(SourceError::malformed(format!(
            "pie layout needs exactly two headers, got {}",
            headers.len()
        )));
    }
    if labels.is_empty() {
        return Err(SourceError::malformed("no slices found"));
    }

    let mut table = Table::new(headers.iter().cloned())?;
    for (i, label) in labels.iter().enumerate() {
        let raw = label
            .as_deref()
            .ok_or_else(|| SourceError::malformed(format!("could not read label for slice {i}")))?;
        let (name, value) = raw.split_once("<br>").ok_or_else(|| {
            SourceError::malformed(format!("slice {i} label '{raw}' has no <br> separator"))
        })?;
        table.push_row(text_row([name.trim(), value.trim()]))?;
    }
    Ok(table)
}
