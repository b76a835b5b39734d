//! Headless Chrome over the DevTools protocol.
//!
//! Chart extraction only needs three things from a browser: open a URL, run
//! an expression and hand back its JSON value, and shut down. [`ChartBrowser`]
//! is that seam; [`ChromiumBrowser`] implements it with chromiumoxide on a
//! private current-thread runtime so the rest of the crate stays blocking.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chromiumoxide::error::CdpError;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde_json::Value as Json;
use url::Url;

use crate::source::SourceError;

pub trait ChartBrowser {
    fn navigate(&mut self, url: &Url) -> Result<(), SourceError>;

    /// Evaluate a JavaScript expression and return its value by value.
    fn evaluate(&mut self, script: &str) -> Result<Json, SourceError>;

    /// Release the browser. Calling it twice is a no-op.
    fn close(&mut self) -> Result<(), SourceError>;
}

/// Evaluate `script` and decode the result.
pub fn evaluate_as<T: DeserializeOwned>(
    browser: &mut dyn ChartBrowser,
    script: &str,
) -> Result<T, SourceError> {
    let value = browser.evaluate(script)?;
    serde_json::from_value(value)
        .map_err(|e| SourceError::malformed(format!("unexpected script result: {e}")))
}

#[derive(Debug, Clone)]
pub struct ChromeConfig {
    /// Chrome or Chromium binary; the usual install locations are searched
    /// when unset.
    pub executable: Option<PathBuf>,
    pub headless: bool,
    /// Upper bound on any single DevTools request.
    pub request_timeout: Duration,
}

impl Default for ChromeConfig {
    fn default() -> Self {
        Self {
            executable: None,
            headless: true,
            request_timeout: Duration::from_secs(30),
        }
    }
}

pub struct ChromiumBrowser {
    runtime: tokio::runtime::Runtime,
    browser: Option<chromiumoxide::Browser>,
    page: chromiumoxide::Page,
    handler: tokio::task::JoinHandle<()>,
    // Chrome profile; removed when the browser is dropped.
    _profile: tempfile::TempDir,
}

impl ChromiumBrowser {
    pub fn launch(config: &ChromeConfig) -> Result<Self, SourceError> {
        let executable = find_chrome_binary(config.executable.as_deref())?;
        let profile = tempfile::Builder::new()
            .prefix("xcheck-chrome-")
            .tempdir()
            .map_err(|e| SourceError::unavailable(format!("failed to create browser profile dir: {e}")))?;

        let mut builder = chromiumoxide::BrowserConfig::builder()
            .chrome_executable(&executable)
            .user_data_dir(profile.path())
            .request_timeout(config.request_timeout)
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-gpu")
            .arg("--disable-extensions")
            .arg("--disable-dev-shm-usage");
        if !config.headless {
            builder = builder.with_head();
        }
        let browser_config = builder
            .build()
            .map_err(|e| SourceError::unavailable(format!("invalid browser config: {e}")))?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| SourceError::unavailable(format!("failed to start browser runtime: {e}")))?;

        let (browser, page, handler) = runtime.block_on(async {
            let (browser, mut handler) = chromiumoxide::Browser::launch(browser_config)
                .await
                .map_err(|e| {
                    SourceError::unavailable(format!("failed to launch {}: {e}", executable.display()))
                })?;
            let handler = tokio::spawn(async move { while handler.next().await.is_some() {} });
            let page = browser
                .new_page("about:blank")
                .await
                .map_err(|e| SourceError::unavailable(format!("failed to open a page: {e}")))?;
            Ok::<_, SourceError>((browser, page, handler))
        })?;

        tracing::debug!(executable = %executable.display(), headless = config.headless, "browser launched");
        Ok(Self {
            runtime,
            browser: Some(browser),
            page,
            handler,
            _profile: profile,
        })
    }
}

impl ChartBrowser for ChromiumBrowser {
    fn navigate(&mut self, url: &Url) -> Result<(), SourceError> {
        tracing::debug!(%url, "navigate");
        self.runtime
            .block_on(self.page.goto(url.as_str()))
            .map_err(|e| SourceError::unavailable(format!("navigation to {url} failed: {e}")))?;
        Ok(())
    }

    fn evaluate(&mut self, script: &str) -> Result<Json, SourceError> {
        let result = self.runtime.block_on(self.page.evaluate(script)).map_err(|e| match e {
            CdpError::JavascriptException(details) => {
                SourceError::malformed(format!("script failed: {}", details.text))
            }
            other => SourceError::unavailable(format!("script evaluation failed: {other}")),
        })?;
        Ok(result.into_value::<Json>().unwrap_or(Json::Null))
    }

    fn close(&mut self) -> Result<(), SourceError> {
        let Some(mut browser) = self.browser.take() else {
            return Ok(());
        };
        let closed = self.runtime.block_on(async {
            browser.close().await.map_err(|e| e.to_string())?;
            browser.wait().await.map_err(|e| e.to_string())?;
            Ok::<_, String>(())
        });
        self.handler.abort();
        closed.map_err(|e| SourceError::unavailable(format!("failed to close browser: {e}")))?;
        tracing::debug!("browser closed");
        Ok(())
    }
}

impl Drop for ChromiumBrowser {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(error = %e, "browser did not shut down cleanly");
        }
    }
}

#[cfg(target_os = "linux")]
const CHROME_CANDIDATES: &[&str] = &[
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
];

#[cfg(target_os = "macos")]
const CHROME_CANDIDATES: &[&str] = &[
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
];

#[cfg(target_os = "windows")]
const CHROME_CANDIDATES: &[&str] = &[
    r"C:\Program Files\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
];

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
const CHROME_CANDIDATES: &[&str] = &[];

/// A configured path must exist; otherwise the first installed candidate wins.
pub fn find_chrome_binary(configured: Option<&Path>) -> Result<PathBuf, SourceError> {
    if let Some(path) = configured {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        return Err(SourceError::unavailable(format!(
            "browser executable {} not found",
            path.display()
        )));
    }
    CHROME_CANDIDATES
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
        .ok_or_else(|| {
            SourceError::unavailable("no Chrome or Chromium installation found; set the browser executable")
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_executable_must_exist() {
        let err = find_chrome_binary(Some(Path::new("/definitely/not/chrome"))).unwrap_err();
        assert!(err.is_unavailable());
        assert!(err.to_string().contains("/definitely/not/chrome"), "{err}");
    }

    #[test]
    fn configured_executable_is_used_as_is() {
        let dir = tempfile::tempdir().unwrap();
        let fake = dir.path().join("chrome");
        std::fs::write(&fake, "").unwrap();
        assert_eq!(find_chrome_binary(Some(&fake)).unwrap(), fake);
    }

    #[test]
    fn launch_with_missing_executable_is_unavailable() {
        let config = ChromeConfig {
            executable: Some(PathBuf::from("/definitely/not/chrome")),
            ..ChromeConfig::default()
        };
        assert!(ChromiumBrowser::launch(&config).err().is_some_and(|e| e.is_unavailable()));
    }

    struct Canned(Json);

    impl ChartBrowser for Canned {
        fn navigate(&mut self, _: &Url) -> Result<(), SourceError> {
            Ok(())
        }
        fn evaluate(&mut self, _: &str) -> Result<Json, SourceError> {
            Ok(self.0.clone())
        }
        fn close(&mut self) -> Result<(), SourceError> {
            Ok(())
        }
    }

    #[test]
    fn evaluate_as_decodes_or_reports_malformed() {
        let mut browser = Canned(serde_json::json!(["a", null]));
        let labels: Vec<Option<String>> = evaluate_as(&mut browser, "x").unwrap();
        assert_eq!(labels, [Some("a".to_string()), None]);

        let err = evaluate_as::<usize>(&mut browser, "x").unwrap_err();
        assert!(matches!(err, SourceError::Malformed(ref m) if m.contains("unexpected script result")));
    }
}
