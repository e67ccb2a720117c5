//! Chrome DevTools Protocol backend (uses the `headless_chrome` crate)
//!
//! One Chrome process is one [`ChromeSession`]; each render opens its own
//! tab, sizes it with device metrics emulation, writes the markup into the
//! tab's main frame and captures a PNG once the document, its fonts and its
//! images are ready.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use headless_chrome::browser::tab::Tab;
use headless_chrome::protocol::cdp::{Emulation, Page};
use headless_chrome::{Browser, LaunchOptions};
use log::debug;

use crate::session::{Backend, Session, Surface};
use crate::{Error, Geometry, Result};

// Chrome shuts the connection after this long without traffic. The session
// is meant to live for the whole process, so keep it effectively unbounded.
const IDLE_BROWSER_TIMEOUT: Duration = Duration::from_secs(60 * 60 * 24 * 365);

// Resolves to true once the page, its web fonts and its images have settled,
// or to false when `__RFOX_WAIT_MS__` elapses first.
const READY_SCRIPT: &str = r#"(async function(){
    const deadline = new Promise(function(resolve){ setTimeout(function(){ resolve(false); }, __RFOX_WAIT_MS__); });
    const ready = (async function(){
        if (document.readyState !== 'complete') {
            await new Promise(function(resolve){ window.addEventListener('load', resolve, { once: true }); });
        }
        await document.fonts.ready;
        await Promise.all(Array.from(document.images).map(function(img){
            if (img.complete) return null;
            return new Promise(function(resolve){ img.addEventListener('load', resolve); img.addEventListener('error', resolve); });
        }));
        return true;
    })();
    return await Promise.race([ready, deadline]);
})()"#;

/// Launches headless Chrome
#[derive(Debug, Clone)]
pub struct ChromeBackend {
    /// Chrome executable; `None` lets `headless_chrome` find or fetch one
    pub executable: Option<PathBuf>,
    /// Run Chrome with its sandbox (disable inside most containers)
    pub sandbox: bool,
}

impl Default for ChromeBackend {
    fn default() -> Self {
        Self {
            executable: None,
            sandbox: true,
        }
    }
}

impl Backend for ChromeBackend {
    type Session = ChromeSession;

    fn launch(&self) -> Result<ChromeSession> {
        let launch_options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(self.sandbox)
            .path(self.executable.clone())
            .idle_browser_timeout(IDLE_BROWSER_TIMEOUT)
            .build()
            .map_err(|e| Error::SessionUnavailable(format!("Failed to build launch options: {}", e)))?;

        let browser = Browser::new(launch_options)
            .map_err(|e| Error::SessionUnavailable(format!("Failed to launch browser: {}", e)))?;

        if let Ok(version) = browser.get_version() {
            debug!("Launched {}", version.product);
        }

        Ok(ChromeSession { browser })
    }
}

/// A running Chrome process
pub struct ChromeSession {
    browser: Browser,
}

impl Session for ChromeSession {
    type Surface = ChromeSurface;

    fn is_connected(&self) -> bool {
        self.browser.get_version().is_ok()
    }

    fn open_surface(&self, geometry: Geometry) -> Result<ChromeSurface> {
        let tab = self
            .browser
            .new_tab()
            .map_err(|e| Error::RenderError(format!("Failed to create tab: {}", e)))?;

        let mut surface = ChromeSurface { tab, geometry };
        if let Err(e) = surface.apply_geometry() {
            if let Err(release_err) = surface.release() {
                debug!("Failed to close tab after setup error: {}", release_err);
            }
            return Err(e);
        }
        Ok(surface)
    }

    fn close(&self) -> Result<()> {
        // Closing every tab lets Chrome exit; the process itself is reaped
        // when the last `Browser` handle drops.
        let tabs: Vec<Arc<Tab>> = match self.browser.get_tabs().lock() {
            Ok(tabs) => tabs.clone(),
            Err(_) => Vec::new(),
        };
        for tab in tabs {
            if let Err(e) = tab.close(false) {
                debug!("Failed to close tab during shutdown: {}", e);
            }
        }
        Ok(())
    }
}

/// One tab used for a single render
pub struct ChromeSurface {
    tab: Arc<Tab>,
    geometry: Geometry,
}

impl ChromeSurface {
    fn apply_geometry(&self) -> Result<()> {
        // Built from JSON so only the required protocol fields need naming.
        let metrics: Emulation::SetDeviceMetricsOverride = serde_json::from_value(serde_json::json!({
            "width": self.geometry.width,
            "height": self.geometry.height,
            "deviceScaleFactor": self.geometry.scale,
            "mobile": false,
        }))
        .map_err(|e| Error::RenderError(format!("Invalid device metrics: {}", e)))?;

        self.tab
            .call_method(metrics)
            .map_err(|e| Error::RenderError(format!("Failed to set device metrics: {}", e)))?;
        Ok(())
    }

    fn load(&self, markup: &str, timeout: Duration) -> Result<()> {
        let started = Instant::now();
        let timed_out = || Error::RenderTimeout(timeout.as_millis() as u64);

        self.tab.set_default_timeout(timeout);

        // Written straight into the main frame; no URL length cap applies.
        let content = document_content(self.tab.get_target_id(), markup);
        self.tab.call_method(content).map_err(|e| {
            if started.elapsed() >= timeout {
                timed_out()
            } else {
                Error::RenderError(format!("Failed to load markup: {}", e))
            }
        })?;

        let remaining = timeout.saturating_sub(started.elapsed());
        if remaining.is_zero() {
            return Err(timed_out());
        }

        let script = READY_SCRIPT.replace("__RFOX_WAIT_MS__", &remaining.as_millis().to_string());
        let eval = self.tab.evaluate(&script, true).map_err(|e| {
            if started.elapsed() >= timeout {
                timed_out()
            } else {
                Error::RenderError(format!("Readiness check failed: {}", e))
            }
        })?;

        match eval.value.as_ref().and_then(|v| v.as_bool()) {
            Some(true) => Ok(()),
            _ => Err(timed_out()),
        }
    }
}

// A page target's main frame carries the target's id.
fn document_content(frame_id: &str, markup: &str) -> Page::SetDocumentContent {
    Page::SetDocumentContent {
        frame_id: frame_id.to_string(),
        html: markup.to_string(),
    }
}

impl Surface for ChromeSurface {
    fn render_and_capture(&mut self, markup: &str, timeout: Duration) -> Result<Vec<u8>> {
        self.load(markup, timeout)?;

        let png = self
            .tab
            .capture_screenshot(Page::CaptureScreenshotFormatOption::Png, None, None, true)
            .map_err(|e| Error::RenderError(format!("Screenshot failed: {}", e)))?;

        Ok(png)
    }

    fn release(&mut self) -> Result<()> {
        self.tab.close(false)?;
        Ok(())
    }
}
