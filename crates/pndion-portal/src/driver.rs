// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of PNDion.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! Browser session lifecycle: chromedriver child supervision and the
//! WebDriver session bound to the run's download directory.
//!
//! Teardown runs on every exit path. The chromedriver child gets SIGTERM
//! with a bounded wait before SIGKILL, and any orphaned child processes
//! left behind by Chromium are reaped non-blockingly.

use crate::error::{PortalError, PortalResult};
use pndion_types::config::RuntimeConfig;
use serde_json::json;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::time::Duration;
use thirtyfour::prelude::*;
use thirtyfour::{ChromeCapabilities, ChromiumLikeCapabilities};
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

const READY_TIMEOUT: Duration = Duration::from_secs(15);
const READY_POLL: Duration = Duration::from_millis(250);
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Supervised chromedriver child process.
pub struct ChromeDriverHandle {
    child: Child,
    port: u16,
}

impl std::fmt::Debug for ChromeDriverHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChromeDriverHandle")
            .field("pid", &self.child.id())
            .field("port", &self.port)
            .finish()
    }
}

impl ChromeDriverHandle {
    pub fn spawn(binary: &Path, port: u16) -> PortalResult<Self> {
        let child = Command::new(binary)
            .arg(format!("--port={port}"))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                PortalError::DriverInit(format!("failed to start {}: {e}", binary.display()))
            })?;
        info!("chromedriver started with PID {} on port {port}", child.id());
        Ok(Self { child, port })
    }

    /// Poll the driver's `/status` endpoint until it reports ready.
    pub async fn wait_ready(&self) -> PortalResult<()> {
        let url = format!("http://127.0.0.1:{}/status", self.port);
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()
            .map_err(|e| PortalError::DriverInit(format!("HTTP client: {e}")))?;

        let deadline = Instant::now() + READY_TIMEOUT;
        loop {
            if let Ok(response) = client.get(&url).send().await
                && let Ok(status) = response.json::<serde_json::Value>().await
                && status["value"]["ready"].as_bool().unwrap_or(false)
            {
                debug!("chromedriver ready");
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(PortalError::DriverInit(format!(
                    "chromedriver on port {} did not become ready within {}s",
                    self.port,
                    READY_TIMEOUT.as_secs()
                )));
            }
            sleep(READY_POLL).await;
        }
    }

    /// Stop the child: SIGTERM, bounded wait, SIGKILL fallback.
    pub fn stop(&mut self) {
        if matches!(self.child.try_wait(), Ok(Some(_))) {
            return;
        }

        #[cfg(unix)]
        {
            use nix::sys::signal::{self, Signal};
            use nix::unistd::Pid;

            let pid = Pid::from_raw(self.child.id() as i32);
            if let Err(e) = signal::kill(pid, Signal::SIGTERM) {
                warn!("Failed to send SIGTERM to chromedriver: {}", e);
            }
        }

        let start = std::time::Instant::now();
        loop {
            match self.child.try_wait() {
                Ok(Some(_)) => {
                    debug!("chromedriver stopped");
                    return;
                }
                Ok(None) => {
                    if start.elapsed() > STOP_TIMEOUT {
                        warn!("chromedriver did not stop gracefully, killing");
                        let _ = self.child.kill();
                        let _ = self.child.wait();
                        return;
                    }
                    std::thread::sleep(Duration::from_millis(100));
                }
                Err(e) => {
                    warn!("Error checking chromedriver status: {}", e);
                    let _ = self.child.kill();
                    let _ = self.child.wait();
                    return;
                }
            }
        }
    }
}

impl Drop for ChromeDriverHandle {
    fn drop(&mut self) {
        if matches!(self.child.try_wait(), Ok(None)) {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

/// Reap any exited child processes without blocking. Chromium tends to
/// leave renderer processes behind when the driver dies mid-session.
#[cfg(unix)]
pub fn reap_orphans() {
    use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};

    loop {
        match waitpid(None, Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) => break,
            Ok(status) => debug!("reaped orphaned child: {:?}", status),
            // ECHILD: no children left
            Err(_) => break,
        }
    }
}

#[cfg(not(unix))]
pub fn reap_orphans() {}

/// Chrome preferences that bind downloads to the working directory and
/// suppress the download prompt.
fn download_prefs(download_dir: &Path) -> serde_json::Value {
    json!({
        "download.default_directory": download_dir.display().to_string(),
        "download.prompt_for_download": false,
        "download.directory_upgrade": true,
        "plugins.always_open_pdf_externally": false,
    })
}

fn build_capabilities(download_dir: &Path) -> WebDriverResult<ChromeCapabilities> {
    let mut caps = DesiredCapabilities::chrome();
    caps.add_arg("--headless")?;
    caps.add_arg("--no-sandbox")?;
    caps.add_arg("--disable-gpu")?;
    caps.add_arg("--disable-dev-shm-usage")?;
    caps.add_arg("--log-level=3")?;
    caps.add_experimental_option("prefs", download_prefs(download_dir))?;
    Ok(caps)
}

/// One headless browser session with downloads bound to the working
/// directory.
pub struct PortalSession {
    driver: WebDriver,
    chromedriver: ChromeDriverHandle,
}

impl std::fmt::Debug for PortalSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortalSession")
            .field("chromedriver", &self.chromedriver)
            .finish()
    }
}

impl PortalSession {
    pub async fn open(runtime: &RuntimeConfig, download_dir: &Path) -> PortalResult<Self> {
        let mut chromedriver =
            ChromeDriverHandle::spawn(&runtime.chromedriver_path, runtime.webdriver_port)?;

        match Self::connect(&chromedriver, download_dir).await {
            Ok(driver) => {
                info!("Driver loaded");
                Ok(Self {
                    driver,
                    chromedriver,
                })
            }
            Err(e) => {
                chromedriver.stop();
                reap_orphans();
                Err(e)
            }
        }
    }

    async fn connect(
        chromedriver: &ChromeDriverHandle,
        download_dir: &Path,
    ) -> PortalResult<WebDriver> {
        chromedriver.wait_ready().await?;

        let caps = build_capabilities(download_dir)
            .map_err(|e| PortalError::DriverInit(e.to_string()))?;
        let server_url = format!("http://127.0.0.1:{}", chromedriver.port);
        let driver = WebDriver::new(&server_url, caps)
            .await
            .map_err(|e| PortalError::DriverInit(e.to_string()))?;
        driver
            .set_window_rect(0, 0, 1920, 1080)
            .await
            .map_err(|e| PortalError::DriverInit(e.to_string()))?;
        Ok(driver)
    }

    pub fn driver(&self) -> &WebDriver {
        &self.driver
    }

    /// Quit the WebDriver session, stop chromedriver and reap leftovers.
    pub async fn close(self) {
        let Self {
            driver,
            mut chromedriver,
        } = self;
        if let Err(e) = driver.quit().await {
            warn!("WebDriver session did not quit cleanly: {e}");
        }
        chromedriver.stop();
        reap_orphans();
        info!("All done - browser closed");
    }
}
