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

//! Authentication stage: cookie banner, login form, landing-page check,
//! one-time dialog dismissal and application-version extraction.

use crate::debug::DebugRecorder;
use crate::error::{PortalError, PortalResult};
use crate::wait::{clickable_within, find_within};
use pndion_ha::normalize_state;
use pndion_types::config::PortalConfig;
use std::time::Duration;
use thirtyfour::prelude::*;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

const COOKIE_BANNER_BUTTON: &str = "CybotCookiebotDialogBodyLevelButtonLevelOptinAllowallSelection";
const USERNAME_INPUT: &str = "//input[@placeholder='Zadejte svůj e-mail']";
const PASSWORD_INPUT: &str = "//input[@placeholder='Zadejte své heslo']";
const SUBMIT_BUTTON: &str = "//button[@type='submit' and contains(@class, 'mui-btn--primary')]";
const LANDING_HEADING: &str = "//h1[contains(text(), 'Naměřená data')]";
const MODAL_ACK_BUTTON: &str =
    ".//button[contains(@class, 'btn pnd-btn btn-primary') and contains(text(), 'Přečteno')]";
const VERSION_ELEMENT: &str = "//div[contains(text(), 'Verze aplikace:')]";

const FORM_TIMEOUT: Duration = Duration::from_secs(10);
const LANDING_TIMEOUT: Duration = Duration::from_secs(20);

/// Result of a successful login.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    /// Portal application version as displayed, `unknown` when unreadable
    pub app_version: String,
}

/// Drive the whole login sequence and land on the measured-data dashboard.
pub async fn authenticate(
    driver: &WebDriver,
    portal: &PortalConfig,
    dbg: &DebugRecorder,
) -> PortalResult<LoginOutcome> {
    info!("Opening website: {}", portal.base_url);
    driver
        .goto(&portal.base_url)
        .await
        .map_err(|e| PortalError::Navigation(e.to_string()))?;
    // page load settle; the login widget mounts after the document loads
    sleep(Duration::from_secs(3)).await;
    if let Ok(url) = driver.current_url().await {
        info!("Current URL: {url}");
    }

    dismiss_cookie_banner(driver).await;
    sleep(Duration::from_secs(1)).await;

    submit_credentials(driver, portal, dbg).await?;
    sleep(Duration::from_secs(5)).await;

    wait_for_landing(driver).await?;
    dbg.screenshot(driver, "01-landing").await;

    dismiss_first_login_dialog(driver, dbg).await?;
    sleep(Duration::from_secs(2)).await;

    let app_version = read_app_version(driver).await;
    info!("App version: {app_version}");

    Ok(LoginOutcome { app_version })
}

/// Best-effort cookie-consent dismissal; absence is the normal case after
/// the first run of a browser profile.
async fn dismiss_cookie_banner(driver: &WebDriver) {
    match find_within(driver, By::Id(COOKIE_BANNER_BUTTON), Duration::from_secs(2)).await {
        Some(button) => {
            if let Err(e) = button.click().await {
                warn!("cookie banner present but not clickable: {e}");
            } else {
                debug!("cookie banner dismissed");
            }
        }
        None => debug!("No cookie banner found"),
    }
}

async fn submit_credentials(
    driver: &WebDriver,
    portal: &PortalConfig,
    dbg: &DebugRecorder,
) -> PortalResult<()> {
    let username_field = find_within(driver, By::XPath(USERNAME_INPUT), FORM_TIMEOUT)
        .await
        .ok_or_else(|| PortalError::LoginFormNotFound("e-mail input".into()))?;
    let password_field = find_within(driver, By::XPath(PASSWORD_INPUT), FORM_TIMEOUT)
        .await
        .ok_or_else(|| PortalError::LoginFormNotFound("password input".into()))?;

    username_field
        .send_keys(&portal.username)
        .await
        .map_err(|e| PortalError::LoginFormNotFound(format!("e-mail input: {e}")))?;
    password_field
        .send_keys(&portal.password)
        .await
        .map_err(|e| PortalError::LoginFormNotFound(format!("password input: {e}")))?;

    let submit = clickable_within(driver, By::XPath(SUBMIT_BUTTON), FORM_TIMEOUT)
        .await
        .ok_or_else(|| PortalError::LoginFormNotFound("submit button".into()))?;
    info!("Login button found, clicking it");
    dbg.screenshot(driver, "00-login").await;
    submit
        .click()
        .await
        .map_err(|e| PortalError::LoginFormNotFound(format!("submit button: {e}")))?;
    Ok(())
}

/// Wait for either the landing heading or the portal's error panel.
async fn wait_for_landing(driver: &WebDriver) -> PortalResult<()> {
    let deadline = Instant::now() + LANDING_TIMEOUT;
    loop {
        if driver.find(By::XPath(LANDING_HEADING)).await.is_ok() {
            info!("Landing heading 'Naměřená data' is present");
            return Ok(());
        }
        if let Ok(panel) = driver.find(By::ClassName("alertWidget__content")).await {
            let detail = panel.text().await.unwrap_or_default();
            return Err(PortalError::LoginRejected(detail));
        }
        if Instant::now() >= deadline {
            return Err(PortalError::LoginTimeout);
        }
        sleep(Duration::from_millis(500)).await;
    }
}

/// The portal shows a one-time announcement dialog after some deployments.
/// Absence is fine; presence without a working acknowledgement button is
/// fatal because the dialog blocks the export panel.
async fn dismiss_first_login_dialog(driver: &WebDriver, dbg: &DebugRecorder) -> PortalResult<()> {
    let Some(dialog) =
        find_within(driver, By::ClassName("modal-dialog"), Duration::from_secs(2)).await
    else {
        debug!("Modal dialog not found, continuing");
        return Ok(());
    };

    warn!("Modal dialog found, closing it");
    dbg.screenshot(driver, "01-modal").await;
    let ack = dialog
        .find(By::XPath(MODAL_ACK_BUTTON))
        .await
        .map_err(|_| PortalError::ModalDismissFailed)?;
    ack.click()
        .await
        .map_err(|_| PortalError::ModalDismissFailed)?;
    sleep(Duration::from_secs(2)).await;
    driver.refresh().await?;
    info!("Modal dialog closed, page reloaded");
    Ok(())
}

/// Extract the displayed application version; `unknown` on any failure.
async fn read_app_version(driver: &WebDriver) -> String {
    let Some(element) =
        find_within(driver, By::XPath(VERSION_ELEMENT), Duration::from_secs(2)).await
    else {
        return "unknown".to_owned();
    };

    let mut raw = match element.prop("textContent").await {
        Ok(Some(text)) if !text.trim().is_empty() => text,
        _ => String::new(),
    };
    if raw.is_empty() {
        raw = element.text().await.unwrap_or_default();
    }
    parse_version_text(&raw)
}

/// Take the text after the label's colon, collapse whitespace and clamp to
/// the platform's state length limit.
fn parse_version_text(raw: &str) -> String {
    let cleaned = raw.replace('\u{a0}', " ");
    let tail = cleaned
        .split_once(':')
        .map(|(_, tail)| tail)
        .unwrap_or(&cleaned);
    normalize_state(tail)
}
