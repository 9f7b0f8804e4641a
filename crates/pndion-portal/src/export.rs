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

//! Export navigator and downloader.
//!
//! The export panel's multiselect widgets toggle their state asynchronously
//! after a click, and the "Vyhledat data" button's disabled flag follows
//! with a delay. Each selection stage therefore runs under a bounded retry
//! policy, re-locating its elements fresh on every attempt.

use crate::debug::DebugRecorder;
use crate::error::{PortalError, PortalResult, WindowStep};
use crate::retry::{Attempt, RetryFailure, RetryPolicy, run_with_retry};
use crate::wait::{body_click, child_within, clickable_within, find_within};
use pndion_types::{ExportStage, GENERIC_EXPORT_NAME};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thirtyfour::prelude::*;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

const REPORT_PROFILE: &str = "Rychlá sestava";

const PROFILE_RETRY: RetryPolicy = RetryPolicy::new(10, Duration::from_millis(250));
const DEVICE_RETRY: RetryPolicy = RetryPolicy::new(10, Duration::from_secs(1));

/// Short wait for widgets that are usually already rendered.
const WIDGET_TIMEOUT: Duration = Duration::from_secs(2);
/// Wait for the export panel itself, which renders with the dashboard.
const PANEL_TIMEOUT: Duration = Duration::from_secs(20);
const LINK_TIMEOUT: Duration = Duration::from_secs(10);
/// The download has no completion signal; a fixed settle must cover it.
const DOWNLOAD_SETTLE: Duration = Duration::from_secs(5);

/// Time window of one export pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowMode {
    /// The portal's fixed "Včera" window
    Yesterday,
    /// Caller-supplied date range for the "Vlastní" window
    Custom(String),
}

/// Click the "Export" control of the first dashboard panel.
pub async fn open_export_panel(driver: &WebDriver) -> PortalResult<()> {
    let panel = find_within(driver, By::Css(".pnd-window"), PANEL_TIMEOUT)
        .await
        .ok_or_else(|| PortalError::ExportPanelFailed("Export".into()))?;
    let button = child_within(&panel, By::XPath(".//button[@title='Export']"), LINK_TIMEOUT)
        .await
        .ok_or_else(|| PortalError::ExportPanelFailed("Export".into()))?;
    button
        .click()
        .await
        .map_err(|_| PortalError::ExportPanelFailed("Export".into()))?;
    Ok(())
}

/// Re-open the results view for the interval pass: "Tabulka dat", then the
/// panel's "Export" control again.
pub async fn reopen_results_panel(driver: &WebDriver) -> PortalResult<()> {
    let table_button = clickable_within(
        driver,
        By::XPath("//button[@title='Tabulka dat']"),
        WIDGET_TIMEOUT,
    )
    .await
    .ok_or_else(|| PortalError::ExportPanelFailed("Tabulka dat".into()))?;
    table_button
        .click()
        .await
        .map_err(|_| PortalError::ExportPanelFailed("Tabulka dat".into()))?;
    sleep(Duration::from_secs(1)).await;

    let export_button = clickable_within(
        driver,
        By::XPath("//button[@title='Export']"),
        WIDGET_TIMEOUT,
    )
    .await
    .ok_or_else(|| PortalError::ExportPanelFailed("Export".into()))?;
    export_button
        .click()
        .await
        .map_err(|_| PortalError::ExportPanelFailed("Export".into()))?;
    body_click(driver).await?;
    Ok(())
}

/// Select the "Rychlá sestava" report profile, retrying while the dropdown
/// races with page settle.
pub async fn select_report_profile(driver: &WebDriver) -> PortalResult<()> {
    let outcome = run_with_retry(&PROFILE_RETRY, |_| async move {
        match try_select_profile(driver).await {
            Ok(true) => Attempt::Ready(()),
            Ok(false) => Attempt::NotReady,
            Err(e) => {
                debug!("profile selection attempt failed: {e}");
                Attempt::NotReady
            }
        }
    })
    .await;

    match outcome {
        Ok(()) => {
            info!("Report profile '{REPORT_PROFILE}' selected");
            Ok(())
        }
        Err(_) => Err(PortalError::ProfileSelectionFailed {
            attempts: PROFILE_RETRY.max_attempts,
        }),
    }
}

async fn try_select_profile(driver: &WebDriver) -> WebDriverResult<bool> {
    let Some(label) = find_within(
        driver,
        By::XPath("//label[contains(text(), 'Sestava')]"),
        WIDGET_TIMEOUT,
    )
    .await
    else {
        return Ok(false);
    };
    let dropdown = label
        .find(By::XPath(
            "./following-sibling::div//div[contains(@class, 'multiselect__tags')]",
        ))
        .await?;
    dropdown.click().await?;

    let Some(option) = clickable_within(
        driver,
        By::XPath(&format!("//span[contains(text(), '{REPORT_PROFILE}')]")),
        WIDGET_TIMEOUT,
    )
    .await
    else {
        return Ok(false);
    };
    option.click().await?;
    body_click(driver).await?;

    // Verify against the freshly rendered single-value span
    let Some(selected) = find_within(
        driver,
        By::XPath("//span[@class='multiselect__single']"),
        WIDGET_TIMEOUT,
    )
    .await
    else {
        return Ok(false);
    };
    Ok(selected.text().await?.trim() == REPORT_PROFILE)
}

enum DeviceAttempt {
    Selected,
    Pending,
    Missing,
}

/// Select the metering point and wait for the submit button to leave its
/// disabled state. A selector absent from the rendered options fails
/// immediately; a selection that never stabilizes exhausts the retries.
pub async fn select_device(
    driver: &WebDriver,
    selector: &str,
    dbg: &DebugRecorder,
) -> PortalResult<()> {
    info!("Selecting device '{selector}'");
    let options = list_device_options(driver).await;
    info!("Rendered device options: {}", options.join(", "));
    dbg.init_device_log();

    let outcome = run_with_retry(&DEVICE_RETRY, |attempt| async move {
        match try_select_device(driver, selector, attempt, dbg).await {
            Ok(DeviceAttempt::Selected) => Attempt::Ready(()),
            Ok(DeviceAttempt::Pending) => Attempt::NotReady,
            Ok(DeviceAttempt::Missing) => Attempt::Impossible,
            Err(e) => {
                debug!("device selection attempt failed: {e}");
                Attempt::NotReady
            }
        }
    })
    .await;

    match outcome {
        Ok(()) => {
            info!("Device '{selector}' selected");
            Ok(())
        }
        Err(RetryFailure::Impossible) => {
            error!("'{selector}' is not among the rendered options");
            Err(PortalError::UnknownDevice(selector.to_owned()))
        }
        Err(RetryFailure::Exhausted { attempts }) => Err(PortalError::DeviceSelectionFailed {
            selector: selector.to_owned(),
            attempts,
        }),
    }
}

async fn try_select_device(
    driver: &WebDriver,
    selector: &str,
    attempt: u32,
    dbg: &DebugRecorder,
) -> WebDriverResult<DeviceAttempt> {
    let Some(label) = find_within(
        driver,
        By::XPath("//label[contains(text(), 'Množina zařízení')]"),
        WIDGET_TIMEOUT,
    )
    .await
    else {
        return Ok(DeviceAttempt::Pending);
    };
    let dropdown = label
        .find(By::XPath(
            "./following-sibling::div//div[contains(@class, 'multiselect__select')]",
        ))
        .await?;
    dropdown.click().await?;
    sleep(Duration::from_secs(1)).await;
    dbg.screenshot(driver, &format!("03-{attempt}-a")).await;

    let Some(option) = clickable_within(
        driver,
        By::XPath(&format!("//span[contains(text(), '{selector}')]")),
        WIDGET_TIMEOUT,
    )
    .await
    else {
        return Ok(DeviceAttempt::Missing);
    };
    option.click().await?;
    dbg.screenshot(driver, &format!("03-{attempt}-b")).await;
    body_click(driver).await?;

    // Re-resolve everything before verifying; the widget re-renders on
    // selection and the old handles may be stale.
    let submit = driver
        .find(By::XPath("//button[contains(., 'Vyhledat data')]"))
        .await?;
    let submit_class = submit.attr("class").await?.unwrap_or_default();

    let form_group = label
        .find(By::XPath(".//ancestor::div[contains(@class, 'form-group')]"))
        .await?;
    let selected_text = match form_group
        .find(By::XPath(".//span[@class='multiselect__single']"))
        .await
    {
        Ok(span) => span.text().await.unwrap_or_default(),
        Err(_) => String::new(),
    };
    debug!("device status: '{selected_text}' - '{selector}'");
    let markup = form_group.outer_html().await.unwrap_or_default();
    dbg.log_device_attempt(attempt, &selected_text, &markup);

    if !submit_class.contains("disabled") && !selected_text.trim().is_empty() {
        debug!("attempt {attempt}: submit button enabled");
        Ok(DeviceAttempt::Selected)
    } else {
        debug!("attempt {attempt}: submit button still disabled");
        Ok(DeviceAttempt::Pending)
    }
}

async fn list_device_options(driver: &WebDriver) -> Vec<String> {
    let Ok(spans) = driver.find_all(By::Css("span.multiselect__option")).await else {
        return Vec::new();
    };
    let mut options = Vec::new();
    for span in spans {
        if let Ok(text) = span.text().await {
            let text = text.trim().to_owned();
            if !text.is_empty() {
                options.push(text);
            }
        }
    }
    options
}

/// Select the time window and submit the search.
pub async fn select_time_window(driver: &WebDriver, mode: &WindowMode) -> PortalResult<()> {
    let first_step = match mode {
        WindowMode::Yesterday => WindowStep::Yesterday,
        WindowMode::Custom(_) => WindowStep::CustomOption,
    };

    let label = clickable_within(
        driver,
        By::XPath("//label[contains(text(), 'Období')]"),
        WIDGET_TIMEOUT,
    )
    .await
    .ok_or(PortalError::WindowSelectionFailed(first_step))?;
    let dropdown = label
        .find(By::XPath(
            "./following-sibling::div//div[contains(@class, 'multiselect__select')]",
        ))
        .await
        .map_err(|_| PortalError::WindowSelectionFailed(first_step))?;
    dropdown
        .click()
        .await
        .map_err(|_| PortalError::WindowSelectionFailed(first_step))?;

    match mode {
        WindowMode::Yesterday => select_window_option(driver, "Včera", WindowStep::Yesterday).await?,
        WindowMode::Custom(interval) => {
            select_window_option(driver, "Vlastní", WindowStep::CustomOption).await?;
            fill_custom_interval(driver, interval).await?;
            info!("Data interval entered - '{interval}'");
        }
    }

    let submit = clickable_within(
        driver,
        By::XPath("//button[contains(., 'Vyhledat data')]"),
        WIDGET_TIMEOUT,
    )
    .await
    .ok_or(PortalError::WindowSelectionFailed(WindowStep::Submit))?;
    submit
        .click()
        .await
        .map_err(|_| PortalError::WindowSelectionFailed(WindowStep::Submit))?;
    info!("Button 'Vyhledat data' clicked");
    sleep(Duration::from_secs(2)).await;
    body_click(driver).await?;
    Ok(())
}

async fn select_window_option(
    driver: &WebDriver,
    option_text: &str,
    step: WindowStep,
) -> PortalResult<()> {
    let option = clickable_within(
        driver,
        By::XPath(&format!(
            "//span[contains(text(), '{option_text}') and contains(@class, 'multiselect__option')]"
        )),
        WIDGET_TIMEOUT,
    )
    .await
    .ok_or(PortalError::WindowSelectionFailed(step))?;
    option
        .click()
        .await
        .map_err(|_| PortalError::WindowSelectionFailed(step))?;
    Ok(())
}

async fn fill_custom_interval(driver: &WebDriver, interval: &str) -> PortalResult<()> {
    let step = WindowStep::CustomInput;
    let label = find_within(
        driver,
        By::XPath("//label[contains(text(), 'Vlastní období')]"),
        WIDGET_TIMEOUT,
    )
    .await
    .ok_or(PortalError::WindowSelectionFailed(step))?;
    let input = label
        .find(By::XPath("./following::input[1]"))
        .await
        .map_err(|_| PortalError::WindowSelectionFailed(step))?;

    input
        .clear()
        .await
        .map_err(|_| PortalError::WindowSelectionFailed(step))?;
    input
        .send_keys(interval)
        .await
        .map_err(|_| PortalError::WindowSelectionFailed(step))?;
    // The range widget only commits on blur; tab out and click away
    input
        .send_keys(Key::Tab + "")
        .await
        .map_err(|_| PortalError::WindowSelectionFailed(step))?;
    body_click(driver).await?;
    Ok(())
}

/// Download one report: select its link in the export panel, trigger the
/// CSV export, wait out the settle delay and rename the artifact.
pub async fn download_report(
    driver: &WebDriver,
    stage: ExportStage,
    working_dir: &Path,
    dbg: &DebugRecorder,
) -> PortalResult<PathBuf> {
    select_report_link(driver, stage, dbg).await?;
    trigger_csv_export(driver, stage).await?;
    sleep(DOWNLOAD_SETTLE).await;
    rename_artifact(working_dir, stage)
}

async fn select_report_link(
    driver: &WebDriver,
    stage: ExportStage,
    dbg: &DebugRecorder,
) -> PortalResult<()> {
    let label = stage.report_label();
    let panel = find_within(driver, By::Css(".pnd-window"), PANEL_TIMEOUT)
        .await
        .ok_or_else(|| PortalError::ExportLinkNotFound(label.to_owned()))?;
    let link = child_within(
        &panel,
        By::XPath(&format!(".//a[contains(text(), '{label}')]")),
        LINK_TIMEOUT,
    )
    .await
    .ok_or_else(|| PortalError::ExportLinkNotFound(label.to_owned()))?;

    info!("Selecting report: {label}");
    sleep(Duration::from_secs(2)).await;
    dbg.screenshot(driver, &format!("{stage}-link")).await;
    link.click()
        .await
        .map_err(|_| PortalError::ExportLinkNotFound(label.to_owned()))?;
    body_click(driver).await?;
    Ok(())
}

async fn trigger_csv_export(driver: &WebDriver, stage: ExportStage) -> PortalResult<()> {
    let toggle = clickable_within(
        driver,
        By::XPath("//button[contains(text(), 'Exportovat data')]"),
        LINK_TIMEOUT,
    )
    .await
    .ok_or(PortalError::CsvDownloadFailed(stage))?;
    sleep(Duration::from_secs(2)).await;
    toggle
        .click()
        .await
        .map_err(|_| PortalError::CsvDownloadFailed(stage))?;

    let csv_link = clickable_within(
        driver,
        By::XPath("//a[normalize-space()='CSV']"),
        LINK_TIMEOUT,
    )
    .await
    .ok_or(PortalError::CsvDownloadFailed(stage))?;
    info!("Downloading CSV file for {}", stage.report_label());
    csv_link
        .click()
        .await
        .map_err(|_| PortalError::CsvDownloadFailed(stage))?;
    Ok(())
}

/// Rename the generic `pnd_export.csv` to the stage-tagged name. A stale
/// target from a previous run is removed first, so the rename never fails
/// on leftovers. Skipping this step would lose the artifact to the next
/// export's overwrite.
pub fn rename_artifact(working_dir: &Path, stage: ExportStage) -> PortalResult<PathBuf> {
    let source = working_dir.join(GENERIC_EXPORT_NAME);
    if !source.exists() {
        warn!("No file was downloaded for {}", stage.report_label());
        return Err(PortalError::CsvDownloadFailed(stage));
    }

    let target = working_dir.join(stage.file_name());
    if target.exists() {
        std::fs::remove_file(&target)?;
    }
    std::fs::rename(&source, &target)?;
    info!("File downloaded and saved as: {}", target.display());
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rename_moves_generic_artifact_to_stage_name() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(GENERIC_EXPORT_NAME), b"data").unwrap();

        let target = rename_artifact(dir.path(), ExportStage::DailyConsumption).unwrap();
        assert_eq!(target, dir.path().join("daily-consumption.csv"));
        assert!(!dir.path().join(GENERIC_EXPORT_NAME).exists());
        assert_eq!(std::fs::read(target).unwrap(), b"data");
    }

    #[test]
    fn rename_replaces_stale_leftover_from_previous_run() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("range-production.csv"), b"stale").unwrap();
        std::fs::write(dir.path().join(GENERIC_EXPORT_NAME), b"fresh").unwrap();

        let target = rename_artifact(dir.path(), ExportStage::RangeProduction).unwrap();
        assert_eq!(std::fs::read(target).unwrap(), b"fresh");
    }

    #[test]
    fn rename_without_download_reports_the_stage() {
        let dir = tempfile::tempdir().unwrap();
        let err = rename_artifact(dir.path(), ExportStage::DailyProduction).unwrap_err();
        match err {
            PortalError::CsvDownloadFailed(stage) => {
                assert_eq!(stage, ExportStage::DailyProduction);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn window_modes_pick_their_option() {
        assert_eq!(WindowMode::Yesterday, WindowMode::Yesterday);
        let custom = WindowMode::Custom("1.7.2025 - 31.7.2025".into());
        match custom {
            WindowMode::Custom(interval) => assert!(interval.contains("2025")),
            WindowMode::Yesterday => unreachable!(),
        }
    }
}
