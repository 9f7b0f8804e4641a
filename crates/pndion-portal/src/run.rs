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

//! Run orchestration.
//!
//! One run: publish Running, reset the working directory, open the browser
//! session, authenticate, daily pass, interval pass, teardown, publish the
//! outcome. The session is closed on every exit path, and a fatal error is
//! published as an Error status with its Czech stage message before the
//! run aborts.

use crate::debug::DebugRecorder;
use crate::driver::PortalSession;
use crate::error::PortalResult;
use crate::export::{
    WindowMode, download_report, open_export_panel, reopen_results_panel, select_device,
    select_report_profile, select_time_window,
};
use crate::login::authenticate;
use pndion_ha::{RunStatus, StatePublisher};
use pndion_types::{
    AppConfig, DownloadFailurePolicy, EnergyKind, ExportPass, ExportStage, RatioSet,
};
use std::path::{Path, PathBuf};
use std::time::Instant;
use thirtyfour::prelude::*;
use tracing::{error, info, warn};

/// Everything one run needs, threaded explicitly through the stages.
#[derive(Clone)]
pub struct RunContext {
    pub config: AppConfig,
    pub publisher: StatePublisher,
    pub working_dir: PathBuf,
    pub debug: DebugRecorder,
}

impl RunContext {
    pub fn new(config: AppConfig, publisher: StatePublisher) -> Self {
        let working_dir = config.working_dir();
        Self {
            config,
            publisher,
            debug: DebugRecorder::new(working_dir.clone()),
            working_dir,
        }
    }

    fn artifact_path(&self, stage: ExportStage) -> PathBuf {
        self.working_dir.join(stage.file_name())
    }
}

/// Execute one full run and publish its outcome. Returns the fatal error,
/// if any, after it has been published.
pub async fn run_once(ctx: &RunContext) -> PortalResult<()> {
    let started = Instant::now();
    info!(
        "********************* Starting {} *********************",
        env!("CARGO_PKG_VERSION")
    );
    ctx.publisher.set_running(true).await?;
    ctx.publisher.set_status(RunStatus::Running, "OK").await?;

    let result = execute(ctx).await;
    finalize(ctx, result, started).await
}

async fn execute(ctx: &RunContext) -> PortalResult<()> {
    reset_working_dir(&ctx.working_dir)?;

    let session = PortalSession::open(&ctx.config.runtime, &ctx.working_dir).await?;
    let result = drive(ctx, session.driver()).await;
    session.close().await;
    result
}

async fn drive(ctx: &RunContext, driver: &WebDriver) -> PortalResult<()> {
    let login = authenticate(driver, &ctx.config.portal, &ctx.debug).await?;
    ctx.publisher.publish_app_version(&login.app_version).await?;

    // Daily pass: yesterday's figures
    open_export_panel(driver).await?;
    ctx.debug.screenshot(driver, "02-export-panel").await;
    select_report_profile(driver).await?;
    ctx.debug.screenshot(driver, "03-profile").await;
    select_device(driver, &ctx.config.portal.device_selector, &ctx.debug).await?;
    ctx.debug.screenshot(driver, "04-device").await;
    select_time_window(driver, &WindowMode::Yesterday).await?;
    ctx.debug.screenshot(driver, "06-search").await;
    download_pass(ctx, driver, ExportPass::Daily).await?;
    process_daily(ctx).await?;

    // Interval pass: the caller-supplied custom range
    let interval = ctx.config.portal.data_interval.clone();
    select_time_window(driver, &WindowMode::Custom(interval)).await?;
    reopen_results_panel(driver).await?;
    download_pass(ctx, driver, ExportPass::Range).await?;
    process_interval(ctx).await?;

    Ok(())
}

/// Download both reports of one pass, honoring the configured failure
/// policy. Under the lenient (legacy) policy a failed download is logged
/// and published but the run moves on; the missing artifact then surfaces
/// in the ingestion stage.
async fn download_pass(
    ctx: &RunContext,
    driver: &WebDriver,
    pass: ExportPass,
) -> PortalResult<()> {
    for stage in ExportStage::ALL.into_iter().filter(|s| s.pass() == pass) {
        if let Err(e) = download_report(driver, stage, &ctx.working_dir, &ctx.debug).await {
            match ctx.config.runtime.download_failure_policy {
                DownloadFailurePolicy::Strict => return Err(e),
                DownloadFailurePolicy::Lenient => {
                    error!("download stage {stage} failed: {e}");
                    if let Err(publish_err) = ctx
                        .publisher
                        .set_status(RunStatus::Error, &e.status_message())
                        .await
                    {
                        warn!("could not publish download failure: {publish_err}");
                    }
                }
            }
        }
    }
    info!("All done - {pass:?} data downloaded");
    Ok(())
}

/// Ingest the two daily artifacts and publish the latest readings.
pub async fn process_daily(ctx: &RunContext) -> PortalResult<()> {
    let consumption = pndion_ingest::daily_reading(
        &ctx.artifact_path(ExportStage::DailyConsumption),
        ExportStage::DailyConsumption,
    )?;
    let production = pndion_ingest::daily_reading(
        &ctx.artifact_path(ExportStage::DailyProduction),
        ExportStage::DailyProduction,
    )?;

    ctx.publisher
        .publish_daily_reading(EnergyKind::Consumption, &consumption)
        .await?;
    ctx.publisher
        .publish_daily_reading(EnergyKind::Production, &production)
        .await?;
    info!("All done - daily data processed");
    Ok(())
}

/// Ingest the two range artifacts and publish the series, totals and the
/// derived ratio variants.
pub async fn process_interval(ctx: &RunContext) -> PortalResult<()> {
    let series = pndion_ingest::interval_series(
        &ctx.artifact_path(ExportStage::RangeConsumption),
        &ctx.artifact_path(ExportStage::RangeProduction),
    )?;

    ctx.publisher.publish_interval_series(&series).await?;
    let ratios = RatioSet::from_totals(series.total_production, series.total_consumption);
    ctx.publisher.publish_ratios(&ratios).await?;
    info!("All done - interval data processed");
    Ok(())
}

async fn finalize(
    ctx: &RunContext,
    result: PortalResult<()>,
    started: Instant,
) -> PortalResult<()> {
    match result {
        Ok(()) => {
            ctx.publisher.set_running(false).await?;
            if let Err(e) = ctx.debug.write_bundle() {
                warn!("debug bundle failed: {e}");
            } else {
                info!("Debug files zipped");
            }
            let duration = chrono::Duration::from_std(started.elapsed())
                .unwrap_or_else(|_| chrono::Duration::zero());
            ctx.publisher.publish_duration(duration).await?;
            ctx.publisher
                .set_status(RunStatus::Stopped, "Finished")
                .await?;
            info!(
                "********************* Finished in {}s *********************",
                duration.num_seconds()
            );
            Ok(())
        }
        Err(e) => {
            error!("run failed: {e}");
            if let Err(publish_err) = ctx.publisher.set_running(false).await {
                warn!("could not clear the running flag: {publish_err}");
            }
            if let Err(publish_err) = ctx
                .publisher
                .set_status(RunStatus::Error, &e.status_message())
                .await
            {
                warn!("could not publish the error status: {publish_err}");
            }
            Err(e)
        }
    }
}

/// Clear and recreate the working directory. One run owns the directory;
/// concurrent runs must use distinct instance ids.
fn reset_working_dir(dir: &Path) -> std::io::Result<()> {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    std::fs::create_dir_all(dir)
}
