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

//! Portal automation for the ČEZ Distribuce PND dashboard.
//!
//! Drives a headless Chromium through login and the export panel's
//! profile/device/window selection, downloads the four CSV exports of a run
//! and hands them to ingestion. The portal renders its widgets
//! asynchronously, so every interaction uses bounded re-locating waits and
//! the selection stages run under an explicit retry policy.

pub mod debug;
pub mod driver;
pub mod error;
pub mod export;
pub mod login;
pub mod retry;
pub mod run;
mod wait;

pub use debug::DebugRecorder;
pub use driver::{ChromeDriverHandle, PortalSession};
pub use error::{PortalError, PortalResult, WindowStep};
pub use export::WindowMode;
pub use retry::{Attempt, RetryFailure, RetryPolicy};
pub use run::{RunContext, run_once};
