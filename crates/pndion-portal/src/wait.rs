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

//! Bounded element waits.
//!
//! Each poll re-issues the lookup from scratch instead of reusing a handle;
//! the portal re-renders its widgets while they settle and stale references
//! would otherwise go undetected.

use std::time::Duration;
use thirtyfour::prelude::*;
use tokio::time::{Instant, sleep};

const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Wait until an element is present, up to `timeout`. `None` on timeout.
pub async fn find_within(driver: &WebDriver, by: By, timeout: Duration) -> Option<WebElement> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Ok(element) = driver.find(by.clone()).await {
            return Some(element);
        }
        if Instant::now() >= deadline {
            return None;
        }
        sleep(POLL_INTERVAL).await;
    }
}

/// Wait until an element is present, displayed and enabled.
pub async fn clickable_within(
    driver: &WebDriver,
    by: By,
    timeout: Duration,
) -> Option<WebElement> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Ok(element) = driver.find(by.clone()).await {
            let displayed = element.is_displayed().await.unwrap_or(false);
            let enabled = element.is_enabled().await.unwrap_or(false);
            if displayed && enabled {
                return Some(element);
            }
        }
        if Instant::now() >= deadline {
            return None;
        }
        sleep(POLL_INTERVAL).await;
    }
}

/// Wait until a descendant of `parent` is present.
pub async fn child_within(
    parent: &WebElement,
    by: By,
    timeout: Duration,
) -> Option<WebElement> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Ok(element) = parent.find(by.clone()).await {
            return Some(element);
        }
        if Instant::now() >= deadline {
            return None;
        }
        sleep(POLL_INTERVAL).await;
    }
}

/// Click `<body>`, the portal's idiom for closing an open multiselect.
pub async fn body_click(driver: &WebDriver) -> WebDriverResult<()> {
    driver.find(By::Tag("body")).await?.click().await
}
