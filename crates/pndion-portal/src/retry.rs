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

//! Bounded retry policy for selection stages whose widgets settle
//! asynchronously.
//!
//! An attempt reports one of three outcomes: the target condition holds
//! (`Ready`), it may still settle (`NotReady`), or it can never hold
//! because the wanted option does not exist at all (`Impossible`). The two
//! terminal failures stay distinct so callers can tell a misconfigured
//! selector from a page that never settled.

use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// One stage's retry parameters.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Settle delay between attempts
    pub settle: Duration,
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, settle: Duration) -> Self {
        Self {
            max_attempts,
            settle,
        }
    }
}

/// Outcome of a single attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt<T> {
    Ready(T),
    NotReady,
    Impossible,
}

/// Terminal failure of a retried stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryFailure {
    /// Every attempt returned `NotReady`
    Exhausted { attempts: u32 },
    /// An attempt established the condition can never hold
    Impossible,
}

/// Run `attempt` under `policy`. The closure receives the 1-based attempt
/// number and must re-locate any page elements it touches; the page may
/// have re-rendered since the previous attempt.
pub async fn run_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    mut attempt: F,
) -> Result<T, RetryFailure>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Attempt<T>>,
{
    for number in 1..=policy.max_attempts {
        match attempt(number).await {
            Attempt::Ready(value) => return Ok(value),
            Attempt::Impossible => return Err(RetryFailure::Impossible),
            Attempt::NotReady => {
                debug!(attempt = number, "condition not settled yet");
                if number < policy.max_attempts {
                    tokio::time::sleep(policy.settle).await;
                }
            }
        }
    }
    Err(RetryFailure::Exhausted {
        attempts: policy.max_attempts,
    })
}
