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

//! Measurement data model: parsed time series, the derived daily reading,
//! the interval series and the production/consumption ratio variants.

use chrono::{Days, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// One parsed CSV row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesRow {
    pub timestamp: NaiveDateTime,
    pub value: f64,
}

/// Latest daily figure, derived from the last row of a daily export.
///
/// The portal logs each reading under the day after the measured day, so
/// the attributed date is the CSV date shifted back by one calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyReading {
    /// Date the reading is attributed to (already shifted)
    pub date: NaiveDateTime,
    /// Energy in kWh
    pub value: f64,
}

impl DailyReading {
    pub fn from_last_row(row: TimeSeriesRow) -> Self {
        Self {
            date: row.timestamp - Days::new(1),
            value: row.value,
        }
    }
}

/// Parallel date/consumption/production sequences over the custom interval,
/// with totals rounded to two decimals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntervalSeries {
    pub dates: Vec<NaiveDate>,
    pub consumption: Vec<f64>,
    pub production: Vec<f64>,
    pub total_consumption: f64,
    pub total_production: f64,
}

impl IntervalSeries {
    /// Combine the two range exports. Dates come from the consumption rows,
    /// matching the legacy integration.
    pub fn from_rows(consumption: &[TimeSeriesRow], production: &[TimeSeriesRow]) -> Self {
        let dates = consumption.iter().map(|row| row.timestamp.date()).collect();
        let consumption_values: Vec<f64> = consumption.iter().map(|row| row.value).collect();
        let production_values: Vec<f64> = production.iter().map(|row| row.value).collect();
        let total_consumption = round2(consumption_values.iter().sum());
        let total_production = round2(production_values.iter().sum());
        Self {
            dates,
            consumption: consumption_values,
            production: production_values,
            total_consumption,
            total_production,
        }
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// ISO-formatted calendar dates for publication.
    pub fn iso_dates(&self) -> Vec<String> {
        self.dates.iter().map(|d| d.to_string()).collect()
    }
}

/// The three published production-to-consumption percentage variants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatioSet {
    /// Unbounded percentage
    pub full: f64,
    /// Capped at 100 for gauge display
    pub capped: f64,
    /// Excess above 100, floored at 0
    pub floor: f64,
}

impl RatioSet {
    /// Derive the ratio variants from interval totals. Division by zero or
    /// a non-finite result yields all zeroes, never an error.
    pub fn from_totals(total_production: f64, total_consumption: f64) -> Self {
        let full = total_production / total_consumption * 100.0;
        if !full.is_finite() {
            return Self {
                full: 0.0,
                capped: 0.0,
                floor: 0.0,
            };
        }
        let full = round2(full);
        Self {
            full,
            capped: round2(full.min(100.0)),
            floor: round2((full - 100.0).max(0.0)),
        }
    }
}

/// Round to two decimal places, the precision every published total uses.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
