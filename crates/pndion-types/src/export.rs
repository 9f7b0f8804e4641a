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

//! Export-stage descriptors shared by the portal driver and CSV ingestion.
//!
//! The portal always downloads `pnd_export.csv`; each stage renames it to
//! its own file before the next export can overwrite it.

use std::fmt;

/// The portal's generic download name, identical for every export.
pub const GENERIC_EXPORT_NAME: &str = "pnd_export.csv";

/// Which export cycle a stage belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportPass {
    /// Fixed "yesterday" window
    Daily,
    /// Caller-supplied custom date range
    Range,
}

/// Direction of the measured energy flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnergyKind {
    Consumption,
    Production,
}

/// One of the four CSV exports produced by a full run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportStage {
    DailyConsumption,
    DailyProduction,
    RangeConsumption,
    RangeProduction,
}

impl ExportStage {
    pub const ALL: [Self; 4] = [
        Self::DailyConsumption,
        Self::DailyProduction,
        Self::RangeConsumption,
        Self::RangeProduction,
    ];

    /// Stage-tagged artifact name the generic download is renamed to.
    pub fn file_name(self) -> &'static str {
        match self {
            Self::DailyConsumption => "daily-consumption.csv",
            Self::DailyProduction => "daily-production.csv",
            Self::RangeConsumption => "range-consumption.csv",
            Self::RangeProduction => "range-production.csv",
        }
    }

    /// Report link label as rendered by the portal's export panel.
    pub fn report_label(self) -> &'static str {
        match self.kind() {
            EnergyKind::Consumption => "07 Profil spotřeby za den (+A)",
            EnergyKind::Production => "08 Profil výroby za den (-A)",
        }
    }

    pub fn pass(self) -> ExportPass {
        match self {
            Self::DailyConsumption | Self::DailyProduction => ExportPass::Daily,
            Self::RangeConsumption | Self::RangeProduction => ExportPass::Range,
        }
    }

    pub fn kind(self) -> EnergyKind {
        match self {
            Self::DailyConsumption | Self::RangeConsumption => EnergyKind::Consumption,
            Self::DailyProduction | Self::RangeProduction => EnergyKind::Production,
        }
    }
}

impl fmt::Display for ExportStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::DailyConsumption => "daily-consumption",
            Self::DailyProduction => "daily-production",
            Self::RangeConsumption => "range-consumption",
            Self::RangeProduction => "range-production",
        };
        f.write_str(name)
    }
}
