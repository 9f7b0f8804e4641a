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

//! CSV ingestion for the renamed portal exports.
//!
//! The portal serves semicolon-delimited, Latin-1 encoded files with a
//! header row and two columns: a `%d.%m.%Y %H:%M:%S` timestamp and a kWh
//! value (decimal comma or dot). End-of-day rows carry the non-standard
//! `24:00:00` time, which is remapped to `23:59:00` of the same date before
//! parsing. A malformed row is fatal for the whole file.

use chrono::NaiveDateTime;
use pndion_types::{DailyReading, ExportStage, IntervalSeries, TimeSeriesRow};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

const TIMESTAMP_FORMAT: &str = "%d.%m.%Y %H:%M:%S";

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to read {stage} export: {source}")]
    Read {
        stage: ExportStage,
        source: std::io::Error,
    },

    #[error("failed to parse {stage} export, offending value {value:?}")]
    Malformed { stage: ExportStage, value: String },

    #[error("{stage} export contains no data rows")]
    Empty { stage: ExportStage },
}

pub type Result<T> = std::result::Result<T, IngestError>;

/// Decode a Latin-1 byte stream; every byte maps 1:1 onto a code point.
fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Remap the portal's end-of-day `24:00:00` to `23:59:00` of the same
/// calendar date. Deliberately not rolled over to next-day midnight; the
/// downstream consumers rely on the reading staying on its own date.
pub fn normalize_day_rollover(raw: &str) -> String {
    raw.replace("24:00:00", "23:59:00")
}

fn parse_timestamp(raw: &str, stage: ExportStage) -> Result<NaiveDateTime> {
    let normalized = normalize_day_rollover(raw.trim());
    NaiveDateTime::parse_from_str(&normalized, TIMESTAMP_FORMAT).map_err(|_| {
        IngestError::Malformed {
            stage,
            value: raw.to_owned(),
        }
    })
}

fn parse_value(raw: &str, stage: ExportStage) -> Result<f64> {
    let normalized = raw.trim().replace('\u{a0}', "").replace(',', ".");
    normalized
        .parse::<f64>()
        .map_err(|_| IngestError::Malformed {
            stage,
            value: raw.to_owned(),
        })
}

/// Parse one renamed export into its full row sequence.
pub fn read_series(path: &Path, stage: ExportStage) -> Result<Vec<TimeSeriesRow>> {
    let bytes = std::fs::read(path).map_err(|source| IngestError::Read { stage, source })?;
    let text = decode_latin1(&bytes);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| IngestError::Malformed {
            stage,
            value: e.to_string(),
        })?;
        let timestamp_field = record.get(0).ok_or_else(|| IngestError::Malformed {
            stage,
            value: String::new(),
        })?;
        let value_field = record.get(1).ok_or_else(|| IngestError::Malformed {
            stage,
            value: timestamp_field.to_owned(),
        })?;
        rows.push(TimeSeriesRow {
            timestamp: parse_timestamp(timestamp_field, stage)?,
            value: parse_value(value_field, stage)?,
        });
    }

    debug!(stage = %stage, rows = rows.len(), "export parsed");
    Ok(rows)
}

/// Derive the latest daily figure from a daily export: last row only, with
/// the date shifted back one calendar day.
pub fn daily_reading(path: &Path, stage: ExportStage) -> Result<DailyReading> {
    let rows = read_series(path, stage)?;
    let last = rows.last().ok_or(IngestError::Empty { stage })?;
    Ok(DailyReading::from_last_row(*last))
}

/// Combine the two range exports into the interval series.
pub fn interval_series(consumption_path: &Path, production_path: &Path) -> Result<IntervalSeries> {
    let consumption = read_series(consumption_path, ExportStage::RangeConsumption)?;
    let production = read_series(production_path, ExportStage::RangeProduction)?;
    Ok(IntervalSeries::from_rows(&consumption, &production))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::path::PathBuf;

    fn write_export(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn rollover_substitution_stays_on_same_date() {
        assert_eq!(
            normalize_day_rollover("06.08.2025 24:00:00"),
            "06.08.2025 23:59:00"
        );
        // Regular times are untouched
        assert_eq!(
            normalize_day_rollover("06.08.2025 12:00:00"),
            "06.08.2025 12:00:00"
        );
    }

    #[test]
    fn parses_rollover_timestamp_without_day_shift() {
        let ts = parse_timestamp("31.12.2025 24:00:00", ExportStage::DailyConsumption).unwrap();
        assert_eq!(ts.date(), NaiveDate::from_ymd_opt(2025, 12, 31).unwrap());
        assert_eq!(ts.format("%H:%M:%S").to_string(), "23:59:00");
    }

    #[test]
    fn reads_semicolon_latin1_file() {
        let dir = tempfile::tempdir().unwrap();
        // header carries a non-ASCII Latin-1 byte, as the portal's files do
        let mut bytes = b"Datum a \xe8as;Hodnota [kWh]\n".to_vec();
        bytes.extend_from_slice(b"05.08.2025 24:00:00;1,25\n");
        bytes.extend_from_slice(b"06.08.2025 24:00:00;2.5\n");
        let path = write_export(dir.path(), "daily-consumption.csv", &bytes);

        let rows = read_series(&path, ExportStage::DailyConsumption).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].value, 1.25);
        assert_eq!(rows[1].value, 2.5);
        assert_eq!(
            rows[1].timestamp.date(),
            NaiveDate::from_ymd_opt(2025, 8, 6).unwrap()
        );
    }

    #[test]
    fn daily_reading_takes_last_row_minus_one_day() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_export(
            dir.path(),
            "daily-production.csv",
            b"Datum;Hodnota\n05.08.2025 24:00:00;0,75\n06.08.2025 24:00:00;3,125\n",
        );

        let reading = daily_reading(&path, ExportStage::DailyProduction).unwrap();
        assert_eq!(reading.value, 3.125);
        assert_eq!(
            reading.date.date(),
            NaiveDate::from_ymd_opt(2025, 8, 5).unwrap()
        );
    }

    #[test]
    fn empty_daily_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_export(dir.path(), "daily-consumption.csv", b"Datum;Hodnota\n");
        let err = daily_reading(&path, ExportStage::DailyConsumption).unwrap_err();
        assert!(matches!(err, IngestError::Empty { .. }));
    }

    #[test]
    fn malformed_value_is_fatal_and_carries_the_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_export(
            dir.path(),
            "range-consumption.csv",
            b"Datum;Hodnota\n01.07.2025 24:00:00;n/a\n",
        );
        let err = read_series(&path, ExportStage::RangeConsumption).unwrap_err();
        match err {
            IngestError::Malformed { stage, value } => {
                assert_eq!(stage, ExportStage::RangeConsumption);
                assert_eq!(value, "n/a");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn malformed_timestamp_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_export(
            dir.path(),
            "range-production.csv",
            b"Datum;Hodnota\n2025-07-01;1,0\n",
        );
        assert!(read_series(&path, ExportStage::RangeProduction).is_err());
    }

    #[test]
    fn interval_series_combines_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let consumption = write_export(
            dir.path(),
            "range-consumption.csv",
            b"Datum;Hodnota\n01.07.2025 24:00:00;10,5\n02.07.2025 24:00:00;20,25\n",
        );
        let production = write_export(
            dir.path(),
            "range-production.csv",
            b"Datum;Hodnota\n01.07.2025 24:00:00;1,5\n02.07.2025 24:00:00;2,25\n",
        );

        let series = interval_series(&consumption, &production).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.iso_dates(), vec!["2025-07-01", "2025-07-02"]);
        assert_eq!(series.total_consumption, 30.75);
        assert_eq!(series.total_production, 3.75);
    }

    #[test]
    fn missing_file_reports_read_error() {
        let err = read_series(
            Path::new("/nonexistent/range-consumption.csv"),
            ExportStage::RangeConsumption,
        )
        .unwrap_err();
        assert!(matches!(err, IngestError::Read { .. }));
    }
}
