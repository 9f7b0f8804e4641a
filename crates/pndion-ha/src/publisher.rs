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

//! State publisher: maps run results onto the `pnd_*` entities the legacy
//! integration exposed, so existing dashboards and automations keep working.
//!
//! Every state value passes through [`normalize_state`] before publishing
//! (Home Assistant rejects states longer than 255 characters).

use crate::client::HomeAssistantClient;
use crate::errors::HaResult;
use async_trait::async_trait;
use chrono::Local;
use pndion_types::{DailyReading, EnergyKind, IntervalSeries, RatioSet};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::info;

/// Home Assistant's hard limit on state value length.
const STATE_VALUE_LIMIT: usize = 255;

/// Seam between the publisher and the HA REST API, so the run pipeline can
/// be exercised against a recording sink in tests.
#[async_trait]
pub trait StateSink: Send + Sync {
    async fn set_state(&self, entity_id: &str, state: &str, attributes: Value) -> HaResult<()>;
}

#[async_trait]
impl StateSink for HomeAssistantClient {
    async fn set_state(&self, entity_id: &str, state: &str, attributes: Value) -> HaResult<()> {
        HomeAssistantClient::set_state(self, entity_id, state, attributes).await
    }
}

/// Overall script status as shown in the status entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Error,
    Stopped,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "Running",
            Self::Error => "Error",
            Self::Stopped => "Stopped",
        }
    }
}

/// Normalize a raw value into a publishable state: NBSP to space, collapsed
/// whitespace, truncated to the platform limit. Empty input maps to
/// `unknown`.
pub fn normalize_state(raw: &str) -> String {
    let cleaned = raw.replace('\u{a0}', " ");
    let joined = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    if joined.is_empty() {
        return "unknown".to_owned();
    }
    joined.chars().take(STATE_VALUE_LIMIT).collect()
}

fn numeric_state(value: f64) -> String {
    if value.is_finite() {
        value.to_string()
    } else {
        "unknown".to_owned()
    }
}

/// Publishes run results under the instance-suffixed `pnd_*` entity ids.
#[derive(Clone)]
pub struct StatePublisher {
    sink: Arc<dyn StateSink>,
    suffix: String,
}

impl StatePublisher {
    pub fn new(sink: Arc<dyn StateSink>, suffix: impl Into<String>) -> Self {
        Self {
            sink,
            suffix: suffix.into(),
        }
    }

    fn entity(&self, base: &str) -> String {
        format!("{}{}", base, self.suffix)
    }

    async fn set(&self, base: &str, state: &str, attributes: Value) -> HaResult<()> {
        self.sink
            .set_state(&self.entity(base), &normalize_state(state), attributes)
            .await
    }

    pub async fn set_running(&self, running: bool) -> HaResult<()> {
        let state = if running { "on" } else { "off" };
        self.set("binary_sensor.pnd_running", state, json!({})).await
    }

    pub async fn set_status(&self, status: RunStatus, detail: &str) -> HaResult<()> {
        self.set(
            "sensor.pnd_script_status",
            status.as_str(),
            json!({
                "status": detail,
                "friendly_name": "PND Script Status",
            }),
        )
        .await
    }

    pub async fn publish_app_version(&self, version: &str) -> HaResult<()> {
        self.set(
            "sensor.pnd_app_version",
            version,
            json!({
                "friendly_name": "PND App Version",
            }),
        )
        .await
    }

    pub async fn publish_daily_reading(
        &self,
        kind: EnergyKind,
        reading: &DailyReading,
    ) -> HaResult<()> {
        let (base, friendly_name) = match kind {
            EnergyKind::Consumption => ("sensor.pnd_consumption", "PND Consumption"),
            EnergyKind::Production => ("sensor.pnd_production", "PND Production"),
        };
        info!(
            "Latest {} entry: {} - {} kWh",
            friendly_name,
            reading.date.format("%Y-%m-%dT%H:%M:%S"),
            reading.value
        );
        self.set(
            base,
            &numeric_state(reading.value),
            json!({
                "friendly_name": friendly_name,
                "device_class": "energy",
                "unit_of_measurement": "kWh",
                "date": reading.date.format("%Y-%m-%dT%H:%M:%S").to_string(),
            }),
        )
        .await
    }

    /// Publish the interval series (timestamped by publish time) and both
    /// interval totals.
    pub async fn publish_interval_series(&self, series: &IntervalSeries) -> HaResult<()> {
        let published_at = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        self.set(
            "sensor.pnd_data",
            &published_at,
            json!({
                "pnddate": series.iso_dates(),
                "consumption": series.consumption,
                "production": series.production,
            }),
        )
        .await?;

        self.set(
            "sensor.pnd_total_interval_consumption",
            &format!("{:.2}", series.total_consumption),
            json!({
                "friendly_name": "PND Total Interval Consumption",
                "device_class": "energy",
                "unit_of_measurement": "kWh",
            }),
        )
        .await?;

        self.set(
            "sensor.pnd_total_interval_production",
            &format!("{:.2}", series.total_production),
            json!({
                "friendly_name": "PND Total Interval Production",
                "device_class": "energy",
                "unit_of_measurement": "kWh",
            }),
        )
        .await
    }

    pub async fn publish_ratios(&self, ratios: &RatioSet) -> HaResult<()> {
        self.set(
            "sensor.pnd_production2consumption",
            &format!("{:.2}", ratios.capped),
            json!({
                "friendly_name": "PND Interval Production to Consumption Max",
                "device_class": "energy",
                "unit_of_measurement": "%",
            }),
        )
        .await?;

        self.set(
            "sensor.pnd_production2consumptionfull",
            &format!("{:.2}", ratios.full),
            json!({
                "friendly_name": "PND Interval Production to Consumption Full",
                "device_class": "energy",
                "unit_of_measurement": "%",
            }),
        )
        .await?;

        self.set(
            "sensor.pnd_production2consumptionfloor",
            &format!("{:.2}", ratios.floor),
            json!({
                "friendly_name": "PND Interval Production to Consumption Floor",
                "device_class": "energy",
                "unit_of_measurement": "%",
            }),
        )
        .await
    }

    pub async fn publish_duration(&self, duration: chrono::Duration) -> HaResult<()> {
        let seconds = duration.num_seconds().max(0);
        let formatted = format!(
            "{}:{:02}:{:02}",
            seconds / 3600,
            (seconds % 3600) / 60,
            seconds % 60
        );
        self.set(
            "sensor.pnd_script_duration",
            &formatted,
            json!({
                "friendly_name": "PND Script Duration",
            }),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pndion_types::TimeSeriesRow;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        calls: Mutex<Vec<(String, String, Value)>>,
    }

    #[async_trait]
    impl StateSink for RecordingSink {
        async fn set_state(
            &self,
            entity_id: &str,
            state: &str,
            attributes: Value,
        ) -> HaResult<()> {
            self.calls.lock().unwrap().push((
                entity_id.to_owned(),
                state.to_owned(),
                attributes,
            ));
            Ok(())
        }
    }

    fn publisher(sink: Arc<RecordingSink>, suffix: &str) -> StatePublisher {
        StatePublisher::new(sink, suffix)
    }

    #[test]
    fn normalize_collapses_whitespace_and_nbsp() {
        assert_eq!(normalize_state("  2.1.3\u{a0} (build\n 7) "), "2.1.3 (build 7)");
    }

    #[test]
    fn normalize_truncates_to_platform_limit() {
        let long = "x".repeat(400);
        assert_eq!(normalize_state(&long).chars().count(), 255);
    }

    #[test]
    fn normalize_empty_is_unknown() {
        assert_eq!(normalize_state("  \u{a0} "), "unknown");
    }

    #[tokio::test]
    async fn running_flag_uses_suffix() {
        let sink = Arc::new(RecordingSink::default());
        publisher(sink.clone(), "_house2")
            .set_running(true)
            .await
            .unwrap();

        let calls = sink.calls.lock().unwrap();
        assert_eq!(calls[0].0, "binary_sensor.pnd_running_house2");
        assert_eq!(calls[0].1, "on");
    }

    #[tokio::test]
    async fn daily_reading_carries_attributed_date() {
        let sink = Arc::new(RecordingSink::default());
        let reading = DailyReading::from_last_row(TimeSeriesRow {
            timestamp: NaiveDate::from_ymd_opt(2025, 8, 7)
                .unwrap()
                .and_hms_opt(23, 59, 0)
                .unwrap(),
            value: 12.5,
        });
        publisher(sink.clone(), "")
            .publish_daily_reading(EnergyKind::Consumption, &reading)
            .await
            .unwrap();

        let calls = sink.calls.lock().unwrap();
        assert_eq!(calls[0].0, "sensor.pnd_consumption");
        assert_eq!(calls[0].1, "12.5");
        assert_eq!(calls[0].2["date"], "2025-08-06T23:59:00");
        assert_eq!(calls[0].2["unit_of_measurement"], "kWh");
    }

    #[tokio::test]
    async fn nan_reading_publishes_unknown() {
        let sink = Arc::new(RecordingSink::default());
        let reading = DailyReading {
            date: NaiveDate::from_ymd_opt(2025, 8, 6)
                .unwrap()
                .and_hms_opt(23, 59, 0)
                .unwrap(),
            value: f64::NAN,
        };
        publisher(sink.clone(), "")
            .publish_daily_reading(EnergyKind::Production, &reading)
            .await
            .unwrap();

        assert_eq!(sink.calls.lock().unwrap()[0].1, "unknown");
    }

    #[tokio::test]
    async fn interval_series_publishes_data_and_totals() {
        let sink = Arc::new(RecordingSink::default());
        let rows = [
            TimeSeriesRow {
                timestamp: NaiveDate::from_ymd_opt(2025, 7, 1)
                    .unwrap()
                    .and_hms_opt(23, 59, 0)
                    .unwrap(),
                value: 10.5,
            },
            TimeSeriesRow {
                timestamp: NaiveDate::from_ymd_opt(2025, 7, 2)
                    .unwrap()
                    .and_hms_opt(23, 59, 0)
                    .unwrap(),
                value: 20.25,
            },
        ];
        let series = IntervalSeries::from_rows(&rows, &rows[..1]);
        publisher(sink.clone(), "")
            .publish_interval_series(&series)
            .await
            .unwrap();

        let calls = sink.calls.lock().unwrap();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].0, "sensor.pnd_data");
        assert_eq!(calls[0].2["pnddate"], json!(["2025-07-01", "2025-07-02"]));
        assert_eq!(calls[1].0, "sensor.pnd_total_interval_consumption");
        assert_eq!(calls[1].1, "30.75");
        assert_eq!(calls[2].0, "sensor.pnd_total_interval_production");
        assert_eq!(calls[2].1, "10.50");
    }

    #[tokio::test]
    async fn ratios_publish_all_three_variants() {
        let sink = Arc::new(RecordingSink::default());
        publisher(sink.clone(), "")
            .publish_ratios(&RatioSet::from_totals(50.0, 40.0))
            .await
            .unwrap();

        let calls = sink.calls.lock().unwrap();
        assert_eq!(calls[0].0, "sensor.pnd_production2consumption");
        assert_eq!(calls[0].1, "100.00");
        assert_eq!(calls[1].0, "sensor.pnd_production2consumptionfull");
        assert_eq!(calls[1].1, "125.00");
        assert_eq!(calls[2].0, "sensor.pnd_production2consumptionfloor");
        assert_eq!(calls[2].1, "25.00");
    }

    #[tokio::test]
    async fn duration_formats_as_clock_time() {
        let sink = Arc::new(RecordingSink::default());
        publisher(sink.clone(), "")
            .publish_duration(chrono::Duration::seconds(3725))
            .await
            .unwrap();

        assert_eq!(sink.calls.lock().unwrap()[0].1, "1:02:05");
    }

    #[tokio::test]
    async fn negative_duration_clamps_to_zero() {
        let sink = Arc::new(RecordingSink::default());
        publisher(sink.clone(), "")
            .publish_duration(chrono::Duration::seconds(-5))
            .await
            .unwrap();

        assert_eq!(sink.calls.lock().unwrap()[0].1, "0:00:00");
    }
}
