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

//! End-to-end ingestion/publishing pipeline against a recording sink:
//! given four well-formed exports, a run publishes exactly one daily
//! consumption reading, one daily production reading, one interval series,
//! two sums, three ratio variants, a Stopped/Finished status and a
//! non-negative duration.

use async_trait::async_trait;
use pndion_ha::{HaResult, RunStatus, StatePublisher, StateSink};
use pndion_portal::RunContext;
use pndion_portal::run::{process_daily, process_interval};
use pndion_types::{AppConfig, config::PortalConfig, config::RuntimeConfig};
use serde_json::Value;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct RecordingSink {
    calls: Mutex<Vec<(String, String, Value)>>,
}

impl RecordingSink {
    fn calls(&self) -> Vec<(String, String, Value)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl StateSink for RecordingSink {
    async fn set_state(&self, entity_id: &str, state: &str, attributes: Value) -> HaResult<()> {
        self.calls
            .lock()
            .unwrap()
            .push((entity_id.to_owned(), state.to_owned(), attributes));
        Ok(())
    }
}

fn test_config(download_dir: std::path::PathBuf) -> AppConfig {
    AppConfig {
        portal: PortalConfig {
            username: "user@example.com".into(),
            password: "secret".into(),
            device_selector: "ELM1234567890".into(),
            data_interval: "1.7.2025 - 31.7.2025".into(),
            base_url: "http://localhost:1/unused".into(),
        },
        runtime: RuntimeConfig {
            download_dir,
            ..RuntimeConfig::default()
        },
        home_assistant: Default::default(),
    }
}

fn seed_exports(dir: &std::path::Path) {
    std::fs::write(
        dir.join("daily-consumption.csv"),
        b"Datum;Hodnota\n05.08.2025 24:00:00;11,5\n06.08.2025 24:00:00;12,5\n",
    )
    .unwrap();
    std::fs::write(
        dir.join("daily-production.csv"),
        b"Datum;Hodnota\n05.08.2025 24:00:00;3,0\n06.08.2025 24:00:00;4,25\n",
    )
    .unwrap();
    std::fs::write(
        dir.join("range-consumption.csv"),
        b"Datum;Hodnota\n01.07.2025 24:00:00;10,0\n02.07.2025 24:00:00;20,0\n03.07.2025 24:00:00;10,0\n",
    )
    .unwrap();
    std::fs::write(
        dir.join("range-production.csv"),
        b"Datum;Hodnota\n01.07.2025 24:00:00;20,0\n02.07.2025 24:00:00;20,0\n03.07.2025 24:00:00;10,0\n",
    )
    .unwrap();
}

#[tokio::test]
async fn full_pipeline_publishes_the_complete_entity_set() {
    let dir = tempfile::tempdir().unwrap();
    let sink = Arc::new(RecordingSink::default());
    let publisher = StatePublisher::new(sink.clone(), "");
    let config = test_config(dir.path().to_path_buf());
    let ctx = RunContext::new(config, publisher.clone());
    seed_exports(&ctx.working_dir);

    let started = std::time::Instant::now();
    publisher.set_running(true).await.unwrap();
    publisher.set_status(RunStatus::Running, "OK").await.unwrap();

    process_daily(&ctx).await.unwrap();
    process_interval(&ctx).await.unwrap();

    publisher.set_running(false).await.unwrap();
    publisher
        .publish_duration(chrono::Duration::from_std(started.elapsed()).unwrap())
        .await
        .unwrap();
    publisher
        .set_status(RunStatus::Stopped, "Finished")
        .await
        .unwrap();

    let calls = sink.calls();
    let entities: Vec<&str> = calls.iter().map(|(id, _, _)| id.as_str()).collect();
    assert_eq!(
        entities,
        vec![
            "binary_sensor.pnd_running",
            "sensor.pnd_script_status",
            "sensor.pnd_consumption",
            "sensor.pnd_production",
            "sensor.pnd_data",
            "sensor.pnd_total_interval_consumption",
            "sensor.pnd_total_interval_production",
            "sensor.pnd_production2consumption",
            "sensor.pnd_production2consumptionfull",
            "sensor.pnd_production2consumptionfloor",
            "binary_sensor.pnd_running",
            "sensor.pnd_script_duration",
            "sensor.pnd_script_status",
        ]
    );

    // Daily readings: last row, date shifted back one day
    let consumption = &calls[2];
    assert_eq!(consumption.1, "12.5");
    assert_eq!(consumption.2["date"], "2025-08-05T23:59:00");
    let production = &calls[3];
    assert_eq!(production.1, "4.25");

    // Interval series of three rows with both sums
    let data = &calls[4];
    assert_eq!(
        data.2["pnddate"],
        serde_json::json!(["2025-07-01", "2025-07-02", "2025-07-03"])
    );
    assert_eq!(calls[5].1, "40.00");
    assert_eq!(calls[6].1, "50.00");

    // Ratios: 50/40 => 125 full, capped at 100, floor 25
    assert_eq!(calls[7].1, "100.00");
    assert_eq!(calls[8].1, "125.00");
    assert_eq!(calls[9].1, "25.00");

    // Final status pair and a non-negative duration
    assert_eq!(calls[10].1, "off");
    let duration = &calls[11].1;
    assert!(duration.split(':').count() == 3, "duration: {duration}");
    let stopped = &calls[12];
    assert_eq!(stopped.1, "Stopped");
    assert_eq!(stopped.2["status"], "Finished");
}

#[tokio::test]
async fn missing_artifact_fails_ingestion_for_that_stage() {
    let dir = tempfile::tempdir().unwrap();
    let sink = Arc::new(RecordingSink::default());
    let publisher = StatePublisher::new(sink.clone(), "");
    let ctx = RunContext::new(test_config(dir.path().to_path_buf()), publisher);
    // Working directory exists but holds no artifacts
    std::fs::create_dir_all(&ctx.working_dir).unwrap();

    let err = process_daily(&ctx).await.unwrap_err();
    assert!(err.status_message().starts_with("ERROR: "));
    assert!(sink.calls().is_empty());
}

#[tokio::test]
async fn instance_suffix_reaches_every_entity() {
    let dir = tempfile::tempdir().unwrap();
    let sink = Arc::new(RecordingSink::default());
    let publisher = StatePublisher::new(sink.clone(), "_house2");
    let mut config = test_config(dir.path().to_path_buf());
    config.runtime.instance_id = "house2".into();
    let ctx = RunContext::new(config, publisher);
    std::fs::create_dir_all(&ctx.working_dir).unwrap();
    seed_exports(&ctx.working_dir);

    process_daily(&ctx).await.unwrap();
    process_interval(&ctx).await.unwrap();

    for (entity, _, _) in sink.calls() {
        assert!(entity.ends_with("_house2"), "entity without suffix: {entity}");
    }
}
