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

//! Debug artifacts: stage screenshots, the device-selection markup log and
//! the final bundle. Everything here is best-effort; a failed screenshot
//! must never fail a run.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use thirtyfour::prelude::*;
use tracing::{debug, warn};
use zip::{CompressionMethod, ZipWriter, write::SimpleFileOptions};

const DEVICE_LOG_NAME: &str = "debug-ELM.txt";
const BUNDLE_NAME: &str = "debug.zip";

/// Writes debug artifacts into the run's working directory.
#[derive(Debug, Clone)]
pub struct DebugRecorder {
    dir: PathBuf,
}

impl DebugRecorder {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Capture a labeled screenshot of the current page.
    pub async fn screenshot(&self, driver: &WebDriver, label: &str) {
        let path = self.dir.join(format!("{label}.png"));
        if let Err(e) = driver.screenshot(&path).await {
            warn!("screenshot {label} failed: {e}");
        }
    }

    /// Start a fresh device-selection log for this run.
    pub fn init_device_log(&self) {
        if let Err(e) = std::fs::write(self.device_log_path(), ">>>Debug ELM<<<\n") {
            warn!("could not create {DEVICE_LOG_NAME}: {e}");
        }
    }

    /// Append one selection attempt's state and serialized markup.
    pub fn log_device_attempt(&self, attempt: u32, selected_text: &str, markup: &str) {
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.device_log_path())
            .and_then(|mut file| {
                writeln!(file, ">>>Iteration {attempt}<<<")?;
                writeln!(file, "ELM span content: {selected_text}")?;
                writeln!(file, "{markup}")
            });
        if let Err(e) = result {
            warn!("could not append to {DEVICE_LOG_NAME}: {e}");
        }
    }

    fn device_log_path(&self) -> PathBuf {
        self.dir.join(DEVICE_LOG_NAME)
    }

    /// Zip every artifact in the working directory into `debug.zip`.
    pub fn write_bundle(&self) -> std::io::Result<PathBuf> {
        let bundle_path = self.dir.join(BUNDLE_NAME);
        let file = File::create(&bundle_path)?;
        let mut writer = ZipWriter::new(file);
        let options =
            SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if name == BUNDLE_NAME {
                continue;
            }
            writer
                .start_file(name, options)
                .map_err(std::io::Error::other)?;
            let mut source = File::open(&path)?;
            std::io::copy(&mut source, &mut writer)?;
        }

        writer.finish().map_err(std::io::Error::other)?;
        debug!("debug bundle written to {}", bundle_path.display());
        Ok(bundle_path)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
