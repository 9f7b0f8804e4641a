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

//! Configuration model loaded from a TOML file at startup.
//!
//! All values are read once and stay read-only for the process lifetime.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

const DEFAULT_PORTAL_URL: &str = "https://pnd.cezdistribuce.cz/cezpnd2/external/dashboard/view";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Portal account and export parameters
    pub portal: PortalConfig,

    /// Local runtime: working directory, chromedriver, failure policy
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// Home Assistant connection (optional; Supervisor env wins when present)
    #[serde(default)]
    pub home_assistant: HaConfig,
}

/// Portal account and export-flow parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    /// Portal login e-mail
    pub username: String,

    /// Portal password
    pub password: String,

    /// Metering-point selector, matched as a substring against the options
    /// of the "Množina zařízení" dropdown (e.g. "ELM1234567890")
    pub device_selector: String,

    /// Custom date range in the exact format the portal input expects
    /// (e.g. "1.7.2025 - 31.7.2025"); passed through unvalidated
    pub data_interval: String,

    /// Dashboard URL; overridable for test harnesses
    #[serde(default = "default_portal_url")]
    pub base_url: String,
}

/// Local runtime settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Base working/download directory; the instance suffix is appended
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Optional instance id; suffixes entity ids and the working directory
    #[serde(default)]
    pub instance_id: String,

    /// Path to the chromedriver binary
    #[serde(default = "default_chromedriver_path")]
    pub chromedriver_path: PathBuf,

    /// Port chromedriver listens on; one port per instance
    #[serde(default = "default_webdriver_port")]
    pub webdriver_port: u16,

    /// What to do when an export download sub-stage fails
    #[serde(default)]
    pub download_failure_policy: DownloadFailurePolicy,
}

/// Home Assistant connection settings; both fields fall back to the
/// `HA_BASE_URL`/`HA_TOKEN` environment variables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HaConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// Failure policy for the export-link/download sub-stage.
///
/// The legacy integration logged download failures and kept going, while
/// every other stage aborted the run. `Lenient` preserves that behavior,
/// `Strict` makes download failures fatal like the rest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadFailurePolicy {
    #[default]
    Lenient,
    Strict,
}

fn default_portal_url() -> String {
    DEFAULT_PORTAL_URL.to_owned()
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("/data/pnd")
}

fn default_chromedriver_path() -> PathBuf {
    PathBuf::from("/usr/bin/chromedriver")
}

fn default_webdriver_port() -> u16 {
    9515
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            instance_id: String::new(),
            chromedriver_path: default_chromedriver_path(),
            webdriver_port: default_webdriver_port(),
            download_failure_policy: DownloadFailurePolicy::default(),
        }
    }
}

impl AppConfig {
    /// Entity-id suffix for this instance (`"_house2"` or empty).
    pub fn suffix(&self) -> String {
        if self.runtime.instance_id.is_empty() {
            String::new()
        } else {
            format!("_{}", self.runtime.instance_id)
        }
    }

    /// Working directory for this instance. Cleared and recreated at run
    /// start; holds downloads, renamed artifacts and debug output.
    pub fn working_dir(&self) -> PathBuf {
        if self.runtime.instance_id.is_empty() {
            self.runtime.download_dir.clone()
        } else {
            let mut dir = self.runtime.download_dir.clone().into_os_string();
            dir.push(format!("_{}", self.runtime.instance_id));
            PathBuf::from(dir)
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.portal.username.trim().is_empty() {
            return Err(ConfigError::Invalid("portal.username is empty".into()));
        }
        if self.portal.password.is_empty() {
            return Err(ConfigError::Invalid("portal.password is empty".into()));
        }
        if self.portal.device_selector.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "portal.device_selector is empty".into(),
            ));
        }
        if self.portal.data_interval.trim().is_empty() {
            return Err(ConfigError::Invalid("portal.data_interval is empty".into()));
        }
        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config: AppConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_toml() -> &'static str {
        r#"
            [portal]
            username = "user@example.com"
            password = "secret"
            device_selector = "ELM1234567890"
            data_interval = "1.7.2025 - 31.7.2025"

            [runtime]
            download_dir = "/tmp/pnd"
            instance_id = "house2"

            [home_assistant]
            base_url = "http://localhost:8123"
            token = "abc"
        "#
    }

    #[test]
    fn parses_full_config() {
        let config: AppConfig = toml::from_str(sample_toml()).unwrap();
        assert_eq!(config.portal.username, "user@example.com");
        assert_eq!(config.portal.base_url, DEFAULT_PORTAL_URL);
        assert_eq!(config.runtime.webdriver_port, 9515);
        assert_eq!(
            config.runtime.download_failure_policy,
            DownloadFailurePolicy::Lenient
        );
        assert_eq!(config.suffix(), "_house2");
        assert_eq!(config.working_dir(), PathBuf::from("/tmp/pnd_house2"));
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
                [portal]
                username = "u"
                password = "p"
                device_selector = "ELM1"
                data_interval = "1.1.2025 - 2.1.2025"
            "#,
        )
        .unwrap();
        assert!(config.suffix().is_empty());
        assert_eq!(config.working_dir(), PathBuf::from("/data/pnd"));
        assert_eq!(
            config.runtime.chromedriver_path,
            PathBuf::from("/usr/bin/chromedriver")
        );
        assert!(config.home_assistant.base_url.is_none());
    }

    #[test]
    fn strict_policy_round_trips() {
        let config: AppConfig = toml::from_str(
            r#"
                [portal]
                username = "u"
                password = "p"
                device_selector = "ELM1"
                data_interval = "1.1.2025 - 2.1.2025"

                [runtime]
                download_failure_policy = "strict"
            "#,
        )
        .unwrap();
        assert_eq!(
            config.runtime.download_failure_policy,
            DownloadFailurePolicy::Strict
        );
    }

    #[test]
    fn validation_rejects_blank_selector() {
        let mut config: AppConfig = toml::from_str(sample_toml()).unwrap();
        config.portal.device_selector = "  ".into();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn load_config_reports_missing_file() {
        let err = load_config(Path::new("/nonexistent/pndion.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn load_config_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pndion.toml");
        std::fs::write(&path, sample_toml()).unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.portal.device_selector, "ELM1234567890");
    }
}
