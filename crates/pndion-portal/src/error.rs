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

//! Error types for the portal automation.
//!
//! `Display` texts are for logs; [`PortalError::status_message`] carries the
//! Czech operator-facing text published to the status entity.

use pndion_ha::HaError;
use pndion_ingest::IngestError;
use pndion_types::ExportStage;
use thirtyfour::error::WebDriverError;
use thiserror::Error;

/// Sub-step of the time-window selection, for mode-specific failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowStep {
    /// Selecting the "Včera" option
    Yesterday,
    /// Selecting the "Vlastní" option
    CustomOption,
    /// Filling the custom range input
    CustomInput,
    /// Clicking the "Vyhledat data" submit button
    Submit,
}

#[derive(Debug, Error)]
pub enum PortalError {
    #[error("failed to initialize the browser driver: {0}")]
    DriverInit(String),

    #[error("portal site unreachable: {0}")]
    Navigation(String),

    #[error("could not drive the login form: {0}")]
    LoginFormNotFound(String),

    #[error("login rejected by the portal: {0}")]
    LoginRejected(String),

    #[error("neither the landing heading nor an error panel appeared in time")]
    LoginTimeout,

    #[error("post-login dialog present but its acknowledgement button was not")]
    ModalDismissFailed,

    #[error("report profile not selectable after {attempts} attempts")]
    ProfileSelectionFailed { attempts: u32 },

    #[error("device selector {0:?} is not among the portal's rendered options")]
    UnknownDevice(String),

    #[error("device {selector:?} selection did not stabilize after {attempts} attempts")]
    DeviceSelectionFailed { selector: String, attempts: u32 },

    #[error("time window selection failed at {0:?}")]
    WindowSelectionFailed(WindowStep),

    #[error("panel control {0:?} could not be clicked")]
    ExportPanelFailed(String),

    #[error("report link {0:?} not found in the export panel")]
    ExportLinkNotFound(String),

    #[error("no CSV download materialized for {0}")]
    CsvDownloadFailed(ExportStage),

    #[error("unexpected WebDriver failure: {0}")]
    Webdriver(#[from] WebDriverError),

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error("state publishing failed: {0}")]
    Publish(#[from] HaError),

    #[error("working directory error: {0}")]
    Io(#[from] std::io::Error),
}

pub type PortalResult<T> = std::result::Result<T, PortalError>;

impl PortalError {
    /// Operator-facing status text, suitable for the host's status field.
    pub fn status_message(&self) -> String {
        match self {
            Self::DriverInit(_) => {
                "ERROR: Nepodařilo se inicializovat Chrome Driver, zkontrolujte nastavení doplňku"
                    .to_owned()
            }
            Self::Navigation(_) => {
                "ERROR: Nepodařilo se otevřít webovou stránku PND portálu".to_owned()
            }
            Self::LoginFormNotFound(_) => {
                "ERROR: Nepodařilo se vyplnit přihlašovací údaje nebo najít a kliknout na tlačítko pro přihlášení"
                    .to_owned()
            }
            Self::LoginRejected(_) => "ERROR: Není možné se přihlásit do aplikace".to_owned(),
            Self::LoginTimeout => {
                "ERROR: Text 'Naměřená data' nebyl nalezen na stránce, zkuste skript spustit později znovu."
                    .to_owned()
            }
            Self::ModalDismissFailed => {
                "ERROR: Nepodařilo se zavřít úvodní dialogové okno".to_owned()
            }
            Self::ProfileSelectionFailed { attempts } => format!(
                "ERROR: Nebylo možné vybrat 'Rychlá sestava' po {attempts} pokusech. Zkuste skript spustit později znovu."
            ),
            Self::UnknownDevice(selector) => format!(
                "ERROR: Nebylo možné najít '{selector}' v nabídce. Zkontrolujte ELM atribut v nastavení aplikace."
            ),
            Self::DeviceSelectionFailed { selector, attempts } => format!(
                "ERROR: Nebylo možné najít '{selector}' po {attempts} pokusech. Zkontrolujte ELM atribut v nastavení aplikace."
            ),
            Self::WindowSelectionFailed(step) => match step {
                WindowStep::Yesterday => {
                    "ERROR: Nepodařilo se vybrat 'Včera' v nabídce".to_owned()
                }
                WindowStep::CustomOption | WindowStep::CustomInput => {
                    "ERROR: Nepodařilo se vybrat 'Vlastní období' v nabídce".to_owned()
                }
                WindowStep::Submit => {
                    "ERROR: Nepodařilo se nalézt nebo kliknout na tlačítko 'Vyhledat data'"
                        .to_owned()
                }
            },
            Self::ExportPanelFailed(control) => format!(
                "ERROR: Nepodařilo se najít nebo kliknout na tlačítko '{control}'"
            ),
            Self::ExportLinkNotFound(link) => {
                format!("ERROR: Nepodařilo se najít odkaz pro sestavu {link}")
            }
            Self::CsvDownloadFailed(stage) => format!(
                "ERROR: Nepodařilo se stáhnout CSV soubor pro sestavu {}",
                stage.report_label()
            ),
            Self::Webdriver(_) => {
                "ERROR: Neočekávaná chyba prohlížeče, zkuste skript spustit později znovu."
                    .to_owned()
            }
            Self::Ingest(_) => "ERROR: Zpracování staženého CSV souboru selhalo".to_owned(),
            Self::Publish(_) => {
                "ERROR: Publikování stavů do Home Assistant selhalo".to_owned()
            }
            Self::Io(_) => "ERROR: Chyba při práci se soubory v pracovním adresáři".to_owned(),
        }
    }
}
