//! # Configuration Management Module
//!
//! Questo modulo gestisce tutta la configurazione dell'applicazione.
//!
//! ## Responsabilità:
//! - Definisce la struct `Config` con tutti i parametri della conversione
//! - Fornisce validazione dei parametri di input
//! - Supporta caricamento/salvataggio configurazione da/verso file JSON
//!
//! ## Parametri di configurazione:
//! - `input_dir`: Directory radice con i TIFF sorgente
//! - `output_dir`: Directory radice che rispecchia l'albero di input con i JPEG
//! - `target_size_kb`: Dimensione massima per file di output (default: 15000)
//!
//! ## Esempio:
//! ```rust,ignore
//! let config = Config {
//!     input_dir: "/data/ortho".into(),
//!     output_dir: "/data/ortho-jpeg".into(),
//!     target_size_kb: 15000,
//! };
//! config.validate()?;
//! ```

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default output size budget per file, in kilobytes.
pub const DEFAULT_TARGET_SIZE_KB: u64 = 15000;

/// Configuration for a conversion run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root directory containing source TIFF files
    pub input_dir: PathBuf,
    /// Root directory for the mirrored JPEG tree (and the conversion log)
    pub output_dir: PathBuf,
    /// Maximum allowed output size per file, in kilobytes
    pub target_size_kb: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("."),
            output_dir: PathBuf::from("converted"),
            target_size_kb: DEFAULT_TARGET_SIZE_KB,
        }
    }
}

impl Config {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.target_size_kb == 0 {
            return Err(anyhow::anyhow!("Target size must be greater than 0 KB"));
        }

        if !self.input_dir.exists() {
            return Err(anyhow::anyhow!(
                "Input directory does not exist: {}",
                self.input_dir.display()
            ));
        }

        if !self.input_dir.is_dir() {
            return Err(anyhow::anyhow!(
                "Input path is not a directory: {}",
                self.input_dir.display()
            ));
        }

        Ok(())
    }

    /// Load configuration from file
    pub async fn from_file(path: &PathBuf) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_to_file(&self, path: &PathBuf) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}
