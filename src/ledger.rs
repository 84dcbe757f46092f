//! # Conversion Ledger Module
//!
//! Questo modulo gestisce il tracking dei file già convertiti per permettere
//! il resume dopo interruzioni o crash.
//!
//! ## Responsabilità:
//! - Carica il set dei path di output già completati da `conversion_log.txt`
//! - Registra ogni conversione riuscita con un append durevole (mai rewrite)
//! - Fornisce il test di membership usato per saltare i file al restart
//!
//! ## Formato del file:
//! Testo semplice, un path di output per riga, newline-terminated. L'ordine
//! è cronologico ma ha solo semantica di membership. Al restart il file su
//! disco è autorevole: viene ricaricato e l'insieme in memoria ricostruito.
//!
//! ## Invariante:
//! La presenza di un path nel ledger implica che il file di output esiste e
//! rispetta il budget di dimensione (best-effort, non verificato al load).

use anyhow::Result;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Persisted set of completed output paths
pub struct Ledger {
    log_path: PathBuf,
    entries: HashSet<String>,
}

impl Ledger {
    /// Name of the log file kept at the output root.
    pub const FILE_NAME: &'static str = "conversion_log.txt";

    /// Load the ledger from the output root.
    ///
    /// A missing log file yields an empty ledger; an existing but unreadable
    /// file is a fatal error.
    pub async fn load(output_root: &Path) -> Result<Self> {
        let log_path = output_root.join(Self::FILE_NAME);
        let mut entries = HashSet::new();

        match fs::read_to_string(&log_path).await {
            Ok(content) => {
                for line in content.lines() {
                    let line = line.trim();
                    if !line.is_empty() {
                        entries.insert(line.to_string());
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        Ok(Self { log_path, entries })
    }

    /// Whether an output path has already been recorded as converted.
    pub fn contains(&self, output_path: &Path) -> bool {
        self.entries.contains(output_path.to_string_lossy().as_ref())
    }

    /// Number of recorded conversions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record a successful conversion: durable append to the log file first,
    /// then the in-memory set. The file is never rewritten wholesale.
    pub async fn record(&mut self, output_path: &Path) -> Result<()> {
        let entry = output_path.to_string_lossy().into_owned();

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .await?;
        file.write_all(entry.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.flush().await?;

        self.entries.insert(entry);
        Ok(())
    }
}
