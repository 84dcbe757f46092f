//! # Rasterpress Library
//!
//! Questo è il modulo principale della libreria che espone tutte le API pubbliche.
//!
//! ## Responsabilità:
//! - Definisce la struttura modulare dell'applicazione
//! - Espone i tipi e le funzioni principali tramite re-exports
//! - Fornisce un'interfaccia pulita per il main.rs e per altri consumatori
//!
//! ## Architettura dei moduli:
//! - `config`: Gestione configurazione e validazione parametri
//! - `error`: Tipi di errore custom per le diverse operazioni
//! - `ledger`: Registro append-only dei file già convertiti (resume)
//! - `walker`: Discovery ricorsiva dei TIFF e mirroring delle directory
//! - `decode`: Decodifica TIFF e normalizzazione del colore
//! - `compressor`: Ricerca dinamica della qualità JPEG per il budget di dimensione
//! - `converter`: Orchestratore sequenziale del processo di conversione
//! - `progress`: Progress tracking e statistiche
//!
//! ## Utilizzo:
//! ```rust,ignore
//! use rasterpress::{Config, ConversionRun};
//!
//! let config = Config { input_dir, output_dir, target_size_kb: 15000 };
//! let mut run = ConversionRun::new(config).await?;
//! run.run().await?;
//! ```

pub mod compressor;
pub mod config;
pub mod converter;
pub mod decode;
pub mod error;
pub mod ledger;
pub mod progress;
pub mod walker;

pub use compressor::Compressor;
pub use config::Config;
pub use converter::ConversionRun;
pub use error::ConvertError;
pub use ledger::Ledger;
pub use walker::ConversionJob;
