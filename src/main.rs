//! # Rasterpress - Main Entry Point
//!
//! Questo è il punto di ingresso principale dell'applicazione.
//!
//! ## Responsabilità:
//! - Parsing degli argomenti della command line con `clap`
//! - Caricamento opzionale della configurazione da file JSON
//! - Inizializzazione del sistema di logging con `tracing`
//! - Validazione degli input dell'utente
//! - Installazione del ctrl-c handler per la cancellazione cooperativa
//! - Creazione della configurazione e avvio della conversione
//!
//! ## Flusso di esecuzione:
//! 1. Parsa gli argomenti CLI (input, output, target size, config, verbose)
//! 2. Configura il logging (INFO o DEBUG a seconda del flag verbose)
//! 3. Risolve la configurazione: file JSON se `--config`, poi i flag CLI
//!    hanno la precedenza
//! 4. Valida che la directory di input esista e crea quella di output
//! 5. Avvia `ConversionRun`; un ctrl-c interrompe la run in modo pulito
//!    e un restart successivo riprende dal ledger
//!
//! ## Esempio di utilizzo:
//! ```bash
//! rasterpress /data/ortho /data/ortho-jpeg --target-size 15000 --verbose
//! ```

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tokio::sync::broadcast;
use tracing::info;

use rasterpress::converter::is_cancelled;
use rasterpress::{Config, ConversionRun};

#[derive(Parser)]
#[command(name = "rasterpress")]
#[command(about = "Convert TIFF trees into size-bounded progressive JPEGs, resumably")]
struct Args {
    /// Root directory containing the source TIFF files
    input_dir: PathBuf,

    /// Root directory for the mirrored JPEG output tree
    output_dir: PathBuf,

    /// Maximum output size per file, in kilobytes (default: 15000)
    #[arg(short, long)]
    target_size: Option<u64>,

    /// Optional JSON config file; command line flags take precedence
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Resolve the effective configuration: the JSON config file (when given)
/// provides the base values, command line arguments override them.
async fn resolve_config(args: &Args) -> Result<Config> {
    let mut config = match args.config {
        Some(ref path) => Config::from_file(path).await?,
        None => Config::default(),
    };

    config.input_dir = args.input_dir.clone();
    config.output_dir = args.output_dir.clone();
    if let Some(target_size) = args.target_size {
        config.target_size_kb = target_size;
    }

    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(if args.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    // Validate arguments
    if !args.input_dir.exists() {
        return Err(anyhow::anyhow!(
            "Input directory does not exist: {}",
            args.input_dir.display()
        ));
    }

    if !args.output_dir.exists() {
        std::fs::create_dir_all(&args.output_dir)?;
        info!("Created output directory: {}", args.output_dir.display());
    }

    let config = resolve_config(&args).await?;

    // ctrl-c requests a cooperative stop; the run observes it at file
    // granularity and between encode attempts
    let (stop_sender, stop_receiver) = broadcast::channel(1);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = stop_sender.send(());
        }
    });

    let mut run = ConversionRun::new_with_cancellation(config, stop_receiver).await?;
    match run.run().await {
        Ok(()) => {
            info!("Conversion completed successfully");
            Ok(())
        }
        Err(e) if is_cancelled(&e) => {
            info!("Conversion stopped by user. Progress has been saved; restart to continue from where it left off.");
            Ok(())
        }
        Err(e) => Err(e),
    }
}
