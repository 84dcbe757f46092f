//! # Conversion Orchestrator Module
//!
//! Questo è il modulo che orchestra l'intero processo di conversione.
//!
//! ## Responsabilità:
//! - Coordinamento di tutti gli altri moduli
//! - Loop sequenziale per-file: ledger check → decode → normalize → compress
//! - Isolamento degli errori per singolo file (un file corrotto non
//!   interrompe il batch)
//! - Cleanup garantito degli output parziali su ogni percorso di fallimento
//! - Gestione della cancellazione cooperativa (ctrl-c)
//!
//! ## Stati per file:
//! `Pending → Skipped` (ledger hit) oppure
//! `Pending → Decoding → Normalizing → Compressing →
//!  {Succeeded, FailedBudget, FailedError}`
//!
//! ## Cleanup degli output parziali:
//! Ogni file processato acquisisce un `OutputGuard` sul path di output; la
//! decisione keep/delete avviene in un punto solo, all'uscita di successo.
//! Budget esaurito, errori e cancellazione lasciano il guard al suo Drop,
//! che rimuove i byte parziali.
//!
//! ## Garanzia di restart:
//! Il ledger viene aggiornato solo dopo che l'output definitivo è su disco,
//! quindi un restart riprocessa esattamente i file non ancora completati.

use crate::{
    compressor::Compressor,
    config::Config,
    decode,
    error::ConvertError,
    ledger::Ledger,
    progress::{format_size, ConversionStats, ProgressManager},
    walker::{self, ConversionJob},
};
use anyhow::Result;
use std::path::PathBuf;
use std::time::Instant;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Terminal state of a single file that ran the full pipeline.
enum FileOutcome {
    Converted { input_bytes: u64, output_bytes: u64 },
    BudgetExhausted,
}

/// Deletes the output path on drop unless the success exit marked it kept.
struct OutputGuard {
    path: PathBuf,
    keep: bool,
}

impl OutputGuard {
    fn new(path: PathBuf) -> Self {
        Self { path, keep: false }
    }

    fn keep(mut self) {
        self.keep = true;
    }
}

impl Drop for OutputGuard {
    fn drop(&mut self) {
        if !self.keep && self.path.exists() {
            if let Err(e) = std::fs::remove_file(&self.path) {
                warn!(
                    "Failed to remove partial output {}: {}",
                    self.path.display(),
                    e
                );
            }
        }
    }
}

/// Sequential conversion run: walks the input tree once and converts every
/// TIFF not already recorded in the ledger.
pub struct ConversionRun {
    config: Config,
    ledger: Ledger,
    compressor: Compressor,
    stop_receiver: Option<broadcast::Receiver<()>>,
    stats: ConversionStats,
}

impl ConversionRun {
    /// Create a new conversion run
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;
        tokio::fs::create_dir_all(&config.output_dir).await?;

        let ledger = Ledger::load(&config.output_dir).await?;
        let compressor = Compressor::new(config.target_size_kb);

        Ok(Self {
            config,
            ledger,
            compressor,
            stop_receiver: None,
            stats: ConversionStats::new(),
        })
    }

    /// Create a conversion run that observes a stop signal at the top of the
    /// per-file loop and between encode attempts.
    pub async fn new_with_cancellation(
        config: Config,
        stop_receiver: broadcast::Receiver<()>,
    ) -> Result<Self> {
        let compressor_receiver = stop_receiver.resubscribe();
        let mut run = Self::new(config).await?;
        run.compressor =
            Compressor::with_cancellation(run.config.target_size_kb, compressor_receiver);
        run.stop_receiver = Some(stop_receiver);
        Ok(run)
    }

    /// Statistics accumulated so far.
    pub fn stats(&self) -> &ConversionStats {
        &self.stats
    }

    fn should_stop(&mut self) -> bool {
        if let Some(ref mut receiver) = self.stop_receiver {
            match receiver.try_recv() {
                Ok(_) => return true,
                Err(broadcast::error::TryRecvError::Empty) => return false,
                Err(broadcast::error::TryRecvError::Lagged(_)) => return true,
                Err(broadcast::error::TryRecvError::Closed) => return false,
            }
        }
        false
    }

    /// Run the conversion over the whole input tree.
    ///
    /// Per-file failures are logged and counted but never abort the batch;
    /// the only error this returns besides startup failures is
    /// `ConvertError::Cancelled`.
    pub async fn run(&mut self) -> Result<()> {
        info!(
            "Starting conversion: {} -> {} (target {} KB per file)",
            self.config.input_dir.display(),
            self.config.output_dir.display(),
            self.config.target_size_kb
        );

        let jobs = walker::walk(&self.config.input_dir, &self.config.output_dir)?;
        info!("Found {} TIFF files", jobs.len());

        if !self.ledger.is_empty() {
            info!("Ledger contains {} completed conversions", self.ledger.len());
        }

        if jobs.is_empty() {
            info!("No TIFF files found to convert");
            return Ok(());
        }

        let progress = ProgressManager::new(jobs.len() as u64);

        for job in jobs {
            if self.should_stop() {
                progress.abandon();
                return Err(ConvertError::Cancelled.into());
            }

            let file_name = job
                .input
                .file_name()
                .unwrap_or_default()
                .to_string_lossy()
                .into_owned();

            if self.ledger.contains(&job.output) {
                debug!("Skipping already converted: {}", job.input.display());
                self.stats.add_skipped();
                progress.update(&format!("⏩ {}: skipped", file_name));
                continue;
            }

            let start_time = Instant::now();
            match self.process_file(&job).await {
                Ok(FileOutcome::Converted {
                    input_bytes,
                    output_bytes,
                }) => {
                    let ratio = input_bytes as f64 / output_bytes as f64;
                    let elapsed = start_time.elapsed();
                    info!(
                        "Converted: {} -> {}",
                        job.input.display(),
                        job.output.display()
                    );
                    info!("Output size: {:.2} MB", output_bytes as f64 / BYTES_PER_MB);
                    info!("Compression ratio: {:.2}x", ratio);
                    info!("Processing time: {:.1} seconds", elapsed.as_secs_f64());

                    self.stats.add_converted(input_bytes, output_bytes);
                    progress.update(&format!("✅ {}: {:.2}x smaller", file_name, ratio));
                }
                Ok(FileOutcome::BudgetExhausted) => {
                    warn!(
                        "Failed to compress {} to {} KB at any quality level",
                        job.input.display(),
                        self.config.target_size_kb
                    );
                    self.stats.add_budget_failure();
                    progress.update(&format!("⚠️ {}: over budget", file_name));
                }
                Err(e) if ConvertError::is_cancellation(&e) => {
                    progress.abandon();
                    return Err(e);
                }
                Err(e) => {
                    error!("Error processing {}: {:#}", job.input.display(), e);
                    self.stats.add_error();
                    progress.update(&format!("❌ {}: error", file_name));
                }
            }
        }

        progress.finish(&self.stats.format_summary());
        self.log_final_stats();
        Ok(())
    }

    /// Decode, normalize and compress a single file.
    ///
    /// The output path is held by an `OutputGuard` for the whole pipeline;
    /// every early return leaves the guard to clean up partial bytes, and
    /// only the success path marks the file kept (after the ledger append,
    /// so ledger membership always implies a finished file on disk).
    async fn process_file(&mut self, job: &ConversionJob) -> Result<FileOutcome> {
        let input_bytes = tokio::fs::metadata(&job.input).await?.len();
        info!("Processing: {}", job.input.display());
        info!("Input file size: {:.2} MB", input_bytes as f64 / BYTES_PER_MB);

        let guard = OutputGuard::new(job.output.clone());

        let image = decode::decode_image(&job.input)?;
        info!("Image dimensions: {}x{}", image.width(), image.height());

        let image = decode::flatten_alpha(image);

        debug!("Compressing image...");
        let fitted = self.compressor.compress(&image, &job.output)?;
        if !fitted {
            return Ok(FileOutcome::BudgetExhausted);
        }

        let output_bytes = std::fs::metadata(&job.output)?.len();
        self.ledger.record(&job.output).await?;
        guard.keep();

        Ok(FileOutcome::Converted {
            input_bytes,
            output_bytes,
        })
    }

    fn log_final_stats(&self) {
        info!("=== Conversion Complete ===");
        info!("Files converted this run: {}", self.stats.files_converted);
        info!("Files skipped (already converted): {}", self.stats.files_skipped);
        info!("Files over budget: {}", self.stats.files_failed_budget);
        info!("Errors this run: {}", self.stats.files_failed_error);
        info!(
            "Bytes in/out this run: {} / {}",
            format_size(self.stats.total_input_bytes),
            format_size(self.stats.total_output_bytes)
        );
        info!("Total conversions in ledger: {}", self.ledger.len());
    }
}

/// Helper shared by `main`: whether the error returned by [`ConversionRun::run`]
/// was an operator cancellation.
pub fn is_cancelled(err: &anyhow::Error) -> bool {
    ConvertError::is_cancellation(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgb, RgbImage, Rgba, RgbaImage};
    use std::path::Path;
    use tempfile::TempDir;

    fn write_flat_tiff(path: &Path, width: u32, height: u32) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        RgbImage::from_pixel(width, height, Rgb([90, 120, 200]))
            .save(path)
            .unwrap();
    }

    fn write_noise_tiff(path: &Path, width: u32, height: u32) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let mut state: u32 = 0xdeadbeef;
        RgbImage::from_fn(width, height, |_, _| {
            state = state.wrapping_mul(1664525).wrapping_add(1013904223);
            let b = state.to_le_bytes();
            Rgb([b[0], b[1], b[2]])
        })
        .save(path)
        .unwrap();
    }

    fn test_config(root: &Path, target_size_kb: u64) -> Config {
        Config {
            input_dir: root.join("in"),
            output_dir: root.join("out"),
            target_size_kb,
        }
    }

    #[tokio::test]
    async fn test_full_run_converts_tree() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(temp_dir.path(), 500);
        write_flat_tiff(&config.input_dir.join("a.tif"), 64, 64);
        write_flat_tiff(&config.input_dir.join("sub").join("b.tiff"), 48, 32);

        let mut run = ConversionRun::new(config.clone()).await.unwrap();
        run.run().await.unwrap();

        assert_eq!(run.stats().files_converted, 2);
        assert_eq!(run.stats().files_failed_error, 0);

        for output in [
            config.output_dir.join("a.jpg"),
            config.output_dir.join("sub").join("b.jpg"),
        ] {
            let size = std::fs::metadata(&output).unwrap().len();
            assert!(size <= 500 * 1024);
        }

        let ledger = Ledger::load(&config.output_dir).await.unwrap();
        assert_eq!(ledger.len(), 2);
        assert!(ledger.contains(&config.output_dir.join("a.jpg")));
        assert!(ledger.contains(&config.output_dir.join("sub").join("b.jpg")));
    }

    #[tokio::test]
    async fn test_second_run_skips_everything() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(temp_dir.path(), 500);
        write_flat_tiff(&config.input_dir.join("a.tif"), 64, 64);
        write_flat_tiff(&config.input_dir.join("b.tif"), 32, 32);

        let mut first = ConversionRun::new(config.clone()).await.unwrap();
        first.run().await.unwrap();
        let log_path = config.output_dir.join(Ledger::FILE_NAME);
        let log_after_first = std::fs::read(&log_path).unwrap();

        let mut second = ConversionRun::new(config.clone()).await.unwrap();
        second.run().await.unwrap();

        assert_eq!(second.stats().files_converted, 0);
        assert_eq!(second.stats().files_skipped, 2);
        // Idempotence: the ledger is byte-identical after the second run
        assert_eq!(std::fs::read(&log_path).unwrap(), log_after_first);
    }

    #[tokio::test]
    async fn test_alpha_is_stripped_from_output() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(temp_dir.path(), 500);
        let input = config.input_dir.join("overlay.tif");
        std::fs::create_dir_all(input.parent().unwrap()).unwrap();
        RgbaImage::from_pixel(40, 40, Rgba([200, 40, 40, 100]))
            .save(&input)
            .unwrap();

        let mut run = ConversionRun::new(config.clone()).await.unwrap();
        run.run().await.unwrap();

        assert_eq!(run.stats().files_converted, 1);
        let decoded = image::open(config.output_dir.join("overlay.jpg")).unwrap();
        assert!(!decoded.color().has_alpha());
        assert!(matches!(decoded, DynamicImage::ImageRgb8(_) | DynamicImage::ImageLuma8(_)));
    }

    #[tokio::test]
    async fn test_budget_failure_leaves_no_trace_and_run_continues() {
        let temp_dir = TempDir::new().unwrap();
        // 1 KB: enough for a small flat tile, hopeless for 512x512 noise
        let config = test_config(temp_dir.path(), 1);
        write_noise_tiff(&config.input_dir.join("noise.tif"), 512, 512);
        write_flat_tiff(&config.input_dir.join("flat.tif"), 16, 16);

        let mut run = ConversionRun::new(config.clone()).await.unwrap();
        run.run().await.unwrap();

        assert_eq!(run.stats().files_failed_budget, 1);
        assert_eq!(run.stats().files_converted, 1);

        // No partial output and no ledger entry for the failed file
        assert!(!config.output_dir.join("noise.jpg").exists());
        let ledger = Ledger::load(&config.output_dir).await.unwrap();
        assert!(!ledger.contains(&config.output_dir.join("noise.jpg")));
        assert!(ledger.contains(&config.output_dir.join("flat.jpg")));
    }

    #[tokio::test]
    async fn test_corrupt_file_does_not_abort_the_batch() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(temp_dir.path(), 500);
        let corrupt = config.input_dir.join("corrupt.tif");
        std::fs::create_dir_all(corrupt.parent().unwrap()).unwrap();
        std::fs::write(&corrupt, b"definitely not a tiff").unwrap();
        write_flat_tiff(&config.input_dir.join("good.tif"), 32, 32);

        let mut run = ConversionRun::new(config.clone()).await.unwrap();
        run.run().await.unwrap();

        assert_eq!(run.stats().files_failed_error, 1);
        assert_eq!(run.stats().files_converted, 1);
        assert!(!config.output_dir.join("corrupt.jpg").exists());
        assert!(config.output_dir.join("good.jpg").exists());
    }

    #[tokio::test]
    async fn test_cancellation_aborts_before_processing() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(temp_dir.path(), 500);
        write_flat_tiff(&config.input_dir.join("a.tif"), 32, 32);

        let (tx, rx) = broadcast::channel(1);
        let mut run = ConversionRun::new_with_cancellation(config.clone(), rx)
            .await
            .unwrap();
        tx.send(()).unwrap();

        let err = run.run().await.unwrap_err();
        assert!(is_cancelled(&err));
        assert!(!config.output_dir.join("a.jpg").exists());

        let ledger = Ledger::load(&config.output_dir).await.unwrap();
        assert!(ledger.is_empty());
    }
}
