//! # Progress Tracking and Statistics Module
//!
//! Questo modulo gestisce il progress tracking e le statistiche della run.
//!
//! ## Responsabilità:
//! - Progress bar visual con `indicatif` per feedback real-time
//! - Tracking statistiche di conversione (convertiti, saltati, errori)
//! - Report finale con statistiche aggregate
//!
//! ## Statistiche tracciate:
//! - **files_converted**: File convertiti con successo in questa run
//! - **files_skipped**: File saltati perché già nel ledger
//! - **files_failed_budget**: File per cui nessuna qualità rispetta il budget
//! - **files_failed_error**: File falliti per errori di decode/encode/IO
//! - **total_input_bytes** / **total_output_bytes**: Byte prima/dopo

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Manages progress reporting for a conversion run
#[derive(Clone)]
pub struct ProgressManager {
    bar: ProgressBar,
}

impl ProgressManager {
    /// Create a new progress manager
    pub fn new(total_files: u64) -> Self {
        let bar = ProgressBar::new(total_files);

        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
                .unwrap()
                .progress_chars("=>-"),
        );

        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Update progress with a message
    pub fn update(&self, message: &str) {
        self.bar.inc(1);
        self.bar.set_message(message.to_string());
    }

    /// Finish with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }

    /// Clear the bar without a completion message (cancelled runs)
    pub fn abandon(&self) {
        self.bar.abandon();
    }
}

/// Statistics tracker for a conversion run
#[derive(Debug, Default, Clone)]
pub struct ConversionStats {
    pub files_converted: usize,
    pub files_skipped: usize,
    pub files_failed_budget: usize,
    pub files_failed_error: usize,
    pub total_input_bytes: u64,
    pub total_output_bytes: u64,
}

impl ConversionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_converted(&mut self, input_bytes: u64, output_bytes: u64) {
        self.files_converted += 1;
        self.total_input_bytes += input_bytes;
        self.total_output_bytes += output_bytes;
    }

    pub fn add_skipped(&mut self) {
        self.files_skipped += 1;
    }

    pub fn add_budget_failure(&mut self) {
        self.files_failed_budget += 1;
    }

    pub fn add_error(&mut self) {
        self.files_failed_error += 1;
    }

    /// Overall compression ratio (input / output) across converted files
    pub fn overall_ratio(&self) -> f64 {
        if self.total_output_bytes > 0 {
            self.total_input_bytes as f64 / self.total_output_bytes as f64
        } else {
            0.0
        }
    }

    pub fn format_summary(&self) -> String {
        format!(
            "Converted: {} | Skipped: {} | Over budget: {} | Errors: {} | {} -> {} ({:.2}x)",
            self.files_converted,
            self.files_skipped,
            self.files_failed_budget,
            self.files_failed_error,
            format_size(self.total_input_bytes),
            format_size(self.total_output_bytes),
            self.overall_ratio()
        )
    }
}

/// Get human-readable file size
pub fn format_size(size: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = size as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", size as u64, UNITS[unit_index])
    } else {
        format!("{:.2} {}", size, UNITS[unit_index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.00 KB");
        assert_eq!(format_size(15 * 1024 * 1024), "15.00 MB");
    }

    #[test]
    fn test_stats_accumulate() {
        let mut stats = ConversionStats::new();
        stats.add_converted(1000, 100);
        stats.add_converted(3000, 300);
        stats.add_skipped();
        stats.add_budget_failure();
        stats.add_error();

        assert_eq!(stats.files_converted, 2);
        assert_eq!(stats.files_skipped, 1);
        assert_eq!(stats.files_failed_budget, 1);
        assert_eq!(stats.files_failed_error, 1);
        assert!((stats.overall_ratio() - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_ratio_with_no_output_is_zero() {
        let stats = ConversionStats::new();
        assert_eq!(stats.overall_ratio(), 0.0);
    }
}
