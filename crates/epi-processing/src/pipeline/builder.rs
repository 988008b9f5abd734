//! Main cleaning pipeline module.
//!
//! This module provides the core `Pipeline` struct and builder for
//! orchestrating profile, quality check, cleaning, validation and output.

use crate::cleaner::DataCleaner;
use crate::config::{ConfigValidationError, PipelineConfig};
use crate::error::{PipelineError, Result};
use crate::loader::{RawDataset, output_write_failed, stage_table};
use crate::pipeline::progress::{
    CancellationToken, ClosureProgressReporter, PipelineStage, ProgressReporter, ProgressUpdate,
};
use crate::profiler::DataProfiler;
use crate::quality::DataQualityAnalyzer;
use crate::reporting::{ReportGenerator, report_commit_failed};
use crate::types::{CleaningSummary, DatasetProfile, PipelineResult, QualityReport};
use crate::validation::OutputValidator;
use polars::prelude::DataFrame;
use std::path::Path;
use std::sync::Arc;
use std::thread::{self, ScopedJoinHandle};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Results of the three stages that read the raw snapshot.
type StageOutputs = (DatasetProfile, QualityReport, (DataFrame, CleaningSummary));

/// The main cleaning pipeline.
///
/// Use [`Pipeline::builder()`] to create a new pipeline with custom configuration.
///
/// # Example
///
/// ```rust,ignore
/// use epi_processing::{Pipeline, PipelineConfig, CancellationToken};
///
/// let token = CancellationToken::new();
///
/// let result = Pipeline::builder()
///     .config(PipelineConfig::default())
///     .cancellation_token(token.clone())
///     .on_progress(|update| {
///         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
///     })
///     .build()?
///     .run_path("data/epidemiology.csv")?;
///
/// println!("{} rows written to {:?}", result.cleaned.height(), result.output_path);
/// ```
pub struct Pipeline {
    config: PipelineConfig,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
    cancellation_token: CancellationToken,
    reporter: ReportGenerator,
}

// Stage threads borrow the pipeline.
static_assertions::assert_impl_all!(Pipeline: Send, Sync);

impl Pipeline {
    /// Create a new pipeline builder.
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the pipeline over an already loaded raw dataset.
    ///
    /// # Errors
    ///
    /// Returns `Err(PipelineError::Cancelled)` if the pipeline was cancelled
    /// via the cancellation token, and `Err(PipelineError::InvariantViolated)`
    /// if output validation is enabled and the cleaned table fails it. In
    /// both cases the existing output file is left untouched.
    pub fn run(&self, raw: &RawDataset) -> Result<PipelineResult> {
        self.finish(self.run_internal(raw, None, Instant::now()))
    }

    /// Load the raw source at `path`, then run the pipeline over it.
    pub fn run_path(&self, path: impl AsRef<Path>) -> Result<PipelineResult> {
        let path = path.as_ref();
        let start_time = Instant::now();
        let outcome = self.load(path).and_then(|raw| {
            let input = path.display().to_string();
            self.run_internal(&raw, Some(&input), start_time)
        });
        self.finish(outcome)
    }

    /// Profile and audit without cleaning or writing anything.
    pub fn dry_run(&self, raw: &RawDataset) -> Result<(DatasetProfile, QualityReport)> {
        self.check_cancelled()?;
        let profile = DataProfiler::profile(raw, &self.config.window())?;
        self.check_cancelled()?;
        let quality = DataQualityAnalyzer::analyze(raw, &self.config)?;
        Ok((profile, quality))
    }

    fn finish(&self, outcome: Result<PipelineResult>) -> Result<PipelineResult> {
        match outcome {
            Ok(result) => {
                self.report_progress(ProgressUpdate::complete("Pipeline completed successfully"));
                Ok(result)
            }
            Err(e) => {
                if e.is_cancelled() {
                    self.report_progress(ProgressUpdate::cancelled());
                } else {
                    self.report_progress(ProgressUpdate::failed(e.to_string()));
                }
                error!("Pipeline error: {}", e);
                Err(e)
            }
        }
    }

    /// Check if cancellation has been requested.
    fn check_cancelled(&self) -> Result<()> {
        if self.cancellation_token.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        Ok(())
    }

    /// Report progress if a reporter is configured.
    fn report_progress(&self, update: ProgressUpdate) {
        if let Some(reporter) = &self.progress_reporter {
            reporter.report(update);
        }
    }

    fn load(&self, path: &Path) -> Result<RawDataset> {
        self.check_cancelled()?;
        self.report_progress(ProgressUpdate::new(
            PipelineStage::Loading,
            0.0,
            format!("Loading {}", path.display()),
        ));
        let raw = RawDataset::from_path(path)?;
        self.report_progress(ProgressUpdate::new(
            PipelineStage::Loading,
            1.0,
            format!("Loaded {} rows", raw.height()),
        ));
        Ok(raw)
    }

    fn run_internal(
        &self,
        raw: &RawDataset,
        input_file: Option<&str>,
        start_time: Instant,
    ) -> Result<PipelineResult> {
        let window = self.config.window();

        info!(
            "Starting cleaning pipeline over {} .. {} ({} days)",
            window.start,
            window.end,
            window.day_count()
        );
        self.report_progress(ProgressUpdate::new(
            PipelineStage::Initializing,
            1.0,
            "Starting cleaning pipeline...",
        ));

        self.check_cancelled()?;

        // Step 1: Profile, audit and clean the same snapshot
        let (profile, quality, (mut cleaned, cleaning)) = if self.config.parallel_stages {
            self.run_stages_parallel(raw)?
        } else {
            self.run_stages_sequential(raw)?
        };

        for finding in quality.findings() {
            debug!("Quality finding: {}", finding);
        }

        self.check_cancelled()?;

        // Step 2: Validate the cleaned table
        let validation = if self.config.validate_output {
            self.report_progress(ProgressUpdate::new(
                PipelineStage::Validation,
                0.0,
                "Validating cleaned table...",
            ));
            let report =
                OutputValidator::validate(&cleaned, &self.config, cleaning.catalog_countries)?;
            for warning in &report.warnings {
                warn!("Validation warning: {}", warning);
            }
            if !report.is_valid {
                return Err(PipelineError::InvariantViolated {
                    count: report.errors.len(),
                    summary: report.summary(),
                });
            }
            self.report_progress(ProgressUpdate::new(
                PipelineStage::Validation,
                1.0,
                "Cleaned table is valid",
            ));
            Some(report)
        } else {
            debug!("Skipping output validation (disabled)");
            None
        };

        self.check_cancelled()?;

        // Step 3: Stage the output table and the report; nothing is replaced yet
        let staged_table = if self.config.save_to_disk {
            let path = self.config.output_path();
            self.report_progress(ProgressUpdate::new(
                PipelineStage::Writing,
                0.0,
                format!("Writing {}", path.display()),
            ));
            Some(stage_table(&mut cleaned, &path, self.config.output_format)?)
        } else {
            None
        };

        let mut result = PipelineResult {
            profile,
            quality,
            cleaning,
            validation,
            cleaned,
            output_path: staged_table.as_ref().map(|s| s.target().to_path_buf()),
            report_path: None,
            duration_ms: start_time.elapsed().as_millis() as u64,
        };

        let staged_report = if self.config.generate_reports {
            self.report_progress(ProgressUpdate::new(
                PipelineStage::ReportGeneration,
                0.0,
                "Writing run report...",
            ));
            let report = ReportGenerator::build_run_report(input_file, &result);
            Some(self.reporter.stage_report(&report)?)
        } else {
            None
        };

        self.check_cancelled()?;

        // Step 4: Move staged files into place, the table last
        if let Some(staged) = staged_report {
            let target = staged.target().to_path_buf();
            let path = staged
                .commit()
                .map_err(|e| report_commit_failed(&target, e))?;
            info!("Report saved: {}", path.display());
            result.report_path = Some(path);
            self.report_progress(ProgressUpdate::new(
                PipelineStage::ReportGeneration,
                1.0,
                "Run report written",
            ));
        }

        if let Some(staged) = staged_table {
            let target = staged.target().to_path_buf();
            staged
                .commit()
                .map_err(|e| output_write_failed(&target, e))?;
            info!(
                "Wrote {} rows to {}",
                result.cleaned.height(),
                target.display()
            );
            self.report_progress(ProgressUpdate::new(
                PipelineStage::Writing,
                1.0,
                "Output written",
            ));
        }

        info!(
            "Pipeline finished in {}ms: {} cleaned rows",
            result.duration_ms,
            result.cleaned.height()
        );

        Ok(result)
    }

    fn run_stages_sequential(&self, raw: &RawDataset) -> Result<StageOutputs> {
        let window = self.config.window();

        self.report_progress(ProgressUpdate::new(
            PipelineStage::Profiling,
            0.0,
            "Profiling dataset...",
        ));
        let profile = DataProfiler::profile(raw, &window)?;

        self.check_cancelled()?;
        self.report_progress(ProgressUpdate::new(
            PipelineStage::QualityCheck,
            0.0,
            "Running quality audits...",
        ));
        let quality = DataQualityAnalyzer::analyze(raw, &self.config)?;

        self.check_cancelled()?;
        self.report_progress(ProgressUpdate::new(
            PipelineStage::Cleaning,
            0.0,
            "Cleaning observations...",
        ));
        let cleaned = DataCleaner::clean(raw, &self.config)?;
        self.report_progress(ProgressUpdate::new(
            PipelineStage::Cleaning,
            1.0,
            "Cleaning complete",
        ));

        Ok((profile, quality, cleaned))
    }

    fn run_stages_parallel(&self, raw: &RawDataset) -> Result<StageOutputs> {
        let window = self.config.window();
        let config = &self.config;

        self.report_progress(ProgressUpdate::with_sub_stage(
            PipelineStage::Profiling,
            "parallel",
            0.0,
            "Profiling, auditing and cleaning in parallel...",
        ));

        thread::scope(|s| {
            let profile = s.spawn(move || DataProfiler::profile(raw, &window));
            let quality = s.spawn(move || DataQualityAnalyzer::analyze(raw, config));
            let cleaned = DataCleaner::clean(raw, config);

            let profile = join_stage(profile, "profiler");
            let quality = join_stage(quality, "quality checker");
            self.report_progress(ProgressUpdate::new(
                PipelineStage::Cleaning,
                1.0,
                "Profile, audits and cleaning complete",
            ));

            Ok((profile?, quality?, cleaned?))
        })
    }
}

fn join_stage<T>(handle: ScopedJoinHandle<'_, Result<T>>, stage: &str) -> Result<T> {
    handle
        .join()
        .map_err(|_| PipelineError::Internal(format!("{} thread panicked", stage)))?
}

/// Builder for creating a [`Pipeline`] with custom configuration.
///
/// # Example
///
/// ```rust,ignore
/// let pipeline = Pipeline::builder()
///     .config(PipelineConfig::default())
///     .cancellation_token(token)
///     .on_progress(|update| {
///         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
///     })
///     .build()?;
/// ```
#[derive(Default)]
pub struct PipelineBuilder {
    config: Option<PipelineConfig>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
    cancellation_token: Option<CancellationToken>,
}

static_assertions::assert_impl_all!(PipelineBuilder: Send);

impl PipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set a progress reporter for receiving updates during a run.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// use epi_processing::{ProgressReporter, ProgressUpdate};
    /// use std::sync::Arc;
    ///
    /// struct MyReporter;
    ///
    /// impl ProgressReporter for MyReporter {
    ///     fn report(&self, update: ProgressUpdate) {
    ///         println!("{}: {}", update.stage.display_name(), update.message);
    ///     }
    /// }
    ///
    /// let pipeline = Pipeline::builder()
    ///     .progress_reporter(Arc::new(MyReporter))
    ///     .build()?;
    /// ```
    pub fn progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress_reporter = Some(reporter);
        self
    }

    /// Set a progress callback closure.
    ///
    /// This is a convenience method for simple progress handling.
    /// For more complex scenarios, use [`progress_reporter`](Self::progress_reporter).
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_reporter = Some(Arc::new(ClosureProgressReporter::new(callback)));
        self
    }

    /// Set a cancellation token for stopping the pipeline.
    ///
    /// Clone the token and call [`CancellationToken::cancel()`] from
    /// any thread. The pipeline checks the token between stages and
    /// returns [`PipelineError::Cancelled`] without writing anything.
    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = Some(token);
        self
    }

    /// Build the pipeline.
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> std::result::Result<Pipeline, ConfigValidationError> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let reporter = ReportGenerator::new(config.output_dir.clone(), config.output_name.clone());

        Ok(Pipeline {
            config,
            progress_reporter: self.progress_reporter,
            cancellation_token: self.cancellation_token.unwrap_or_default(),
            reporter,
        })
    }
}
