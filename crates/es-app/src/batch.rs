//! Sequential batch execution over every simulation artifact.

use es_core::{SimulationArtifactRef, WeatherArtifactRef, file_name};
use es_engine::{EnergyPlusEngine, ExtractedMetrics, MetricExtractor, SimulationEngine};
use es_results::{MatrixStore, MetricKind};
use es_storage::ObjectStore;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tempfile::TempDir;

use crate::config::BatchConfig;
use crate::error::{AppError, AppResult};
use crate::indexer::{WeatherIndex, index_weather_artifacts, list_simulation_artifacts};
use crate::progress::{ArtifactProgress, BatchProgressEvent, BatchStage};

/// Builds the engine a run will use from that run's configuration.
pub type EngineFactory = Arc<dyn Fn(&BatchConfig) -> Arc<dyn SimulationEngine> + Send + Sync>;

/// The real engine, configured from `engine_exe`, `engine_args` and `timeout_secs`.
pub fn energyplus_factory() -> EngineFactory {
    Arc::new(|config: &BatchConfig| {
        Arc::new(
            EnergyPlusEngine::new(config.engine_exe.clone(), config.timeout())
                .with_launcher_args(config.engine_args.clone()),
        ) as Arc<dyn SimulationEngine>
    })
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchCounts {
    pub success: usize,
    pub failed: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactFailure {
    pub key: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub bucket: String,
    pub simulation_prefix: String,
    pub weather_prefix: String,
    pub results_total_key: String,
    pub results_per_area_key: String,
    /// First successfully processed keys, capped at `sample_limit`.
    pub processed: Vec<String>,
    /// First failures, capped at `sample_limit`.
    pub failures: Vec<ArtifactFailure>,
    pub counts: BatchCounts,
}

/// Long-lived collaborators shared by every run.
#[derive(Clone)]
pub struct BatchServices {
    pub store: Arc<dyn ObjectStore>,
    pub matrices: MatrixStore,
    pub extractor: Arc<MetricExtractor>,
    pub engine_factory: EngineFactory,
}

impl BatchServices {
    pub fn new(store: Arc<dyn ObjectStore>, engine_factory: EngineFactory) -> Self {
        Self {
            matrices: MatrixStore::new(store.clone()),
            store,
            extractor: Arc::new(MetricExtractor::standard()),
            engine_factory,
        }
    }

    pub fn orchestrator(&self, config: Arc<BatchConfig>) -> BatchOrchestrator {
        let engine = (self.engine_factory)(&config);
        BatchOrchestrator::new(
            self.store.clone(),
            engine,
            self.matrices.clone(),
            self.extractor.clone(),
            config,
        )
    }
}

pub struct BatchOrchestrator {
    store: Arc<dyn ObjectStore>,
    engine: Arc<dyn SimulationEngine>,
    matrices: MatrixStore,
    extractor: Arc<MetricExtractor>,
    config: Arc<BatchConfig>,
}

type ProgressCallback<'a> = Option<&'a mut (dyn FnMut(BatchProgressEvent) + Send)>;

fn emit_progress(
    progress_cb: &mut ProgressCallback<'_>,
    stage: BatchStage,
    started: Instant,
    message: Option<String>,
    artifact: Option<ArtifactProgress>,
) {
    if let Some(cb) = progress_cb.as_deref_mut() {
        let mut event =
            BatchProgressEvent::stage(stage, started.elapsed().as_secs_f64(), message);
        event.artifact = artifact;
        cb(event);
    }
}

impl BatchOrchestrator {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        engine: Arc<dyn SimulationEngine>,
        matrices: MatrixStore,
        extractor: Arc<MetricExtractor>,
        config: Arc<BatchConfig>,
    ) -> Self {
        Self {
            store,
            engine,
            matrices,
            extractor,
            config,
        }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    pub async fn run(&self) -> AppResult<BatchSummary> {
        self.run_with_progress(None).await
    }

    /// Process every simulation artifact once.
    ///
    /// Indexing and listing failures abort the batch. Once iteration starts,
    /// per-artifact failures are logged and tallied and the batch completes.
    pub async fn run_with_progress(
        &self,
        mut progress_cb: ProgressCallback<'_>,
    ) -> AppResult<BatchSummary> {
        let started = Instant::now();
        let config = &*self.config;

        emit_progress(&mut progress_cb, BatchStage::IndexingWeather, started, None, None);
        let weather = index_weather_artifacts(
            self.store.as_ref(),
            &config.bucket,
            &config.weather_prefix,
            config.weather_locale.as_deref(),
            config.duplicate_weather,
        )
        .await?;

        emit_progress(&mut progress_cb, BatchStage::ListingArtifacts, started, None, None);
        let mut keys =
            list_simulation_artifacts(self.store.as_ref(), &config.bucket, &config.simulation_prefix)
                .await?;
        if keys.is_empty() {
            return Err(AppError::NoSimulationArtifacts {
                bucket: config.bucket.clone(),
                prefix: config.simulation_prefix.clone(),
            });
        }
        keys.sort();

        let total = keys.len();
        tracing::info!(total, bucket = %config.bucket, "starting batch");

        let mut summary = BatchSummary {
            bucket: config.bucket.clone(),
            simulation_prefix: config.simulation_prefix.clone(),
            weather_prefix: config.weather_prefix.clone(),
            results_total_key: config.total_matrix_key.clone(),
            results_per_area_key: config.per_area_matrix_key.clone(),
            processed: Vec::new(),
            failures: Vec::new(),
            counts: BatchCounts {
                total,
                ..BatchCounts::default()
            },
        };

        for (i, key) in keys.iter().enumerate() {
            emit_progress(
                &mut progress_cb,
                BatchStage::Simulating,
                started,
                None,
                Some(ArtifactProgress {
                    index: i + 1,
                    total,
                    key: key.clone(),
                    succeeded: summary.counts.success,
                    failed: summary.counts.failed,
                }),
            );

            match self.process_artifact(key, &weather, i + 1, total).await {
                Ok(metrics) => {
                    summary.counts.success += 1;
                    if summary.processed.len() < config.sample_limit {
                        summary.processed.push(key.clone());
                    }
                    tracing::info!(
                        artifact = file_name(key),
                        source = metrics.source.as_str(),
                        total = ?metrics.total,
                        per_area = ?metrics.per_area,
                        "artifact processed"
                    );
                }
                Err(err) => {
                    summary.counts.failed += 1;
                    match &err {
                        AppError::UnmatchedWeather { .. } => {
                            tracing::warn!(artifact = file_name(key), error = %err, "skipping artifact")
                        }
                        _ => tracing::error!(artifact = file_name(key), error = %err, "artifact failed"),
                    }
                    if summary.failures.len() < config.sample_limit {
                        summary.failures.push(ArtifactFailure {
                            key: key.clone(),
                            reason: err.to_string(),
                        });
                    }
                }
            }
        }

        tracing::info!(
            success = summary.counts.success,
            failed = summary.counts.failed,
            total,
            elapsed_s = started.elapsed().as_secs_f64(),
            "batch finished"
        );
        emit_progress(
            &mut progress_cb,
            BatchStage::Completed,
            started,
            Some(format!(
                "{} succeeded, {} failed",
                summary.counts.success, summary.counts.failed
            )),
            None,
        );
        Ok(summary)
    }

    async fn process_artifact(
        &self,
        key: &str,
        weather: &WeatherIndex,
        index: usize,
        total: usize,
    ) -> AppResult<ExtractedMetrics> {
        let artifact = SimulationArtifactRef::parse(key)?;
        let Some(weather_ref) = weather.get(&(artifact.scenario, artifact.year)) else {
            return Err(AppError::UnmatchedWeather {
                simulation: artifact.file_name().to_string(),
                scenario: artifact.scenario.to_string(),
                year: artifact.year,
            });
        };

        tracing::info!(
            "[{index}/{total}] {} with {}",
            artifact.file_name(),
            weather_ref.file_name()
        );

        let scratch = ScratchDir::create(self.config.scratch_root.as_deref(), self.config.keep_outputs)?;
        self.simulate(&artifact, weather_ref, scratch.path()).await
    }

    async fn simulate(
        &self,
        artifact: &SimulationArtifactRef,
        weather: &WeatherArtifactRef,
        scratch: &Path,
    ) -> AppResult<ExtractedMetrics> {
        let bucket = &self.config.bucket;
        let simulation_path = scratch.join(artifact.file_name());
        let weather_path = scratch.join(weather.file_name());

        self.store
            .download_to(bucket, &artifact.storage_key, &simulation_path)
            .await?;
        self.store
            .download_to(bucket, &weather.storage_key, &weather_path)
            .await?;

        self.engine
            .execute(&simulation_path, &weather_path, scratch)
            .await?;

        let extractor = self.extractor.clone();
        let output_dir = scratch.to_path_buf();
        let metrics = tokio::task::spawn_blocking(move || extractor.extract(&output_dir))
            .await
            .map_err(|e| AppError::Task(e.to_string()))?;
        if !metrics.has_any() {
            return Err(AppError::NoMetricExtracted {
                simulation: artifact.file_name().to_string(),
            });
        }

        for (kind, value) in [
            (MetricKind::TotalSiteEnergy, metrics.total),
            (MetricKind::SiteEnergyPerArea, metrics.per_area),
        ] {
            self.matrices
                .write_metric(
                    bucket,
                    self.config.matrix_key(kind),
                    artifact.scenario,
                    artifact.aging_code,
                    artifact.year,
                    value,
                )
                .await?;
        }
        Ok(metrics)
    }
}

/// Per-artifact working directory, removed when dropped unless kept.
struct ScratchDir {
    dir: Option<TempDir>,
    path: PathBuf,
    keep: bool,
}

impl ScratchDir {
    fn create(root: Option<&Path>, keep: bool) -> std::io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("eplus_run_");
        let dir = match root {
            Some(root) => {
                std::fs::create_dir_all(root)?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };
        Ok(Self {
            path: dir.path().to_path_buf(),
            dir: Some(dir),
            keep,
        })
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };
        if self.keep {
            let path = dir.keep();
            tracing::info!(path = %path.display(), "kept engine outputs");
        }
    }
}
