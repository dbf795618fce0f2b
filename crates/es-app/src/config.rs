//! Batch configuration.
//!
//! Values are layered: built-in defaults, then environment variables, then an
//! optional YAML file, then per-run JSON overrides. Each run resolves its own
//! `BatchConfig` once and never reads the process environment afterwards.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use es_results::MetricKind;

use crate::error::{AppError, AppResult};

/// What the indexer does when two weather files share a (scenario, year).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicateWeatherPolicy {
    /// Abort the batch.
    #[default]
    Error,
    /// Log and keep the last one listed.
    Warn,
    /// Keep the last one listed.
    Ignore,
}

impl FromStr for DuplicateWeatherPolicy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "warn" => Ok(Self::Warn),
            "ignore" => Ok(Self::Ignore),
            other => Err(AppError::InvalidConfig(format!(
                "duplicate_weather must be error, warn or ignore (got {other:?})"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub bucket: String,
    pub simulation_prefix: String,
    pub weather_prefix: String,
    /// Only weather files of this locale are indexed when set.
    pub weather_locale: Option<String>,
    pub total_matrix_key: String,
    pub per_area_matrix_key: String,
    pub engine_exe: PathBuf,
    /// Placed between the executable and the fixed engine flags.
    pub engine_args: Vec<String>,
    pub timeout_secs: u64,
    /// Keep each artifact's scratch directory instead of deleting it.
    pub keep_outputs: bool,
    /// Parent of scratch directories; the system temp dir when unset.
    pub scratch_root: Option<PathBuf>,
    pub duplicate_weather: DuplicateWeatherPolicy,
    /// Cap on processed keys and failures echoed back in a summary.
    pub sample_limit: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            bucket: "mmstore".to_string(),
            simulation_prefix: "output_idf_files/".to_string(),
            weather_prefix: "weather/epw/".to_string(),
            weather_locale: None,
            total_matrix_key: "results_total_site_energy.json".to_string(),
            per_area_matrix_key: "results_site_energy_per_area.json".to_string(),
            engine_exe: PathBuf::from("energyplus"),
            engine_args: Vec::new(),
            timeout_secs: 3600,
            keep_outputs: false,
            scratch_root: None,
            duplicate_weather: DuplicateWeatherPolicy::default(),
            sample_limit: 10,
        }
    }
}

impl BatchConfig {
    /// Defaults overlaid with the process environment.
    pub fn from_env() -> AppResult<Self> {
        Self::default().with_lookup(|name| std::env::var(name).ok())
    }

    /// Overlay values found through `lookup`, keyed by environment variable name.
    pub fn with_lookup<F>(mut self, lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(bucket) = get("S3_BUCKET") {
            self.bucket = bucket;
        }
        if let Some(prefix) = get("S3_IDF_PREFIX") {
            self.simulation_prefix = prefix;
        }
        if let Some(prefix) = get("S3_EPW_PREFIX") {
            self.weather_prefix = prefix;
        }
        if let Some(locale) = get("EPW_LOCALE") {
            self.weather_locale = Some(locale);
        }
        if let Some(exe) = get("ENERGYPLUS_EXE") {
            self.engine_exe = PathBuf::from(exe);
        }
        if let Some(timeout) = get("RUN_TIMEOUT_SEC") {
            self.timeout_secs = timeout.trim().parse().map_err(|_| {
                AppError::InvalidConfig(format!("RUN_TIMEOUT_SEC is not a whole number: {timeout}"))
            })?;
        }
        if let Some(keep) = get("KEEP_OUTPUTS") {
            self.keep_outputs = parse_flag(&keep);
        }
        if let Some(dir) = get("SCRATCH_DIR") {
            self.scratch_root = Some(PathBuf::from(dir));
        }
        if let Some(policy) = get("DUPLICATE_WEATHER") {
            self.duplicate_weather = policy.parse()?;
        }

        self.validate()?;
        Ok(self)
    }

    /// Read a YAML file. Keys missing from the file keep their defaults.
    pub fn load_yaml(path: &Path) -> AppResult<Self> {
        Self::default().overlay_yaml(path)
    }

    /// A copy of `self` with the keys present in a YAML file replaced.
    pub fn overlay_yaml(&self, path: &Path) -> AppResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| AppError::ConfigFileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let invalid = |e: &dyn std::fmt::Display| {
            AppError::InvalidConfig(format!("{}: {e}", path.display()))
        };
        let yaml: serde_yaml::Value = serde_yaml::from_str(&text).map_err(|e| invalid(&e))?;
        let overrides = serde_json::to_value(yaml).map_err(|e| invalid(&e))?;
        self.with_overrides(&overrides)
    }

    /// A copy of `self` with the fields of a JSON object replaced.
    ///
    /// `null` means no overrides. Unknown keys are ignored with a warning;
    /// values of the wrong type are `InvalidConfig`.
    pub fn with_overrides(&self, overrides: &serde_json::Value) -> AppResult<Self> {
        let fields = match overrides {
            serde_json::Value::Null => return Ok(self.clone()),
            serde_json::Value::Object(fields) => fields,
            other => {
                return Err(AppError::InvalidConfig(format!(
                    "run config must be a JSON object, got {other}"
                )));
            }
        };

        let mut merged = serde_json::to_value(self)
            .map_err(|e| AppError::InvalidConfig(e.to_string()))?;
        let serde_json::Value::Object(base) = &mut merged else {
            return Err(AppError::InvalidConfig(
                "configuration did not serialize to an object".to_string(),
            ));
        };
        for (key, value) in fields {
            if !base.contains_key(key) {
                tracing::warn!(key = %key, "ignoring unknown run config key");
                continue;
            }
            base.insert(key.clone(), value.clone());
        }

        let config: Self =
            serde_json::from_value(merged).map_err(|e| AppError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.bucket.trim().is_empty() {
            return Err(AppError::InvalidConfig("bucket must not be empty".to_string()));
        }
        if self.timeout_secs == 0 {
            return Err(AppError::InvalidConfig(
                "timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.total_matrix_key == self.per_area_matrix_key {
            return Err(AppError::InvalidConfig(format!(
                "both metrics would be written to {}",
                self.total_matrix_key
            )));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn matrix_key(&self, kind: MetricKind) -> &str {
        match kind {
            MetricKind::TotalSiteEnergy => &self.total_matrix_key,
            MetricKind::SiteEnergyPerArea => &self.per_area_matrix_key,
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
