//! Supervised engine invocation.

use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;

use crate::error::{EngineError, EngineResult};

/// Runs one simulation against one weather file, writing into `output_dir`.
#[async_trait]
pub trait SimulationEngine: Send + Sync {
    async fn execute(
        &self,
        simulation: &Path,
        weather: &Path,
        output_dir: &Path,
    ) -> EngineResult<()>;
}

/// Production engine: an EnergyPlus-compatible executable.
///
/// Invoked as
/// `<exe> [launcher args..] --weather <epw> --output-directory <dir> --readvars --expandobjects <idf>`.
/// No retries; a failure is reported once with the captured output.
#[derive(Debug, Clone)]
pub struct EnergyPlusEngine {
    exe: PathBuf,
    launcher_args: Vec<String>,
    timeout: Duration,
}

impl EnergyPlusEngine {
    pub fn new(exe: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            exe: exe.into(),
            launcher_args: Vec::new(),
            timeout,
        }
    }

    /// Arguments placed before the fixed engine flags (wrapper scripts,
    /// container launchers).
    pub fn with_launcher_args(mut self, args: Vec<String>) -> Self {
        self.launcher_args = args;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn engine_args(simulation: &Path, weather: &Path, output_dir: &Path) -> Vec<OsString> {
        vec![
            "--weather".into(),
            weather.into(),
            "--output-directory".into(),
            output_dir.into(),
            "--readvars".into(),
            "--expandobjects".into(),
            simulation.into(),
        ]
    }
}

#[async_trait]
impl SimulationEngine for EnergyPlusEngine {
    async fn execute(
        &self,
        simulation: &Path,
        weather: &Path,
        output_dir: &Path,
    ) -> EngineResult<()> {
        let simulation_name = simulation
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| simulation.display().to_string());

        let mut cmd = Command::new(&self.exe);
        cmd.args(&self.launcher_args)
            .args(Self::engine_args(simulation, weather, output_dir))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let started = Instant::now();
        let child = cmd.spawn().map_err(|source| EngineError::Spawn {
            exe: self.exe.display().to_string(),
            source,
        })?;

        // Dropping the wait future on timeout drops the child, which kills it.
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => {
                return Err(EngineError::Io {
                    path: output_dir.to_path_buf(),
                    source,
                });
            }
            Err(_) => {
                tracing::warn!(
                    simulation = %simulation_name,
                    timeout_s = self.timeout.as_secs_f64(),
                    "engine timed out; process killed"
                );
                return Err(EngineError::Timeout {
                    simulation: simulation_name,
                    timeout_secs: self.timeout.as_secs(),
                });
            }
        };

        tracing::debug!(
            simulation = %simulation_name,
            status = %output.status,
            elapsed_s = started.elapsed().as_secs_f64(),
            "engine exited"
        );

        if output.status.success() {
            Ok(())
        } else {
            Err(EngineError::Execution {
                simulation: simulation_name,
                exit_code: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            })
        }
    }
}
