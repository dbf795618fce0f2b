//! Error types for engine execution.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(
        "Engine failed ({code}) for {simulation}\nSTDOUT:\n{stdout}\nSTDERR:\n{stderr}",
        code = exit_label(.exit_code)
    )]
    Execution {
        simulation: String,
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("Engine timed out after {timeout_secs}s for {simulation}")]
    Timeout { simulation: String, timeout_secs: u64 },

    #[error("Failed to launch engine {exe}: {source}")]
    Spawn {
        exe: String,
        source: std::io::Error,
    },

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub type EngineResult<T> = Result<T, EngineError>;

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "terminated by signal".to_string(),
    }
}
