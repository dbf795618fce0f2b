use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStage {
    IndexingWeather,
    ListingArtifacts,
    Simulating,
    Completed,
}

impl BatchStage {
    pub fn label(&self) -> &'static str {
        match self {
            BatchStage::IndexingWeather => "indexing weather",
            BatchStage::ListingArtifacts => "listing artifacts",
            BatchStage::Simulating => "simulating",
            BatchStage::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ArtifactProgress {
    /// 1-based position in the sorted artifact list.
    pub index: usize,
    pub total: usize,
    pub key: String,
    pub succeeded: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchProgressEvent {
    pub stage: BatchStage,
    pub elapsed_wall_s: f64,
    pub message: Option<String>,
    pub artifact: Option<ArtifactProgress>,
}

impl BatchProgressEvent {
    pub fn stage(stage: BatchStage, elapsed_wall_s: f64, message: Option<String>) -> Self {
        Self {
            stage,
            elapsed_wall_s,
            message,
            artifact: None,
        }
    }
}
