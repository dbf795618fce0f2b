#![allow(dead_code)]

use async_trait::async_trait;
use es_app::{BatchConfig, BatchServices, EngineFactory};
use es_engine::{EngineError, EngineResult, SimulationEngine};
use es_storage::MemoryObjectStore;
use rusqlite::{Connection, params};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

pub const BUCKET: &str = "mmstore";
pub const TOTAL_KEY: &str = "results_total_site_energy.json";
pub const PER_AREA_KEY: &str = "results_site_energy_per_area.json";

pub fn sim_key(name: &str) -> String {
    format!("output_idf_files/{name}")
}

pub fn weather_key(name: &str) -> String {
    format!("weather/epw/{name}")
}

/// Store seeded with simulation and weather objects in the default bucket.
pub fn seeded_store(simulations: &[&str], weather: &[&str]) -> Arc<MemoryObjectStore> {
    let store = Arc::new(MemoryObjectStore::new());
    seed(&store, BUCKET, simulations, weather);
    store
}

pub fn seed(store: &MemoryObjectStore, bucket: &str, simulations: &[&str], weather: &[&str]) {
    for name in simulations {
        store.insert(bucket, &sim_key(name), format!("! simulation {name}"));
    }
    for name in weather {
        store.insert(bucket, &weather_key(name), format!("! weather {name}"));
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineCall {
    pub simulation: String,
    pub weather: String,
    pub output_dir: PathBuf,
}

/// Stand-in engine that writes an `eplusout.sql` with fixed values.
pub struct FakeEngine {
    pub calls: Mutex<Vec<EngineCall>>,
    total: Option<String>,
    per_area: Option<String>,
    failing: HashSet<String>,
    gate: Option<Arc<Semaphore>>,
}

impl FakeEngine {
    pub fn new(total: Option<&str>, per_area: Option<&str>) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            total: total.map(str::to_string),
            per_area: per_area.map(str::to_string),
            failing: HashSet::new(),
            gate: None,
        }
    }

    pub fn standard() -> Self {
        Self::new(Some("125,000.5"), Some("42.3"))
    }

    pub fn failing_on(mut self, simulation: &str) -> Self {
        self.failing.insert(simulation.to_string());
        self
    }

    /// Each execution waits for one permit.
    pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().unwrap().clone()
    }
}

fn write_report(dir: &Path, total: Option<&str>, per_area: Option<&str>) {
    let conn = Connection::open(dir.join("eplusout.sql")).unwrap();
    conn.execute_batch(
        "CREATE TABLE TabularDataWithStrings (
            TableName TEXT, RowName TEXT, ColumnName TEXT, Value TEXT
        );",
    )
    .unwrap();
    for (column, value) in [
        ("Total Energy [kWh]", total),
        ("Energy Per Total Building Area [kWh/m2]", per_area),
    ] {
        if let Some(value) = value {
            conn.execute(
                "INSERT INTO TabularDataWithStrings VALUES (?1, ?2, ?3, ?4)",
                params!["Site and Source Energy", "Total Site Energy", column, value],
            )
            .unwrap();
        }
    }
}

#[async_trait]
impl SimulationEngine for FakeEngine {
    async fn execute(
        &self,
        simulation: &Path,
        weather: &Path,
        output_dir: &Path,
    ) -> EngineResult<()> {
        let name = simulation.file_name().unwrap().to_string_lossy().to_string();
        assert!(simulation.is_file(), "simulation not downloaded");
        assert!(weather.is_file(), "weather not downloaded");

        self.calls.lock().unwrap().push(EngineCall {
            simulation: name.clone(),
            weather: weather.file_name().unwrap().to_string_lossy().to_string(),
            output_dir: output_dir.to_path_buf(),
        });

        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        if self.failing.contains(&name) {
            return Err(EngineError::Execution {
                simulation: name,
                exit_code: Some(1),
                stdout: String::new(),
                stderr: "** Fatal ** simulation terminated".to_string(),
            });
        }
        write_report(output_dir, self.total.as_deref(), self.per_area.as_deref());
        Ok(())
    }
}

pub fn factory(engine: Arc<FakeEngine>) -> EngineFactory {
    Arc::new(move |_: &BatchConfig| engine.clone() as Arc<dyn SimulationEngine>)
}

/// Factory that also records the configuration each run was built with.
pub fn recording_factory(
    engine: Arc<FakeEngine>,
    seen: Arc<Mutex<Vec<BatchConfig>>>,
) -> EngineFactory {
    Arc::new(move |config: &BatchConfig| {
        seen.lock().unwrap().push(config.clone());
        engine.clone() as Arc<dyn SimulationEngine>
    })
}

pub fn services(store: Arc<MemoryObjectStore>, engine: Arc<FakeEngine>) -> BatchServices {
    BatchServices::new(store, factory(engine))
}
