use clap::Parser;
use es_app::{BatchConfig, BatchServices, RunManager, energyplus_factory};
use es_server::{
    AppState, LEGACY_ENDPOINTS, RegistryClient, RegistrySettings, ServerError, router,
};
use es_storage::FsObjectStore;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "es-server")]
#[command(about = "HTTP control surface for energy-sweep batch runs")]
struct Cli {
    /// Address to bind; defaults to ADAPTER_HOST:ADAPTER_PORT
    #[arg(long)]
    bind: Option<SocketAddr>,

    #[arg(long, env = "ADAPTER_HOST", default_value = "0.0.0.0")]
    host: String,

    #[arg(long, env = "ADAPTER_PORT", default_value_t = 8000)]
    port: u16,

    /// Directory backing the object store (one subdirectory per bucket)
    #[arg(long, env = "STORAGE_ROOT", default_value = "./storage")]
    storage_root: PathBuf,

    /// YAML file layered over environment configuration
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, env = "RUN_ID_PREFIX", default_value = "run")]
    run_id_prefix: String,
}

impl Cli {
    fn bind_addr(&self) -> Result<SocketAddr, ServerError> {
        if let Some(addr) = self.bind {
            return Ok(addr);
        }
        let addr = format!("{}:{}", self.host, self.port);
        addr.parse().map_err(|_| ServerError::Bind { addr })
    }
}

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "es_server=info,es_app=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut config = BatchConfig::from_env()?;
    if let Some(path) = &cli.config {
        config = config.overlay_yaml(path)?;
    }
    info!(
        bucket = %config.bucket,
        storage_root = %cli.storage_root.display(),
        engine = %config.engine_exe.display(),
        "configuration loaded"
    );

    let store = Arc::new(FsObjectStore::new(&cli.storage_root));
    let runs = RunManager::new(BatchServices::new(store, energyplus_factory()), config)
        .with_id_prefix(cli.run_id_prefix.clone());

    let lookup = |name: &str| std::env::var(name).ok();
    match RegistrySettings::from_lookup(lookup, &LEGACY_ENDPOINTS) {
        Some(settings) => match RegistryClient::new(settings) {
            Ok(client) => {
                client.spawn_heartbeat();
            }
            Err(err) => warn!(error = %err, "registry client unavailable"),
        },
        None => info!("REGISTRY_ENDPOINT not set; skipping auto-registration"),
    }

    let addr = cli.bind_addr()?;
    let app = router(AppState { runs });
    let listener = TcpListener::bind(addr).await?;
    info!("es-server listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}
