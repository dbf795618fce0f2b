//! Self-registration with a model registry.
//!
//! The newer registry API (`POST {registry}/registry/`) is tried first; when
//! it answers 404 or fails, the legacy `POST {registry}/models/register` is
//! used. A background heartbeat repeats the attempt forever: every 60 s after
//! a success, every 10 s after a failure.

use reqwest::StatusCode;
use serde::Serialize;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
const SUCCESS_INTERVAL: Duration = Duration::from_secs(60);
const FAILURE_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Registry endpoint not found")]
    NotFound,
}

/// Base URL other services should use to reach this adapter.
///
/// `ADAPTER_PUBLIC_URL` wins; otherwise host from `ADAPTER_PUBLIC_HOST`,
/// `ADAPTER_SERVICE` or `default_service`, and port from
/// `ADAPTER_PUBLIC_PORT`, `ADAPTER_PORT` or 8000.
pub fn public_base_url<F>(lookup: F, default_service: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let get = |name: &str| lookup(name).filter(|v| !v.is_empty());
    if let Some(url) = get("ADAPTER_PUBLIC_URL") {
        return url.trim_end_matches('/').to_string();
    }
    let host = get("ADAPTER_PUBLIC_HOST")
        .or_else(|| get("ADAPTER_SERVICE"))
        .unwrap_or_else(|| default_service.to_string());
    let port = get("ADAPTER_PUBLIC_PORT")
        .or_else(|| get("ADAPTER_PORT"))
        .unwrap_or_else(|| "8000".to_string());
    format!("http://{host}:{port}")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrySettings {
    pub endpoint: String,
    pub name: String,
    pub description: String,
    pub version: String,
    pub max_workers: u32,
    pub used_workers: u32,
    pub public_url: String,
    pub endpoints: Vec<String>,
}

impl RegistrySettings {
    /// `None` when `REGISTRY_ENDPOINT` is not set.
    pub fn from_lookup<F>(lookup: F, endpoints: &[&str]) -> Option<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let endpoint = lookup("REGISTRY_ENDPOINT").filter(|v| !v.is_empty())?;
        let name = lookup("MODEL_NAME").unwrap_or_else(|| "energy_sim_model".to_string());
        let number = |key: &str, default: u32| {
            lookup(key)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(default)
        };
        Some(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            description: lookup("MODEL_DESCRIPTION").unwrap_or_else(|| {
                "Runs building-energy simulations over stored artifacts and records result matrices"
                    .to_string()
            }),
            version: lookup("MODEL_VERSION").unwrap_or_else(|| "1.0.0".to_string()),
            max_workers: number("MODEL_MAX_WORKERS", 1),
            used_workers: number("MODEL_USED_WORKERS", 0),
            public_url: public_base_url(&lookup, &format!("{name}-adapter")),
            endpoints: endpoints.iter().map(|e| e.to_string()).collect(),
            name,
        })
    }
}

#[derive(Serialize)]
struct RegistryEntry<'a> {
    name: &'a str,
    uri: &'a str,
    version: &'a str,
    max_workers: u32,
    used_workers: u32,
}

#[derive(Serialize)]
struct LegacyRegistration<'a> {
    name: &'a str,
    description: &'a str,
    url: &'a str,
    endpoints: &'a [String],
}

pub struct RegistryClient {
    http: reqwest::Client,
    settings: RegistrySettings,
}

impl RegistryClient {
    pub fn new(settings: RegistrySettings) -> Result<Self, RegistryError> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { http, settings })
    }

    pub fn settings(&self) -> &RegistrySettings {
        &self.settings
    }

    async fn register_current(&self) -> Result<(), RegistryError> {
        let s = &self.settings;
        let url = format!("{}/registry/", s.endpoint);
        let resp = self
            .http
            .post(&url)
            .json(&RegistryEntry {
                name: &s.name,
                uri: &s.public_url,
                version: &s.version,
                max_workers: s.max_workers,
                used_workers: s.used_workers,
            })
            .send()
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(RegistryError::NotFound);
        }
        resp.error_for_status()?;
        info!(url = %url, "registered with registry");
        Ok(())
    }

    async fn register_legacy(&self) -> Result<(), RegistryError> {
        let s = &self.settings;
        let url = format!("{}/models/register", s.endpoint);
        self.http
            .post(&url)
            .json(&LegacyRegistration {
                name: &s.name,
                description: &s.description,
                url: &s.public_url,
                endpoints: &s.endpoints,
            })
            .send()
            .await?
            .error_for_status()?;
        info!(url = %url, "registered with registry (legacy API)");
        Ok(())
    }

    /// One registration attempt; true on success with either API.
    pub async fn register_once(&self) -> bool {
        match self.register_current().await {
            Ok(()) => return true,
            Err(RegistryError::NotFound) => {}
            Err(err) => warn!(error = %err, "registry registration failed"),
        }
        match self.register_legacy().await {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, "legacy registry registration failed");
                false
            }
        }
    }

    /// Register in the background, forever. Never blocks the caller.
    pub fn spawn_heartbeat(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let interval = if self.register_once().await {
                    SUCCESS_INTERVAL
                } else {
                    FAILURE_INTERVAL
                };
                tokio::time::sleep(interval).await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn public_url_precedence() {
        assert_eq!(
            public_base_url(env(&[("ADAPTER_PUBLIC_URL", "https://sim.example/")]), "svc"),
            "https://sim.example"
        );
        assert_eq!(
            public_base_url(
                env(&[("ADAPTER_SERVICE", "energy"), ("ADAPTER_PORT", "9000")]),
                "svc"
            ),
            "http://energy:9000"
        );
        assert_eq!(
            public_base_url(
                env(&[
                    ("ADAPTER_PUBLIC_HOST", "public"),
                    ("ADAPTER_SERVICE", "energy"),
                    ("ADAPTER_PUBLIC_PORT", "443"),
                    ("ADAPTER_PORT", "9000"),
                ]),
                "svc"
            ),
            "http://public:443"
        );
        assert_eq!(public_base_url(env(&[]), "svc"), "http://svc:8000");
    }

    #[test]
    fn settings_require_endpoint() {
        assert!(RegistrySettings::from_lookup(env(&[]), &LEGACY).is_none());

        let settings = RegistrySettings::from_lookup(
            env(&[
                ("REGISTRY_ENDPOINT", "http://registry:5000/"),
                ("MODEL_MAX_WORKERS", "4"),
                ("MODEL_USED_WORKERS", "many"),
            ]),
            &LEGACY,
        )
        .unwrap();
        assert_eq!(settings.endpoint, "http://registry:5000");
        assert_eq!(settings.name, "energy_sim_model");
        assert_eq!(settings.version, "1.0.0");
        assert_eq!((settings.max_workers, settings.used_workers), (4, 0));
        assert_eq!(settings.public_url, "http://energy_sim_model-adapter:8000");
        assert_eq!(settings.endpoints, vec!["/model/request".to_string()]);
    }

    const LEGACY: [&str; 1] = ["/model/request"];
}
