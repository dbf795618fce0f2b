//! Storage listing and weather matching.

use es_core::{
    ScenarioKey, SIMULATION_EXT, WEATHER_EXT, WeatherArtifactRef, file_name, has_extension,
};
use es_storage::ObjectStore;
use std::collections::HashMap;

use crate::config::DuplicateWeatherPolicy;
use crate::error::{AppError, AppResult};

/// Weather artifacts keyed by `(scenario, year)`.
pub type WeatherIndex = HashMap<(ScenarioKey, i32), WeatherArtifactRef>;

/// Every simulation key under `prefix`, unparsed and in listing order.
pub async fn list_simulation_artifacts(
    store: &dyn ObjectStore,
    bucket: &str,
    prefix: &str,
) -> AppResult<Vec<String>> {
    let objects = store.list_all(bucket, prefix).await?;
    Ok(objects
        .into_iter()
        .map(|meta| meta.key)
        .filter(|key| has_extension(key, SIMULATION_EXT))
        .collect())
}

/// List and index the weather artifacts under `prefix`.
///
/// An empty index is an error since no simulation could be matched.
pub async fn index_weather_artifacts(
    store: &dyn ObjectStore,
    bucket: &str,
    prefix: &str,
    locale: Option<&str>,
    policy: DuplicateWeatherPolicy,
) -> AppResult<WeatherIndex> {
    let objects = store.list_all(bucket, prefix).await?;
    let index = build_weather_index(objects.into_iter().map(|m| m.key), locale, policy)?;
    if index.is_empty() {
        return Err(AppError::NoWeatherArtifacts {
            bucket: bucket.to_string(),
            prefix: prefix.to_string(),
        });
    }
    tracing::info!(count = index.len(), bucket, prefix, "indexed weather artifacts");
    Ok(index)
}

/// Build a weather index from raw keys. Names that do not follow the weather
/// pattern are skipped.
pub fn build_weather_index<I>(
    keys: I,
    locale: Option<&str>,
    policy: DuplicateWeatherPolicy,
) -> AppResult<WeatherIndex>
where
    I: IntoIterator<Item = String>,
{
    let mut index = WeatherIndex::new();
    for key in keys {
        if !has_extension(&key, WEATHER_EXT) {
            continue;
        }
        let weather = match WeatherArtifactRef::parse(&key) {
            Ok(weather) => weather,
            Err(err) => {
                tracing::debug!(key = %key, error = %err, "skipping weather file");
                continue;
            }
        };
        if let Some(locale) = locale
            && !weather.locale.eq_ignore_ascii_case(locale)
        {
            continue;
        }

        let match_key = weather.match_key();
        if let Some(previous) = index.get(&match_key) {
            match policy {
                DuplicateWeatherPolicy::Error => {
                    return Err(AppError::DuplicateWeather {
                        scenario: match_key.0.to_string(),
                        year: match_key.1,
                        first: file_name(&previous.storage_key).to_string(),
                        second: weather.file_name().to_string(),
                    });
                }
                DuplicateWeatherPolicy::Warn => tracing::warn!(
                    scenario = %match_key.0,
                    year = match_key.1,
                    replaced = previous.file_name(),
                    kept = weather.file_name(),
                    "duplicate weather artifact"
                ),
                DuplicateWeatherPolicy::Ignore => {}
            }
        }
        index.insert(match_key, weather);
    }
    Ok(index)
}
