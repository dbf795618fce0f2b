//! Artifact name parsing.
//!
//! Storage keys are only parsed by their final path segment:
//! - simulation: `<RCPx.y>_<aging>_<year>.idf`
//! - weather: `<locale>_<RCPxy>_<year>.epw`

use crate::years::parse_year_token;
use crate::{AgingCode, ParseError, ParseResult, ScenarioKey};

pub const SIMULATION_EXT: &str = "idf";
pub const WEATHER_EXT: &str = "epw";

/// Final path segment of an object key.
pub fn file_name(key: &str) -> &str {
    key.rsplit_once('/').map_or(key, |(_, name)| name)
}

/// True if the key's extension matches `ext` (case-insensitive).
pub fn has_extension(key: &str, ext: &str) -> bool {
    strip_extension(file_name(key), ext).is_some()
}

fn strip_extension<'a>(name: &'a str, ext: &str) -> Option<&'a str> {
    let (stem, found) = name.rsplit_once('.')?;
    found.eq_ignore_ascii_case(ext).then_some(stem)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationArtifactRef {
    pub scenario: ScenarioKey,
    pub aging_code: AgingCode,
    pub year: i32,
    pub storage_key: String,
}

impl SimulationArtifactRef {
    pub fn parse(storage_key: &str) -> ParseResult<Self> {
        let name = file_name(storage_key);
        let invalid = || ParseError::Simulation {
            name: name.to_string(),
        };

        let stem = strip_extension(name, SIMULATION_EXT).ok_or_else(invalid)?;
        let mut parts = stem.split('_');
        let (Some(scenario), Some(aging), Some(year), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };

        Ok(Self {
            scenario: ScenarioKey::from_dotted(scenario).ok_or_else(invalid)?,
            aging_code: aging.parse().map_err(|_| invalid())?,
            year: parse_year_token(year).ok_or_else(invalid)?,
            storage_key: storage_key.to_string(),
        })
    }

    pub fn file_name(&self) -> &str {
        file_name(&self.storage_key)
    }

    /// Name re-formed from the parsed fields, e.g. `RCP8.5_E12_2030.idf`.
    pub fn canonical_name(&self) -> String {
        format!(
            "{}_{}_{}.{}",
            self.scenario.dotted(),
            self.aging_code,
            self.year,
            SIMULATION_EXT
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeatherArtifactRef {
    pub locale: String,
    pub scenario: ScenarioKey,
    pub year: i32,
    pub storage_key: String,
}

impl WeatherArtifactRef {
    pub fn parse(storage_key: &str) -> ParseResult<Self> {
        let name = file_name(storage_key);
        let invalid = || ParseError::Weather {
            name: name.to_string(),
        };

        let stem = strip_extension(name, WEATHER_EXT).ok_or_else(invalid)?;
        // Locale may itself contain underscores.
        let mut parts = stem.rsplitn(3, '_');
        let (Some(year), Some(scenario), Some(locale)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };
        if locale.is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            locale: locale.to_string(),
            scenario: ScenarioKey::from_undotted(scenario).ok_or_else(invalid)?,
            year: parse_year_token(year).ok_or_else(invalid)?,
            storage_key: storage_key.to_string(),
        })
    }

    pub fn file_name(&self) -> &str {
        file_name(&self.storage_key)
    }

    pub fn match_key(&self) -> (ScenarioKey, i32) {
        (self.scenario, self.year)
    }
}
