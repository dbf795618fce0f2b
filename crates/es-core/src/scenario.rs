use core::fmt;
use core::str::FromStr;

use crate::{ParseError, ParseResult};

/// Climate pathway identifier.
///
/// Artifacts spell the same pathway two ways: simulation inputs use the
/// dotted form (`RCP8.5`), weather files the undotted one (`RCP85`). Both
/// parse to the same key, so comparisons never look at the raw text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ScenarioKey {
    Rcp26,
    Rcp45,
    Rcp85,
}

impl ScenarioKey {
    pub const ALL: [ScenarioKey; 3] = [ScenarioKey::Rcp26, ScenarioKey::Rcp45, ScenarioKey::Rcp85];

    /// Canonical (undotted) token, e.g. `RCP85`.
    pub fn canonical(self) -> &'static str {
        match self {
            ScenarioKey::Rcp26 => "RCP26",
            ScenarioKey::Rcp45 => "RCP45",
            ScenarioKey::Rcp85 => "RCP85",
        }
    }

    /// Display token used in simulation names and matrix headers, e.g. `RCP8.5`.
    pub fn dotted(self) -> &'static str {
        match self {
            ScenarioKey::Rcp26 => "RCP2.6",
            ScenarioKey::Rcp45 => "RCP4.5",
            ScenarioKey::Rcp85 => "RCP8.5",
        }
    }

    /// Strip separators and case from scenario text.
    pub fn normalize(text: &str) -> String {
        text.chars()
            .filter(|c| !matches!(c, '.' | '_' | '-') && !c.is_whitespace())
            .map(|c| c.to_ascii_uppercase())
            .collect()
    }

    /// Accept only the dotted spelling (case-insensitive).
    pub fn from_dotted(text: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|key| key.dotted().eq_ignore_ascii_case(text))
    }

    /// Accept only the undotted spelling (case-insensitive).
    pub fn from_undotted(text: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|key| key.canonical().eq_ignore_ascii_case(text))
    }
}

impl FromStr for ScenarioKey {
    type Err = ParseError;

    fn from_str(s: &str) -> ParseResult<Self> {
        let normalized = Self::normalize(s);
        Self::ALL
            .into_iter()
            .find(|key| key.canonical() == normalized)
            .ok_or_else(|| ParseError::Scenario {
                text: s.to_string(),
            })
    }
}

impl fmt::Display for ScenarioKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dotted())
    }
}

/// Building-envelope aging variant: a series letter and a level.
///
/// - series is one of `E`, `F`, `T`
/// - level is `0..=28`, written with one or two digits
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AgingCode {
    series: char,
    level: u8,
}

impl AgingCode {
    pub const SERIES: [char; 3] = ['E', 'F', 'T'];
    pub const MAX_LEVEL: u8 = 28;

    pub fn new(series: char, level: u8) -> Option<Self> {
        let series = series.to_ascii_uppercase();
        (Self::SERIES.contains(&series) && level <= Self::MAX_LEVEL)
            .then_some(Self { series, level })
    }

    pub fn series(self) -> char {
        self.series
    }

    pub fn level(self) -> u8 {
        self.level
    }
}

impl FromStr for AgingCode {
    type Err = ParseError;

    fn from_str(s: &str) -> ParseResult<Self> {
        let invalid = || ParseError::AgingCode {
            text: s.to_string(),
        };
        let mut chars = s.chars();
        let series = chars.next().ok_or_else(invalid)?;
        let digits = chars.as_str();
        if digits.is_empty() || digits.len() > 2 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        // `E05` would share a column with `E5`.
        if digits.len() == 2 && digits.starts_with('0') {
            return Err(invalid());
        }
        let level: u8 = digits.parse().map_err(|_| invalid())?;
        Self::new(series, level).ok_or_else(invalid)
    }
}

impl fmt::Display for AgingCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.series, self.level)
    }
}
