//! Declarative scoring rules.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::RulesError;

/// Per-component weights. Conceptually sum to 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Weights {
    pub freshness: u32,
    pub keyword: u32,
    pub stack: u32,
    pub location: u32,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            freshness: 30,
            keyword: 40,
            stack: 20,
            location: 10,
        }
    }
}

/// Keyword list, preferred locations, freshness window and weights.
///
/// Fields missing from a document take their built-in default, so a rules
/// file only needs to list what it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringRules {
    pub keywords: Vec<String>,
    pub locations: Vec<String>,
    #[serde(alias = "maxAgeDays")]
    pub max_age_days: i64,
    pub weights: Weights,
}

impl Default for ScoringRules {
    fn default() -> Self {
        Self {
            keywords: ["python", "backend", "ai", "ml", "data", "engineer"]
                .into_iter()
                .map(String::from)
                .collect(),
            locations: ["remote", "kenya", "africa"]
                .into_iter()
                .map(String::from)
                .collect(),
            max_age_days: 7,
            weights: Weights::default(),
        }
    }
}

impl ScoringRules {
    pub fn from_toml_str(text: &str) -> Result<Self, RulesError> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_json_str(text: &str) -> Result<Self, RulesError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Read a rules document; `.json` files are JSON, everything else TOML.
    pub fn try_load(path: impl AsRef<Path>) -> Result<Self, RulesError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| RulesError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        if is_json {
            Self::from_json_str(&text)
        } else {
            Self::from_toml_str(&text)
        }
    }

    /// Like [`try_load`](Self::try_load) but never fails: a missing or
    /// malformed document yields the built-in defaults.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::try_load(path) {
            Ok(rules) => {
                info!(
                    path = %path.display(),
                    keywords = rules.keywords.len(),
                    locations = rules.locations.len(),
                    "Loaded scoring rules"
                );
                rules
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Using default scoring rules");
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let rules = ScoringRules::from_toml_str(
            r#"
            keywords = ["rust"]
            max_age_days = 14

            [weights]
            keyword = 50
            "#,
        )
        .unwrap();

        assert_eq!(rules.keywords, vec!["rust"]);
        assert_eq!(rules.max_age_days, 14);
        assert_eq!(rules.locations, ScoringRules::default().locations);
        assert_eq!(rules.weights.keyword, 50);
        assert_eq!(rules.weights.freshness, 30);
    }

    #[test]
    fn json_accepts_camel_case_max_age() {
        let rules = ScoringRules::from_json_str(r#"{"maxAgeDays": 3}"#).unwrap();
        assert_eq!(rules.max_age_days, 3);
    }

    #[test]
    fn shipped_rules_match_defaults() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../rules/job_rules.toml");
        assert_eq!(ScoringRules::try_load(path).unwrap(), ScoringRules::default());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let rules = ScoringRules::load("/definitely/not/here/rules.toml");
        assert_eq!(rules, ScoringRules::default());
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let path = std::env::temp_dir().join(format!("rules-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            ScoringRules::try_load(&path),
            Err(RulesError::Json(_))
        ));
        assert_eq!(ScoringRules::load(&path), ScoringRules::default());

        std::fs::remove_file(&path).ok();
    }
}
