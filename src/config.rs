//! Engine configuration: JSON file and environment overrides on top of defaults.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const ENV_MAX_DEPTH: &str = "FORMULATE_MAX_DEPTH";
pub const ENV_ALLOW_IF_ELSE: &str = "FORMULATE_ALLOW_IF_ELSE";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum nesting of parentheses and conditional chains accepted by the parser
    pub max_depth: usize,
    /// Accept `V IF C ELSE R` as an alias of `V WHEN C OTHERWISE R`
    pub allow_if_else: bool,
}

impl Default for EngineConfig {
    fn default() -> Self { Self { max_depth: 64, allow_if_else: true } }
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl EngineConfig {
    /// Defaults with `FORMULATE_*` environment overrides applied.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.apply_overrides(|k| std::env::var(k).ok());
        cfg
    }

    /// Apply overrides from a key lookup. Unparseable values are ignored with a warning.
    pub fn apply_overrides<F: Fn(&str) -> Option<String>>(&mut self, lookup: F) {
        if let Some(v) = lookup(ENV_MAX_DEPTH) {
            match v.trim().parse::<usize>() {
                Ok(n) if n > 0 => self.max_depth = n,
                _ => warn!(target: "formulate", "ignoring {}='{}': expected a positive integer", ENV_MAX_DEPTH, v),
            }
        }
        if let Some(v) = lookup(ENV_ALLOW_IF_ELSE) {
            match parse_bool(&v) {
                Some(b) => self.allow_if_else = b,
                None => warn!(target: "formulate", "ignoring {}='{}': expected a boolean", ENV_ALLOW_IF_ELSE, v),
            }
        }
    }

    /// Load a JSON config file; missing fields keep their defaults. Environment
    /// overrides are applied on top.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).with_context(|| format!("reading config {}", path.display()))?;
        let mut cfg: EngineConfig = serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))?;
        cfg.apply_overrides(|k| std::env::var(k).ok());
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn overrides_apply_and_bad_values_are_ignored() {
        let env: HashMap<&str, &str> = [(ENV_MAX_DEPTH, "8"), (ENV_ALLOW_IF_ELSE, "off")].into_iter().collect();
        let mut cfg = EngineConfig::default();
        cfg.apply_overrides(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(cfg, EngineConfig { max_depth: 8, allow_if_else: false });

        let bad: HashMap<&str, &str> = [(ENV_MAX_DEPTH, "zero"), (ENV_ALLOW_IF_ELSE, "maybe")].into_iter().collect();
        let mut cfg = EngineConfig::default();
        cfg.apply_overrides(|k| bad.get(k).map(|v| v.to_string()));
        assert_eq!(cfg, EngineConfig::default());
    }

    #[test]
    fn json_file_with_partial_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.json");
        std::fs::write(&path, r#"{"max_depth": 5}"#).unwrap();
        let parsed: EngineConfig = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed, EngineConfig { max_depth: 5, allow_if_else: true });
        assert_eq!(EngineConfig::from_json_file(&path).unwrap(), parsed);
        std::fs::write(&path, "{ not json").unwrap();
        assert!(EngineConfig::from_json_file(&path).is_err());
        assert!(EngineConfig::from_json_file(&dir.path().join("missing.json")).is_err());
    }
}
