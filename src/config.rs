// WHY: One TOML file describes the whole annotation pipeline so marker rules and abbreviation
// lists can change without a rebuild; CLI flags override individual values

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::info;

use crate::annotators::MarkerAction;
use crate::classifier::BoundaryRules;

/// Default stream block size in bytes
pub const DEFAULT_BLOCK_SIZE: usize = 8192;

/// Smallest accepted block size; a UTF-8 character must always fit in a block
pub const MIN_BLOCK_SIZE: usize = 8;

/// Complete pipeline configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Bytes per streamed sub-block; also the longest regex match a marker rule may produce
    pub block_size: usize,
    /// Regex marker rules, applied in order before the built-in annotators
    pub markers: Vec<MarkerRule>,
    pub newlines: NewlineConfig,
    pub abbreviations: AbbreviationConfig,
    /// Boundary rules of the punctuation classifier
    pub classifier: BoundaryRules,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            markers: Vec::new(),
            newlines: NewlineConfig::default(),
            abbreviations: AbbreviationConfig::default(),
            classifier: BoundaryRules::default(),
        }
    }
}

/// One `[[markers]]` table
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MarkerRule {
    pub name: String,
    pub pattern: String,
    /// Capture group to mark; 0 is the whole match
    #[serde(default)]
    pub group: usize,
    pub actions: Vec<MarkerAction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NewlineConfig {
    pub enabled: bool,
    /// Force a sentence break at blank lines
    pub paragraph_breaks: bool,
}

impl Default for NewlineConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            paragraph_breaks: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AbbreviationConfig {
    pub enabled: bool,
    /// Added to the built-in list
    pub extra: Vec<String>,
}

impl Default for AbbreviationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            extra: Vec::new(),
        }
    }
}

impl PipelineConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source).context("Failed to parse TOML config")?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML config file
    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::from_toml_str(&source)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        info!(path = %path.display(), markers = config.markers.len(), block_size = config.block_size, "loaded pipeline config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.block_size < MIN_BLOCK_SIZE {
            bail!(
                "block_size must be at least {MIN_BLOCK_SIZE} bytes, got {}",
                self.block_size
            );
        }
        for rule in &self.markers {
            if rule.actions.is_empty() {
                bail!("marker rule '{}' has no actions", rule.name);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = r#"
block_size = 4096

[[markers]]
name = "markup"
pattern = "<[^>]+>"
actions = [{ type = "skip" }]

[[markers]]
name = "entity"
pattern = "&(amp|lt);"
actions = [
    { type = "replace", replacement = "&" },
    { type = "attribute", key = "entity", value = "$1" },
]

[newlines]
paragraph_breaks = true

[abbreviations]
extra = ["approx.", "Fig."]

[classifier]
end_punctuation = [".", "!", "?", ";"]
"#;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.block_size, DEFAULT_BLOCK_SIZE);
        assert!(config.markers.is_empty());
        assert!(config.newlines.enabled);
        assert!(!config.newlines.paragraph_breaks);
        assert!(config.abbreviations.enabled);
        assert_eq!(config.classifier, BoundaryRules::default());
        assert_eq!(PipelineConfig::from_toml_str("").unwrap(), config);
    }

    #[test]
    fn test_parse_sample() {
        let config = PipelineConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.block_size, 4096);
        assert_eq!(config.markers.len(), 2);
        assert_eq!(config.markers[0].actions, vec![MarkerAction::Skip]);
        assert_eq!(config.markers[1].group, 0);
        assert_eq!(
            config.markers[1].actions[1],
            MarkerAction::Attribute {
                key: "entity".to_string(),
                value: "$1".to_string()
            }
        );
        assert!(config.newlines.enabled);
        assert!(config.newlines.paragraph_breaks);
        assert_eq!(config.abbreviations.extra, vec!["approx.", "Fig."]);
        assert_eq!(config.classifier.end_punctuation, vec!['.', '!', '?', ';']);
        // unspecified rule lists keep their defaults
        assert_eq!(
            config.classifier.opening_parentheticals,
            BoundaryRules::default().opening_parentheticals
        );
    }

    #[test]
    fn test_invalid_configs_rejected() {
        assert!(PipelineConfig::from_toml_str("block_size = 4").is_err());
        assert!(PipelineConfig::from_toml_str("unknown_key = 1").is_err());
        let no_actions = r#"
[[markers]]
name = "empty"
pattern = "x"
actions = []
"#;
        let err = PipelineConfig::from_toml_str(no_actions).unwrap_err();
        assert!(err.to_string().contains("no actions"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let config = PipelineConfig::load(file.path()).unwrap();
        assert_eq!(config.markers[0].name, "markup");

        let missing = file.path().with_extension("missing");
        let err = PipelineConfig::load(&missing).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
