/// Configuration management
///
/// `DrawConfig` is read from TOML (every field optional) and then patched
/// from `DRAW_*` environment variables.
use crate::error::{DrawError, DrawResult};
use crate::ingestion::alias::MappingOrientation;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DrawConfig {
    /// Language model backend
    pub llm: LlmConfig,

    /// Upload parsing
    pub ingestion: IngestionConfig,

    /// Query translation and execution
    pub query: QueryConfig,

    /// Winner sampling
    pub sampler: SamplerConfig,

    /// Audit log retention
    pub audit: AuditConfig,
}

/// Which completion API to talk to
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    #[default]
    Ollama,
    OpenAi,
}

impl std::str::FromStr for BackendKind {
    type Err = DrawError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ollama" => Ok(BackendKind::Ollama),
            "openai" | "open_ai" => Ok(BackendKind::OpenAi),
            other => Err(DrawError::config(format!("unknown LLM backend '{}'", other))),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub backend: BackendKind,

    /// Base URL; backend default when unset
    pub base_url: Option<String>,

    /// Model name; backend default when unset
    pub model: Option<String>,

    /// Environment variable holding the API key (OpenAI-compatible backends)
    pub api_key_env: String,

    /// Upper bound on one completion call (seconds)
    pub timeout_secs: u64,

    /// Maximum tokens to generate
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Ollama,
            base_url: None,
            model: None,
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_secs: 60,
            max_tokens: 512,
        }
    }
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    /// Worksheet to read; first sheet when unset
    pub sheet: Option<String>,

    /// Field delimiter for CSV uploads
    pub csv_delimiter: u8,

    /// Column layout of mapping tables without recognised headers
    pub mapping_orientation: MappingOrientation,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            sheet: None,
            csv_delimiter: b',',
            mapping_orientation: MappingOrientation::CanonicalFirst,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Name under which the dataset is addressable in queries
    pub relation_name: String,

    /// Rows shown to the model as grounding
    pub sample_rows: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            relation_name: "df".to_string(),
            sample_rows: 3,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Fixed seed for every draw; a fresh random seed per draw when unset
    pub seed: Option<u64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Entries kept before the oldest are evicted
    pub max_entries: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self { max_entries: 1000 }
    }
}

impl DrawConfig {
    /// Parse a TOML document
    pub fn from_toml_str(text: &str) -> DrawResult<Self> {
        let config: DrawConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file and apply environment overrides
    pub fn load(path: impl AsRef<Path>) -> DrawResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| DrawError::config(format!("cannot read {}: {}", path.display(), e)))?;
        let mut config = Self::from_toml_str(&text)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Defaults patched from the environment
    pub fn from_env() -> DrawResult<Self> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) -> DrawResult<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> DrawResult<()> {
        if let Some(backend) = lookup("DRAW_LLM_BACKEND") {
            self.llm.backend = backend.parse()?;
        }
        if let Some(model) = lookup("DRAW_LLM_MODEL") {
            self.llm.model = Some(model);
        }
        if let Some(url) = lookup("DRAW_LLM_BASE_URL") {
            self.llm.base_url = Some(url);
        }
        if let Some(timeout) = lookup("DRAW_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = timeout
                .parse()
                .map_err(|_| DrawError::config(format!("DRAW_LLM_TIMEOUT_SECS is not a number: {}", timeout)))?;
        }
        if let Some(relation) = lookup("DRAW_RELATION_NAME") {
            self.query.relation_name = relation;
        }
        self.validate()
    }

    pub fn validate(&self) -> DrawResult<()> {
        if self.llm.timeout_secs == 0 {
            return Err(DrawError::config("llm.timeout_secs must be greater than 0"));
        }
        if self.query.sample_rows == 0 {
            return Err(DrawError::config("query.sample_rows must be greater than 0"));
        }
        if self.audit.max_entries == 0 {
            return Err(DrawError::config("audit.max_entries must be greater than 0"));
        }
        let relation = &self.query.relation_name;
        let valid_identifier = relation
            .chars()
            .next()
            .map_or(false, |c| c.is_ascii_alphabetic() || c == '_')
            && relation.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid_identifier {
            return Err(DrawError::config(format!(
                "query.relation_name '{}' must be a plain identifier",
                relation
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = DrawConfig::default();
        assert_eq!(config.query.relation_name, "df");
        assert_eq!(config.query.sample_rows, 3);
        assert_eq!(config.llm.backend, BackendKind::Ollama);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let config = DrawConfig::from_toml_str(
            r#"
            [llm]
            backend = "open_ai"
            model = "gpt-4o-mini"
            timeout_secs = 20

            [ingestion]
            mapping_orientation = "label_first"

            [sampler]
            seed = 42
            "#,
        )
        .unwrap();
        assert_eq!(config.llm.backend, BackendKind::OpenAi);
        assert_eq!(config.llm.model.as_deref(), Some("gpt-4o-mini"));
        assert_eq!(config.llm.timeout(), Duration::from_secs(20));
        assert_eq!(config.ingestion.mapping_orientation, MappingOrientation::LabelFirst);
        assert_eq!(config.query.relation_name, "df");
        assert_eq!(config.sampler.seed, Some(42));
    }

    #[test]
    fn test_invalid_relation_name_rejected() {
        let err = DrawConfig::from_toml_str("[query]\nrelation_name = \"df; DROP\"\n").unwrap_err();
        assert!(matches!(err, DrawError::Config { .. }));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("DRAW_LLM_BACKEND", "openai"),
            ("DRAW_LLM_TIMEOUT_SECS", "5"),
            ("DRAW_RELATION_NAME", "candidates"),
        ]
        .into_iter()
        .collect();
        let mut config = DrawConfig::default();
        config
            .apply_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.llm.backend, BackendKind::OpenAi);
        assert_eq!(config.llm.timeout_secs, 5);
        assert_eq!(config.query.relation_name, "candidates");
    }

    #[test]
    fn test_bad_timeout_override() {
        let mut config = DrawConfig::default();
        let result = config.apply_overrides(|key| (key == "DRAW_LLM_TIMEOUT_SECS").then(|| "soon".to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[query]\nsample_rows = 5").unwrap();
        let config = DrawConfig::load(file.path()).unwrap();
        assert_eq!(config.query.sample_rows, 5);
    }
}
