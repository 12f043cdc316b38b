use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::llm::ApiProvider;

/// Upper bound for `llm.max_retries`.
pub const MAX_RETRIES: u32 = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    pub data: DataConfig,
    pub llm: LlmSettings,
    pub matching: MatchingConfig,
    pub search: SearchConfig,
    pub routing: RoutingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// The supply log, re-read on every query.
    pub csv_file: PathBuf,
    /// Header-less rows waiting to be appended to `csv_file`.
    pub pending_file: PathBuf,
    pub index_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    pub provider: ApiProvider,
    pub model: String,
    /// Environment variable holding the API key. Local providers need none.
    pub api_key_env: Option<String>,
    pub max_tokens: usize,
    pub temperature: f32,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// Fuzzy matches are accepted only when the score is strictly above this.
    pub accept_above: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub top_k: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Route with keyword rules when the classification call fails.
    pub rule_fallback: bool,
}

impl AssistantConfig {
    /// Validate config values, returning errors for clearly broken configurations.
    pub fn validate(&self) -> Result<(), String> {
        if self.data.csv_file.as_os_str().is_empty() {
            return Err("data.csv_file must be set".into());
        }
        if self.data.csv_file == self.data.pending_file {
            return Err("data.pending_file must differ from data.csv_file".into());
        }
        if self.matching.accept_above >= 100 {
            return Err("matching.accept_above must be < 100".into());
        }
        if self.search.top_k == 0 {
            return Err("search.top_k must be > 0".into());
        }
        if self.llm.model.trim().is_empty() {
            return Err("llm.model must be set".into());
        }
        if self.llm.max_tokens == 0 {
            return Err("llm.max_tokens must be > 0".into());
        }
        if self.llm.max_retries > MAX_RETRIES {
            return Err(format!("llm.max_retries must be <= {}", MAX_RETRIES));
        }
        Ok(())
    }

    /// Load config from a JSON file, then apply environment overrides.
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;
        let mut config: Self = serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse config: {}", e))?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// `SUPPLY_QUERY_CSV`, `SUPPLY_QUERY_MODEL` and `SUPPLY_QUERY_LLM_ENDPOINT`
    /// take precedence over file values.
    pub fn apply_env(&mut self) {
        if let Ok(csv) = std::env::var("SUPPLY_QUERY_CSV") {
            self.data.csv_file = PathBuf::from(csv);
        }
        if let Ok(model) = std::env::var("SUPPLY_QUERY_MODEL") {
            self.llm.model = model;
        }
        if let Ok(endpoint) = std::env::var("SUPPLY_QUERY_LLM_ENDPOINT") {
            self.llm.provider = ApiProvider::Custom { endpoint };
        }
    }

    pub fn api_key(&self) -> String {
        self.llm
            .api_key_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
            .unwrap_or_default()
    }
}

impl Default for AssistantConfig {
    fn default() -> Self {
        let index_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("supply-query")
            .join("index");

        Self {
            data: DataConfig {
                csv_file: PathBuf::from("supply_log.csv"),
                pending_file: PathBuf::from("updated_medical_supply.csv"),
                index_dir,
            },
            llm: LlmSettings {
                provider: ApiProvider::Ollama,
                model: "llama3".to_string(),
                api_key_env: None,
                max_tokens: 512,
                temperature: 0.1,
                connect_timeout_secs: 15,
                request_timeout_secs: 300,
                max_retries: 2,
            },
            matching: MatchingConfig { accept_above: 80 },
            search: SearchConfig { top_k: 5 },
            routing: RoutingConfig {
                rule_fallback: true,
            },
        }
    }
}
