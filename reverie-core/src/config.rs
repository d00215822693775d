//! Configuration for the cognition core.
//!
//! Maps directly to `reverie.toml`. Every field has a default, so an empty
//! file is a valid configuration.

use reverie_llm::{LlmClient, LlmProvider};
use serde::{Deserialize, Serialize};

use crate::error::{CognitionError, Result};

/// Top-level configuration, loadable from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CognitionConfig {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,
    /// Retrieval defaults.
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    /// Reflection trigger and pipeline sizes.
    #[serde(default)]
    pub reflection: ReflectionConfig,
    /// Planning settings.
    #[serde(default)]
    pub planning: PlanningConfig,
    /// Focus-topic maintenance.
    #[serde(default)]
    pub focus: FocusConfig,
    /// Character summary sizes.
    #[serde(default)]
    pub summary: SummaryConfig,
    /// Environment perception and interaction.
    #[serde(default)]
    pub environment: EnvironmentConfig,
    /// LLM backend settings.
    #[serde(default)]
    pub llm: LlmConfig,
    /// Persistence settings.
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

impl CognitionConfig {
    /// Load configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `CognitionError::Config` if the TOML is invalid.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| CognitionError::Config(e.to_string()))
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error. `RUST_LOG` wins if set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Emit JSON log lines instead of human-readable ones.
    #[serde(default)]
    pub json_logs: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
        }
    }
}

/// Retrieval defaults used when a caller does not override them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Records returned per query.
    #[serde(default = "default_20_usize")]
    pub default_limit: usize,
    /// Default scoring weights.
    #[serde(default)]
    pub weights: RetrievalWeights,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_limit: 20,
            weights: RetrievalWeights::default(),
        }
    }
}

/// Scoring weights: `score = recency·r + relevance·v + importance·i`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetrievalWeights {
    /// Weight for recency.
    #[serde(default = "default_1_0")]
    pub recency: f64,
    /// Weight for semantic relevance.
    #[serde(default = "default_1_0")]
    pub relevance: f64,
    /// Weight for importance.
    #[serde(default = "default_1_0")]
    pub importance: f64,
}

impl Default for RetrievalWeights {
    fn default() -> Self {
        Self {
            recency: 1.0,
            relevance: 1.0,
            importance: 1.0,
        }
    }
}

/// Reflection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReflectionConfig {
    /// Threshold given to new characters.
    #[serde(default = "default_150")]
    pub default_threshold: u32,
    /// Observations summed when deciding whether to reflect.
    #[serde(default = "default_100")]
    pub observation_window: usize,
    /// Mixed memories shown when asking for questions.
    #[serde(default = "default_100")]
    pub question_context: usize,
    /// Questions per reflection pass.
    #[serde(default = "default_3")]
    pub question_count: usize,
    /// Evidence memories retrieved per question.
    #[serde(default = "default_15")]
    pub evidence_per_question: usize,
    /// Sum only observations made after the character's last reflection.
    /// Off by default: every retrieved observation counts.
    #[serde(default)]
    pub count_since_last_reflection: bool,
}

impl Default for ReflectionConfig {
    fn default() -> Self {
        Self {
            default_threshold: 150,
            observation_window: 100,
            question_context: 100,
            question_count: 3,
            evidence_per_question: 15,
            count_since_last_reflection: false,
        }
    }
}

/// Planning settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanningConfig {
    /// Memories shown when decomposing a plan.
    #[serde(default = "default_10")]
    pub decomposition_context: usize,
    /// Also persist decomposed behaviors as plan memories.
    #[serde(default)]
    pub persist_sub_plans: bool,
}

impl Default for PlanningConfig {
    fn default() -> Self {
        Self {
            decomposition_context: 10,
            persist_sub_plans: false,
        }
    }
}

/// Focus-topic settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FocusConfig {
    /// Recent memories shown when recomputing topics.
    #[serde(default = "default_20_usize")]
    pub window: usize,
    /// Topics kept.
    #[serde(default = "default_5")]
    pub max_topics: usize,
}

impl Default for FocusConfig {
    fn default() -> Self {
        Self { window: 20, max_topics: 5 }
    }
}

/// Character-summary settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryConfig {
    /// Reflections and observations retrieved, each.
    #[serde(default = "default_10")]
    pub per_kind: usize,
    /// Records kept after merging.
    #[serde(default = "default_15")]
    pub keep: usize,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self { per_kind: 10, keep: 15 }
    }
}

/// Environment perception and interaction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// At or below this many normal objects/occupants, each is recorded
    /// individually; above it, one aggregate is recorded.
    #[serde(default = "default_3")]
    pub individual_threshold: usize,
    /// Write the model's new object status back into the object cache.
    #[serde(default)]
    pub write_back_object_status: bool,
    /// Statuses considered unremarkable (case-insensitive). An empty status
    /// is always normal.
    #[serde(default = "default_normal_statuses")]
    pub normal_statuses: Vec<String>,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            individual_threshold: 3,
            write_back_object_status: false,
            normal_statuses: default_normal_statuses(),
        }
    }
}

impl EnvironmentConfig {
    /// Whether `status` is unremarkable.
    #[must_use]
    pub fn is_normal_status(&self, status: &str) -> bool {
        let status = status.trim();
        status.is_empty() || self.normal_statuses.iter().any(|s| s.eq_ignore_ascii_case(status))
    }
}

/// LLM backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider: "ollama", "openai", "none".
    #[serde(default = "default_ollama")]
    pub provider: String,
    /// Base URL for the API.
    #[serde(default = "default_ollama_url")]
    pub base_url: String,
    /// API key for OpenAI-compatible providers.
    #[serde(default)]
    pub api_key: String,
    /// Completion model.
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
    /// Embedding model.
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    /// Per-request timeout in milliseconds.
    #[serde(default = "default_30000")]
    pub request_timeout_ms: u64,
    /// Extra attempts after a failed request.
    #[serde(default = "default_2")]
    pub max_retries: u32,
    /// Sampling temperature.
    #[serde(default = "default_0_7")]
    pub temperature: f32,
    /// Completion token budget.
    #[serde(default = "default_512")]
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_ollama(),
            base_url: default_ollama_url(),
            api_key: String::new(),
            chat_model: default_chat_model(),
            embedding_model: default_embedding_model(),
            request_timeout_ms: 30_000,
            max_retries: 2,
            temperature: 0.7,
            max_tokens: 512,
        }
    }
}

impl LlmConfig {
    /// Build an HTTP client for the configured provider.
    ///
    /// # Errors
    /// Returns `CognitionError::Config` for an unknown provider name.
    pub fn build_client(&self) -> Result<LlmClient> {
        let provider = match self.provider.to_ascii_lowercase().as_str() {
            "ollama" => LlmProvider::Ollama { base_url: self.base_url.clone() },
            "openai" | "openai_compatible" => LlmProvider::OpenAiCompatible {
                base_url: self.base_url.clone(),
                api_key: self.api_key.clone(),
            },
            "none" => LlmProvider::None,
            other => {
                return Err(CognitionError::Config(format!("unknown LLM provider '{other}'")));
            }
        };
        Ok(
            LlmClient::new(provider, &self.chat_model, &self.embedding_model, self.max_retries)
                .with_defaults(self.temperature, self.max_tokens, self.request_timeout_ms),
        )
    }
}

/// Persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Storage backend: "memory" or "sqlite".
    #[serde(default = "default_memory")]
    pub backend: String,
    /// Path of the SQLite database file.
    #[serde(default = "default_db_path")]
    pub sqlite_path: String,
    /// Enable WAL journaling.
    #[serde(default = "default_true")]
    pub wal_mode: bool,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            backend: default_memory(),
            sqlite_path: default_db_path(),
            wal_mode: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Default value helpers (serde requires functions)
// ---------------------------------------------------------------------------

fn default_true() -> bool { true }
fn default_log_level() -> String { "info".to_string() }
fn default_ollama() -> String { "ollama".to_string() }
fn default_ollama_url() -> String { "http://localhost:11434".to_string() }
fn default_chat_model() -> String { "llama3.1:8b".to_string() }
fn default_embedding_model() -> String { "nomic-embed-text".to_string() }
fn default_memory() -> String { "memory".to_string() }
fn default_db_path() -> String { "reverie.db".to_string() }
fn default_normal_statuses() -> Vec<String> {
    ["normal", "idle", "ok", "available"].iter().map(ToString::to_string).collect()
}
fn default_0_7() -> f32 { 0.7 }
fn default_1_0() -> f64 { 1.0 }
fn default_2() -> u32 { 2 }
fn default_3() -> usize { 3 }
fn default_5() -> usize { 5 }
fn default_10() -> usize { 10 }
fn default_15() -> usize { 15 }
fn default_20_usize() -> usize { 20 }
fn default_100() -> usize { 100 }
fn default_150() -> u32 { 150 }
fn default_512() -> u32 { 512 }
fn default_30000() -> u64 { 30_000 }
