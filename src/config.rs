use serde::Deserialize;
use std::path::Path;

pub const DEFAULT_CONFIG_PATH: &str = "ragsql.toml";

// ──────────────────────────── TOML structure ────────────────────────────

#[derive(Debug, Deserialize, Clone, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub parser: ParserConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub vector_store: VectorStoreConfig,
    #[serde(default)]
    pub sql: SqlConfig,
    #[serde(default)]
    pub rag: RagConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8000
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    #[serde(default = "default_environment")]
    pub environment: String,
    #[serde(default = "default_version")]
    pub version: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            version: default_version(),
        }
    }
}

fn default_environment() -> String {
    "development".to_string()
}
fn default_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct CompletionConfig {
    #[serde(default = "default_chat_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub default_temperature: f64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            model: default_chat_model(),
            default_max_tokens: default_max_tokens(),
            default_temperature: default_temperature(),
        }
    }
}

fn default_chat_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_max_tokens() -> u32 {
    1000
}
fn default_temperature() -> f64 {
    0.3
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_dimensions")]
    pub dimensions: u32,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            dimensions: default_dimensions(),
            batch_size: default_batch_size(),
        }
    }
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}
fn default_dimensions() -> u32 {
    1536
}
fn default_batch_size() -> usize {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct ParserConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    /// Remote parse servers. Empty means extract locally.
    #[serde(default)]
    pub api_endpoints: Vec<String>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            api_endpoints: vec![],
        }
    }
}

fn default_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_upload_dir")]
    pub upload_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: default_upload_dir(),
        }
    }
}

fn default_upload_dir() -> String {
    "data/uploads".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct VectorStoreConfig {
    #[serde(default = "default_index_name")]
    pub index_name: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default)]
    pub index_host: Option<String>,
    #[serde(default = "default_control_plane_url")]
    pub control_plane_url: String,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            index_name: default_index_name(),
            namespace: default_namespace(),
            index_host: None,
            control_plane_url: default_control_plane_url(),
        }
    }
}

fn default_index_name() -> String {
    "rag-documents".to_string()
}
fn default_namespace() -> String {
    "default".to_string()
}
fn default_control_plane_url() -> String {
    "https://api.pinecone.io".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct SqlConfig {
    #[serde(default = "default_chat_model")]
    pub model: String,
    #[serde(default = "default_sql_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_max_training_examples")]
    pub max_training_examples: usize,
}

impl Default for SqlConfig {
    fn default() -> Self {
        Self {
            model: default_chat_model(),
            timeout_secs: default_sql_timeout(),
            pool_size: default_pool_size(),
            max_training_examples: default_max_training_examples(),
        }
    }
}

fn default_sql_timeout() -> u64 {
    60
}
fn default_pool_size() -> u32 {
    5
}
fn default_max_training_examples() -> usize {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct RagConfig {
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            default_top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    3
}

// ──────────────────────────── Flattened settings ────────────────────────────

/// Flattened application settings (TOML + environment).
#[derive(Debug, Clone)]
pub struct Settings {
    // API
    pub host: String,
    pub port: u16,

    // Service
    pub environment: String,
    pub version: String,

    // Completion
    pub completion_model: String,
    pub default_max_tokens: u32,
    pub default_temperature: f64,

    // Embedding
    pub embedding_model: String,
    pub vector_dimensions: u32,
    pub embedding_batch_size: usize,

    // Parser
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub parser_api_endpoints: Vec<String>,

    // Storage
    pub upload_dir: String,

    // Vector store
    pub index_name: String,
    pub namespace: String,
    pub index_host: Option<String>,
    pub pinecone_control_plane_url: String,

    // SQL
    pub sql_model: String,
    pub sql_timeout_secs: u64,
    pub sql_pool_size: u32,
    pub max_training_examples: usize,

    // RAG
    pub default_top_k: usize,

    // Secrets (environment only)
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub pinecone_api_key: Option<String>,
    pub database_url: Option<String>,
}

impl Settings {
    /// Document RAG needs both an OpenAI and a Pinecone key.
    pub fn rag_enabled(&self) -> bool {
        self.openai_api_key.is_some() && self.pinecone_api_key.is_some()
    }

    /// Text-to-SQL needs a database and an OpenAI key.
    pub fn sql_enabled(&self) -> bool {
        self.database_url.is_some() && self.openai_api_key.is_some()
    }
}

/// Load settings from a given TOML path. A missing file yields defaults.
pub fn load_settings_from_path(path: impl AsRef<Path>) -> anyhow::Result<Settings> {
    // Load .env if present (ignore errors)
    let _ = dotenvy::dotenv();

    let content = match std::fs::read_to_string(path.as_ref()) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e.into()),
    };
    let config: TomlConfig = toml::from_str(&content)?;

    Ok(build_settings(config, |key| std::env::var(key).ok()))
}

/// Merge the parsed TOML with secrets from `env`. Blank values count as unset.
pub fn build_settings(config: TomlConfig, env: impl Fn(&str) -> Option<String>) -> Settings {
    let secret = |key: &str| env(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    let openai_base_url = secret("OPENAI_BASE_URL")
        .unwrap_or_else(|| "https://api.openai.com/v1".to_string())
        .trim_end_matches('/')
        .to_string();

    Settings {
        host: config.api.host,
        port: config.api.port,
        environment: config.service.environment,
        version: config.service.version,
        completion_model: config.completion.model,
        default_max_tokens: config.completion.default_max_tokens,
        default_temperature: config.completion.default_temperature,
        embedding_model: config.embedding.model,
        vector_dimensions: config.embedding.dimensions,
        embedding_batch_size: config.embedding.batch_size,
        chunk_size: config.parser.chunk_size,
        chunk_overlap: config.parser.chunk_overlap,
        parser_api_endpoints: config.parser.api_endpoints,
        upload_dir: config.storage.upload_dir,
        index_name: config.vector_store.index_name,
        namespace: config.vector_store.namespace,
        index_host: secret("PINECONE_INDEX_HOST").or(config.vector_store.index_host),
        pinecone_control_plane_url: config.vector_store.control_plane_url,
        sql_model: config.sql.model,
        sql_timeout_secs: config.sql.timeout_secs,
        sql_pool_size: config.sql.pool_size,
        max_training_examples: config.sql.max_training_examples,
        default_top_k: config.rag.default_top_k,
        openai_api_key: secret("OPENAI_API_KEY"),
        openai_base_url,
        pinecone_api_key: secret("PINECONE_API_KEY"),
        database_url: secret("DATABASE_URL"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let settings = load_settings_from_path(dir.path().join("missing.toml")).unwrap();

        assert_eq!(settings.host, "0.0.0.0");
        assert_eq!(settings.port, 8000);
        assert_eq!(settings.chunk_size, 1000);
        assert_eq!(settings.chunk_overlap, 200);
        assert_eq!(settings.upload_dir, "data/uploads");
        assert_eq!(settings.namespace, "default");
        assert_eq!(settings.default_top_k, 3);
        assert_eq!(settings.sql_timeout_secs, 60);
        assert!(settings.parser_api_endpoints.is_empty());
    }

    #[test]
    fn test_parse_partial_toml() {
        let toml_content = r#"
[api]
port = 9000

[service]
environment = "production"

[completion]
model = "gpt-4o"
default_max_tokens = 512

[parser]
chunk_size = 800
api_endpoints = ["http://localhost:6000"]

[vector_store]
index_name = "contracts"
index_host = "contracts-abc.svc.pinecone.io"

[sql]
timeout_secs = 15
max_training_examples = 4
"#;
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(toml_content.as_bytes()).unwrap();
        let settings = load_settings_from_path(tmp.path()).unwrap();

        assert_eq!(settings.host, "0.0.0.0");
        assert_eq!(settings.port, 9000);
        assert_eq!(settings.environment, "production");
        assert_eq!(settings.completion_model, "gpt-4o");
        assert_eq!(settings.default_max_tokens, 512);
        assert_eq!(settings.default_temperature, 0.3);
        assert_eq!(settings.chunk_size, 800);
        assert_eq!(settings.chunk_overlap, 200);
        assert_eq!(settings.parser_api_endpoints, vec!["http://localhost:6000"]);
        assert_eq!(settings.index_name, "contracts");
        assert_eq!(settings.sql_model, "gpt-4o-mini");
        assert_eq!(settings.sql_timeout_secs, 15);
        assert_eq!(settings.max_training_examples, 4);
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"[api]\nport = \"not a number\"\n").unwrap();
        assert!(load_settings_from_path(tmp.path()).is_err());
    }

    #[test]
    fn test_secrets_enable_features() {
        let settings = build_settings(
            TomlConfig::default(),
            env_of(&[
                ("OPENAI_API_KEY", "sk-test"),
                ("PINECONE_API_KEY", "pc-test"),
                ("OPENAI_BASE_URL", "http://localhost:4010/v1/"),
            ]),
        );
        assert!(settings.rag_enabled());
        assert!(!settings.sql_enabled());
        assert_eq!(settings.openai_base_url, "http://localhost:4010/v1");

        let settings = build_settings(
            TomlConfig::default(),
            env_of(&[
                ("OPENAI_API_KEY", "sk-test"),
                ("DATABASE_URL", "postgresql://localhost/shop"),
            ]),
        );
        assert!(!settings.rag_enabled());
        assert!(settings.sql_enabled());
        assert_eq!(settings.openai_base_url, "https://api.openai.com/v1");
    }

    #[test]
    fn test_blank_secrets_are_unset() {
        let settings = build_settings(
            TomlConfig::default(),
            env_of(&[("OPENAI_API_KEY", "  "), ("DATABASE_URL", "postgresql://localhost/shop")]),
        );
        assert!(settings.openai_api_key.is_none());
        assert!(!settings.sql_enabled());
    }

    #[test]
    fn test_index_host_env_overrides_file() {
        let mut config = TomlConfig::default();
        config.vector_store.index_host = Some("from-file.svc.pinecone.io".to_string());
        let settings = build_settings(
            config.clone(),
            env_of(&[("PINECONE_INDEX_HOST", "from-env.svc.pinecone.io")]),
        );
        assert_eq!(settings.index_host.as_deref(), Some("from-env.svc.pinecone.io"));

        let settings = build_settings(config, env_of(&[]));
        assert_eq!(settings.index_host.as_deref(), Some("from-file.svc.pinecone.io"));
    }
}
