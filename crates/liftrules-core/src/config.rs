//! Configuration loader and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars
//! (nested keys split on `__`, e.g. `APP_RETRIEVAL__ALPHA=0.7`). Every section
//! has defaults, so an empty configuration is valid.

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.validate()?;
        Ok(config)
    }

    /// Builds a config from an inline TOML document, without files or env.
    pub fn from_toml_str(toml: &str) -> anyhow::Result<Self> {
        let config = Self { figment: Figment::from(Toml::string(toml)) };
        config.validate()?;
        Ok(config)
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Like [`Config::get`] but a missing section yields its defaults.
    pub fn section<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned + Default,
    {
        match self.figment.extract_inner::<T>(key) {
            Ok(value) => Ok(value),
            Err(e) if e.missing() => Ok(T::default()),
            Err(e) => Err(anyhow::anyhow!("Failed to get '{}': {}", key, e)),
        }
    }

    pub fn app(&self) -> anyhow::Result<AppConfig> {
        Ok(AppConfig {
            corpus: self.section("corpus")?,
            retrieval: self.section("retrieval")?,
            embedding: self.section("embedding")?,
            cache: self.section("cache")?,
            logging: self.section("logging")?,
        })
    }

    fn validate(&self) -> anyhow::Result<()> {
        let retrieval: RetrievalConfig = self.section("retrieval")?;
        retrieval.validate()?;
        Ok(())
    }
}

/// Every typed section of the configuration, defaults filled in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub corpus: CorpusConfig,
    pub retrieval: RetrievalConfig,
    pub embedding: EmbeddingConfig,
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusConfig {
    pub path: String,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self { path: "data/ipf_rules.json".to_string() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FusionKind {
    /// Min-max normalize each pool, then blend with `alpha`.
    Weighted,
    /// Reciprocal rank fusion over the two pools.
    Rrf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Weight of the lexical signal; the semantic signal gets `1 - alpha`.
    pub alpha: f32,
    pub default_k: usize,
    pub pool_multiplier: usize,
    pub min_pool: usize,
    /// Serve lexical-only results when the query embedding fails.
    pub degrade_on_embedding_failure: bool,
    pub fusion: FusionKind,
    pub rrf_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            alpha: 0.5,
            default_k: 3,
            pool_multiplier: 4,
            min_pool: 20,
            degrade_on_embedding_failure: true,
            fusion: FusionKind::Weighted,
            rrf_k: 60,
        }
    }
}

impl RetrievalConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(Error::InvalidConfig(format!("retrieval.alpha must be within [0, 1], got {}", self.alpha)));
        }
        if self.default_k == 0 {
            return Err(Error::InvalidConfig("retrieval.default_k must be positive".to_string()));
        }
        if self.pool_multiplier == 0 {
            return Err(Error::InvalidConfig("retrieval.pool_multiplier must be positive".to_string()));
        }
        Ok(())
    }

    /// Candidate pool requested from each index for a final result of `k`.
    pub fn pool_size(&self, k: usize) -> usize {
        k.saturating_mul(self.pool_multiplier).max(self.min_pool).max(k)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    Model,
    Fake,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub backend: EmbeddingBackend,
    pub model_dir: Option<String>,
    pub max_len: usize,
    pub fake_dim: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self { backend: EmbeddingBackend::Model, model_dir: None, max_len: 256, fake_dim: 384 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub uri: String,
    pub table: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { enabled: false, uri: "data/indexes/lancedb".to_string(), table: "rule_embeddings".to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string() }
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
