use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// Directory the three default paths live under, relative to the working directory.
const DEFAULT_DATA_DIR: &str = "src/data/latent-scope/omitted_nones";

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct ScopeEmbedConfig {
    pub paths: PathsConfig,
    pub embedding: EmbeddingConfig,
    pub output: OutputConfig,
    pub preview: PreviewConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PathsConfig {
    pub embeddings: String,
    pub input: String,
    pub output: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Name of the tensor (safetensors) or dataset (HDF5) holding the matrix.
    pub tensor: String,
    /// Name of the column the vectors are written to.
    pub column: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct OutputConfig {
    pub compression: Codec,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PreviewConfig {
    pub rows: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub log_level: String,
}

/// Parquet compression codec for the output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Codec {
    None,
    #[default]
    Snappy,
    Gzip,
    Zstd,
    Lz4,
}

impl Codec {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Snappy => "snappy",
            Self::Gzip => "gzip",
            Self::Zstd => "zstd",
            Self::Lz4 => "lz4",
        }
    }

    pub fn to_parquet(self) -> parquet::basic::Compression {
        use parquet::basic::{Compression, GzipLevel, ZstdLevel};
        match self {
            Self::None => Compression::UNCOMPRESSED,
            Self::Snappy => Compression::SNAPPY,
            Self::Gzip => Compression::GZIP(GzipLevel::default()),
            Self::Zstd => Compression::ZSTD(ZstdLevel::default()),
            Self::Lz4 => Compression::LZ4_RAW,
        }
    }
}

impl std::fmt::Display for Codec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Codec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "snappy" => Ok(Self::Snappy),
            "gzip" => Ok(Self::Gzip),
            "zstd" => Ok(Self::Zstd),
            "lz4" => Ok(Self::Lz4),
            _ => Err(format!("unknown compression codec: {s}")),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        let data_dir = Path::new(DEFAULT_DATA_DIR);
        let path = |file: &str| data_dir.join(file).to_string_lossy().into_owned();
        Self {
            embeddings: path("embedding-001.h5"),
            input: path("scopes-001-input.parquet"),
            output: path("scopes-001-embeddings.parquet"),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            tensor: "embeddings".into(),
            column: "embeddings".into(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            compression: Codec::Snappy,
        }
    }
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self { rows: 5 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
        }
    }
}

/// Returns `~/.scope-embed/`
pub fn default_config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".scope-embed")
}

/// Returns the default config file path: `~/.scope-embed/config.toml`
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.toml")
}

impl ScopeEmbedConfig {
    /// Load config from the default TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            ScopeEmbedConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    /// (SCOPE_EMBED_EMBEDDINGS, SCOPE_EMBED_INPUT, SCOPE_EMBED_OUTPUT, SCOPE_EMBED_LOG_LEVEL).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("SCOPE_EMBED_EMBEDDINGS") {
            self.paths.embeddings = val;
        }
        if let Ok(val) = std::env::var("SCOPE_EMBED_INPUT") {
            self.paths.input = val;
        }
        if let Ok(val) = std::env::var("SCOPE_EMBED_OUTPUT") {
            self.paths.output = val;
        }
        if let Ok(val) = std::env::var("SCOPE_EMBED_LOG_LEVEL") {
            self.logging.log_level = val;
        }
    }

    pub fn resolved_embeddings_path(&self) -> PathBuf {
        expand_tilde(&self.paths.embeddings)
    }

    pub fn resolved_input_path(&self) -> PathBuf {
        expand_tilde(&self.paths.input)
    }

    pub fn resolved_output_path(&self) -> PathBuf {
        expand_tilde(&self.paths.output)
    }

    /// Build the merge job described by this config.
    pub fn merge_config(&self) -> crate::merge::MergeConfig {
        crate::merge::MergeConfig {
            embeddings: self.resolved_embeddings_path(),
            input: self.resolved_input_path(),
            output: self.resolved_output_path(),
            tensor: self.embedding.tensor.clone(),
            column: self.embedding.column.clone(),
            compression: self.output.compression,
        }
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
