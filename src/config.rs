use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Config files tried, in order, when none is given explicitly
const DEFAULT_CONFIG_PATHS: [&str; 2] = ["speech-index.toml", "config/speech-index.toml"];

/// Configuration for the speech index service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Where captions, manifests and indexes live
    pub storage: StorageConfig,

    /// Index building and caching settings
    pub index: IndexConfig,

    /// Caption languages the host accepts
    pub languages: LanguageConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory holding `{video}.{lang}.vtt`, `{video}.{lang}.index.json`
    /// and `{video}.manifest.json`
    pub root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Maximum number of languages indexed at once during prefetch
    pub prefetch_concurrency: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageConfig {
    /// Language code -> display name
    pub supported: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default tracing filter, e.g. "info" or "speech_index=debug"
    pub level: String,
}

/// Where a loaded configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    Environment,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::File(path) => write!(f, "{}", path.display()),
            ConfigSource::Environment => write!(f, "defaults with environment overrides"),
        }
    }
}

impl Config {
    /// Load configuration from the first config file found, falling back to
    /// defaults with environment overrides
    pub fn load() -> Result<Self> {
        Self::resolve(None).map(|(config, _)| config)
    }

    /// Load from `explicit` when given, else from the first default config
    /// file that exists, else from defaults with environment overrides.
    ///
    /// Returns the source too, so the caller can report it once logging is up.
    pub fn resolve(explicit: Option<&Path>) -> Result<(Self, ConfigSource)> {
        let path = explicit.map(Path::to_path_buf).or_else(|| {
            DEFAULT_CONFIG_PATHS
                .iter()
                .map(PathBuf::from)
                .find(|path| path.exists())
        });

        match path {
            Some(path) => Ok((Self::load_from(&path)?, ConfigSource::File(path))),
            None => Ok((Self::from_env()?, ConfigSource::Environment)),
        }
    }

    /// Load configuration from a specific TOML file
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Ok(config)
    }

    /// Defaults overridden by environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(root) = std::env::var("SPEECH_INDEX_ROOT") {
            config.storage.root = PathBuf::from(root);
        }

        if let Ok(concurrency) = std::env::var("SPEECH_INDEX_PREFETCH_CONCURRENCY") {
            config.index.prefetch_concurrency = concurrency.parse().with_context(|| {
                format!("Invalid SPEECH_INDEX_PREFETCH_CONCURRENCY: {}", concurrency)
            })?;
        }

        if let Ok(level) = std::env::var("SPEECH_INDEX_LOG_LEVEL") {
            config.logging.level = level;
        }

        Ok(config)
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let config_str = toml::to_string_pretty(self)?;
        std::fs::write(path, config_str)?;
        tracing::info!("💾 Configuration saved to: {}", path.display());
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.storage.root.as_os_str().is_empty() {
            return Err(anyhow!("storage.root must not be empty"));
        }

        if self.index.prefetch_concurrency == 0 {
            return Err(anyhow!("prefetch_concurrency must be greater than 0"));
        }

        if self.languages.supported.is_empty() {
            return Err(anyhow!("at least one supported language is required"));
        }

        for code in self.languages.supported.keys() {
            crate::index::validate_component("language", code)
                .map_err(|e| anyhow!("languages.supported: {}", e))?;
        }

        Ok(())
    }

    /// Whether `code` is an accepted language (case-insensitive)
    pub fn is_supported_language(&self, code: &str) -> bool {
        self.languages
            .supported
            .contains_key(&code.to_ascii_lowercase())
    }

    /// Get runtime configuration summary
    pub fn summary(&self) -> String {
        format!(
            "Speech Index Configuration:\n\
            - Storage Root: {}\n\
            - Prefetch Concurrency: {}\n\
            - Languages: {}\n\
            - Log Level: {}",
            self.storage.root.display(),
            self.index.prefetch_concurrency,
            self.languages
                .supported
                .keys()
                .cloned()
                .collect::<Vec<_>>()
                .join(", "),
            self.logging.level
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        let supported = [
            ("en", "English"),
            ("hi", "Hindi"),
            ("kn", "Kannada"),
            ("te", "Telugu"),
            ("ta", "Tamil"),
            ("ml", "Malayalam"),
            ("mr", "Marathi"),
            ("gu", "Gujarati"),
            ("bn", "Bengali"),
            ("pa", "Punjabi"),
            ("or", "Odia"),
            ("ur", "Urdu"),
        ]
        .into_iter()
        .map(|(code, name)| (code.to_string(), name.to_string()))
        .collect();

        Self {
            storage: StorageConfig {
                root: PathBuf::from("data/vtts"),
            },
            index: IndexConfig {
                prefetch_concurrency: num_cpus::get().min(8),
            },
            languages: LanguageConfig { supported },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }
}

/// Configuration builder for programmatic config creation
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_root(mut self, root: PathBuf) -> Self {
        self.config.storage.root = root;
        self
    }

    pub fn with_prefetch_concurrency(mut self, concurrency: usize) -> Self {
        self.config.index.prefetch_concurrency = concurrency;
        self
    }

    pub fn with_language(mut self, code: &str, name: &str) -> Self {
        self.config
            .languages
            .supported
            .insert(code.to_ascii_lowercase(), name.to_string());
        self
    }

    pub fn with_log_level(mut self, level: &str) -> Self {
        self.config.logging.level = level.to_string();
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
