//! Service configuration and the host-supplied load context.
//!
//! Settings come from an optional TOML file overlaid by `BINDSERVE__*`
//! environment variables (`BINDSERVE__DEVICE__PREFERENCE=cuda`). A `.env`
//! file in the working directory is read first when present.
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};

use bindserve_error::{Error, FatalError};
use bindserve_model::{
    DEFAULT_BATCH_SIZE, DEFAULT_CHECKPOINT, DevicePreference, EmbedderOptions, ImageBindConfig,
    WeightsSource,
};
use serde::{Deserialize, Serialize};

pub const ENV_PREFIX: &str = "BINDSERVE";
pub const ENV_SEPARATOR: &str = "__";
/// Secret name holding a Hugging Face access token.
pub const HF_TOKEN_SECRET: &str = "hf_token";

/// Which request contract the predictor serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    /// `{"text": [...], "vision": [...], "audio": [...]}` in, map of vectors out.
    #[default]
    Serializable,
    /// A bare list of strings in, a list of text vectors out.
    Legacy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub preference: DevicePreference,
    pub ordinal: usize,
    /// Fall back to CPU when an explicitly requested accelerator is missing.
    pub allow_fallback: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            preference: DevicePreference::Auto,
            ordinal: 0,
            allow_fallback: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightsConfig {
    /// Local checkpoint; relative paths resolve against the data directory.
    pub path: Option<PathBuf>,
    /// Download from this Hugging Face repository instead of reading `path`.
    pub hub_repo: Option<String>,
    pub hub_revision: Option<String>,
    pub filename: String,
}

impl Default for WeightsConfig {
    fn default() -> Self {
        Self {
            path: None,
            hub_repo: None,
            hub_revision: None,
            filename: "imagebind_huge.pth".to_string(),
        }
    }
}

impl WeightsConfig {
    pub fn source(&self, data_dir: &Path, secrets: &Secrets) -> WeightsSource {
        match &self.hub_repo {
            Some(repo) => WeightsSource::Hub {
                repo: repo.clone(),
                revision: self.hub_revision.clone(),
                filename: self.filename.clone(),
                token: secrets.get(HF_TOKEN_SECRET).map(str::to_string),
            },
            None => {
                let path = self
                    .path
                    .clone()
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_CHECKPOINT));
                WeightsSource::Local(resolve_in(data_dir, path))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directives used when `RUST_LOG` is unset.
    pub filter: String,
    /// Also write daily-rotated logs here.
    pub log_dir: Option<PathBuf>,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info,tokenizers=error,hf_hub=warn".to_string(),
            log_dir: None,
            json: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServeConfig {
    pub variant: Variant,
    /// Tokenizer JSON; relative paths resolve against the data directory.
    pub tokenizer_file: PathBuf,
    pub batch_size: usize,
    pub device: DeviceConfig,
    pub weights: WeightsConfig,
    pub model: ImageBindConfig,
    pub logging: LoggingConfig,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            variant: Variant::default(),
            tokenizer_file: PathBuf::from("tokenizer.json"),
            batch_size: DEFAULT_BATCH_SIZE,
            device: DeviceConfig::default(),
            weights: WeightsConfig::default(),
            model: ImageBindConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl ServeConfig {
    /// Read `.env`, then `path` (if given), then `BINDSERVE__*` variables.
    pub fn load(path: Option<&Path>) -> Result<Self, Error> {
        dotenvy::dotenv().ok();
        Self::layered(path, None)
    }

    /// Like [`ServeConfig::load`] but reads variables from `env` instead of
    /// the process environment, and skips `.env`.
    pub fn load_with_env(path: Option<&Path>, env: HashMap<String, String>) -> Result<Self, Error> {
        Self::layered(path, Some(env))
    }

    fn layered(path: Option<&Path>, env: Option<HashMap<String, String>>) -> Result<Self, Error> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            if !path.exists() {
                return Err(FatalError::MissingFile {
                    what: "configuration",
                    path: path.to_path_buf(),
                }
                .into());
            }
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let config: Self = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator(ENV_SEPARATOR)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true)
                    .source(env),
            )
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| FatalError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, Error> {
        let config: Self = toml::from_str(raw).map_err(|e| FatalError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, Error> {
        toml::to_string_pretty(self).map_err(|e| FatalError::Config(e.to_string()).into())
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.batch_size == 0 {
            return Err(FatalError::Config("batch_size must be at least 1".into()).into());
        }
        self.model
            .validate()
            .map_err(|e| Error::Fatal(e.into_fatal()))
    }
}

/// Named secrets handed over by the host. Values never appear in `Debug`.
#[derive(Clone, Default)]
pub struct Secrets(BTreeMap<String, String>);

impl Secrets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    /// Absent and empty secrets are treated alike.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str).filter(|v| !v.is_empty())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Secrets {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.0.keys()).finish()
    }
}

/// Everything the host provides at load time.
#[derive(Debug, Clone)]
pub struct HostContext {
    /// Directory holding the tokenizer and the `.checkpoints/` cache.
    pub data_dir: PathBuf,
    pub config: ServeConfig,
    pub secrets: Secrets,
}

impl HostContext {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            config: ServeConfig::default(),
            secrets: Secrets::new(),
        }
    }

    pub fn with_config(mut self, config: ServeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_secrets(mut self, secrets: Secrets) -> Self {
        self.secrets = secrets;
        self
    }

    pub fn tokenizer_path(&self) -> PathBuf {
        resolve_in(&self.data_dir, self.config.tokenizer_file.clone())
    }

    pub fn weights_source(&self) -> WeightsSource {
        self.config.weights.source(&self.data_dir, &self.secrets)
    }

    pub fn embedder_options(&self) -> EmbedderOptions {
        EmbedderOptions {
            config: self.config.model.clone(),
            weights: self.weights_source(),
            tokenizer: self.tokenizer_path(),
            device: self.config.device.preference,
            ordinal: self.config.device.ordinal,
            allow_fallback: self.config.device.allow_fallback,
            batch_size: self.config.batch_size,
        }
    }
}

fn resolve_in(base: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() { path } else { base.join(path) }
}
