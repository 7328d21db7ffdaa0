//! Configuration resolution
//!
//! Every field is resolved with the same precedence: CLI flag, then
//! environment variable, then the persisted config file, then a built-in
//! default. Environment access is injected through [`EnvLookup`] so the
//! resolver never reads process state on its own.

pub mod mode;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::aws::credentials::{AwsCredentials, StoredCredentials};
use crate::error::ConfigError;
pub use mode::Mode;

pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_REGION: &str = "us-east-1";

const APP_DIR_NAME: &str = ".aws-insights";
const CONFIG_FILE_NAME: &str = "config.json";
const LEDGER_FILE_NAME: &str = "jobs.json";

/// Key-value view of the environment
pub trait EnvLookup {
    fn get(&self, key: &str) -> Option<String>;
}

/// The real process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvLookup for ProcessEnv {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.is_empty())
    }
}

impl EnvLookup for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).filter(|v| !v.is_empty()).cloned()
    }
}

/// Number of days covered by a scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanPeriod(u32);

impl ScanPeriod {
    pub const ALLOWED: [u32; 5] = [1, 7, 30, 120, 365];

    pub fn new(days: u32) -> Option<Self> {
        Self::ALLOWED.contains(&days).then_some(Self(days))
    }

    fn parse(raw: &str) -> Option<Self> {
        raw.trim().parse().ok().and_then(Self::new)
    }

    pub fn days(self) -> u32 {
        self.0
    }
}

impl Default for ScanPeriod {
    fn default() -> Self {
        Self(30)
    }
}

/// Locations of the files owned by this tool
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub dir: PathBuf,
    pub config_file: PathBuf,
    pub ledger_file: PathBuf,
}

impl AppPaths {
    /// `$AWS_INSIGHTS_HOME` if set, otherwise `~/.aws-insights`
    pub fn resolve(env: &dyn EnvLookup) -> Result<Self, ConfigError> {
        let dir = match env.get("AWS_INSIGHTS_HOME") {
            Some(dir) => PathBuf::from(dir),
            None => dirs::home_dir()
                .map(|h| h.join(APP_DIR_NAME))
                .ok_or(ConfigError::NoHomeDirectory)?,
        };
        Ok(Self::in_dir(dir))
    }

    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            config_file: dir.join(CONFIG_FILE_NAME),
            ledger_file: dir.join(LEDGER_FILE_NAME),
            dir,
        }
    }
}

/// On-disk mirror of the configuration
///
/// Keys this version does not know about are carried in `extra` so that
/// rewriting the file never drops them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Kept raw so an out-of-range value on disk is skipped instead of
    /// failing the whole file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan_period: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<StoredCredentials>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verbosity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_effort: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_tier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_cost: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_cost: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cached_cost: Option<f64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Reads and writes the persisted config file
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing or malformed files count as an empty config
    pub fn load(&self) -> PersistedConfig {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                debug!("No stored config at {:?}: {}", self.path, e);
                return PersistedConfig::default();
            }
        };

        serde_json::from_str(&content).unwrap_or_else(|e| {
            warn!("Ignoring malformed config file {:?}: {}", self.path, e);
            PersistedConfig::default()
        })
    }

    pub fn save(&self, config: &PersistedConfig) -> Result<(), ConfigError> {
        let content =
            serde_json::to_string_pretty(config).map_err(|source| ConfigError::Serialize {
                path: self.path.clone(),
                source,
            })?;
        write_private(&self.path, &content)
    }
}

/// Write a file readable only by the owning user, creating its directory
pub fn write_private(path: &Path, content: &str) -> Result<(), ConfigError> {
    let to_error = |source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        create_private_dir(parent).map_err(to_error)?;
    }

    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path).map_err(to_error)?;
    // The mode passed to open() only applies to newly created files
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))
            .map_err(to_error)?;
    }

    file.write_all(content.as_bytes()).map_err(to_error)
}

fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    if dir.as_os_str().is_empty() || dir.exists() {
        return Ok(());
    }
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(dir)
}

/// Values supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub region: Option<String>,
    pub scan_period: Option<u32>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub mode: Mode,
}

/// The configuration in effect for one invocation
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub verbosity: Option<String>,
    pub reasoning_effort: Option<String>,
    pub service_tier: Option<String>,
    pub input_cost: Option<f64>,
    pub output_cost: Option<f64>,
    pub cached_cost: Option<f64>,
    pub scan_period: ScanPeriod,
    pub region: String,
    pub credentials: Option<AwsCredentials>,
    pub live: bool,
}

/// Merges CLI flags, environment and the stored file
pub struct ConfigResolver<'a> {
    store: ConfigStore,
    env: &'a dyn EnvLookup,
}

impl<'a> ConfigResolver<'a> {
    pub fn new(store: ConfigStore, env: &'a dyn EnvLookup) -> Self {
        Self { store, env }
    }

    /// Produce the effective config and persist newly supplied secrets
    pub fn resolve(&self, cli: &CliOverrides) -> Result<EffectiveConfig, ConfigError> {
        let file = self.store.load();
        let env = self.env;

        let api_key = cli
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| env.get("OPENAI_API_KEY"))
            .or_else(|| file.api_key.clone());

        let model = cli
            .model
            .clone()
            .or_else(|| env.get("AWS_INSIGHTS_MODEL"))
            .or_else(|| file.model.clone())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let base_url = env
            .get("OPENAI_BASE_URL")
            .or_else(|| file.base_url.clone())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let region = cli
            .region
            .clone()
            .or_else(|| env.get("AWS_REGION"))
            .or_else(|| env.get("AWS_DEFAULT_REGION"))
            .or_else(|| file.region.clone())
            .unwrap_or_else(|| DEFAULT_REGION.to_string());

        let scan_period = cli
            .scan_period
            .and_then(ScanPeriod::new)
            .or_else(|| {
                env.get("AWS_INSIGHTS_SCAN_PERIOD")
                    .and_then(|raw| ScanPeriod::parse(&raw))
            })
            .or_else(|| file.scan_period.and_then(ScanPeriod::new))
            .unwrap_or_default();

        let max_tokens = cli
            .max_tokens
            .or_else(|| env_parse(env, "AWS_INSIGHTS_MAX_TOKENS"))
            .or(file.max_tokens);
        let temperature = cli
            .temperature
            .or_else(|| env_parse(env, "AWS_INSIGHTS_TEMPERATURE"))
            .or(file.temperature);

        let env_credentials = AwsCredentials::from_env(env);
        let credentials = env_credentials
            .clone()
            .or_else(|| file.credentials.as_ref().and_then(AwsCredentials::from_stored));

        let live = mode::decide(credentials.as_ref(), cli.mode)?;

        let config = EffectiveConfig {
            api_key,
            model,
            base_url,
            max_tokens,
            temperature,
            verbosity: env.get("AWS_INSIGHTS_VERBOSITY").or(file.verbosity.clone()),
            reasoning_effort: env
                .get("AWS_INSIGHTS_REASONING_EFFORT")
                .or(file.reasoning_effort.clone()),
            service_tier: env
                .get("AWS_INSIGHTS_SERVICE_TIER")
                .or(file.service_tier.clone()),
            input_cost: env_parse(env, "AWS_INSIGHTS_INPUT_COST").or(file.input_cost),
            output_cost: env_parse(env, "AWS_INSIGHTS_OUTPUT_COST").or(file.output_cost),
            cached_cost: env_parse(env, "AWS_INSIGHTS_CACHED_COST").or(file.cached_cost),
            scan_period,
            region,
            credentials,
            live,
        };

        self.write_back(file, &config, env_credentials.as_ref());
        Ok(config)
    }

    /// Store secrets that arrived via env/CLI and are missing from the file
    fn write_back(
        &self,
        mut file: PersistedConfig,
        config: &EffectiveConfig,
        env_credentials: Option<&AwsCredentials>,
    ) {
        let mut changed = false;

        if file.api_key.is_none() {
            if let Some(key) = &config.api_key {
                file.api_key = Some(key.clone());
                changed = true;
            }
        }

        let stored_complete = file
            .credentials
            .as_ref()
            .and_then(AwsCredentials::from_stored)
            .is_some();
        if !stored_complete {
            if let Some(creds) = env_credentials {
                file.credentials = Some(StoredCredentials::from(creds));
                changed = true;
            }
        }

        if !changed {
            return;
        }

        match self.store.save(&file) {
            Ok(()) => debug!("Stored new secrets in {:?}", self.store.path()),
            Err(e) => warn!("Could not update config file: {}", e),
        }
    }
}

fn env_parse<T: std::str::FromStr>(env: &dyn EnvLookup, key: &str) -> Option<T> {
    let raw = env.get(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            debug!("Ignoring unparsable {}={}", key, raw);
            None
        }
    }
}
