use anyhow::{Context, Result};
use directories::UserDirs;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
#[cfg(unix)]
use tokio::fs::File;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

/// Model used when neither config nor environment names one.
pub const DEFAULT_MODEL: &str = "mistral-large-latest";

/// Provider used when neither config nor environment names one.
pub const DEFAULT_PROVIDER: &str = "mistral";

// ── Top-level config ──────────────────────────────────────────────

/// Top-level Kairos configuration, loaded from `config.toml`.
///
/// Resolution order for the config directory: `KAIROS_CONFIG_DIR` env → `~/.kairos`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Config {
    /// Path to config.toml - computed at load time, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,
    /// API key for the selected provider. When unset the provider's own env var
    /// (`MISTRAL_API_KEY`, `OPENAI_API_KEY`) is used, then `KAIROS_API_KEY`, then `API_KEY`.
    pub api_key: Option<String>,
    /// Base URL override for the provider API (e.g. a self-hosted OpenAI-compatible endpoint).
    pub api_url: Option<String>,
    /// Provider id: `"mistral"`, `"openai"` or `"custom:<url>"`. Default: `"mistral"`.
    #[serde(default = "default_provider")]
    pub default_provider: String,
    /// Model name sent with every completion request. Default: `"mistral-large-latest"`.
    #[serde(default = "default_model")]
    pub default_model: String,
    /// Sampling temperature (0.0–2.0). Omitted from requests when unset.
    #[serde(default)]
    pub temperature: Option<f64>,
    /// Timeout for a single provider request, in seconds. Default: `120`.
    #[serde(default = "default_provider_timeout_secs")]
    pub provider_timeout_secs: u64,
    /// Directory holding `prompts/` and `documents/`. Relative paths resolve
    /// against the working directory. Default: `"resources"`.
    #[serde(default = "default_resources_dir")]
    pub resources_dir: PathBuf,

    /// HTTP gateway configuration (`[gateway]`).
    #[serde(default)]
    pub gateway: GatewayConfig,
}

fn default_provider() -> String {
    DEFAULT_PROVIDER.into()
}

fn default_model() -> String {
    DEFAULT_MODEL.into()
}

fn default_provider_timeout_secs() -> u64 {
    120
}

fn default_resources_dir() -> PathBuf {
    PathBuf::from("resources")
}

// ── Gateway ───────────────────────────────────────────────────────

/// HTTP gateway configuration (`[gateway]` section).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GatewayConfig {
    /// Gateway port (default: 5000)
    #[serde(default = "default_gateway_port")]
    pub port: u16,
    /// Gateway host (default: 127.0.0.1)
    #[serde(default = "default_gateway_host")]
    pub host: String,
    /// Upper bound for handling one `/chat` request, in seconds (default: 300)
    #[serde(default = "default_gateway_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_gateway_port() -> u16 {
    5000
}

fn default_gateway_host() -> String {
    "127.0.0.1".into()
}

fn default_gateway_request_timeout_secs() -> u64 {
    300
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            host: default_gateway_host(),
            request_timeout_secs: default_gateway_request_timeout_secs(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let config_dir = default_config_dir().unwrap_or_else(|_| PathBuf::from(".kairos"));

        Self {
            config_path: config_dir.join("config.toml"),
            api_key: None,
            api_url: None,
            default_provider: default_provider(),
            default_model: default_model(),
            temperature: None,
            provider_timeout_secs: default_provider_timeout_secs(),
            resources_dir: default_resources_dir(),
            gateway: GatewayConfig::default(),
        }
    }
}

fn default_config_dir() -> Result<PathBuf> {
    let home = UserDirs::new()
        .map(|u| u.home_dir().to_path_buf())
        .context("Could not find home directory")?;
    Ok(home.join(".kairos"))
}

/// Config directory in effect: `KAIROS_CONFIG_DIR` when set, else `~/.kairos`.
pub fn resolve_config_dir() -> Result<PathBuf> {
    if let Ok(custom_config_dir) = std::env::var("KAIROS_CONFIG_DIR") {
        let custom_config_dir = custom_config_dir.trim();
        if !custom_config_dir.is_empty() {
            return Ok(PathBuf::from(custom_config_dir));
        }
    }
    default_config_dir()
}

fn config_dir_creation_error(path: &Path) -> String {
    format!(
        "Failed to create config directory: {}. Set KAIROS_CONFIG_DIR or pass --config-dir \
         to use a writable location.",
        path.display()
    )
}

fn non_empty_env(names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| {
        std::env::var(name)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}

/// Show only the first and last few characters of a secret.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "****".into();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}…{tail}")
}

impl Config {
    /// Load `config.toml` from the resolved config directory, writing defaults
    /// when it does not exist yet.
    pub async fn load_or_init() -> Result<Self> {
        let config_dir = resolve_config_dir()?;
        Self::load_or_init_in(&config_dir).await
    }

    /// Load or create `config.toml` inside `config_dir`, then apply env overrides and validate.
    pub async fn load_or_init_in(config_dir: &Path) -> Result<Self> {
        let config_path = config_dir.join("config.toml");

        fs::create_dir_all(config_dir)
            .await
            .with_context(|| config_dir_creation_error(config_dir))?;

        let initialized = !config_path.exists();
        let mut config = if initialized {
            let mut config = Config::default();
            config.config_path = config_path.clone();
            config.save().await?;

            // Restrict permissions on newly created config file (may contain API keys)
            #[cfg(unix)]
            {
                use std::{fs::Permissions, os::unix::fs::PermissionsExt};
                let _ = fs::set_permissions(&config_path, Permissions::from_mode(0o600)).await;
            }
            config
        } else {
            // Warn if config file is world-readable (may contain API keys)
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                if let Ok(meta) = fs::metadata(&config_path).await {
                    if meta.permissions().mode() & 0o004 != 0 {
                        tracing::warn!(
                            "Config file {:?} is world-readable (mode {:o}). \
                             Consider restricting with: chmod 600 {:?}",
                            config_path,
                            meta.permissions().mode() & 0o777,
                            config_path,
                        );
                    }
                }
            }

            let contents = fs::read_to_string(&config_path)
                .await
                .context("Failed to read config file")?;
            let mut config: Config =
                toml::from_str(&contents).context("Failed to parse config file")?;
            config.config_path = config_path.clone();
            config
        };

        config.apply_env_overrides();
        config.validate()?;
        tracing::info!(
            path = %config.config_path.display(),
            provider = %config.default_provider,
            model = %config.default_model,
            initialized,
            "Config loaded"
        );
        Ok(config)
    }

    /// Validate configuration values that would cause runtime failures.
    pub fn validate(&self) -> Result<()> {
        if self.default_provider.trim().is_empty() {
            anyhow::bail!("default_provider must not be empty");
        }
        if self.default_model.trim().is_empty() {
            anyhow::bail!("default_model must not be empty");
        }
        if let Some(temperature) = self.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                anyhow::bail!("temperature must be between 0.0 and 2.0 (got {temperature})");
            }
        }
        if self.provider_timeout_secs == 0 {
            anyhow::bail!("provider_timeout_secs must be greater than 0");
        }

        // Gateway
        if self.gateway.host.trim().is_empty() {
            anyhow::bail!("gateway.host must not be empty");
        }
        if self.gateway.request_timeout_secs == 0 {
            anyhow::bail!("gateway.request_timeout_secs must be greater than 0");
        }

        Ok(())
    }

    /// Apply environment variable overrides to config.
    ///
    /// Credentials are not copied in here; the provider factory reads them
    /// from the environment so the per-provider variable keeps its precedence.
    pub fn apply_env_overrides(&mut self) {
        if let Some(provider) = non_empty_env(&["KAIROS_PROVIDER"]) {
            self.default_provider = provider;
        }

        // Model: KAIROS_MODEL or MISTRAL_MODEL
        if let Some(model) = non_empty_env(&["KAIROS_MODEL", "MISTRAL_MODEL"]) {
            self.default_model = model;
        }

        if let Some(url) = non_empty_env(&["KAIROS_API_URL"]) {
            self.api_url = Some(url);
        }

        // Temperature: KAIROS_TEMPERATURE
        if let Some(temp_str) = non_empty_env(&["KAIROS_TEMPERATURE"]) {
            match temp_str.parse::<f64>() {
                Ok(temp) if (0.0..=2.0).contains(&temp) => self.temperature = Some(temp),
                _ => tracing::warn!(
                    value = %temp_str,
                    "Ignoring KAIROS_TEMPERATURE outside 0.0..=2.0"
                ),
            }
        }

        if let Some(dir) = non_empty_env(&["KAIROS_RESOURCES_DIR"]) {
            self.resources_dir = PathBuf::from(dir);
        }

        // Gateway port: KAIROS_GATEWAY_PORT or PORT
        if let Some(port_str) = non_empty_env(&["KAIROS_GATEWAY_PORT", "PORT"]) {
            if let Ok(port) = port_str.parse::<u16>() {
                self.gateway.port = port;
            }
        }

        // Gateway host: KAIROS_GATEWAY_HOST (bare HOST is not read)
        if let Some(host) = non_empty_env(&["KAIROS_GATEWAY_HOST"]) {
            self.gateway.host = host;
        }
    }

    /// Directory the resource set is loaded from.
    ///
    /// A relative `resources_dir` is looked up under the working directory,
    /// then the config directory, then the crate's install source. The first
    /// existing directory wins; otherwise the working-directory path is
    /// returned so the load error names it.
    pub fn resources_path(&self) -> PathBuf {
        if self.resources_dir.is_absolute() {
            return self.resources_dir.clone();
        }

        let mut candidates = Vec::with_capacity(3);
        if let Ok(cwd) = std::env::current_dir() {
            candidates.push(cwd.join(&self.resources_dir));
        }
        if let Some(config_dir) = self.config_path.parent() {
            candidates.push(config_dir.join(&self.resources_dir));
        }
        candidates.push(Path::new(env!("CARGO_MANIFEST_DIR")).join(&self.resources_dir));

        let found = candidates.iter().find(|dir| dir.is_dir()).cloned();
        found.unwrap_or_else(|| {
            candidates
                .into_iter()
                .next()
                .unwrap_or_else(|| self.resources_dir.clone())
        })
    }

    /// Write the config atomically: temp file, fsync, rename, directory fsync.
    pub async fn save(&self) -> Result<()> {
        let toml_str = toml::to_string_pretty(self).context("Failed to serialize config")?;

        let parent_dir = self
            .config_path
            .parent()
            .context("Config path must have a parent directory")?;

        fs::create_dir_all(parent_dir).await.with_context(|| {
            format!(
                "Failed to create config directory: {}",
                parent_dir.display()
            )
        })?;

        let file_name = self
            .config_path
            .file_name()
            .and_then(|v| v.to_str())
            .unwrap_or("config.toml");
        let temp_path = parent_dir.join(format!(".{file_name}.tmp-{}", uuid::Uuid::new_v4()));

        let mut temp_file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&temp_path)
            .await
            .with_context(|| {
                format!(
                    "Failed to create temporary config file: {}",
                    temp_path.display()
                )
            })?;
        temp_file
            .write_all(toml_str.as_bytes())
            .await
            .context("Failed to write temporary config contents")?;
        temp_file
            .sync_all()
            .await
            .context("Failed to fsync temporary config file")?;
        drop(temp_file);

        if let Err(e) = fs::rename(&temp_path, &self.config_path).await {
            let _ = fs::remove_file(&temp_path).await;
            anyhow::bail!("Failed to atomically replace config file: {e}");
        }

        sync_directory(parent_dir).await
    }
}

async fn sync_directory(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        let dir = File::open(path)
            .await
            .with_context(|| format!("Failed to open directory for fsync: {}", path.display()))?;
        dir.sync_all()
            .await
            .with_context(|| format!("Failed to fsync directory metadata: {}", path.display()))?;
        Ok(())
    }

    #[cfg(not(unix))]
    {
        let _ = path;
        Ok(())
    }
}
