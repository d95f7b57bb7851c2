use crate::rewards::to_fixed;
use async_trait::async_trait;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;
use std::env;
use std::fs;
use std::io::{Error, ErrorKind};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const APP_NAME: &str = "farmdesk";
pub const CONFIG_PATH_ENV: &str = "FARMDESK_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "farmdesk.yaml";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default)]
pub struct Plot {
    pub location: String,
    #[serde(rename = "sizeGB")]
    pub size_gb: f64,
}

/// Persisted application settings chosen during setup.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    pub plot: Plot,
    pub reward_address: String,
    pub launch_on_boot: bool,
    pub version: String,
    #[serde(default)]
    pub node_name: String,
}
impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            plot: Plot::default(),
            reward_address: String::new(),
            launch_on_boot: true,
            version: env!("CARGO_PKG_VERSION").to_string(),
            node_name: String::new(),
        }
    }
}
impl AppConfig {
    /// A config is complete once plot, reward address and node name are all set.
    pub fn is_valid(&self) -> bool {
        !self.plot.location.is_empty()
            && self.plot.size_gb > 0.0
            && !self.reward_address.is_empty()
            && !self.node_name.is_empty()
    }
}

/// Partial update merged over the stored config. `None` fields are left untouched.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConfigUpdate {
    pub plot: Option<Plot>,
    pub launch_on_boot: Option<bool>,
    pub reward_address: Option<String>,
    pub version: Option<String>,
    pub node_name: Option<String>,
}
impl ConfigUpdate {
    pub fn node_name<S: Into<String>>(name: S) -> Self {
        Self {
            node_name: Some(name.into()),
            ..Default::default()
        }
    }
    pub fn plot_and_reward<L: Into<String>, R: Into<String>>(
        location: L,
        size_gb: f64,
        reward_address: R,
    ) -> Self {
        Self {
            plot: Some(Plot {
                location: location.into(),
                size_gb,
            }),
            reward_address: Some(reward_address.into()),
            ..Default::default()
        }
    }
    pub fn apply(self, config: &mut AppConfig) {
        if let Some(plot) = self.plot {
            config.plot = plot;
        }
        if let Some(launch_on_boot) = self.launch_on_boot {
            config.launch_on_boot = launch_on_boot;
        }
        if let Some(reward_address) = self.reward_address {
            config.reward_address = reward_address;
        }
        if let Some(version) = self.version {
            config.version = version;
        }
        if let Some(node_name) = self.node_name {
            config.node_name = node_name;
        }
    }
}

#[async_trait]
pub trait AppConfigStore: Send + Sync {
    /// Creates a default config if none can be read.
    async fn init(&self) -> Result<(), Error>;
    async fn read(&self) -> Result<AppConfig, Error>;
    async fn update(&self, update: ConfigUpdate) -> Result<(), Error>;
    async fn validate(&self) -> Result<bool, Error>;
    async fn remove(&self) -> Result<(), Error>;
}

/// JSON config file at `<config dir>/<app name>/<app name>.cfg`.
pub struct FileConfigStore {
    dir: PathBuf,
    path: PathBuf,
}
impl FileConfigStore {
    pub fn new<P: AsRef<Path>>(config_dir: P, app_name: &str) -> Self {
        let dir = config_dir.as_ref().join(app_name);
        let path = dir.join(format!("{app_name}.cfg"));
        Self { dir, path }
    }
    pub fn path(&self) -> &Path {
        &self.path
    }
    async fn write(&self, config: &AppConfig) -> Result<(), Error> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let contents = serde_json::to_string_pretty(config).map_err(Error::other)?;
        tokio::fs::write(&self.path, contents).await
    }
}

#[async_trait]
impl AppConfigStore for FileConfigStore {
    async fn init(&self) -> Result<(), Error> {
        if let Err(e) = self.read().await {
            debug!("No readable config at {}, creating default: {e}", self.path.display());
            self.write(&AppConfig::default()).await?;
        }
        Ok(())
    }

    async fn read(&self) -> Result<AppConfig, Error> {
        let contents = tokio::fs::read_to_string(&self.path).await?;
        let mut config: AppConfig = serde_json::from_str(&contents).map_err(|e| {
            Error::new(
                ErrorKind::InvalidData,
                format!("Failed to parse {}: {e}", self.path.display()),
            )
        })?;
        config.plot.size_gb = to_fixed(config.plot.size_gb, 2);
        Ok(config)
    }

    async fn update(&self, update: ConfigUpdate) -> Result<(), Error> {
        let mut config = self.read().await?;
        update.apply(&mut config);
        self.write(&config).await
    }

    async fn validate(&self) -> Result<bool, Error> {
        Ok(self.read().await?.is_valid())
    }

    async fn remove(&self) -> Result<(), Error> {
        tokio::fs::remove_file(&self.path).await
    }
}

/// Command used to launch an external process. Arguments may contain the placeholders
/// `{path}`, `{node_name}`, `{reward_address}` and `{plot_size}`.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize, Default)]
pub struct ProcessConfig {
    pub binary: String,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub struct TimingConfig {
    pub node_settle_delay_ms: u64,
    pub sync_poll_interval_ms: u64,
    pub retry_attempts: u32,
    pub retry_backoff_ms: u64,
    pub request_timeout_ms: u64,
}
impl Default for TimingConfig {
    fn default() -> Self {
        TimingConfig {
            node_settle_delay_ms: 7_000,
            sync_poll_interval_ms: 3_000,
            retry_attempts: 5,
            retry_backoff_ms: 500,
            request_timeout_ms: 30_000,
        }
    }
}
impl TimingConfig {
    pub fn node_settle_delay(&self) -> Duration {
        Duration::from_millis(self.node_settle_delay_ms)
    }
    pub fn sync_poll_interval(&self) -> Duration {
        Duration::from_millis(self.sync_poll_interval_ms)
    }
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Runtime settings for the desktop client, stored as YAML.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub struct FarmdeskConfig {
    pub app_name: String,
    pub config_dir: PathBuf,
    pub data_dir: PathBuf,
    pub log_dir: PathBuf,
    pub local_rpc_url: String,
    #[serde(default)]
    pub public_rpc_url: Option<String>,
    pub node: ProcessConfig,
    pub farmer: ProcessConfig,
    #[serde(default)]
    pub timings: TimingConfig,
    pub log_level: String,
}
impl FarmdeskConfig {
    pub fn save_as_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        fs::write(
            path.as_ref(),
            serde_yaml::to_string(&self).map_err(|e| Error::other(format!("{e:?}")))?,
        )
    }

    /// Loads from `$FARMDESK_CONFIG` (or `farmdesk.yaml`), falling back to defaults when missing.
    pub fn load_or_default() -> Result<Self, Error> {
        let path = config_path();
        if path.exists() {
            Self::try_from(&path)
        } else {
            warn!("Config file {} not found, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn app_config_store(&self) -> FileConfigStore {
        FileConfigStore::new(&self.config_dir, &self.app_name)
    }

    pub fn blocks_path(&self) -> PathBuf {
        self.data_dir.join(&self.app_name).join("farmed_blocks.json")
    }
}

impl TryFrom<&Path> for FarmdeskConfig {
    type Error = Error;
    fn try_from(value: &Path) -> Result<Self, Self::Error> {
        serde_yaml::from_str::<FarmdeskConfig>(&fs::read_to_string(value)?)
            .map_err(|e| Error::new(ErrorKind::InvalidData, format!("{e:?}")))
    }
}
impl TryFrom<&PathBuf> for FarmdeskConfig {
    type Error = Error;
    fn try_from(value: &PathBuf) -> Result<Self, Self::Error> {
        Self::try_from(value.as_path())
    }
}

impl Default for FarmdeskConfig {
    fn default() -> Self {
        let config_dir = default_config_dir();
        let data_dir = default_data_dir();
        FarmdeskConfig {
            app_name: APP_NAME.to_string(),
            log_dir: data_dir.join(APP_NAME).join("logs"),
            config_dir,
            data_dir,
            local_rpc_url: "ws://127.0.0.1:9947".to_string(),
            public_rpc_url: None,
            node: ProcessConfig {
                binary: "subspace-node".to_string(),
                args: vec![
                    "--base-path".to_string(),
                    "{path}".to_string(),
                    "--name".to_string(),
                    "{node_name}".to_string(),
                    "--rpc-port".to_string(),
                    "9947".to_string(),
                    "--validator".to_string(),
                ],
            },
            farmer: ProcessConfig {
                binary: "subspace-farmer".to_string(),
                args: vec![
                    "--base-path".to_string(),
                    "{path}".to_string(),
                    "farm".to_string(),
                    "--reward-address".to_string(),
                    "{reward_address}".to_string(),
                    "--plot-size".to_string(),
                    "{plot_size}".to_string(),
                ],
            },
            timings: TimingConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

pub fn config_path() -> PathBuf {
    env::var(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE))
}

fn default_config_dir() -> PathBuf {
    dirs::config_dir().unwrap_or_else(|| PathBuf::from("."))
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir().unwrap_or_else(|| PathBuf::from("."))
}
