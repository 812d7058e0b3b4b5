use std::path::{Path, PathBuf};

pub const ID: &str = "novanotif";

/// File name of the configuration inside [`config_dir`].
pub const CONFIG_FILE: &str = "config.json";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct NotificationsConfig {
    pub theme: Theme,
    /// Raises the default log filter to `debug`.
    pub verbose: bool,
    pub server: ServerConfig,
    pub udp: UdpConfig,
    pub notification: NotificationConfig,
    pub display: DisplayConfig,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerConfig {
    /// Port of the local HTTP endpoint, always bound on 127.0.0.1.
    pub port: u16,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct UdpConfig {
    pub enabled: bool,
    /// Port the broadcast listener binds to.
    pub port: u16,
    pub broadcast_address: String,
    pub broadcast_port: u16,
    /// Empty disables authentication of inbound datagrams.
    pub shared_key: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct NotificationConfig {
    /// The maximum number of notifications that can be displayed at once.
    pub max_visible: u32,
    /// Countdown in milliseconds used when a request has no timeout or a zero timeout.
    pub default_timeout: u64,
    /// Surface width as a fraction of the work area width.
    #[serde(alias = "maxWidth")]
    pub max_width_ratio: f64,
    /// Upper bound of a surface height as a fraction of the work area height.
    #[serde(alias = "maxHeight")]
    pub max_height_ratio: f64,
    pub min_height: u32,
    pub spacing: u32,
    pub margin_top: u32,
    pub margin_right: u32,
    pub animation: AnimationConfig,
    /// Capacity of the overflow queue. Zero means unbounded.
    pub max_queued: usize,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct AnimationConfig {
    /// Slide-in duration and close delay in milliseconds.
    pub duration: u64,
    /// Duration of the repositioning animation after the stack changes.
    pub re_stack_duration: u64,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct DisplayConfig {
    pub work_area: WorkArea,
}

/// Usable area of the primary display, in screen pixels.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WorkArea {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            theme: Theme::default(),
            verbose: false,
            server: ServerConfig::default(),
            udp: UdpConfig::default(),
            notification: NotificationConfig::default(),
            display: DisplayConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 38080 }
    }
}

impl Default for UdpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 38081,
            broadcast_address: String::from("255.255.255.255"),
            broadcast_port: 38081,
            shared_key: String::new(),
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            max_visible: 3,
            default_timeout: 5000,
            max_width_ratio: 0.2,
            max_height_ratio: 0.33,
            min_height: 30,
            spacing: 10,
            margin_top: 10,
            margin_right: 10,
            animation: AnimationConfig::default(),
            max_queued: 100,
        }
    }
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            duration: 300,
            re_stack_duration: 150,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            work_area: WorkArea::default(),
        }
    }
}

impl Default for WorkArea {
    fn default() -> Self {
        Self {
            x: 0,
            y: 0,
            width: 1920,
            height: 1080,
        }
    }
}

impl UdpConfig {
    /// The shared key, if authentication is enabled.
    pub fn shared_key(&self) -> Option<&str> {
        (!self.shared_key.is_empty()).then_some(self.shared_key.as_str())
    }
}

impl NotificationsConfig {
    /// Default location of the configuration file.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(ID).join(CONFIG_FILE))
    }

    /// Read a configuration file. Keys missing from the file keep their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load `path` (or the default location), falling back to defaults on any error.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path.map(Path::to_path_buf).or_else(Self::default_path) else {
            tracing::warn!("No configuration directory available, using defaults");
            return Self::default();
        };

        if !path.exists() {
            tracing::debug!("No configuration at {}, using defaults", path.display());
            return Self::default();
        }

        match Self::load(&path) {
            Ok(config) => {
                tracing::info!("Loaded configuration from {}", path.display());
                config
            }
            Err(err) => {
                tracing::error!("{err}, using defaults");
                Self::default()
            }
        }
    }
}
