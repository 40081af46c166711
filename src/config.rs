//! Config file loading
//!
//! Every field has a default, so an empty or missing file is a valid config.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::Deserialize;

use hoihoi_logs::window::{DEFAULT_OVERSCAN, DEFAULT_WINDOW_THRESHOLD, MAX_WINDOW_THRESHOLD};
use hoihoi_remote::{ClientConfig, EventNames};
use hoihoi_tui::ViewSettings;
use hoihoi_types::LogSource;

const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerSection,
    pub events: EventsSection,
    pub tail: TailSection,
    pub view: ViewSection,
    pub buffer: BufferSection,
    pub export: ExportSection,
    /// Catalog of tailable log files
    pub logs: Vec<LogSource>,
}

/// `[server]` section
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// Backend base URL
    pub url: String,
    pub socket_path: String,
    pub namespace: String,
    /// 0 waits forever
    pub connect_timeout_secs: u64,
}

/// `[events]` section
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct EventsSection {
    pub start_tail: String,
    pub stop_tail: String,
    pub log_line: String,
    pub tail_status: String,
}

/// `[tail]` section
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TailSection {
    /// CVM address the tail runs on
    pub host: Option<String>,
    /// Catalog entry selected at startup
    pub log: Option<String>,
}

/// `[view]` section
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ViewSection {
    /// Capped at 65535
    pub window_threshold: usize,
    pub overscan: usize,
    pub follow: bool,
}

/// `[buffer]` section
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct BufferSection {
    /// Oldest lines are evicted above this count (0 or unset keeps everything)
    pub max_lines: Option<usize>,
}

/// `[export]` section
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ExportSection {
    /// Where exports are written (unset = current directory)
    pub directory: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerSection::default(),
            events: EventsSection::default(),
            tail: TailSection::default(),
            view: ViewSection::default(),
            buffer: BufferSection::default(),
            export: ExportSection::default(),
            logs: default_catalog(),
        }
    }
}

impl Default for ServerSection {
    fn default() -> Self {
        let client = ClientConfig::default();
        Self {
            url: client.base_url,
            socket_path: client.socket_path,
            namespace: client.namespace,
            connect_timeout_secs: client.connect_timeout.map(|d| d.as_secs()).unwrap_or(0),
        }
    }
}

impl Default for EventsSection {
    fn default() -> Self {
        let names = EventNames::default();
        Self {
            start_tail: names.start_tail,
            stop_tail: names.stop_tail,
            log_line: names.log_line,
            tail_status: names.tail_status,
        }
    }
}

impl Default for ViewSection {
    fn default() -> Self {
        Self {
            window_threshold: DEFAULT_WINDOW_THRESHOLD,
            overscan: DEFAULT_OVERSCAN,
            follow: true,
        }
    }
}

impl AppConfig {
    /// Load from `path`, or from the platform config dir when no path is given
    ///
    /// An explicit path must exist; the platform file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::parse(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(content)?;
        if config.logs.is_empty() {
            config.logs = default_catalog();
        }
        Ok(config)
    }

    /// Connection settings for the session controller
    pub fn client_config(&self) -> ClientConfig {
        let connect_timeout = match self.server.connect_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        ClientConfig {
            base_url: self.server.url.clone(),
            socket_path: self.server.socket_path.clone(),
            namespace: self.server.namespace.clone(),
            connect_timeout,
            events: EventNames {
                start_tail: self.events.start_tail.clone(),
                stop_tail: self.events.stop_tail.clone(),
                log_line: self.events.log_line.clone(),
                tail_status: self.events.tail_status.clone(),
            },
        }
    }

    pub fn view_settings(&self) -> ViewSettings {
        ViewSettings {
            window_threshold: self.view.window_threshold.min(MAX_WINDOW_THRESHOLD),
            overscan: self.view.overscan,
            follow: self.view.follow,
        }
    }

    /// Buffer cap; `None` keeps every line
    pub fn buffer_capacity(&self) -> Option<usize> {
        self.buffer.max_lines.filter(|&n| n > 0)
    }

    pub fn export_dir(&self) -> PathBuf {
        self.export
            .directory
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

/// `<config dir>/hoihoi/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "hoihoi").map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}

/// Common CVM service logs
fn default_catalog() -> Vec<LogSource> {
    [
        ("genesis", "/home/nutanix/data/logs/genesis.out"),
        ("acropolis", "/home/nutanix/data/logs/acropolis.out"),
        ("prism_gateway", "/home/nutanix/data/logs/prism_gateway.log"),
        ("stargate", "/home/nutanix/data/logs/stargate.INFO"),
        ("cerebro", "/home/nutanix/data/logs/cerebro.INFO"),
        ("curator", "/home/nutanix/data/logs/curator.INFO"),
        ("cassandra", "/home/nutanix/data/logs/cassandra/system.log.INFO"),
        ("zookeeper", "/home/nutanix/data/logs/zookeeper.out"),
        ("uhura", "/home/nutanix/data/logs/uhura.out"),
        ("lazan", "/home/nutanix/data/logs/lazan.out"),
    ]
    .into_iter()
    .map(|(name, path)| LogSource::new(name, path))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = AppConfig::parse("").unwrap();
        let client = config.client_config();
        assert_eq!(client, ClientConfig::default());
        assert_eq!(config.view_settings(), ViewSettings::default());
        assert_eq!(config.buffer_capacity(), None);
        assert_eq!(config.export_dir(), PathBuf::from("."));
        assert!(config.logs.iter().any(|l| l.name == "genesis"));
    }

    #[test]
    fn test_full_config() {
        let config = AppConfig::parse(
            r#"
            [server]
            url = "https://hoihoi.example:7776"
            namespace = "tail"
            connect_timeout_secs = 0

            [events]
            start_tail = "start"
            log_line = "line"

            [tail]
            host = "10.0.0.5"
            log = "stargate"

            [view]
            window_threshold = 200
            overscan = 10
            follow = false

            [buffer]
            max_lines = 5000

            [export]
            directory = "/tmp/exports"

            [[logs]]
            name = "stargate"
            path = "/home/nutanix/data/logs/stargate.INFO"
            "#,
        )
        .unwrap();

        let client = config.client_config();
        assert_eq!(client.base_url, "https://hoihoi.example:7776");
        assert_eq!(client.namespace, "tail");
        assert_eq!(client.socket_path, "/socket.io/");
        assert_eq!(client.connect_timeout, None);
        assert_eq!(client.events.start_tail, "start");
        assert_eq!(client.events.stop_tail, "stop_tail_f");
        assert_eq!(client.events.log_line, "line");

        assert_eq!(config.tail.host.as_deref(), Some("10.0.0.5"));
        assert_eq!(config.tail.log.as_deref(), Some("stargate"));
        assert_eq!(config.view_settings().window_threshold, 200);
        assert!(!config.view_settings().follow);
        assert_eq!(config.buffer_capacity(), Some(5000));
        assert_eq!(config.export_dir(), PathBuf::from("/tmp/exports"));
        assert_eq!(config.logs.len(), 1);
    }

    #[test]
    fn test_zero_max_lines_is_unbounded() {
        let config = AppConfig::parse("[buffer]\nmax_lines = 0\n").unwrap();
        assert_eq!(config.buffer_capacity(), None);
    }

    #[test]
    fn test_window_threshold_is_clamped() {
        let config = AppConfig::parse("[view]\nwindow_threshold = 1000000\n").unwrap();
        assert_eq!(config.view_settings().window_threshold, MAX_WINDOW_THRESHOLD);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let path = std::env::temp_dir().join("hoihoi-missing-config-for-test.toml");
        assert!(AppConfig::load(Some(&path)).is_err());
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        assert!(AppConfig::parse("[server\nurl = 1").is_err());
    }
}
