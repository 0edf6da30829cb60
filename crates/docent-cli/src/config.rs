//! Configuration Vault – reads/writes `~/.docent/config.toml`.
//!
//! Every field has a default, so a partial file (or none at all) is fine.
//! `DOCENT_*` environment variables override the file after loading.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use docent_runtime::catalog::Catalog;
use docent_runtime::dialogue::DialogueConfig;
use docent_runtime::tour::TourConfig;
use docent_types::{Exhibit, TourError};
use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Sections
// ─────────────────────────────────────────────────────────────────────────────

/// Where the two backend services live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Host the tour connects to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Interface `docent serve` binds to.
    #[serde(default = "default_bind_host")]
    pub bind_host: String,
    #[serde(default = "default_detection_port")]
    pub detection_port: u16,
    #[serde(default = "default_audio_port")]
    pub audio_port: u16,
}

/// Dialogue model endpoint and sampling parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogueSection {
    #[serde(default = "default_llm_url")]
    pub llm_url: String,
    #[serde(default = "default_n_predict")]
    pub n_predict: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_top_k")]
    pub top_k: u32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
}

/// Tour timing and robustness knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TourSection {
    #[serde(default = "default_scan_settle_ms")]
    pub scan_settle_ms: u64,
    #[serde(default = "default_monitor_interval_ms")]
    pub monitor_interval_ms: u64,
    #[serde(default = "default_interaction_timeout_secs")]
    pub interaction_timeout_secs: u64,
    /// `0` disables the cap.
    #[serde(default = "default_max_empty_scans")]
    pub max_empty_scans: usize,
    #[serde(default = "default_face_visitor_turn")]
    pub face_visitor_turn: f32,
    #[serde(default = "default_prefer_unvisited")]
    pub prefer_unvisited: bool,
}

/// Persisted configuration stored in `~/.docent/config.toml`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Config {
    /// Tour journal file.  Defaults to `journal.ndjson` next to the config.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub journal_path: Option<PathBuf>,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub dialogue: DialogueSection,
    #[serde(default)]
    pub tour: TourSection,
    /// Replaces the built-in catalog when non-empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exhibits: Vec<Exhibit>,
}

fn default_host() -> String {
    "localhost".to_string()
}
fn default_bind_host() -> String {
    "0.0.0.0".to_string()
}
fn default_detection_port() -> u16 {
    5001
}
fn default_audio_port() -> u16 {
    5002
}
fn default_llm_url() -> String {
    "http://localhost:8080/completion".to_string()
}
fn default_n_predict() -> u32 {
    250
}
fn default_temperature() -> f32 {
    0.7
}
fn default_top_k() -> u32 {
    10
}
fn default_top_p() -> f32 {
    0.8
}
fn default_scan_settle_ms() -> u64 {
    1500
}
fn default_monitor_interval_ms() -> u64 {
    5000
}
fn default_interaction_timeout_secs() -> u64 {
    600
}
fn default_max_empty_scans() -> usize {
    20
}
fn default_face_visitor_turn() -> f32 {
    2.5
}
fn default_prefer_unvisited() -> bool {
    true
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            bind_host: default_bind_host(),
            detection_port: default_detection_port(),
            audio_port: default_audio_port(),
        }
    }
}

impl Default for DialogueSection {
    fn default() -> Self {
        Self {
            llm_url: default_llm_url(),
            n_predict: default_n_predict(),
            temperature: default_temperature(),
            top_k: default_top_k(),
            top_p: default_top_p(),
        }
    }
}

impl Default for TourSection {
    fn default() -> Self {
        Self {
            scan_settle_ms: default_scan_settle_ms(),
            monitor_interval_ms: default_monitor_interval_ms(),
            interaction_timeout_secs: default_interaction_timeout_secs(),
            max_empty_scans: default_max_empty_scans(),
            face_visitor_turn: default_face_visitor_turn(),
            prefer_unvisited: default_prefer_unvisited(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Runtime views
// ─────────────────────────────────────────────────────────────────────────────

impl Config {
    pub fn occupancy_addr(&self) -> String {
        format!("{}:{}", self.network.host, self.network.detection_port)
    }

    pub fn transcription_addr(&self) -> String {
        format!("{}:{}", self.network.host, self.network.audio_port)
    }

    pub fn occupancy_bind_addr(&self) -> String {
        format!("{}:{}", self.network.bind_host, self.network.detection_port)
    }

    pub fn transcription_bind_addr(&self) -> String {
        format!("{}:{}", self.network.bind_host, self.network.audio_port)
    }

    /// The configured catalog, or the built-in gallery when none is set.
    pub fn catalog(&self) -> Result<Catalog, TourError> {
        if self.exhibits.is_empty() {
            Ok(Catalog::museum_default())
        } else {
            Catalog::new(self.exhibits.clone())
        }
    }

    pub fn dialogue_config(&self) -> DialogueConfig {
        DialogueConfig {
            url: self.dialogue.llm_url.clone(),
            n_predict: self.dialogue.n_predict,
            temperature: self.dialogue.temperature,
            top_k: self.dialogue.top_k,
            top_p: self.dialogue.top_p,
            ..DialogueConfig::default()
        }
    }

    pub fn tour_config(&self) -> TourConfig {
        let t = &self.tour;
        let mut cfg = TourConfig {
            face_visitor_turn: t.face_visitor_turn,
            max_empty_scans: (t.max_empty_scans > 0).then_some(t.max_empty_scans),
            ..TourConfig::default()
        };
        cfg.scan.settle = Duration::from_millis(t.scan_settle_ms);
        cfg.scan.prefer_unvisited = t.prefer_unvisited;
        cfg.interaction.timeout = Duration::from_secs(t.interaction_timeout_secs);
        cfg.interaction.monitor.interval = Duration::from_millis(t.monitor_interval_ms);
        cfg
    }

    /// Journal location: the configured path, else next to `config_file`.
    pub fn journal_path(&self, config_file: &Path) -> PathBuf {
        self.journal_path.clone().unwrap_or_else(|| {
            config_file
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join("journal.ndjson")
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Load / save
// ─────────────────────────────────────────────────────────────────────────────

/// Return the path to `~/.docent/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".docent").join("config.toml")
}

/// Load the config from `path`, then apply env overrides.  Returns `None`
/// if the file does not exist.
pub fn load_from(path: &Path) -> Result<Option<Config>, TourError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|e| {
        TourError::Config(format!("failed to read config at {}: {e}", path.display()))
    })?;
    let mut cfg: Config = toml::from_str(&raw)
        .map_err(|e| TourError::Config(format!("failed to parse config: {e}")))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `DOCENT_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `DOCENT_HOST` | `network.host` |
/// | `DOCENT_DETECTION_PORT` | `network.detection_port` |
/// | `DOCENT_AUDIO_PORT` | `network.audio_port` |
/// | `DOCENT_LLM_URL` | `dialogue.llm_url` |
///
/// Unparseable port values are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("DOCENT_HOST") {
        cfg.network.host = v;
    }
    if let Ok(v) = std::env::var("DOCENT_DETECTION_PORT")
        && let Ok(port) = v.parse::<u16>()
    {
        cfg.network.detection_port = port;
    }
    if let Ok(v) = std::env::var("DOCENT_AUDIO_PORT")
        && let Ok(port) = v.parse::<u16>()
    {
        cfg.network.audio_port = port;
    }
    if let Ok(v) = std::env::var("DOCENT_LLM_URL") {
        cfg.dialogue.llm_url = v;
    }
}

/// Save the config to `path`, creating the directory if necessary.
pub fn save_to(cfg: &Config, path: &Path) -> Result<(), TourError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            TourError::Config(format!("failed to create config directory: {e}"))
        })?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700)).map_err(|e| {
                TourError::Config(format!("failed to set config directory permissions: {e}"))
            })?;
        }
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| TourError::Config(format!("failed to serialize config: {e}")))?;
    fs::write(path, raw).map_err(|e| {
        TourError::Config(format!("failed to write config at {}: {e}", path.display()))
    })
}
