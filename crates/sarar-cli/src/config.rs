//! Configuration Vault – reads/writes `~/.sarar/config.toml`.
//!
//! Every field has a default, so a partial file (or none at all) is valid.
//! `SARAR_CONFIG` points the CLI at a different file.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use sarar_hal::Platform;
use sarar_types::RobotError;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

// ─────────────────────────────────────────────────────────────────────────────
// Secrets
// ─────────────────────────────────────────────────────────────────────────────

/// An API key.  Wiped from memory on drop and never printed by `Debug`.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.is_empty() { "<not set>" } else { "<redacted>" })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Sections
// ─────────────────────────────────────────────────────────────────────────────

/// `[ai]` – backends and conversation memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiSection {
    /// Primary backend key.  The primary backend is enabled only when set.
    #[serde(default, skip_serializing_if = "ApiKey::is_empty")]
    pub openai_api_key: ApiKey,

    /// Base URL of the OpenAI-compatible API, including `/v1`.
    #[serde(default = "default_openai_api_base")]
    pub openai_api_base: String,

    /// Model used until auto-selection picks one.
    #[serde(default = "default_openai_model")]
    pub openai_model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Ollama server on the robot.
    #[serde(default = "default_local_url")]
    pub local_url: String,

    /// Local model name.  Empty disables the fallback backend.
    #[serde(default = "default_local_model")]
    pub local_model: String,

    /// Context window passed to the local engine.
    #[serde(default = "default_max_context_length")]
    pub max_context_length: u32,

    /// User/assistant pairs kept in memory.
    #[serde(default = "default_max_exchanges")]
    pub max_exchanges: usize,
}

/// Which voice speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceKind {
    #[default]
    Console,
    Piper,
}

/// `[audio]` – speech output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioSection {
    #[serde(default)]
    pub voice: VoiceKind,

    /// Piper voice name; the model is `{voices_directory}/{piper_voice}.onnx`.
    #[serde(default = "default_piper_voice")]
    pub piper_voice: String,

    #[serde(default = "default_voices_directory")]
    pub voices_directory: String,

    /// WAV player program.
    #[serde(default = "default_player")]
    pub player: String,
}

/// `[hardware]` – drive base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HardwareSection {
    #[serde(default)]
    pub platform: Platform,

    /// Forward/backward run time in seconds.
    #[serde(default = "default_move_duration")]
    pub move_duration_secs: f32,

    /// Turn angle in degrees.
    #[serde(default = "default_turn_angle")]
    pub turn_angle: f32,
}

/// Face renderer choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FaceKind {
    #[default]
    Terminal,
    Headless,
}

/// `[display]` – face.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DisplaySection {
    #[serde(default)]
    pub renderer: FaceKind,
}

/// `[logging]` – journal and tracing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSection {
    /// SQLite journal file.  Empty means `~/.sarar/journal.db`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub journal_path: String,

    /// Rows kept per journal table.
    #[serde(default = "default_max_log_entries")]
    pub max_log_entries: usize,

    /// `"compact"` or `"json"`.
    #[serde(default = "default_log_format")]
    pub format: String,

    /// OTLP/HTTP collector URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub otlp_endpoint: Option<String>,
}

/// Persisted robot configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ai: AiSection,
    #[serde(default)]
    pub audio: AudioSection,
    #[serde(default)]
    pub hardware: HardwareSection,
    #[serde(default)]
    pub display: DisplaySection,
    #[serde(default)]
    pub logging: LoggingSection,
}

fn default_openai_api_base() -> String {
    "http://localhost:5001/v1".to_string()
}
fn default_openai_model() -> String {
    "gpt-3.5-turbo".to_string()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_local_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_local_model() -> String {
    "phi3".to_string()
}
fn default_max_context_length() -> u32 {
    4096
}
fn default_max_exchanges() -> usize {
    sarar_runtime::DEFAULT_MAX_EXCHANGES
}
fn default_piper_voice() -> String {
    "en_US-amy-medium".to_string()
}
fn default_voices_directory() -> String {
    "voices".to_string()
}
fn default_player() -> String {
    "aplay".to_string()
}
fn default_move_duration() -> f32 {
    2.0
}
fn default_turn_angle() -> f32 {
    90.0
}
fn default_max_log_entries() -> usize {
    sarar_journal::DEFAULT_MAX_ENTRIES
}
fn default_log_format() -> String {
    "compact".to_string()
}

impl Default for AiSection {
    fn default() -> Self {
        Self {
            openai_api_key: ApiKey::default(),
            openai_api_base: default_openai_api_base(),
            openai_model: default_openai_model(),
            temperature: default_temperature(),
            local_url: default_local_url(),
            local_model: default_local_model(),
            max_context_length: default_max_context_length(),
            max_exchanges: default_max_exchanges(),
        }
    }
}

impl Default for AudioSection {
    fn default() -> Self {
        Self {
            voice: VoiceKind::default(),
            piper_voice: default_piper_voice(),
            voices_directory: default_voices_directory(),
            player: default_player(),
        }
    }
}

impl Default for HardwareSection {
    fn default() -> Self {
        Self {
            platform: Platform::default(),
            move_duration_secs: default_move_duration(),
            turn_angle: default_turn_angle(),
        }
    }
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            journal_path: String::new(),
            max_log_entries: default_max_log_entries(),
            format: default_log_format(),
            otlp_endpoint: None,
        }
    }
}

impl AudioSection {
    pub fn voice_model_path(&self) -> PathBuf {
        PathBuf::from(&self.voices_directory).join(format!("{}.onnx", self.piper_voice))
    }
}

impl HardwareSection {
    /// Negative or non-finite values fall back to the default.
    pub fn move_duration(&self) -> Duration {
        Duration::try_from_secs_f32(self.move_duration_secs)
            .unwrap_or_else(|_| Duration::from_secs_f32(default_move_duration()))
    }

    /// Turn angle in degrees.  Values outside (0, 360] or non-finite fall
    /// back to the default.
    pub fn turn_angle(&self) -> f32 {
        if self.turn_angle.is_finite() && self.turn_angle > 0.0 && self.turn_angle <= 360.0 {
            self.turn_angle
        } else {
            default_turn_angle()
        }
    }
}

impl Config {
    /// Journal file, resolved against the config directory when unset.
    pub fn journal_path(&self, home: &str) -> PathBuf {
        if self.logging.journal_path.is_empty() {
            sarar_dir_for_home(home).join("journal.db")
        } else {
            PathBuf::from(&self.logging.journal_path)
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Paths
// ─────────────────────────────────────────────────────────────────────────────

pub fn home_dir() -> String {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string())
}

/// `$SARAR_CONFIG`, else `~/.sarar/config.toml`.
pub fn config_path() -> PathBuf {
    match std::env::var("SARAR_CONFIG") {
        Ok(p) if !p.is_empty() => PathBuf::from(p),
        _ => config_path_for_home(&home_dir()),
    }
}

pub(crate) fn sarar_dir_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".sarar")
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    sarar_dir_for_home(home).join("config.toml")
}

// ─────────────────────────────────────────────────────────────────────────────
// Load / save
// ─────────────────────────────────────────────────────────────────────────────

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, RobotError> {
    load_from(&config_path())
}

pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, RobotError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|e| {
        RobotError::Configuration(format!("failed to read config at {}: {e}", path.display()))
    })?;
    let mut cfg: Config = toml::from_str(&raw)
        .map_err(|e| RobotError::Configuration(format!("failed to parse config: {e}")))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `SARAR_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `SARAR_OPENAI_API_BASE` | `ai.openai_api_base` |
/// | `SARAR_OPENAI_API_KEY` | `ai.openai_api_key` |
/// | `SARAR_OPENAI_MODEL` | `ai.openai_model` |
/// | `SARAR_LOCAL_URL` | `ai.local_url` |
/// | `SARAR_LOCAL_MODEL` | `ai.local_model` |
/// | `SARAR_PLATFORM` | `hardware.platform` |
/// | `SARAR_LOG_FORMAT` | `logging.format` |
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("SARAR_OPENAI_API_BASE") {
        cfg.ai.openai_api_base = v;
    }
    if let Ok(v) = std::env::var("SARAR_OPENAI_API_KEY") {
        cfg.ai.openai_api_key = ApiKey::new(v);
    }
    if let Ok(v) = std::env::var("SARAR_OPENAI_MODEL") {
        cfg.ai.openai_model = v;
    }
    if let Ok(v) = std::env::var("SARAR_LOCAL_URL") {
        cfg.ai.local_url = v;
    }
    if let Ok(v) = std::env::var("SARAR_LOCAL_MODEL") {
        cfg.ai.local_model = v;
    }
    if let Ok(v) = std::env::var("SARAR_PLATFORM")
        && let Ok(platform) = v.parse::<Platform>()
    {
        cfg.hardware.platform = platform;
    }
    if let Ok(v) = std::env::var("SARAR_LOG_FORMAT") {
        cfg.logging.format = v;
    }
}

/// Save the config to disk, creating the directory if necessary.
pub fn save(cfg: &Config) -> Result<(), RobotError> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), RobotError> {
    let io_err = |what: &str, e: std::io::Error| {
        RobotError::Configuration(format!("{what} {}: {e}", path.display()))
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| io_err("failed to create directory for", e))?;
        // Owner-only directory (rwx------) on Unix.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| io_err("failed to restrict directory for", e))?;
        }
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| RobotError::Configuration(format!("failed to serialize config: {e}")))?;
    // Owner-only file (rw-------) on Unix; it may hold an API key.
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(raw.as_bytes())
            })
            .map_err(|e| io_err("failed to write config at", e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw).map_err(|e| io_err("failed to write config at", e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_robot_profile() {
        let cfg = Config::default();
        assert_eq!(cfg.ai.openai_api_base, "http://localhost:5001/v1");
        assert_eq!(cfg.ai.openai_model, "gpt-3.5-turbo");
        assert_eq!(cfg.ai.max_context_length, 4096);
        assert_eq!(cfg.ai.max_exchanges, 10);
        assert!((cfg.ai.temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(cfg.hardware.platform, Platform::Simulation);
        assert_eq!(cfg.hardware.move_duration(), Duration::from_secs(2));
        assert_eq!(cfg.logging.max_log_entries, 1000);
    }

    #[test]
    fn config_debug_redacts_api_key() {
        let mut cfg = Config::default();
        cfg.ai.openai_api_key = ApiKey::new("sk-super-secret");
        let debug_str = format!("{cfg:?}");
        assert!(!debug_str.contains("sk-super-secret"), "key must not appear in debug output");
        assert!(debug_str.contains("<redacted>"));
    }

    #[test]
    fn config_debug_shows_not_set_for_empty_key() {
        let debug_str = format!("{:?}", Config::default());
        assert!(debug_str.contains("<not set>"));
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            [ai]
            openai_model = "mistral"

            [hardware]
            platform = "raspberry_pi"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.ai.openai_model, "mistral");
        assert_eq!(cfg.ai.local_url, "http://localhost:11434");
        assert_eq!(cfg.hardware.platform, Platform::RaspberryPi);
        assert!((cfg.hardware.turn_angle - 90.0).abs() < f32::EPSILON);
        assert_eq!(cfg.audio.voice, VoiceKind::Console);
    }

    #[test]
    fn negative_duration_falls_back_to_default() {
        let hw = HardwareSection {
            move_duration_secs: -1.0,
            ..HardwareSection::default()
        };
        assert_eq!(hw.move_duration(), Duration::from_secs(2));
    }

    #[test]
    fn unusable_turn_angle_falls_back_to_default() {
        let cfg: Config = toml::from_str("[hardware]\nturn_angle = inf").unwrap();
        assert!((cfg.hardware.turn_angle() - 90.0).abs() < f32::EPSILON);

        let cfg: Config = toml::from_str("[hardware]\nturn_angle = nan").unwrap();
        assert!((cfg.hardware.turn_angle() - 90.0).abs() < f32::EPSILON);

        let hw = HardwareSection {
            turn_angle: -45.0,
            ..HardwareSection::default()
        };
        assert!((hw.turn_angle() - 90.0).abs() < f32::EPSILON);

        let hw = HardwareSection {
            turn_angle: 45.0,
            ..HardwareSection::default()
        };
        assert!((hw.turn_angle() - 45.0).abs() < f32::EPSILON);
    }

    #[test]
    fn voice_model_path_joins_directory_and_name() {
        let audio = AudioSection::default();
        assert_eq!(
            audio.voice_model_path(),
            PathBuf::from("voices").join("en_US-amy-medium.onnx")
        );
    }

    #[test]
    fn journal_defaults_next_to_config() {
        let cfg = Config::default();
        assert_eq!(
            cfg.journal_path("/home/robot"),
            PathBuf::from("/home/robot/.sarar/journal.db")
        );
    }

    #[cfg(unix)]
    #[test]
    fn config_file_has_restrictive_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        save_to(&Config::default(), &path).expect("save");

        let file_mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(file_mode, 0o600, "config file must have 0o600 permissions");
        let dir_mode = std::fs::metadata(path.parent().unwrap()).unwrap().permissions().mode() & 0o777;
        assert_eq!(dir_mode, 0o700, "config directory must have 0o700 permissions");
    }

    #[test]
    fn roundtrip_keeps_key_and_sections() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        let mut cfg = Config::default();
        cfg.ai.openai_api_key = ApiKey::new("sk-test");
        cfg.display.renderer = FaceKind::Headless;
        save_to(&cfg, &path).expect("save");

        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded.ai.openai_api_key.expose(), "sk-test");
        assert_eq!(loaded.display.renderer, FaceKind::Headless);
    }

    #[test]
    fn empty_key_is_not_written() {
        let raw = toml::to_string_pretty(&Config::default()).unwrap();
        assert!(!raw.contains("openai_api_key"));
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        assert!(load_from(&path).expect("no error").is_none());
    }

    #[test]
    fn malformed_file_is_a_configuration_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[ai\nbroken").unwrap();
        assert!(matches!(load_from(&path), Err(RobotError::Configuration(_))));
    }

    #[test]
    fn config_path_points_to_sarar_dir() {
        let p = config_path_for_home("/home/testuser");
        assert!(p.to_string_lossy().contains(".sarar"));
        assert!(p.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn apply_env_overrides_changes_local_model() {
        // SAFETY: only this test reads or writes this variable.
        unsafe { std::env::set_var("SARAR_LOCAL_MODEL", "tinyllama") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.ai.local_model, "tinyllama");
        unsafe { std::env::remove_var("SARAR_LOCAL_MODEL") };
    }

    #[test]
    fn apply_env_overrides_sets_api_key() {
        // SAFETY: only this test reads or writes this variable.
        unsafe { std::env::set_var("SARAR_OPENAI_API_KEY", "sk-from-env") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.ai.openai_api_key.expose(), "sk-from-env");
        unsafe { std::env::remove_var("SARAR_OPENAI_API_KEY") };
    }

    #[test]
    fn apply_env_overrides_ignores_unknown_platform() {
        // SAFETY: only this test reads or writes this variable.
        unsafe { std::env::set_var("SARAR_PLATFORM", "arduino") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.hardware.platform, Platform::Simulation);
        unsafe { std::env::remove_var("SARAR_PLATFORM") };
    }
}
