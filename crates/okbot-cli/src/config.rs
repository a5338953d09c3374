//! Configuration file – reads/writes `~/.okbot/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use okbot_types::{LlmProvider, RobotConfig};
use zeroize::Zeroize;

/// Return the path to `~/.okbot/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".okbot").join("config.toml")
}

/// Load the config from disk with environment overrides applied. A missing
/// file yields the defaults.
pub fn load() -> Result<RobotConfig, String> {
    let mut cfg = load_from(&config_path())?.unwrap_or_default();
    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

/// Load the config from a specific path. Returns `None` if the file does not
/// exist.
pub(crate) fn load_from(path: &Path) -> Result<Option<RobotConfig>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let mut raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let parsed = toml::from_str::<RobotConfig>(&raw);
    // The file may hold an API key.
    raw.zeroize();
    parsed
        .map(Some)
        .map_err(|e| format!("Failed to parse config: {}", e))
}

/// Apply `OKBOT_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `OKBOT_ROBOT_NAME` | `robot_name` |
/// | `OKBOT_WAKE_WORDS` | `wake_words` (comma separated) |
/// | `OKBOT_WAKE_ENABLED` | `wake_enabled` |
/// | `OKBOT_COMMAND_TIMEOUT` | `command_timeout_secs` |
/// | `OKBOT_MOVE_SPEED` | `move_speed` |
/// | `OKBOT_SOUND_DIR` | `sound.sound_dir` |
/// | `OKBOT_LLM_PROVIDER` | `llm.provider` (also enables the LLM) |
/// | `OKBOT_LLM_MODEL` | `llm.model` |
/// | `OKBOT_LLM_BASE_URL` | `llm.base_url` |
/// | `OKBOT_LLM_API_KEY` | `llm.api_key` |
///
/// Unparseable values are ignored.
pub fn apply_env_overrides(cfg: &mut RobotConfig) {
    if let Ok(v) = std::env::var("OKBOT_ROBOT_NAME") {
        cfg.robot_name = v;
    }
    if let Ok(v) = std::env::var("OKBOT_WAKE_WORDS") {
        cfg.wake_words = v
            .split(',')
            .map(|w| w.trim().to_string())
            .filter(|w| !w.is_empty())
            .collect();
    }
    if let Ok(v) = std::env::var("OKBOT_WAKE_ENABLED")
        && let Ok(enabled) = v.parse::<bool>()
    {
        cfg.wake_enabled = enabled;
    }
    if let Ok(v) = std::env::var("OKBOT_COMMAND_TIMEOUT")
        && let Ok(secs) = v.parse::<u64>()
    {
        cfg.command_timeout_secs = secs;
    }
    if let Ok(v) = std::env::var("OKBOT_MOVE_SPEED")
        && let Ok(speed) = v.parse::<u8>()
    {
        cfg.move_speed = speed;
    }
    if let Ok(v) = std::env::var("OKBOT_SOUND_DIR") {
        cfg.sound.sound_dir = v;
    }
    if let Ok(v) = std::env::var("OKBOT_LLM_PROVIDER")
        && let Ok(provider) = v.parse::<LlmProvider>()
    {
        cfg.llm.provider = provider;
        cfg.llm.enabled = true;
    }
    if let Ok(v) = std::env::var("OKBOT_LLM_MODEL") {
        cfg.llm.model = v;
    }
    if let Ok(v) = std::env::var("OKBOT_LLM_BASE_URL") {
        cfg.llm.base_url = v;
    }
    if let Ok(v) = std::env::var("OKBOT_LLM_API_KEY") {
        cfg.llm.api_key = v;
    }
}

/// Save the config to disk, creating `~/.okbot/` if necessary.
pub fn save(cfg: &RobotConfig) -> Result<(), String> {
    save_to(cfg, &config_path())
}

/// Save the config to a specific path.
pub(crate) fn save_to(cfg: &RobotConfig, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let mut raw = toml::to_string_pretty(cfg)
        .map_err(|e| format!("Failed to serialize config: {}", e))?;
    #[cfg(unix)]
    let written = {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| f.write_all(raw.as_bytes()))
    };
    #[cfg(not(unix))]
    let written = fs::write(path, &raw);
    raw.zeroize();
    written.map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn config_file_has_restrictive_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        save_to(&RobotConfig::default(), &path).expect("save");

        let file_mode = std::fs::metadata(&path).expect("file metadata").permissions().mode() & 0o777;
        assert_eq!(file_mode, 0o600, "config file must have 0o600 permissions");

        let dir_meta = std::fs::metadata(path.parent().unwrap()).expect("dir metadata");
        assert_eq!(dir_meta.permissions().mode() & 0o777, 0o700);
    }

    #[test]
    fn roundtrip_preserves_settings() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        let mut cfg = RobotConfig::default();
        cfg.robot_name = "Picar".to_string();
        cfg.llm.enabled = true;
        cfg.llm.provider = LlmProvider::DeepSeek;
        cfg.llm.api_key = "sk-test".to_string();
        save_to(&cfg, &path).expect("save");

        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "robot_name = \"Zippy\"\nmove_speed = 50\n").unwrap();

        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded.robot_name, "Zippy");
        assert_eq!(loaded.move_speed, 50);
        assert_eq!(loaded.wake_words, RobotConfig::default().wake_words);
        assert_eq!(loaded.too_close_distance, 10.0);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "move_speed = \"fast\"").unwrap();
        let err = load_from(&path).unwrap_err();
        assert!(err.starts_with("Failed to parse config"));
    }

    #[test]
    fn config_path_points_to_okbot_dir() {
        let p = config_path_for_home("/home/testuser");
        assert!(p.to_string_lossy().contains(".okbot"));
        assert!(p.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        assert!(load_from(&path).expect("no error").is_none());
    }

    #[test]
    fn apply_env_overrides_splits_wake_words() {
        // SAFETY: no other test reads this variable.
        unsafe { std::env::set_var("OKBOT_WAKE_WORDS", "hey picar, ,picar") };
        let mut cfg = RobotConfig::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.wake_words, vec!["hey picar", "picar"]);
        unsafe { std::env::remove_var("OKBOT_WAKE_WORDS") };
    }

    #[test]
    fn apply_env_overrides_enables_llm_provider() {
        // SAFETY: no other test reads this variable.
        unsafe { std::env::set_var("OKBOT_LLM_PROVIDER", "ollama") };
        let mut cfg = RobotConfig::default();
        apply_env_overrides(&mut cfg);
        assert!(cfg.llm.enabled);
        assert_eq!(cfg.llm.provider, LlmProvider::Ollama);
        unsafe { std::env::remove_var("OKBOT_LLM_PROVIDER") };
    }

    #[test]
    fn apply_env_overrides_ignores_invalid_timeout() {
        // SAFETY: no other test reads this variable.
        unsafe { std::env::set_var("OKBOT_COMMAND_TIMEOUT", "soon") };
        let mut cfg = RobotConfig::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.command_timeout_secs, 30);
        unsafe { std::env::remove_var("OKBOT_COMMAND_TIMEOUT") };
    }
}
