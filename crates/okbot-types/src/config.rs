//! Static robot configuration: wake phrases, thresholds, speeds, and
//! collaborator settings.
//!
//! Every field has a serde default, so a partial (or empty) TOML document
//! deserializes into a fully populated [`RobotConfig`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::RobotError;

/// Supported chat back-ends. All of them speak the OpenAI chat-completions
/// wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    OpenAI,
    Gemini,
    DeepSeek,
    Doubao,
    Qwen,
    Grok,
    Ollama,
}

impl std::fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LlmProvider::OpenAI => "openai",
            LlmProvider::Gemini => "gemini",
            LlmProvider::DeepSeek => "deepseek",
            LlmProvider::Doubao => "doubao",
            LlmProvider::Qwen => "qwen",
            LlmProvider::Grok => "grok",
            LlmProvider::Ollama => "ollama",
        };
        write!(f, "{name}")
    }
}

impl std::str::FromStr for LlmProvider {
    type Err = RobotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(LlmProvider::OpenAI),
            "gemini" => Ok(LlmProvider::Gemini),
            "deepseek" => Ok(LlmProvider::DeepSeek),
            "doubao" => Ok(LlmProvider::Doubao),
            "qwen" => Ok(LlmProvider::Qwen),
            "grok" => Ok(LlmProvider::Grok),
            "ollama" => Ok(LlmProvider::Ollama),
            other => Err(RobotError::Config(format!("unknown LLM provider '{other}'"))),
        }
    }
}

/// Optional generative-dialogue settings.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub provider: LlmProvider,

    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Overrides the provider's default endpoint when non-empty.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub base_url: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_key: String,
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("enabled", &self.enabled)
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field(
                "api_key",
                if self.api_key.is_empty() { &"<not set>" } else { &"<redacted>" },
            )
            .finish()
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: LlmProvider::default(),
            model: default_llm_model(),
            base_url: String::new(),
            api_key: String::new(),
        }
    }
}

/// Sound-effect files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoundConfig {
    #[serde(default = "default_sound_dir")]
    pub sound_dir: String,
    #[serde(default = "default_horn")]
    pub horn: String,
    #[serde(default = "default_engine")]
    pub engine: String,
}

impl Default for SoundConfig {
    fn default() -> Self {
        Self {
            sound_dir: default_sound_dir(),
            horn: default_horn(),
            engine: default_engine(),
        }
    }
}

/// Everything the robot needs to know at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotConfig {
    #[serde(default = "default_robot_name")]
    pub robot_name: String,

    #[serde(default = "default_wake_words")]
    pub wake_words: Vec<String>,

    /// When false the robot starts awake and never times out to sleep.
    #[serde(default = "default_true")]
    pub wake_enabled: bool,

    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,

    /// Ask the recogniser for streaming partial results.
    #[serde(default)]
    pub stt_stream: bool,

    #[serde(default = "default_move_speed")]
    pub move_speed: u8,

    #[serde(default = "default_move_duration_ms")]
    pub move_duration_ms: u64,

    #[serde(default = "default_turn_angle")]
    pub turn_angle: i32,

    #[serde(default = "default_true")]
    pub obstacle_avoidance_enabled: bool,

    /// Centimetres; no reaction needed at or beyond this distance.
    #[serde(default = "default_safe_distance")]
    pub safe_distance: f32,

    /// Centimetres; steer away below this distance.
    #[serde(default = "default_danger_distance")]
    pub danger_distance: f32,

    /// Centimetres; emergency backoff below this distance.
    #[serde(default = "default_too_close_distance")]
    pub too_close_distance: f32,

    #[serde(default = "default_true")]
    pub cliff_detection_enabled: bool,

    #[serde(default = "default_cliff_reference")]
    pub cliff_reference: [u16; 3],

    #[serde(default = "default_line_track_speed")]
    pub line_track_speed: u8,

    #[serde(default = "default_line_track_offset")]
    pub line_track_offset: i32,

    #[serde(default = "default_true")]
    pub keyboard_enabled: bool,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub sound: SoundConfig,
}

impl RobotConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn move_duration(&self) -> Duration {
        Duration::from_millis(self.move_duration_ms)
    }

    /// Reject threshold combinations the safety logic cannot interpret.
    ///
    /// # Errors
    ///
    /// Returns [`RobotError::Config`] unless
    /// `0 < too_close_distance < danger_distance < safe_distance`, the wake
    /// phrase list is non-empty while wake is enabled, and speeds are ≤ 100.
    pub fn validate(&self) -> Result<(), RobotError> {
        if !(self.too_close_distance > 0.0
            && self.too_close_distance < self.danger_distance
            && self.danger_distance < self.safe_distance)
        {
            return Err(RobotError::Config(format!(
                "distance thresholds must satisfy 0 < too_close ({}) < danger ({}) < safe ({})",
                self.too_close_distance, self.danger_distance, self.safe_distance
            )));
        }
        if self.wake_enabled && self.wake_words.iter().all(|w| w.trim().is_empty()) {
            return Err(RobotError::Config(
                "wake is enabled but no wake words are configured".to_string(),
            ));
        }
        if self.move_speed > 100 || self.line_track_speed > 100 {
            return Err(RobotError::Config("speeds must be within 0-100".to_string()));
        }
        Ok(())
    }
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            robot_name: default_robot_name(),
            wake_words: default_wake_words(),
            wake_enabled: true,
            command_timeout_secs: default_command_timeout(),
            stt_stream: false,
            move_speed: default_move_speed(),
            move_duration_ms: default_move_duration_ms(),
            turn_angle: default_turn_angle(),
            obstacle_avoidance_enabled: true,
            safe_distance: default_safe_distance(),
            danger_distance: default_danger_distance(),
            too_close_distance: default_too_close_distance(),
            cliff_detection_enabled: true,
            cliff_reference: default_cliff_reference(),
            line_track_speed: default_line_track_speed(),
            line_track_offset: default_line_track_offset(),
            keyboard_enabled: true,
            llm: LlmConfig::default(),
            sound: SoundConfig::default(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_robot_name() -> String {
    "Robot".to_string()
}
fn default_wake_words() -> Vec<String> {
    vec![
        "okay robot".to_string(),
        "ok robot".to_string(),
        "hey robot".to_string(),
    ]
}
fn default_command_timeout() -> u64 {
    30
}
fn default_move_speed() -> u8 {
    30
}
fn default_move_duration_ms() -> u64 {
    1000
}
fn default_turn_angle() -> i32 {
    25
}
fn default_safe_distance() -> f32 {
    40.0
}
fn default_danger_distance() -> f32 {
    20.0
}
fn default_too_close_distance() -> f32 {
    10.0
}
fn default_cliff_reference() -> [u16; 3] {
    [200, 200, 200]
}
fn default_line_track_speed() -> u8 {
    10
}
fn default_line_track_offset() -> i32 {
    20
}
fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_sound_dir() -> String {
    "/home/pi/picar-x/sounds".to_string()
}
fn default_horn() -> String {
    "car-double-horn.wav".to_string()
}
fn default_engine() -> String {
    "car-start-engine.wav".to_string()
}
