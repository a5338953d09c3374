//! In-crate fakes shared by the runtime's unit tests.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use okbot_hal::SimCar;
use okbot_types::RobotConfig;

use crate::chat::{ChatError, ChatProvider};
use crate::robot::Robot;
use crate::speech::{SoundPlayer, SpeechError, SpeechOutput};

#[derive(Default)]
pub struct RecordingSpeaker {
    lines: Mutex<Vec<String>>,
    failing: Mutex<bool>,
}

impl RecordingSpeaker {
    pub fn fail(&self, fail: bool) {
        *self.failing.lock().unwrap() = fail;
    }
}

#[async_trait]
impl SpeechOutput for RecordingSpeaker {
    async fn speak(&self, text: &str) -> Result<(), SpeechError> {
        if *self.failing.lock().unwrap() {
            return Err(SpeechError::Io("speaker unplugged".into()));
        }
        self.lines.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingSounds {
    played: Mutex<Vec<PathBuf>>,
}

#[async_trait]
impl SoundPlayer for RecordingSounds {
    async fn play(&self, file: &Path) -> Result<(), SpeechError> {
        self.played.lock().unwrap().push(file.to_path_buf());
        Ok(())
    }
}

/// Answers every prompt with a fixed reply, or fails.
pub struct ScriptedChat {
    reply: Option<String>,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedChat {
    pub fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Some(reply.to_string()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            reply: None,
            prompts: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl ChatProvider for ScriptedChat {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn chat(&self, user_text: &str, _system_prompt: &str) -> Result<String, ChatError> {
        self.prompts.lock().unwrap().push(user_text.to_string());
        self.reply
            .clone()
            .ok_or_else(|| ChatError::Provider("offline".into()))
    }
}

pub struct Rig {
    pub car: SimCar,
    pub robot: Arc<Robot>,
    pub speaker: Arc<RecordingSpeaker>,
    pub sounds: Arc<RecordingSounds>,
}

impl Rig {
    pub fn spoken(&self) -> Vec<String> {
        self.speaker.lines.lock().unwrap().clone()
    }

    pub fn played(&self) -> Vec<PathBuf> {
        self.sounds.played.lock().unwrap().clone()
    }
}

pub fn rig() -> Rig {
    rig_with(RobotConfig::default())
}

pub fn rig_with(config: RobotConfig) -> Rig {
    let car = SimCar::new();
    let speaker = Arc::new(RecordingSpeaker::default());
    let sounds = Arc::new(RecordingSounds::default());
    let robot = Robot::new(
        config,
        Box::new(car.clone()),
        Arc::new(car.clone()),
        speaker.clone(),
        sounds.clone(),
    );
    Rig {
        car,
        robot,
        speaker,
        sounds,
    }
}
