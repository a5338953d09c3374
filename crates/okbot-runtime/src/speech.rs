//! Speech and sound collaborators.
//!
//! Recognition ([`SpeechInput`]), synthesis ([`SpeechOutput`]), and sound
//! effects ([`SoundPlayer`]) are external engines; the runtime only sees
//! these traits. Output is always best-effort: callers go through
//! [`Robot::say`][crate::robot::Robot::say] and
//! [`Robot::play`][crate::robot::Robot::play], which log failures and carry on.
//!
//! [`ChannelInput`] turns a stream of text lines into a recogniser, which is
//! what the console front-end and the tests use.

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info};

// ─────────────────────────────────────────────────────────────────────────────
// Error type
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpeechError {
    /// Nothing was heard within the engine's own window.
    #[error("timed out waiting for speech")]
    Timeout,
    /// Device or engine failure.
    #[error("speech I/O error: {0}")]
    Io(String),
    /// The input source is gone and will never produce text again.
    #[error("speech input closed")]
    Closed,
}

// ─────────────────────────────────────────────────────────────────────────────
// Traits
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
pub trait SpeechInput: Send + Sync {
    /// Block until one of `phrases` is heard and return what was heard.
    async fn wait_for_wake(&self, phrases: &[String]) -> Result<String, SpeechError>;

    /// Return the next utterance. `stream` asks for partial results.
    async fn listen(&self, stream: bool) -> Result<String, SpeechError>;
}

#[async_trait]
pub trait SpeechOutput: Send + Sync {
    async fn speak(&self, text: &str) -> Result<(), SpeechError>;
}

#[async_trait]
pub trait SoundPlayer: Send + Sync {
    /// Start playing `file`; does not wait for playback to finish.
    async fn play(&self, file: &Path) -> Result<(), SpeechError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Headless implementations
// ─────────────────────────────────────────────────────────────────────────────

/// Speaks by writing to the log. Used when no synthesis engine is present.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSpeaker;

#[async_trait]
impl SpeechOutput for LogSpeaker {
    async fn speak(&self, text: &str) -> Result<(), SpeechError> {
        info!(target: "okbot::tts", "{text}");
        Ok(())
    }
}

/// Checks the sound file exists and logs it instead of playing it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSoundPlayer;

#[async_trait]
impl SoundPlayer for LogSoundPlayer {
    async fn play(&self, file: &Path) -> Result<(), SpeechError> {
        if !file.exists() {
            return Err(SpeechError::Io(format!(
                "sound file not found: {}",
                file.display()
            )));
        }
        info!(file = %file.display(), "[SOUND]");
        Ok(())
    }
}

/// A recogniser fed by text lines from a channel.
///
/// Every line is one utterance. While waiting for the wake phrase, lines that
/// do not contain one are dropped.
pub struct ChannelInput {
    rx: Mutex<mpsc::Receiver<String>>,
}

impl ChannelInput {
    pub fn new(rx: mpsc::Receiver<String>) -> Self {
        Self { rx: Mutex::new(rx) }
    }

    /// A connected `(sender, input)` pair.
    pub fn channel(buffer: usize) -> (mpsc::Sender<String>, Self) {
        let (tx, rx) = mpsc::channel(buffer);
        (tx, Self::new(rx))
    }
}

#[async_trait]
impl SpeechInput for ChannelInput {
    async fn wait_for_wake(&self, phrases: &[String]) -> Result<String, SpeechError> {
        let mut rx = self.rx.lock().await;
        loop {
            let line = rx.recv().await.ok_or(SpeechError::Closed)?;
            let heard = line.to_lowercase();
            if phrases.iter().any(|p| heard.contains(&p.to_lowercase())) {
                return Ok(line);
            }
            debug!(%line, "ignored while asleep");
        }
    }

    async fn listen(&self, _stream: bool) -> Result<String, SpeechError> {
        self.rx.lock().await.recv().await.ok_or(SpeechError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn channel_input_waits_for_a_wake_phrase() {
        let (tx, input) = ChannelInput::channel(8);
        tx.send("turn left".into()).await.unwrap();
        tx.send("Okay Robot".into()).await.unwrap();
        tx.send("dance".into()).await.unwrap();

        let wake = input.wait_for_wake(&["okay robot".to_string()]).await.unwrap();
        assert_eq!(wake, "Okay Robot");
        assert_eq!(input.listen(false).await.unwrap(), "dance");
    }

    #[tokio::test]
    async fn closed_channel_reports_closed() {
        let (tx, input) = ChannelInput::channel(1);
        drop(tx);
        assert_eq!(input.listen(true).await, Err(SpeechError::Closed));
        assert_eq!(
            input.wait_for_wake(&["hey robot".to_string()]).await,
            Err(SpeechError::Closed)
        );
    }

    #[tokio::test]
    async fn missing_sound_file_is_an_error() {
        let err = LogSoundPlayer
            .play(Path::new("/definitely/not/here.wav"))
            .await
            .unwrap_err();
        assert!(matches!(err, SpeechError::Io(_)));
    }
}
