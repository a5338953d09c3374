//! `okbot-runtime` – The robot's behaviour loops
//!
//! Everything that runs concurrently on the car lives here. Each loop holds
//! an `Arc<`[`Robot`][robot::Robot]`>` and reaches the hardware only through
//! its [`ActuatorArbiter`][okbot_kernel::ActuatorArbiter].
//!
//! # Modules
//!
//! - [`robot`] – [`Robot`][robot::Robot]: the shared context (config, state,
//!   arbiter, sensors, action library, speech and sound output).
//! - [`safety`] – [`SafetyMonitor`][safety::SafetyMonitor]: the 100 ms
//!   proximity and cliff guard, submitting at `Emergency` and `SafetyAvoid`.
//! - [`autonomy`] – [`AutonomousModeRunner`][autonomy::AutonomousModeRunner]:
//!   line tracking and obstacle avoidance, at most one loop at a time.
//! - [`lifecycle`] – [`StateMachine`][lifecycle::StateMachine]: the
//!   Asleep/Awake transitions, idle timeout, and shutdown.
//! - [`dispatcher`] – [`CommandDispatcher`][dispatcher::CommandDispatcher]:
//!   keyword resolution of voice and keyboard commands, with an optional chat
//!   model in front.
//! - [`controller`] – [`VoiceController`][controller::VoiceController]: the
//!   wake phase / command phase voice loop.
//! - [`keyboard`] – key bindings and [`KeyboardLoop`][keyboard::KeyboardLoop].
//! - [`speech`] – recogniser, synthesiser, and sound player traits plus the
//!   headless implementations.
//! - [`chat`] – [`ChatProvider`][chat::ChatProvider] and the
//!   OpenAI-compatible HTTP client used for every provider preset.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: the global
//!   `tracing` subscriber with optional OTLP export. Set
//!   `OTEL_EXPORTER_OTLP_ENDPOINT` to enable it.

pub mod autonomy;
pub mod chat;
pub mod controller;
pub mod dispatcher;
pub mod keyboard;
pub mod lifecycle;
pub mod robot;
pub mod safety;
pub mod speech;
pub mod telemetry;

#[cfg(test)]
mod testing;

pub use autonomy::AutonomousModeRunner;
pub use chat::{ChatError, ChatProvider, OpenAiCompatible, provider_from_config};
pub use controller::VoiceController;
pub use dispatcher::{CommandDispatcher, Dispatch};
pub use keyboard::KeyboardLoop;
pub use lifecycle::StateMachine;
pub use robot::Robot;
pub use safety::SafetyMonitor;
pub use speech::{
    ChannelInput, LogSoundPlayer, LogSpeaker, SoundPlayer, SpeechError, SpeechInput, SpeechOutput,
};
pub use telemetry::{TracerProviderGuard, init_tracing};
