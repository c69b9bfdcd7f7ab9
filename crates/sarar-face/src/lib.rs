//! `sarar-face` – Expression and voice output.
//!
//! # Modules
//!
//! - [`face`] – [`ExpressionSink`][face::ExpressionSink] and the threaded
//!   [`FaceDisplay`][face::FaceDisplay] worker with its renderers.
//! - [`voice`] – [`UtteranceSink`][voice::UtteranceSink] with an external
//!   synthesizer voice and a console voice.

pub mod face;
pub mod voice;

pub use face::{ExpressionSink, FaceCommand, FaceDisplay, FaceRenderer, HeadlessFace, TerminalFace};
pub use voice::{CommandVoice, ConsoleVoice, UtteranceSink, VoiceCommand};
