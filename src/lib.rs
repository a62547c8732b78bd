#![deny(clippy::all)]

//! Realtime speech-to-text session engine
//!
//! Captures microphone audio, streams it to a realtime transcription service
//! over a WebSocket and hands completed transcriptions to a [`sinks::TextSink`].

pub mod audio;
pub mod error;
pub mod settings;
pub mod sinks;
pub mod transcription;

pub use error::AppError;
