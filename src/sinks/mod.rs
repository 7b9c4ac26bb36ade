//! Display and audio sinks
//!
//! The controller talks to the outside world through these two traits.
//! Presentation must never be torn between clues, so the controller always
//! clears the display before staging and stops audio before starting the
//! next clue; the sinks themselves stay dumb.

mod audio;
mod display;

use std::path::{Path, PathBuf};

pub use audio::{NullAudio, RodioAudio};
pub use display::ConsoleDisplay;

/// Text surface of the clue box
///
/// `present` replaces whatever is currently shown; the empty string clears
/// the surface. Rendering failures are the sink's concern, not the core's.
pub trait DisplaySink {
    fn present(&mut self, text: &str);
}

/// Sound side of the clue box
pub trait AudioSink {
    /// Start playing a sound file; the previous clue's audio must already
    /// have been stopped via `stop_all`
    fn play(&mut self, sound: &Path) -> Result<(), AudioError>;

    /// Stop any playing audio; a no-op when nothing plays
    fn stop_all(&mut self);
}

/// Playback failures
///
/// Never fatal: a clue's text is presented whether or not its audio starts.
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("no audio output device available: {0}")]
    Device(#[from] rodio::StreamError),

    #[error("failed to open sound file {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode sound file {}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: rodio::decoder::DecoderError,
    },

    #[error("failed to open playback sink: {0}")]
    Sink(#[from] rodio::PlayError),
}
