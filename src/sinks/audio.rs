//! Audio sink implementations
//!
//! `RodioAudio` plays clue sounds on the default output device. `NullAudio`
//! is the degraded mode when no device exists: the box keeps dispensing
//! text-only clues.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};
use tracing::debug;

use super::{AudioError, AudioSink};

/// Audio sink backed by the default rodio output device
pub struct RodioAudio {
    /// Keeps the device stream alive; dropping it kills playback
    _stream: OutputStream,
    handle: OutputStreamHandle,
    /// Sink of the currently playing clue, if any
    current: Option<Sink>,
}

impl RodioAudio {
    pub fn new() -> Result<Self, AudioError> {
        let (stream, handle) = OutputStream::try_default()?;
        Ok(Self {
            _stream: stream,
            handle,
            current: None,
        })
    }
}

impl AudioSink for RodioAudio {
    fn play(&mut self, sound: &Path) -> Result<(), AudioError> {
        let file = File::open(sound).map_err(|source| AudioError::Open {
            path: sound.to_owned(),
            source,
        })?;

        let decoded = Decoder::new(BufReader::new(file)).map_err(|source| AudioError::Decode {
            path: sound.to_owned(),
            source,
        })?;

        let sink = Sink::try_new(&self.handle)?;
        sink.append(decoded);
        debug!(sound = %sound.display(), "clue audio started");

        self.current = Some(sink);
        Ok(())
    }

    fn stop_all(&mut self) {
        if let Some(sink) = self.current.take() {
            sink.stop();
        }
    }
}

/// Audio sink that discards every request
#[derive(Debug, Default)]
pub struct NullAudio;

impl AudioSink for NullAudio {
    fn play(&mut self, _sound: &Path) -> Result<(), AudioError> {
        Ok(())
    }

    fn stop_all(&mut self) {}
}
