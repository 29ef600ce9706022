//! Audio outputs the controller renders sessions into.

use rodio::{OutputStream, OutputStreamBuilder, Sink};
use tracing::debug;

use super::error::PlayerError;
use super::pipeline::SessionPipeline;

/// A device that renders one session at a time on its own thread.
pub trait AudioOutput {
    /// Fixed rate every session is resampled to.
    fn sample_rate(&self) -> u32;

    /// Begin rendering `pipeline`, replacing anything still queued.
    fn start(&mut self, pipeline: SessionPipeline) -> Result<(), PlayerError>;

    /// Drop whatever is being rendered right now.
    fn clear(&mut self);
}

/// The default system output through rodio.
pub struct RodioOutput {
    stream: OutputStream,
    sink: Option<Sink>,
    sample_rate: u32,
}

impl RodioOutput {
    pub fn open_default(sample_rate: u32) -> Result<Self, PlayerError> {
        let mut stream = OutputStreamBuilder::from_default_device()
            .map(|builder| builder.with_sample_rate(sample_rate))
            .and_then(|builder| builder.open_stream_or_fallback())
            .map_err(|e| PlayerError::Output(e.to_string()))?;
        // rodio logs to stderr when the stream is dropped, which garbles the TUI.
        stream.log_on_drop(false);

        Ok(Self {
            stream,
            sink: None,
            sample_rate,
        })
    }
}

impl AudioOutput for RodioOutput {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn start(&mut self, pipeline: SessionPipeline) -> Result<(), PlayerError> {
        self.clear();
        // A fresh sink per session, so nothing from the previous one can
        // still be queued behind it.
        let sink = Sink::connect_new(self.stream.mixer());
        sink.append(pipeline);
        self.sink = Some(sink);
        Ok(())
    }

    fn clear(&mut self) {
        if let Some(sink) = self.sink.take() {
            debug!("discarding output sink");
            sink.stop();
        }
    }
}

#[cfg(test)]
pub use manual::ManualOutput;
