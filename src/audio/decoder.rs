//! Forward-only symphonia decoding of a network byte stream.

use std::io::{self, Read};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use rodio::Source;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, Decoder, DecoderOptions};
use symphonia::core::errors::Error;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::{MediaSourceStream, ReadOnlySource};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

use super::error::{DecodeError, PlayerError, StreamError};

/// Consecutive packet decode errors tolerated before the stream is abandoned.
const MAX_DECODE_ERRORS: usize = 3;

/// Format labels with a decoder of their own.
pub const KNOWN_FORMATS: &[&str] = &["mp3", "flac", "wav", "ogg", "oga", "vorbis"];

pub fn is_known_format(label: &str) -> bool {
    KNOWN_FORMATS.iter().any(|f| f.eq_ignore_ascii_case(label))
}

/// Container hint handed to the probe for a track's format label.
///
/// Labels without a decoder (`m4a`, `aac`, empty ...) are taken to be
/// server-transcoded and decoded as `fallback`.
pub fn decoder_format(label: &str, fallback: &str) -> String {
    let label = label.trim().to_ascii_lowercase();
    let chosen = if is_known_format(&label) {
        label
    } else {
        fallback.trim().to_ascii_lowercase()
    };
    match chosen.as_str() {
        "oga" | "vorbis" => "ogg".to_string(),
        _ => chosen,
    }
}

/// Failures before the first packet: a stalled body is a connection
/// problem, anything else means the bytes could not be decoded.
fn open_error(err: Error, decode: fn(String) -> DecodeError) -> PlayerError {
    match err {
        Error::IoError(e) if e.kind() == io::ErrorKind::TimedOut => StreamError::Timeout.into(),
        e => decode(e.to_string()).into(),
    }
}

/// First terminal error raised by a decoder after playback started.
pub type FailureSlot = Arc<OnceLock<DecodeError>>;

pub struct StreamDecoder {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    buffer: Option<SampleBuffer<f32>>,
    offset: usize,
    channels: u16,
    sample_rate: u32,
    failure: FailureSlot,
    exhausted: bool,
}

impl StreamDecoder {
    /// Probe `reader` and decode up to the first audio packet.
    ///
    /// Reads block, so this runs on the calling thread only until the first
    /// packet is out; everything after is pulled by the render thread.
    ///
    /// A body that stalls past its deadline fails as
    /// `PlayerError::Connect(StreamError::Timeout)`.
    pub fn open<R>(reader: R, format_label: &str, fallback: &str) -> Result<Self, PlayerError>
    where
        R: Read + Send + Sync + 'static,
    {
        let mss = MediaSourceStream::new(Box::new(ReadOnlySource::new(reader)), Default::default());

        let extension = decoder_format(format_label, fallback);
        let mut hint = Hint::new();
        hint.with_extension(&extension);

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| open_error(e, DecodeError::Probe))?;
        let format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(DecodeError::NoAudioTrack)?;
        let track_id = track.id;

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| open_error(e, DecodeError::Codec))?;

        let mut this = Self {
            format,
            decoder,
            track_id,
            buffer: None,
            offset: 0,
            channels: 0,
            sample_rate: 0,
            failure: Arc::new(OnceLock::new()),
            exhausted: false,
        };

        match this.decode_next() {
            Ok(true) => {}
            Ok(false) => {
                return Err(DecodeError::Probe("stream ended before any audio".into()).into());
            }
            Err(e) => return Err(open_error(e, DecodeError::Codec)),
        }

        debug!(
            format = %extension,
            sample_rate = this.sample_rate,
            channels = this.channels,
            "decoder ready"
        );
        Ok(this)
    }

    /// Shared slot that receives the error if the stream fails mid-playback.
    pub fn failure(&self) -> FailureSlot {
        self.failure.clone()
    }

    /// Decode packets until one carries audio frames.
    ///
    /// `Ok(false)` is a clean end of stream.
    fn decode_next(&mut self) -> Result<bool, Error> {
        let mut errors = 0;
        loop {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(Error::IoError(e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    return Ok(false);
                }
                // A new logical stream (chained ogg); treat as the end of this one.
                Err(Error::ResetRequired) => return Ok(false),
                Err(e) => return Err(e),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            match self.decoder.decode(&packet) {
                Ok(decoded) => {
                    if decoded.frames() == 0 {
                        continue;
                    }
                    let spec = *decoded.spec();
                    if self.sample_rate == 0 {
                        self.sample_rate = spec.rate;
                        self.channels = spec.channels.count() as u16;
                    }
                    let mut buffer = SampleBuffer::new(decoded.capacity() as u64, spec);
                    buffer.copy_interleaved_ref(decoded);
                    self.buffer = Some(buffer);
                    self.offset = 0;
                    return Ok(true);
                }
                Err(Error::DecodeError(msg)) => {
                    errors += 1;
                    warn!(error = msg, errors, "skipping undecodable packet");
                    if errors > MAX_DECODE_ERRORS {
                        return Err(Error::DecodeError(msg));
                    }
                }
                Err(Error::ResetRequired) => self.decoder.reset(),
                Err(Error::IoError(e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    return Ok(false);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl Iterator for StreamDecoder {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        if self.exhausted {
            return None;
        }

        let buffered = self.buffer.as_ref().map_or(0, |b| b.len());
        if self.offset >= buffered {
            match self.decode_next() {
                Ok(true) => {}
                Ok(false) => {
                    self.exhausted = true;
                    return None;
                }
                Err(e) => {
                    warn!(error = %e, "stream failed mid-playback");
                    let _ = self.failure.set(DecodeError::Stream(e.to_string()));
                    self.exhausted = true;
                    return None;
                }
            }
        }

        let sample = self
            .buffer
            .as_ref()
            .and_then(|b| b.samples().get(self.offset).copied());
        self.offset += 1;
        sample
    }
}

impl Source for StreamDecoder {
    fn current_span_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}
