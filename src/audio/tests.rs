use std::cell::RefCell;
use std::io::{self, Cursor, Read};

use super::*;
use crate::track::TrackDescriptor;

const RATE: u32 = 44_100;

fn wav(rate: u32, channels: u16, frames: usize) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels,
        sample_rate: rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for i in 0..frames {
            // Offset keeps every sample away from zero so silence is detectable.
            let v = 4000 + ((i as f32 * 0.05).sin() * 2000.0) as i16;
            for _ in 0..channels {
                writer.write_sample(v).unwrap();
            }
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

fn track(id: &str) -> TrackDescriptor {
    TrackDescriptor {
        id: id.into(),
        title: format!("Track {id}"),
        format: "wav".into(),
        ..Default::default()
    }
}

/// Stream source that keeps the handle of every body it opens.
struct Recording {
    bytes: Vec<u8>,
    opened: RefCell<Vec<BodyHandle>>,
}

impl Recording {
    fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            opened: RefCell::new(Vec::new()),
        }
    }

    fn handle(&self, i: usize) -> BodyHandle {
        self.opened.borrow()[i].clone()
    }
}

impl OpenStream for Recording {
    fn open(&self) -> Result<StreamBody, StreamError> {
        let body = StreamBody::from_reader(Cursor::new(self.bytes.clone()));
        self.opened.borrow_mut().push(body.handle());
        Ok(body)
    }
}

/// Serves `limit` bytes of `inner`, then fails like a dropped connection.
struct FailsAfter {
    inner: Cursor<Vec<u8>>,
    limit: u64,
}

impl Read for FailsAfter {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let left = self.limit.saturating_sub(self.inner.position());
        if left == 0 {
            return Err(io::Error::new(io::ErrorKind::ConnectionReset, "connection reset"));
        }
        let n = buf.len().min(left as usize);
        self.inner.read(&mut buf[..n])
    }
}

fn controller() -> (Controller<ManualOutput>, ManualOutput) {
    let output = ManualOutput::new(RATE);
    (Controller::new(output.clone(), "mp3"), output)
}

#[test]
fn play_renders_to_the_end_and_signals_once() {
    let (mut c, out) = controller();
    let source = Recording::new(wav(RATE, 2, 4410));
    let done = c.done();

    c.play(&source, "wav", track("1")).unwrap();
    assert_eq!(c.phase(), PlaybackPhase::Playing);
    assert_eq!(c.current().unwrap().track.id, "1");

    assert_eq!(out.drain(), 4410 * 2);
    assert_eq!(
        done.try_recv().unwrap(),
        SessionEnd::Finished { session: 1 }
    );
    assert!(done.try_recv().is_err());

    assert!(c.current().is_none());
    assert_eq!(c.phase(), PlaybackPhase::Idle);
    assert_eq!(c.elapsed(), 0.0);
}

#[test]
fn pause_lands_on_the_next_buffer_boundary() {
    let (mut c, out) = controller();
    let source = Recording::new(wav(RATE, 2, 44_100));
    c.play(&source, "wav", track("1")).unwrap();

    let interval = super::pipeline::BUFFER_FRAMES * 2;
    let before = out.pull(100);
    assert!(before.iter().all(|s| *s != 0.0));
    assert_eq!(c.toggle_pause(), Ok(true));

    let after = out.pull(2 * interval);
    let (tail, silence) = after.split_at(interval - 100);
    assert!(tail.iter().all(|s| *s != 0.0));
    assert!(silence.iter().all(|s| *s == 0.0));

    let frozen = super::pipeline::BUFFER_FRAMES as f64 / RATE as f64;
    assert_eq!(c.elapsed(), frozen);
    out.pull(4096);
    assert_eq!(c.elapsed(), frozen);
}

#[test]
fn elapsed_counts_rendered_frames() {
    let (mut c, out) = controller();
    let source = Recording::new(wav(RATE, 2, 44_100));
    c.play(&source, "wav", track("1")).unwrap();

    assert_eq!(c.elapsed(), 0.0);
    out.pull(2048);
    assert_eq!(c.elapsed(), 1024.0 / RATE as f64);

    let mut last = c.elapsed();
    for _ in 0..10 {
        out.pull(1000);
        let now = c.elapsed();
        assert!(now >= last);
        last = now;
    }
    assert!(last > 1024.0 / RATE as f64);
}

#[test]
fn pause_emits_silence_and_freezes_elapsed() {
    let (mut c, out) = controller();
    let source = Recording::new(wav(RATE, 2, 44_100));
    c.play(&source, "wav", track("1")).unwrap();
    out.pull(2048);

    assert_eq!(c.toggle_pause(), Ok(true));
    assert_eq!(c.phase(), PlaybackPhase::Paused);
    let frozen = c.elapsed();

    let silent = out.pull(2048);
    assert_eq!(silent.len(), 2048);
    assert!(silent.iter().all(|&s| s == 0.0));
    assert_eq!(c.elapsed(), frozen);

    assert_eq!(c.toggle_pause(), Ok(false));
    let audible = out.pull(2048);
    assert!(audible.iter().all(|&s| s != 0.0));
    assert!(c.elapsed() > frozen);
}

#[test]
fn stop_resets_state_and_closes_the_body() {
    let (mut c, out) = controller();
    let source = Recording::new(wav(RATE, 2, 44_100));
    let done = c.done();
    c.play(&source, "wav", track("1")).unwrap();
    out.pull(4096);

    c.stop();
    assert_eq!(c.elapsed(), 0.0);
    assert!(c.current().is_none());
    assert_eq!(c.phase(), PlaybackPhase::Idle);
    assert!(!out.is_rendering());
    assert!(source.handle(0).is_closed());
    assert!(done.try_recv().is_err());

    // Idempotent.
    c.stop();
    assert!(c.current().is_none());
}

#[test]
fn second_play_replaces_the_first_session() {
    let (mut c, out) = controller();
    let source = Recording::new(wav(RATE, 2, 44_100));

    c.play(&source, "wav", track("1")).unwrap();
    out.pull(512);
    c.play(&source, "wav", track("2")).unwrap();

    assert!(source.handle(0).is_closed());
    assert!(!source.handle(1).is_closed());
    assert_eq!(out.starts(), 2);

    let now = c.current().unwrap();
    assert_eq!(now.track.id, "2");
    assert_eq!(now.session, 2);
    assert_eq!(c.elapsed(), 0.0);
}

#[test]
fn stale_completion_is_drained_by_the_next_play() {
    let (mut c, out) = controller();
    let short = Recording::new(wav(RATE, 2, 1000));
    let long = Recording::new(wav(RATE, 2, 44_100));
    let done = c.done();

    c.play(&short, "wav", track("1")).unwrap();
    out.drain();
    c.play(&long, "wav", track("2")).unwrap();

    assert!(done.try_recv().is_err());
}

#[test]
fn toggle_pause_when_idle_is_a_benign_noop() {
    let (mut c, _out) = controller();
    let err = c.toggle_pause().unwrap_err();
    assert_eq!(err, PlayerError::NoActiveSession);
    assert!(err.is_benign());
    assert_eq!(c.phase(), PlaybackPhase::Idle);
}

#[test]
fn http_error_on_open_is_a_connect_error() {
    let (mut c, out) = controller();
    let done = c.done();
    let failing = || -> Result<StreamBody, StreamError> { Err(StreamError::Status(404)) };

    let err = c.play(&failing, "mp3", track("1")).unwrap_err();
    assert_eq!(err, PlayerError::Connect(StreamError::Status(404)));
    assert!(!err.is_benign());
    assert!(c.current().is_none());
    assert_eq!(c.phase(), PlaybackPhase::Idle);
    assert_eq!(out.starts(), 0);
    assert!(done.try_recv().is_err());
}

#[test]
fn undecodable_stream_fails_play_and_closes_the_body() {
    let (mut c, out) = controller();
    let source = Recording::new(b"definitely not audio data".repeat(200));

    let err = c.play(&source, "mp3", track("1")).unwrap_err();
    assert!(matches!(err, PlayerError::Decode(_)));
    assert!(source.handle(0).is_closed());
    assert!(c.current().is_none());
    assert_eq!(out.starts(), 0);
}

#[test]
fn mid_stream_error_ends_the_session_as_a_failure() {
    let (mut c, out) = controller();
    let done = c.done();
    let bytes = wav(RATE, 2, 44_100);
    let source = move || -> Result<StreamBody, StreamError> {
        Ok(StreamBody::from_reader(FailsAfter {
            inner: Cursor::new(bytes.clone()),
            limit: 100_000,
        }))
    };

    c.play(&source, "wav", track("1")).unwrap();
    let rendered = out.drain();
    assert!(rendered > 0);
    assert!(rendered < 44_100 * 2);

    let end = done.try_recv().unwrap();
    assert_eq!(end.session(), 1);
    assert!(matches!(end.error(), Some(DecodeError::Stream(_))));
    assert!(c.current().is_none());
}

#[test]
fn different_source_rate_is_resampled() {
    let (mut c, out) = controller();
    let source = Recording::new(wav(22_050, 2, 2205));

    c.play(&source, "wav", track("1")).unwrap();
    let frames = out.drain() / 2;
    assert!((4406..=4414).contains(&frames), "got {frames} frames");
}

#[test]
fn mono_source_keeps_frame_accounting() {
    let (mut c, out) = controller();
    let source = Recording::new(wav(RATE, 1, 44_100));
    c.play(&source, "wav", track("1")).unwrap();

    out.pull(1024);
    assert_eq!(c.elapsed(), 1024.0 / RATE as f64);
}

#[test]
fn unknown_formats_decode_as_the_fallback() {
    assert_eq!(decoder_format("flac", "mp3"), "flac");
    assert_eq!(decoder_format("MP3", "flac"), "mp3");
    assert_eq!(decoder_format("m4a", "mp3"), "mp3");
    assert_eq!(decoder_format("aac", "mp3"), "mp3");
    assert_eq!(decoder_format("", "mp3"), "mp3");
    assert_eq!(decoder_format("vorbis", "mp3"), "ogg");
    assert!(is_known_format("oga"));
    assert!(!is_known_format("wma"));
}

#[test]
fn fallback_decoder_plays_an_unlabelled_stream() {
    let output = ManualOutput::new(RATE);
    let mut c = Controller::new(output.clone(), "wav");
    let source = Recording::new(wav(RATE, 2, 1000));

    c.play(&source, "m4a", track("1")).unwrap();
    assert_eq!(output.drain(), 2000);
}
