//! Sample-rate conversion to the output's fixed rate.

use std::collections::VecDeque;
use std::mem;
use std::time::Duration;

use rodio::Source;

/// Either the source itself (rates already match) or a converter around it.
pub enum Resampled<S> {
    Direct(S),
    Converted(Resampler<S>),
}

impl<S: Source> Resampled<S> {
    pub fn new(source: S, target_rate: u32) -> Self {
        if source.sample_rate() == target_rate {
            Self::Direct(source)
        } else {
            Self::Converted(Resampler::new(source, target_rate))
        }
    }
}

impl<S: Source> Iterator for Resampled<S> {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        match self {
            Self::Direct(s) => s.next(),
            Self::Converted(r) => r.next(),
        }
    }
}

impl<S: Source> Source for Resampled<S> {
    fn current_span_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        match self {
            Self::Direct(s) => s.channels(),
            Self::Converted(r) => r.channels(),
        }
    }

    fn sample_rate(&self) -> u32 {
        match self {
            Self::Direct(s) => s.sample_rate(),
            Self::Converted(r) => r.sample_rate(),
        }
    }

    fn total_duration(&self) -> Option<Duration> {
        match self {
            Self::Direct(s) => s.total_duration(),
            Self::Converted(r) => r.total_duration(),
        }
    }
}

/// Linear-interpolation converter.
///
/// Rates are reduced by their gcd so output is produced in chunks of `to`
/// frames per `from` input frames.
pub struct Resampler<S> {
    input: S,
    from: u64,
    to: u64,
    target_rate: u32,
    channels: u16,
    current: Vec<f32>,
    next: Vec<f32>,
    /// Position of `current` modulo `from`.
    current_pos: u64,
    /// Position of the next output frame modulo `to`.
    out_pos: u64,
    pending: VecDeque<f32>,
}

impl<S: Source> Resampler<S> {
    pub fn new(mut input: S, target_rate: u32) -> Self {
        let channels = input.channels().max(1);
        let from = u64::from(input.sample_rate().max(1));
        let to = u64::from(target_rate.max(1));
        let divisor = gcd(from, to);

        let current = input.by_ref().take(channels as usize).collect();
        let next = input.by_ref().take(channels as usize).collect();

        Self {
            input,
            from: from / divisor,
            to: to / divisor,
            target_rate,
            channels,
            current,
            next,
            current_pos: 0,
            out_pos: 0,
            pending: VecDeque::with_capacity(channels as usize),
        }
    }

    fn advance(&mut self) {
        self.current_pos += 1;
        mem::swap(&mut self.current, &mut self.next);
        self.next.clear();
        self.next
            .extend(self.input.by_ref().take(self.channels as usize));
    }
}

impl<S: Source> Iterator for Resampler<S> {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        if let Some(sample) = self.pending.pop_front() {
            return Some(sample);
        }

        if self.out_pos == self.to {
            self.out_pos = 0;
            self.advance();
            while self.current_pos != self.from {
                self.advance();
            }
            self.current_pos = 0;
        } else {
            let left = (self.from * self.out_pos / self.to) % self.from;
            while self.current_pos != left {
                self.advance();
            }
        }

        let t = ((self.from * self.out_pos) % self.to) as f32 / self.to as f32;
        let mut first = None;
        for (i, (a, b)) in self.current.iter().zip(&self.next).enumerate() {
            let sample = a + (b - a) * t;
            if i == 0 {
                first = Some(sample);
            } else {
                self.pending.push_back(sample);
            }
        }
        self.out_pos += 1;

        if first.is_some() {
            return first;
        }

        // Input is exhausted: flush the last frame as-is.
        let mut last = mem::take(&mut self.current).into_iter();
        let sample = last.next()?;
        self.pending.extend(last);
        Some(sample)
    }
}

impl<S: Source> Source for Resampler<S> {
    fn current_span_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.target_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        self.input.total_duration()
    }
}

fn gcd(a: u64, b: u64) -> u64 {
    if b == 0 { a } else { gcd(b, a % b) }
}
