//! FFmpeg progress parsing.
//!
//! FFmpeg reports progress on stderr as a status line that is redrawn with
//! carriage returns, e.g. `frame=  120 fps= 30 q=1.0 size=N/A ...`.
//! [`LineSplitter`] turns the raw byte stream into lines, [`parse_progress_line`]
//! applies the marker grammar, and [`ProgressEstimator`] maps frame counters
//! to a coarse, non-decreasing percentage.

/// Job accepted, nothing launched yet.
pub const PROGRESS_ACCEPTED: u8 = 10;
/// Tool process launched.
pub const PROGRESS_LAUNCHED: u8 = 20;
/// Upper bound while the tool is still running.
pub const PROGRESS_CEILING: u8 = 90;
/// Legacy value used for unparsable markers.
pub const PROGRESS_MIDPOINT: u8 = 50;
/// Job finished successfully.
pub const PROGRESS_DONE: u8 = 100;

/// Marker preceding the frame counter.
pub const FRAME_MARKER: &str = "frame=";

/// Classification of one diagnostic line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressLine {
    /// Marker with a numeric frame counter
    Frame(u64),
    /// Marker present but the counter is not a number
    Unparsable,
    /// Any other diagnostic output
    Other,
}

/// Parse one line against the progress marker grammar.
///
/// `frame=` followed by optional spaces and a whitespace-terminated token;
/// the token must be all ASCII digits to count as a frame counter.
pub fn parse_progress_line(line: &str) -> ProgressLine {
    let Some(idx) = line.find(FRAME_MARKER) else {
        return ProgressLine::Other;
    };

    let rest = line[idx + FRAME_MARKER.len()..].trim_start();
    let token = rest.split_whitespace().next().unwrap_or("");

    if !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit()) {
        token
            .parse::<u64>()
            .map(ProgressLine::Frame)
            .unwrap_or(ProgressLine::Unparsable)
    } else {
        ProgressLine::Unparsable
    }
}

/// Coarse percentage for a frame counter: `min(20 + frames / 10, 90)`.
pub fn estimate_percent(frames: u64) -> u8 {
    let estimate = u64::from(PROGRESS_LAUNCHED).saturating_add(frames / 10);
    estimate.min(u64::from(PROGRESS_CEILING)) as u8
}

/// Incremental splitter for a byte stream whose lines end in `\n` or `\r`.
///
/// Empty segments (e.g. from `\r\n`) are dropped.
#[derive(Debug, Default)]
pub struct LineSplitter {
    buf: Vec<u8>,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every line it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &byte in chunk {
            if byte == b'\n' || byte == b'\r' {
                if !self.buf.is_empty() {
                    lines.push(String::from_utf8_lossy(&self.buf).into_owned());
                    self.buf.clear();
                }
            } else {
                self.buf.push(byte);
            }
        }
        lines
    }

    /// Flush the trailing unterminated segment at end of stream.
    pub fn finish(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            None
        } else {
            let line = String::from_utf8_lossy(&self.buf).into_owned();
            self.buf.clear();
            Some(line)
        }
    }
}

/// Maps parsed lines to a percentage that never decreases within a job.
#[derive(Debug, Clone)]
pub struct ProgressEstimator {
    current: u8,
    force_midpoint_on_unparsable: bool,
}

impl ProgressEstimator {
    pub fn new(force_midpoint_on_unparsable: bool) -> Self {
        Self {
            current: 0,
            force_midpoint_on_unparsable,
        }
    }

    /// Current high-water mark.
    pub fn current(&self) -> u8 {
        self.current
    }

    /// Raise to `percent`; returns the new value only if it increased.
    pub fn advance_to(&mut self, percent: u8) -> Option<u8> {
        let percent = percent.min(PROGRESS_DONE);
        if percent > self.current {
            self.current = percent;
            Some(percent)
        } else {
            None
        }
    }

    /// Fold one parsed line in; returns the new value when it changed.
    pub fn observe(&mut self, line: ProgressLine) -> Option<u8> {
        match line {
            ProgressLine::Frame(frames) => self.advance_to(estimate_percent(frames)),
            ProgressLine::Unparsable if self.force_midpoint_on_unparsable => {
                self.advance_to(PROGRESS_MIDPOINT)
            }
            ProgressLine::Unparsable | ProgressLine::Other => None,
        }
    }
}

/// Receiver of progress percentages.
///
/// Implementations must be cheap: they are called from the stderr reader.
pub trait ProgressSink: Send + Sync {
    fn update(&self, percent: u8);
}

impl<F> ProgressSink for F
where
    F: Fn(u8) + Send + Sync,
{
    fn update(&self, percent: u8) {
        self(percent)
    }
}

/// Sink that discards all updates.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn update(&self, _percent: u8) {}
}

/// Sink that forwards to a sink and keeps values non-decreasing.
pub struct MonotonicSink<'a> {
    inner: &'a dyn ProgressSink,
    estimator: std::sync::Mutex<ProgressEstimator>,
}

impl<'a> MonotonicSink<'a> {
    pub fn new(inner: &'a dyn ProgressSink, force_midpoint_on_unparsable: bool) -> Self {
        Self {
            inner,
            estimator: std::sync::Mutex::new(ProgressEstimator::new(force_midpoint_on_unparsable)),
        }
    }

    /// Push an explicit milestone (accepted, launched, done).
    pub fn milestone(&self, percent: u8) {
        let changed = match self.estimator.lock() {
            Ok(mut est) => est.advance_to(percent),
            Err(poisoned) => poisoned.into_inner().advance_to(percent),
        };
        if let Some(value) = changed {
            self.inner.update(value);
        }
    }

    /// Feed a diagnostic line.
    pub fn line(&self, line: ProgressLine) {
        let changed = match self.estimator.lock() {
            Ok(mut est) => est.observe(line),
            Err(poisoned) => poisoned.into_inner().observe(line),
        };
        if let Some(value) = changed {
            self.inner.update(value);
        }
    }

    /// Current high-water mark.
    pub fn current(&self) -> u8 {
        match self.estimator.lock() {
            Ok(est) => est.current(),
            Err(poisoned) => poisoned.into_inner().current(),
        }
    }
}
