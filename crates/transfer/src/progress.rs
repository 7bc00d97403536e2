use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Invoked once per file entry before its first byte: `(path, size)`.
pub type EntryStartCallback = Box<dyn Fn(&str, u64) + Send + Sync>;

/// Invoked with the cumulative bytes transferred for the current entry.
pub type ProgressCallback = Box<dyn Fn(u64) + Send + Sync>;

/// Invoked once per file entry after it completed successfully.
pub type EntryEndCallback = Box<dyn Fn(&str) + Send + Sync>;

/// Optional observers for a copy. Purely a side channel: callbacks never
/// influence the transfer.
#[derive(Default)]
pub struct CopyCallbacks {
    on_entry_start: Option<EntryStartCallback>,
    on_progress: Option<ProgressCallback>,
    on_entry_end: Option<EntryEndCallback>,
}

impl CopyCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_entry_start(mut self, cb: impl Fn(&str, u64) + Send + Sync + 'static) -> Self {
        self.on_entry_start = Some(Box::new(cb));
        self
    }

    pub fn on_progress(mut self, cb: impl Fn(u64) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Box::new(cb));
        self
    }

    pub fn on_entry_end(mut self, cb: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_entry_end = Some(Box::new(cb));
        self
    }

    pub fn entry_start(&self, path: &str, size: u64) {
        if let Some(cb) = &self.on_entry_start {
            cb(path, size);
        }
    }

    pub fn progress(&self, bytes: u64) {
        if let Some(cb) = &self.on_progress {
            cb(bytes);
        }
    }

    pub fn entry_end(&self, path: &str) {
        if let Some(cb) = &self.on_entry_end {
            cb(path);
        }
    }
}

impl std::fmt::Debug for CopyCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CopyCallbacks")
            .field("on_entry_start", &self.on_entry_start.is_some())
            .field("on_progress", &self.on_progress.is_some())
            .field("on_entry_end", &self.on_entry_end.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// SpeedCalculator
// ---------------------------------------------------------------------------

struct SpeedSample {
    bytes: u64,
    timestamp: Instant,
}

/// Calculates transfer speed using a sliding window of samples.
pub struct SpeedCalculator {
    inner: Mutex<SpeedInner>,
}

struct SpeedInner {
    samples: Vec<SpeedSample>,
    max_samples: usize,
    window_size: Duration,
}

impl SpeedCalculator {
    /// Creates a new calculator.
    ///
    /// - `window_size`: time window for speed calculation (default 5 s).
    /// - `max_samples`: maximum retained samples (default 100).
    pub fn new(window_size: Option<Duration>, max_samples: Option<usize>) -> Self {
        Self {
            inner: Mutex::new(SpeedInner {
                samples: Vec::new(),
                max_samples: max_samples.unwrap_or(100),
                window_size: window_size.unwrap_or(Duration::from_secs(5)),
            }),
        }
    }

    /// Records `bytes` transferred since the previous sample.
    pub fn add_sample(&self, bytes: u64) {
        let mut s = self.inner.lock().unwrap();
        let now = Instant::now();
        s.samples.push(SpeedSample {
            bytes,
            timestamp: now,
        });

        if let Some(cutoff) = now.checked_sub(s.window_size) {
            s.samples.retain(|sample| sample.timestamp >= cutoff);
        }

        if s.samples.len() > s.max_samples {
            let excess = s.samples.len() - s.max_samples;
            s.samples.drain(..excess);
        }
    }

    /// Returns the average speed in bytes/second within the window.
    ///
    /// Returns 0.0 if fewer than 2 samples.
    pub fn bytes_per_second(&self) -> f64 {
        let s = self.inner.lock().unwrap();
        if s.samples.len() < 2 {
            return 0.0;
        }

        let first = &s.samples[0];
        let last = &s.samples[s.samples.len() - 1];
        let elapsed = last.timestamp.duration_since(first.timestamp);
        if elapsed.is_zero() {
            return 0.0;
        }

        let total_bytes: u64 = s.samples.iter().map(|sample| sample.bytes).sum();
        total_bytes as f64 / elapsed.as_secs_f64()
    }

    /// Estimates time remaining to transfer `remaining_bytes`.
    ///
    /// Returns `None` if speed is zero.
    pub fn eta(&self, remaining_bytes: u64) -> Option<Duration> {
        let speed = self.bytes_per_second();
        if speed <= 0.0 {
            return None;
        }
        Some(Duration::from_secs_f64(remaining_bytes as f64 / speed))
    }

    /// Clears all recorded samples.
    pub fn reset(&self) {
        self.inner.lock().unwrap().samples.clear();
    }
}
