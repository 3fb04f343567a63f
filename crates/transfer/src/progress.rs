use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Snapshot of an upload in progress, taken after a block is acknowledged.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadProgress {
    /// Id of the block just acknowledged.
    pub block_id: u32,
    /// Bytes acknowledged so far.
    pub bytes_sent: u64,
    /// Total size of the source.
    pub total_bytes: u64,
    /// Average throughput over the recent window.
    pub bytes_per_second: f64,
}

impl UploadProgress {
    /// Completed fraction in `[0.0, 1.0]`.
    pub fn fraction(&self) -> f64 {
        if self.total_bytes == 0 {
            return 1.0;
        }
        (self.bytes_sent as f64 / self.total_bytes as f64).min(1.0)
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
    samples: VecDeque<SpeedSample>,
    max_samples: usize,
    window_size: Duration,
}

impl Default for SpeedCalculator {
    fn default() -> Self {
        Self::new(None, None)
    }
}

impl SpeedCalculator {
    /// Creates a new calculator.
    ///
    /// - `window_size`: time window for speed calculation (default 5 s).
    /// - `max_samples`: maximum retained samples (default 100).
    pub fn new(window_size: Option<Duration>, max_samples: Option<usize>) -> Self {
        Self {
            samples: VecDeque::new(),
            max_samples: max_samples.unwrap_or(100).max(2),
            window_size: window_size.unwrap_or(Duration::from_secs(5)),
        }
    }

    /// Records `bytes` transferred at the current instant.
    pub fn add_sample(&mut self, bytes: u64) {
        self.add_sample_at(bytes, Instant::now());
    }

    fn add_sample_at(&mut self, bytes: u64, timestamp: Instant) {
        self.samples.push_back(SpeedSample { bytes, timestamp });

        if let Some(cutoff) = timestamp.checked_sub(self.window_size) {
            while self.samples.front().is_some_and(|s| s.timestamp < cutoff) {
                self.samples.pop_front();
            }
        }
        while self.samples.len() > self.max_samples {
            self.samples.pop_front();
        }
    }

    /// Average speed in bytes/second within the window.
    ///
    /// Returns 0.0 with fewer than 2 samples. The first sample only marks
    /// the window start, so its bytes are not counted.
    pub fn bytes_per_second(&self) -> f64 {
        let (Some(first), Some(last)) = (self.samples.front(), self.samples.back()) else {
            return 0.0;
        };
        if self.samples.len() < 2 {
            return 0.0;
        }
        let elapsed = last.timestamp.duration_since(first.timestamp);
        if elapsed.is_zero() {
            return 0.0;
        }
        let bytes: u64 = self.samples.iter().skip(1).map(|s| s.bytes).sum();
        bytes as f64 / elapsed.as_secs_f64()
    }

    /// Estimates the time left for `remaining_bytes`; `None` while speed is zero.
    pub fn eta(&self, remaining_bytes: u64) -> Option<Duration> {
        let speed = self.bytes_per_second();
        if speed <= 0.0 {
            return None;
        }
        Some(Duration::from_secs_f64(remaining_bytes as f64 / speed))
    }

    pub fn reset(&mut self) {
        self.samples.clear();
    }
}
