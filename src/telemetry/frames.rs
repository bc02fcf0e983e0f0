//! Frame timing for the host window

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Rolling frame time summary
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameStats {
    pub avg_ms: f64,
    pub max_ms: f64,
    pub fps: f64,
    pub sample_count: usize,
}

/// Keeps the last `capacity` frame durations
pub struct FrameTimer {
    frame_times: VecDeque<Duration>,
    capacity: usize,
    last_frame_start: Option<Instant>,
}

impl Default for FrameTimer {
    fn default() -> Self {
        // 2 seconds at 60fps
        Self::new(120)
    }
}

impl FrameTimer {
    pub fn new(capacity: usize) -> Self {
        Self {
            frame_times: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
            last_frame_start: None,
        }
    }

    /// Mark the start of a frame
    pub fn begin_frame(&mut self) {
        let now = Instant::now();
        if let Some(start) = self.last_frame_start {
            self.record(now.duration_since(start));
        }
        self.last_frame_start = Some(now);
    }

    /// Add one frame duration
    pub fn record(&mut self, duration: Duration) {
        self.frame_times.push_back(duration);
        if self.frame_times.len() > self.capacity {
            self.frame_times.pop_front();
        }
    }

    pub fn stats(&self) -> FrameStats {
        if self.frame_times.is_empty() {
            return FrameStats::default();
        }

        let count = self.frame_times.len();
        let total: Duration = self.frame_times.iter().sum();
        let avg_ms = total.as_secs_f64() * 1000.0 / count as f64;
        let max_ms = self
            .frame_times
            .iter()
            .map(|d| d.as_secs_f64() * 1000.0)
            .fold(0.0, f64::max);

        FrameStats {
            avg_ms,
            max_ms,
            fps: if avg_ms > 0.0 { 1000.0 / avg_ms } else { 0.0 },
            sample_count: count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_stats() {
        assert_eq!(FrameTimer::default().stats(), FrameStats::default());
    }

    #[test]
    fn test_stats_from_recorded_frames() {
        let mut timer = FrameTimer::new(4);
        for ms in [10, 20, 30] {
            timer.record(Duration::from_millis(ms));
        }
        let stats = timer.stats();
        assert_eq!(stats.sample_count, 3);
        assert!((stats.avg_ms - 20.0).abs() < 1e-9);
        assert!((stats.max_ms - 30.0).abs() < 1e-9);
        assert!((stats.fps - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let mut timer = FrameTimer::new(2);
        timer.record(Duration::from_millis(100));
        timer.record(Duration::from_millis(10));
        timer.record(Duration::from_millis(10));
        assert_eq!(timer.stats().sample_count, 2);
        assert!((timer.stats().max_ms - 10.0).abs() < 1e-9);
    }
}
