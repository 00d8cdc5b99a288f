use std::collections::VecDeque;
use std::time::Duration;

pub const DEFAULT_LATENCY_WINDOW: usize = 64;

/// Fixed-size ring buffer of recent per-unit latencies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatencyWindow {
    samples: VecDeque<Duration>,
    capacity: usize,
}

impl LatencyWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn record(&mut self, sample: Duration) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn average(&self) -> Option<Duration> {
        if self.samples.is_empty() {
            return None;
        }
        let total: Duration = self.samples.iter().sum();
        Some(total / self.samples.len() as u32)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl Default for LatencyWindow {
    fn default() -> Self {
        Self::new(DEFAULT_LATENCY_WINDOW)
    }
}

/// `avg_latency × remaining / min(ceiling, remaining)`; zero when nothing remains.
pub fn estimate_remaining(avg_latency: Duration, remaining: usize, ceiling: usize) -> Duration {
    if remaining == 0 {
        return Duration::ZERO;
    }
    let parallelism = ceiling.max(1).min(remaining);
    avg_latency.mul_f64(remaining as f64 / parallelism as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_evicts_oldest_sample() {
        let mut window = LatencyWindow::new(2);
        window.record(Duration::from_secs(10));
        window.record(Duration::from_secs(2));
        window.record(Duration::from_secs(4));
        assert_eq!(window.len(), 2);
        assert_eq!(window.average(), Some(Duration::from_secs(3)));
    }

    #[test]
    fn empty_window_has_no_average() {
        assert_eq!(LatencyWindow::new(0).average(), None);
    }

    #[test]
    fn eta_divides_by_effective_parallelism() {
        let avg = Duration::from_secs(2);
        assert_eq!(estimate_remaining(avg, 10, 5), Duration::from_secs(4));
        // Fewer units than workers: each remaining unit runs in parallel.
        assert_eq!(estimate_remaining(avg, 3, 32), Duration::from_secs(2));
        assert_eq!(estimate_remaining(avg, 0, 32), Duration::ZERO);
        assert_eq!(estimate_remaining(avg, 4, 0), Duration::from_secs(8));
    }
}
