//! Normalisation of producer timestamps to trace relative time.

use std::sync::OnceLock;

const NS_PER_S: f64 = 1_000_000_000.0;

/// Converts absolute monotonic timestamps (nanoseconds, as returned by
/// `bpf_ktime_get_ns`) into seconds since the first event of the trace.
///
/// The origin is set by whichever channel reports a timestamp first and is
/// never changed afterwards.
#[derive(Debug, Default)]
pub struct ClockNormalizer {
    origin: OnceLock<u64>,
}

impl ClockNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// The origin timestamp, if any event has been observed yet.
    pub fn origin(&self) -> Option<u64> {
        self.origin.get().copied()
    }

    /// Seconds between `timestamp` and the origin. The first call sets the
    /// origin.
    pub fn relative_seconds(&self, timestamp: u64) -> f64 {
        let origin = *self.origin.get_or_init(|| timestamp);
        // Another CPU can submit an event stamped just before the origin.
        timestamp.saturating_sub(origin) as f64 / NS_PER_S
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;

    #[test]
    fn test_first_timestamp_is_origin() {
        let clock = ClockNormalizer::new();
        assert_eq!(clock.origin(), None);
        assert_eq!(clock.relative_seconds(5_000_000_000), 0.0);
        assert_eq!(clock.origin(), Some(5_000_000_000));
        assert_eq!(clock.relative_seconds(6_500_000_000), 1.5);
        assert_eq!(clock.relative_seconds(5_000_000_001), 1e-9);
        assert_eq!(clock.origin(), Some(5_000_000_000));
    }

    #[test]
    fn test_earlier_timestamp_clamps_to_zero() {
        let clock = ClockNormalizer::new();
        clock.relative_seconds(1_000);
        assert_eq!(clock.relative_seconds(10), 0.0);
        assert_eq!(clock.origin(), Some(1_000));
    }

    #[test]
    fn test_origin_set_once_across_threads() {
        let clock = ClockNormalizer::new();
        let barrier = Barrier::new(8);
        let results: Vec<f64> = std::thread::scope(|scope| {
            let handles: Vec<_> = (1..=8u64)
                .map(|i| {
                    let clock = &clock;
                    let barrier = &barrier;
                    scope.spawn(move || {
                        barrier.wait();
                        clock.relative_seconds(i * 1_000_000_000)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        let origin = clock.origin().unwrap();
        assert!((1_000_000_000..=8_000_000_000).contains(&origin));
        assert!(results.iter().all(|secs| *secs >= 0.0));
        // Whoever won, later lookups agree with it.
        for i in 1..=8u64 {
            let expected = (i * 1_000_000_000).saturating_sub(origin) as f64 / NS_PER_S;
            assert_eq!(clock.relative_seconds(i * 1_000_000_000), expected);
        }
        assert_eq!(clock.origin(), Some(origin));
    }
}
