use std::sync::RwLock;
use std::time::Duration;

pub const DEFAULT_AVERAGE: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, Copy)]
struct Totals {
    count: u64,
    total: Duration,
}

/// Mean turnaround over every completed job.
///
/// Keeps a running count and sum instead of the samples themselves. Readers on
/// other tasks always see a consistent pair.
#[derive(Debug)]
pub struct RollingLatency {
    totals: RwLock<Totals>,
    default: Duration,
}

impl RollingLatency {
    pub fn new(default: Duration) -> Self {
        Self {
            totals: RwLock::new(Totals {
                count: 0,
                total: Duration::ZERO,
            }),
            default,
        }
    }

    pub fn record(&self, sample: Duration) {
        let mut totals = self.totals.write().unwrap_or_else(|e| e.into_inner());
        totals.count += 1;
        totals.total += sample;
    }

    pub fn average(&self) -> Duration {
        let totals = *self.totals.read().unwrap_or_else(|e| e.into_inner());
        if totals.count == 0 {
            return self.default;
        }
        Duration::from_secs_f64(totals.total.as_secs_f64() / totals.count as f64)
    }

    pub fn count(&self) -> u64 {
        self.totals.read().unwrap_or_else(|e| e.into_inner()).count
    }
}

impl Default for RollingLatency {
    fn default() -> Self {
        Self::new(DEFAULT_AVERAGE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_before_any_sample() {
        let stat = RollingLatency::default();
        assert_eq!(stat.average(), Duration::from_secs(120));
        assert_eq!(stat.count(), 0);
    }

    #[test]
    fn mean_of_all_samples() {
        let stat = RollingLatency::default();
        for secs in [1, 2, 6] {
            stat.record(Duration::from_secs(secs));
        }
        assert_eq!(stat.count(), 3);
        assert_eq!(stat.average(), Duration::from_secs(3));
    }
}
