//! Link rate and health monitoring
//!
//! Sample [`LinkStats`] at a fixed interval to get byte rates and to notice
//! when a robot that was talking has gone quiet (out of range, powered off,
//! or a Bluetooth adapter that went to sleep).

use serde::Serialize;
use std::time::Duration;

use super::LinkStats;

/// Default sampling interval
pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_millis(250);

/// Silence after which a connection is considered lost
pub const DEFAULT_LOST_AFTER: Duration = Duration::from_millis(1250);

/// Connection health derived from received traffic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LinkHealth {
    /// No connection open
    Disconnected,
    /// Connected, nothing received yet
    Waiting,
    /// Data is arriving
    Healthy,
    /// Was receiving, then nothing for at least the lost-after period
    LostConnection,
}

/// Result of one sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LinkReport {
    /// Counters at the time of the sample
    pub stats: LinkStats,
    /// Transmit rate over the last interval
    pub bytes_sent_per_sec: u64,
    /// Receive rate over the last interval
    pub bytes_received_per_sec: u64,
    /// Health verdict for this sample
    pub health: LinkHealth,
}

/// Turns periodic statistics snapshots into rates and a health verdict
#[derive(Debug, Clone)]
pub struct LinkMonitor {
    interval: Duration,
    lost_after: Duration,
    last: LinkStats,
    silent_samples: u32,
}

impl LinkMonitor {
    /// Monitor sampled every `interval` that reports a lost link after `lost_after` of silence
    pub fn new(interval: Duration, lost_after: Duration) -> Self {
        Self {
            interval,
            lost_after,
            last: LinkStats::default(),
            silent_samples: 0,
        }
    }

    /// Sampling interval this monitor assumes
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Forget previous samples
    pub fn reset(&mut self) {
        self.last = LinkStats::default();
        self.silent_samples = 0;
    }

    /// Take one sample; call once per interval.
    ///
    /// Counters that went backwards (the link reconnected) give a rate of zero.
    pub fn sample(&mut self, connected: bool, stats: LinkStats) -> LinkReport {
        let secs = self.interval.as_secs_f64().max(f64::EPSILON);
        let bytes_sent_per_sec =
            (stats.bytes_sent.saturating_sub(self.last.bytes_sent) as f64 / secs) as u64;
        let bytes_received_per_sec =
            (stats.bytes_received.saturating_sub(self.last.bytes_received) as f64 / secs) as u64;
        self.last = stats;

        let health = if !connected {
            self.silent_samples = 0;
            LinkHealth::Disconnected
        } else if stats.messages_received == 0 {
            LinkHealth::Waiting
        } else {
            if bytes_received_per_sec == 0 {
                self.silent_samples += 1;
            } else {
                self.silent_samples = 0;
            }
            if self.interval * self.silent_samples >= self.lost_after {
                LinkHealth::LostConnection
            } else {
                LinkHealth::Healthy
            }
        };

        LinkReport {
            stats,
            bytes_sent_per_sec,
            bytes_received_per_sec,
            health,
        }
    }
}

impl Default for LinkMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_INTERVAL, DEFAULT_LOST_AFTER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(bytes_received: u64, messages_received: u64) -> LinkStats {
        LinkStats {
            bytes_received,
            messages_received,
            ..LinkStats::default()
        }
    }

    #[test]
    fn test_rates() {
        let mut monitor = LinkMonitor::default();
        let report = monitor.sample(
            true,
            LinkStats {
                bytes_sent: 50,
                bytes_received: 100,
                messages_received: 2,
                ..LinkStats::default()
            },
        );
        assert_eq!(report.bytes_sent_per_sec, 200);
        assert_eq!(report.bytes_received_per_sec, 400);
        assert_eq!(report.health, LinkHealth::Healthy);
    }

    #[test]
    fn test_waiting_before_first_message() {
        let mut monitor = LinkMonitor::default();
        for _ in 0..10 {
            assert_eq!(monitor.sample(true, stats(0, 0)).health, LinkHealth::Waiting);
        }
    }

    #[test]
    fn test_lost_after_silence() {
        let mut monitor = LinkMonitor::default();
        assert_eq!(monitor.sample(true, stats(40, 1)).health, LinkHealth::Healthy);
        // 1.25 s at 0.25 s per sample is five silent samples
        for _ in 0..4 {
            assert_eq!(monitor.sample(true, stats(40, 1)).health, LinkHealth::Healthy);
        }
        assert_eq!(
            monitor.sample(true, stats(40, 1)).health,
            LinkHealth::LostConnection
        );
    }

    #[test]
    fn test_traffic_clears_silence() {
        let mut monitor = LinkMonitor::default();
        monitor.sample(true, stats(40, 1));
        for _ in 0..4 {
            monitor.sample(true, stats(40, 1));
        }
        assert_eq!(monitor.sample(true, stats(80, 2)).health, LinkHealth::Healthy);
        assert_eq!(monitor.sample(true, stats(80, 2)).health, LinkHealth::Healthy);
    }

    #[test]
    fn test_counter_reset_gives_zero_rate() {
        let mut monitor = LinkMonitor::default();
        monitor.sample(true, stats(1000, 10));
        let report = monitor.sample(false, LinkStats::default());
        assert_eq!(report.bytes_received_per_sec, 0);
        assert_eq!(report.health, LinkHealth::Disconnected);
    }
}
