//! Per-sink severity gate

use super::log_event::LogEvent;
use super::log_level::LogLevel;

/// `true` iff the event is at least as severe as the threshold
#[inline]
pub fn admit(event: &LogEvent, threshold: LogLevel) -> bool {
    event.level >= threshold
}

/// Minimum-severity filter owned by one sink
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkFilter {
    threshold: LogLevel,
}

impl SinkFilter {
    pub const fn new(threshold: LogLevel) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> LogLevel {
        self.threshold
    }

    #[inline]
    pub fn admit(&self, event: &LogEvent) -> bool {
        admit(event, self.threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admit_all_pairings() {
        for threshold in LogLevel::ALL {
            let filter = SinkFilter::new(threshold);
            for level in LogLevel::ALL {
                let event = LogEvent::new(0, level, "x");
                assert_eq!(
                    filter.admit(&event),
                    level as u8 >= threshold as u8,
                    "level {level} threshold {threshold}"
                );
            }
        }
    }
}
