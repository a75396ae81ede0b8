use std::time::Duration;

/// Timeouts and limits of the transaction engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverConfig {
    /// Time the controller has to ACK a data frame.
    pub ack_timeout: Duration,
    /// Time the controller has to send the paired response.
    pub response_timeout: Duration,
    /// Time the controller has to report the end of a transmission.
    pub callback_timeout: Duration,
    /// Time a node has to answer a Get. Device files may override it.
    pub node_report_timeout: Duration,
    /// Writes of the same frame after CAN, NAK or a missing ACK.
    pub max_link_attempts: u8,
    /// Pause before sending again while the controller is jammed.
    pub jam_backoff: Duration,
    /// The controller counts as ready again after this long, even
    /// without a successful transmission.
    pub jam_timeout: Duration,
    /// Consecutive failed transactions before a node is declared dead.
    pub node_failure_threshold: u8,
    /// Maximum queued transactions. Further sends are dropped.
    pub queue_capacity: usize,
    /// Buffered driver events per subscriber.
    pub event_capacity: usize,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            ack_timeout: Duration::from_millis(1600),
            response_timeout: Duration::from_secs(10),
            callback_timeout: Duration::from_secs(65),
            node_report_timeout: Duration::from_secs(10),
            max_link_attempts: 3,
            jam_backoff: Duration::from_secs(1),
            jam_timeout: Duration::from_secs(30),
            node_failure_threshold: 3,
            queue_capacity: 256,
            event_capacity: 256,
        }
    }
}

impl DriverConfig {
    /// Delay before retry number `attempt` (1-based) of the same message.
    pub fn retry_delay(&self, attempt: u8) -> Duration {
        Duration::from_millis(100 + 1000 * u64::from(attempt.saturating_sub(1).min(4)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_delay_grows_and_caps() {
        let config = DriverConfig::default();
        assert_eq!(config.retry_delay(1), Duration::from_millis(100));
        assert_eq!(config.retry_delay(2), Duration::from_millis(1100));
        assert_eq!(config.retry_delay(9), Duration::from_millis(4100));
    }
}
