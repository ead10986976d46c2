use std::time::Duration;

/// Tunables for one game client.
///
/// The delays are quiesce barriers between closing the stream and
/// reusing the transport. The defaults were measured against a
/// constrained TLS stack and are safe to shorten on a full host.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Wait after flagging the stream as paused before closing it.
    pub stream_stop_delay: Duration,
    /// Wait after closing the stream before the transport is reused.
    pub transport_quiesce: Duration,
    /// Wait after a request before the stream is reopened.
    pub stream_resume_delay: Duration,
    /// Longest time the machine may stay in one non-idle state.
    pub operation_timeout: Duration,
    /// Transport-level attempts per request, the first included.
    pub max_attempts: u32,
    /// Backoff before the second attempt; doubles after each failure.
    pub initial_backoff: Duration,
    /// Failed transport attempts in a row after which the connection is
    /// reset before the next operation starts.
    pub max_consecutive_failures: u32,
    /// A connection with no success for this long is reset before use.
    pub stale_after: Duration,
    /// Stream events surfaced per tick.
    pub max_events_per_tick: usize,
    /// Requests that may wait behind the one in flight.
    pub queue_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            stream_stop_delay: Duration::from_millis(50),
            transport_quiesce: Duration::from_millis(500),
            stream_resume_delay: Duration::from_millis(500),
            operation_timeout: Duration::from_secs(30),
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
            max_consecutive_failures: 3,
            stale_after: Duration::from_secs(600),
            max_events_per_tick: 32,
            queue_capacity: 16,
        }
    }
}
