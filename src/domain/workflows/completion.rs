use std::time::Duration;

/// Thresholds for deciding that a navigation has settled, using growth of
/// the screen recording as a liveness proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionPolicy {
    pub startup_timeout: Duration,
    pub total_timeout: Duration,
    pub poll_interval: Duration,
    pub startup_threshold_bytes: i64,
    pub idle_threshold_bytes: i64,
    /// Consecutive idle polls needed; the counter must exceed 3 by default.
    pub settle_idle_polls: u32,
}

impl Default for CompletionPolicy {
    fn default() -> Self {
        Self {
            startup_timeout: Duration::from_secs(30),
            total_timeout: Duration::from_secs(120),
            poll_interval: Duration::from_secs(5),
            startup_threshold_bytes: 50_000,
            idle_threshold_bytes: 10_000,
            settle_idle_polls: 4,
        }
    }
}

/// Thresholds for the received-bytes barrier used on the neutral page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkIdlePolicy {
    pub timeout: Duration,
    pub poll_interval: Duration,
    pub threshold_bytes: i64,
    pub idle_polls: u32,
}

impl Default for NetworkIdlePolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            poll_interval: Duration::from_secs(1),
            threshold_bytes: 10_000,
            idle_polls: 5,
        }
    }
}

/// Fires once a single delta exceeds the threshold.
#[derive(Debug, Clone)]
pub struct StartupTracker {
    threshold: i64,
    started: bool,
}

impl StartupTracker {
    pub fn new(threshold: i64) -> Self {
        Self {
            threshold,
            started: false,
        }
    }

    pub fn observe(&mut self, delta: i64) -> bool {
        if delta > self.threshold {
            self.started = true;
        }
        self.started
    }
}

/// Counts consecutive deltas at or under the threshold; any busy sample resets.
#[derive(Debug, Clone)]
pub struct IdleTracker {
    threshold: i64,
    required: u32,
    consecutive: u32,
}

impl IdleTracker {
    pub fn new(threshold: i64, required: u32) -> Self {
        Self {
            threshold,
            required: required.max(1),
            consecutive: 0,
        }
    }

    pub fn observe(&mut self, delta: i64) -> bool {
        if delta > self.threshold {
            self.consecutive = 0;
        } else {
            self.consecutive += 1;
        }
        self.is_idle()
    }

    pub fn is_idle(&self) -> bool {
        self.consecutive >= self.required
    }

    pub fn consecutive(&self) -> u32 {
        self.consecutive
    }
}

/// How a wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Signalled,
    Ceiling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionReport {
    pub startup: WaitOutcome,
    pub settle: WaitOutcome,
    pub polls: u32,
}
