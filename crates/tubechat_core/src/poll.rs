use std::time::Duration;

use serde::Deserialize;

/// Server-side processing state of a video. A `null` status on the wire
/// means `Pending`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(from = "Option<String>")]
pub enum ProcessingStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
    Unknown(String),
}

impl ProcessingStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Self::Pending,
            "processing" => Self::Processing,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            _ => Self::Unknown(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Unknown(raw) => raw,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl From<Option<String>> for ProcessingStatus {
    fn from(raw: Option<String>) -> Self {
        raw.map(|raw| Self::parse(&raw)).unwrap_or_default()
    }
}

/// Wait between consecutive polls. Never decreases with the attempt number
/// and never exceeds `cap`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BackoffSchedule {
    /// `min(cap, base + n * step)`
    Additive {
        base: Duration,
        step: Duration,
        cap: Duration,
    },
    /// `min(cap, base * factor^min(n, max_exponent))`
    Multiplicative {
        base: Duration,
        factor: f64,
        cap: Duration,
        max_exponent: u32,
    },
}

impl BackoffSchedule {
    /// Delay to wait after 0-indexed attempt `attempt` before the next poll.
    pub fn interval(&self, attempt: u32) -> Duration {
        match *self {
            BackoffSchedule::Additive { base, step, cap } => {
                base.saturating_add(step.saturating_mul(attempt)).min(cap)
            }
            BackoffSchedule::Multiplicative {
                base,
                factor,
                cap,
                max_exponent,
            } => {
                let exponent = attempt.min(max_exponent) as i32;
                let scaled = base.as_secs_f64() * factor.max(1.0).powi(exponent);
                Duration::try_from_secs_f64(scaled)
                    .unwrap_or(cap)
                    .min(cap)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollPolicy {
    pub schedule: BackoffSchedule,
    /// Total requests allowed before giving up.
    pub max_attempts: u32,
    /// Consecutive failed requests allowed before giving up.
    pub max_consecutive_errors: u32,
}

impl PollPolicy {
    /// Per-video processing status polling.
    pub fn job_default() -> Self {
        Self {
            schedule: BackoffSchedule::Additive {
                base: Duration::from_millis(2_000),
                step: Duration::from_millis(1_000),
                cap: Duration::from_millis(10_000),
            },
            max_attempts: 30,
            max_consecutive_errors: 3,
        }
    }

    /// Project-wide video list refresh while anything is still processing.
    pub fn collection_default() -> Self {
        Self {
            schedule: BackoffSchedule::Multiplicative {
                base: Duration::from_millis(5_000),
                factor: 1.5,
                cap: Duration::from_millis(30_000),
                max_exponent: 10,
            },
            max_attempts: 15,
            max_consecutive_errors: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StallReason {
    AttemptBudget,
    ErrorBudget,
}

/// How a poll loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Completed,
    Failed,
    /// Gave up without a terminal status; the job may still finish server-side.
    Stalled(StallReason),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollObservation {
    Status(ProcessingStatus),
    /// Transport failure or non-2xx response.
    RequestFailed(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PollStep {
    Continue { delay: Duration },
    Finished(PollOutcome),
}

/// Attempt and error accounting for one poll loop.
#[derive(Debug, Clone, PartialEq)]
pub struct PollTracker {
    policy: PollPolicy,
    attempts: u32,
    consecutive_errors: u32,
    last_status: Option<ProcessingStatus>,
}

impl PollTracker {
    pub fn new(policy: PollPolicy) -> Self {
        Self {
            policy,
            attempts: 0,
            consecutive_errors: 0,
            last_status: None,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }

    pub fn last_status(&self) -> Option<&ProcessingStatus> {
        self.last_status.as_ref()
    }

    /// True when the attempt budget leaves no room for another request.
    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.policy.max_attempts
    }

    /// Records the result of one request and decides what happens next.
    pub fn observe(&mut self, observation: PollObservation) -> PollStep {
        let attempt = self.attempts;
        self.attempts += 1;

        match observation {
            PollObservation::Status(status) => {
                self.consecutive_errors = 0;
                let terminal = match status {
                    ProcessingStatus::Completed => Some(PollOutcome::Completed),
                    ProcessingStatus::Failed => Some(PollOutcome::Failed),
                    _ => None,
                };
                self.last_status = Some(status);
                if let Some(outcome) = terminal {
                    return PollStep::Finished(outcome);
                }
            }
            PollObservation::RequestFailed(_) => {
                self.consecutive_errors += 1;
                if self.consecutive_errors >= self.policy.max_consecutive_errors.max(1) {
                    return PollStep::Finished(PollOutcome::Stalled(StallReason::ErrorBudget));
                }
            }
        }

        if self.is_exhausted() {
            return PollStep::Finished(PollOutcome::Stalled(StallReason::AttemptBudget));
        }
        PollStep::Continue {
            delay: self.policy.schedule.interval(attempt),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn null_status_decodes_as_pending() {
        let status: ProcessingStatus = serde_json::from_str("null").unwrap();
        assert_eq!(status, ProcessingStatus::Pending);
        let status: ProcessingStatus = serde_json::from_str("\"Completed\"").unwrap();
        assert_eq!(status, ProcessingStatus::Completed);
    }

    #[test]
    fn additive_schedule_grows_then_caps() {
        let schedule = PollPolicy::job_default().schedule;
        let delays: Vec<_> = (0..12).map(|n| schedule.interval(n)).collect();
        assert_eq!(delays[0], ms(2_000));
        assert_eq!(delays[1], ms(3_000));
        assert_eq!(delays[8], ms(10_000));
        assert_eq!(delays[11], ms(10_000));
        assert!(delays.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn multiplicative_schedule_grows_then_caps() {
        let schedule = PollPolicy::collection_default().schedule;
        assert_eq!(schedule.interval(0), ms(5_000));
        assert_eq!(schedule.interval(1), ms(7_500));
        assert_eq!(schedule.interval(2), ms(11_250));
        assert_eq!(schedule.interval(5), ms(30_000));
        assert_eq!(schedule.interval(u32::MAX), ms(30_000));
        let delays: Vec<_> = (0..20).map(|n| schedule.interval(n)).collect();
        assert!(delays.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn shrinking_factor_is_clamped() {
        let schedule = BackoffSchedule::Multiplicative {
            base: ms(100),
            factor: 0.5,
            cap: ms(1_000),
            max_exponent: 10,
        };
        assert_eq!(schedule.interval(3), ms(100));
    }

    #[test]
    fn status_parsing_is_lenient() {
        assert_eq!(ProcessingStatus::parse("Completed"), ProcessingStatus::Completed);
        assert_eq!(
            ProcessingStatus::parse("queued"),
            ProcessingStatus::Unknown("queued".to_string())
        );
        assert!(!ProcessingStatus::parse("queued").is_terminal());
    }

    #[test]
    fn success_resets_error_streak() {
        let mut tracker = PollTracker::new(PollPolicy::job_default());
        tracker.observe(PollObservation::RequestFailed("boom".into()));
        tracker.observe(PollObservation::RequestFailed("boom".into()));
        assert_eq!(tracker.consecutive_errors(), 2);
        let step = tracker.observe(PollObservation::Status(ProcessingStatus::Processing));
        assert_eq!(tracker.consecutive_errors(), 0);
        assert_eq!(step, PollStep::Continue { delay: ms(4_000) });
        let step = tracker.observe(PollObservation::RequestFailed("boom".into()));
        assert!(matches!(step, PollStep::Continue { .. }));
    }

    #[test]
    fn zero_budget_is_exhausted_up_front() {
        let policy = PollPolicy {
            max_attempts: 0,
            ..PollPolicy::job_default()
        };
        assert!(PollTracker::new(policy).is_exhausted());
    }
}
