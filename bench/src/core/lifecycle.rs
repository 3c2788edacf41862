//! Timeout escalation state machine for a supervised child process.
//!
//! `Running → TimeoutPending → Terminated`, driven by exactly two timer events:
//! the run timeout (send SIGTERM) and the kill grace window (send SIGKILL).

/// Termination state of a supervised child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Running,
    /// SIGTERM sent, waiting out the grace window.
    TimeoutPending,
    /// SIGKILL sent.
    Terminated,
}

/// Signal the supervisor must deliver on a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escalation {
    Terminate,
    Kill,
}

impl Lifecycle {
    /// The run timeout elapsed.
    pub fn on_timeout(self) -> (Lifecycle, Option<Escalation>) {
        match self {
            Lifecycle::Running => (Lifecycle::TimeoutPending, Some(Escalation::Terminate)),
            other => (other, None),
        }
    }

    /// The grace window after SIGTERM elapsed.
    pub fn on_grace_expired(self) -> (Lifecycle, Option<Escalation>) {
        match self {
            Lifecycle::TimeoutPending => (Lifecycle::Terminated, Some(Escalation::Kill)),
            other => (other, None),
        }
    }

    /// Whether the run must be reported as timed out, regardless of exit code.
    pub fn timed_out(self) -> bool {
        !matches!(self, Lifecycle::Running)
    }
}
