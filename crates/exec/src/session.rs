//! Per-session run state: the busy guard and cooperative cancellation.
//!
//! A [`TestSession`] is a small state machine:
//!
//! ```text
//!   Idle ──begin──▶ Running{n} ──complete──▶ Idle
//!    ▲                 │
//!    │               cancel
//!    │                 ▼
//!    └───begin──── Cancelled{n}
//! ```
//!
//! `begin` while `Running` is refused, so a session never has more than one
//! outstanding call. A run's report is applied only while the session is
//! still `Running` that same run; anything arriving after a cancel is dropped.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;

use crate::controller::ExecutionReport;

/// Where a session currently stands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Idle,
    Running { run: u64 },
    Cancelled { run: u64 },
}

/// Returned by [`TestSession::begin`] when a run is already in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("a test run is already in progress for this session")]
pub struct SessionBusy;

#[derive(Debug, Default)]
struct SessionState {
    phase: Phase,
    runs_started: u64,
    cancel: Option<watch::Sender<bool>>,
    latest: Option<ExecutionReport>,
}

/// One test-bench session (one open test form).
#[derive(Debug, Default)]
pub struct TestSession {
    state: Mutex<SessionState>,
}

impl TestSession {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn phase(&self) -> Phase {
        self.lock().phase
    }

    pub fn is_busy(&self) -> bool {
        matches!(self.phase(), Phase::Running { .. })
    }

    /// The last report that was applied to this session.
    pub fn latest(&self) -> Option<ExecutionReport> {
        self.lock().latest.clone()
    }

    /// Start a run. Refused while another run is in flight.
    pub fn begin(&self) -> Result<RunGuard<'_>, SessionBusy> {
        let mut state = self.lock();
        if let Phase::Running { .. } = state.phase {
            return Err(SessionBusy);
        }
        state.runs_started += 1;
        let run = state.runs_started;
        let (sender, receiver) = watch::channel(false);
        state.cancel = Some(sender);
        state.phase = Phase::Running { run };
        Ok(RunGuard {
            session: self,
            run,
            token: CancelToken { receiver },
            finished: false,
        })
    }

    /// Cancel the in-flight run, if any. Returns whether a run was cancelled.
    pub fn cancel(&self) -> bool {
        let mut state = self.lock();
        let Phase::Running { run } = state.phase else {
            return false;
        };
        state.phase = Phase::Cancelled { run };
        if let Some(sender) = &state.cancel {
            sender.send_replace(true);
        }
        true
    }

    /// Clear the stored report, e.g. when the form is reopened.
    pub fn reset(&self) {
        let mut state = self.lock();
        if !matches!(state.phase, Phase::Running { .. }) {
            state.phase = Phase::Idle;
        }
        state.latest = None;
    }
}

/// Fires when the run it was issued for is cancelled.
#[derive(Debug, Clone)]
pub struct CancelToken {
    receiver: watch::Receiver<bool>,
}

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolves once the run is cancelled. Never resolves if the session
    /// moved on to a newer run without cancelling this one.
    pub async fn cancelled(&mut self) {
        if self.receiver.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Ownership of one run. Completing it applies the report; dropping it
/// unfinished frees the session.
#[derive(Debug)]
pub struct RunGuard<'a> {
    session: &'a TestSession,
    run: u64,
    token: CancelToken,
    finished: bool,
}

impl RunGuard<'_> {
    pub fn run(&self) -> u64 {
        self.run
    }

    pub fn token(&self) -> CancelToken {
        self.token.clone()
    }

    /// Apply `report` if this run is still the session's live run.
    /// Returns `false` when the run was cancelled and the report discarded.
    pub fn complete(mut self, report: ExecutionReport) -> bool {
        self.finished = true;
        let mut state = self.session.lock();
        if state.phase != (Phase::Running { run: self.run }) {
            return false;
        }
        state.phase = Phase::Idle;
        state.cancel = None;
        state.latest = Some(report);
        true
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let mut state = self.session.lock();
        if state.phase == (Phase::Running { run: self.run }) {
            state.phase = Phase::Idle;
            state.cancel = None;
        }
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{ExecutionReport, StopReason};

    fn report(id: &str) -> ExecutionReport {
        ExecutionReport {
            execution_id: id.to_string(),
            paginated: false,
            pages: Vec::new(),
            stop: StopReason::SinglePage,
            started_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn second_begin_is_refused_while_running() {
        let session = TestSession::new();
        let guard = session.begin().unwrap();
        assert!(session.is_busy());
        assert_eq!(session.begin().unwrap_err(), SessionBusy);
        assert!(guard.complete(report("a")));
        assert_eq!(session.phase(), Phase::Idle);
        assert!(session.begin().is_ok());
    }

    #[test]
    fn cancelled_run_report_is_discarded() {
        let session = TestSession::new();
        let guard = session.begin().unwrap();
        let token = guard.token();
        assert!(session.cancel());
        assert!(token.is_cancelled());
        assert_eq!(session.phase(), Phase::Cancelled { run: 1 });

        assert!(!guard.complete(report("late")));
        assert!(session.latest().is_none());
    }

    #[test]
    fn cancel_without_run_is_noop() {
        let session = TestSession::new();
        assert!(!session.cancel());
        assert_eq!(session.phase(), Phase::Idle);
    }

    #[test]
    fn new_run_after_cancel_is_not_affected_by_old_guard() {
        let session = TestSession::new();
        let old = session.begin().unwrap();
        session.cancel();
        let fresh = session.begin().unwrap();
        assert_eq!(fresh.run(), 2);
        assert!(!fresh.token().is_cancelled());

        assert!(!old.complete(report("old")));
        assert_eq!(session.phase(), Phase::Running { run: 2 });
        assert!(fresh.complete(report("new")));
        assert_eq!(session.latest().unwrap().execution_id, "new");
    }

    #[test]
    fn dropping_unfinished_guard_frees_session() {
        let session = TestSession::new();
        {
            let _guard = session.begin().unwrap();
            assert!(session.is_busy());
        }
        assert_eq!(session.phase(), Phase::Idle);
    }

    #[tokio::test]
    async fn token_resolves_on_cancel() {
        let session = TestSession::new();
        let guard = session.begin().unwrap();
        let mut token = guard.token();
        session.cancel();
        tokio::time::timeout(std::time::Duration::from_secs(1), token.cancelled())
            .await
            .unwrap();
    }
}
