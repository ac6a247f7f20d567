use crate::commit::CommitInfo;
use crate::runner::{TestOutcome, TestStatus};
use crate::state::PersistentState;

/// What the orchestrator must do after an outcome has been evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Action {
    /// No transition. Log the commit unless it was already the last tested.
    LogNormal,
    /// Healthy tree just broke: record the offending commit and notify.
    LogAndNotifyBreak,
    /// Broken tree just recovered: clear the break record and notify.
    LogAndNotifyFix,
}

/// Decide what a single test outcome means against the persisted break
/// state. Pure: returns the successor state, never mutates or persists.
///
/// A failure while already broken is deliberately silent — every hook
/// invocation against an unfixed tree would otherwise re-notify.
pub(crate) fn evaluate(
    outcome: &TestOutcome,
    state: &PersistentState,
    commit: &CommitInfo,
) -> (PersistentState, Action) {
    let mut next = state.clone();
    match outcome.status {
        TestStatus::Failure | TestStatus::TimedOut => {
            if state.is_broken() {
                (next, Action::LogNormal)
            } else {
                next.broken_commit = commit.id.clone();
                next.broken_commit_author = commit.author.clone();
                (next, Action::LogAndNotifyBreak)
            }
        }
        TestStatus::Success => {
            if state.is_broken() {
                next.broken_commit.clear();
                next.broken_commit_author.clear();
                (next, Action::LogAndNotifyFix)
            } else {
                (next, Action::LogNormal)
            }
        }
    }
}

/// The "normal commit" log line is suppressed when the same commit was
/// already tested by a previous invocation.
pub(crate) fn normal_log_due(state: &PersistentState, commit: &CommitInfo) -> bool {
    commit.id != state.last_tested_commit
}
