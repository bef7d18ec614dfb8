//! Refinement session state
//!
//! One session per planning request, owned by the refinement loop while it
//! runs. The attempt log only grows, and nothing is recorded after a passing
//! attempt.

use serde_json::{Map, Value};
use tracing::debug;

use crate::domain::{Attempt, Constraints, TaskAnalysis};

/// Where a session stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

/// Working state of one planning request
#[derive(Debug, Clone)]
pub struct RefinementSession {
    pub task: String,
    pub context: Option<Map<String, Value>>,
    pub constraints: Option<Constraints>,
    pub analysis: Option<TaskAnalysis>,
    max_iterations: u32,
    attempts: Vec<Attempt>,
    state: SessionState,
}

impl RefinementSession {
    /// Create a session; a zero budget is raised to one attempt
    pub fn new(task: impl Into<String>, max_iterations: u32) -> Self {
        let task = task.into();
        debug!(task_len = task.len(), max_iterations, "RefinementSession::new: called");
        Self {
            task,
            context: None,
            constraints: None,
            analysis: None,
            max_iterations: max_iterations.max(1),
            attempts: Vec::new(),
            state: SessionState::Running,
        }
    }

    /// Builder: set context
    pub fn with_context(mut self, context: Option<Map<String, Value>>) -> Self {
        self.context = context;
        self
    }

    /// Builder: set constraints
    pub fn with_constraints(mut self, constraints: Option<Constraints>) -> Self {
        self.constraints = constraints;
        self
    }

    /// Builder: set analysis
    pub fn with_analysis(mut self, analysis: Option<TaskAnalysis>) -> Self {
        self.analysis = analysis;
        self
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn attempts(&self) -> &[Attempt] {
        &self.attempts
    }

    pub fn into_attempts(self) -> Vec<Attempt> {
        self.attempts
    }

    pub fn last_attempt(&self) -> Option<&Attempt> {
        self.attempts.last()
    }

    /// Index the next attempt would get
    pub fn next_iteration(&self) -> u32 {
        self.attempts.len() as u32 + 1
    }

    pub fn has_budget(&self) -> bool {
        self.state == SessionState::Running && self.next_iteration() <= self.max_iterations
    }

    /// Append an attempt; a passing attempt ends the session
    pub fn record(&mut self, attempt: Attempt) {
        debug!(iteration = attempt.iteration, passed = attempt.outcome.is_passed(), "RefinementSession::record: called");
        debug_assert_eq!(self.state, SessionState::Running, "attempt recorded after session ended");
        debug_assert_eq!(attempt.iteration, self.next_iteration());
        if attempt.outcome.is_passed() {
            self.state = SessionState::Succeeded;
        }
        self.attempts.push(attempt);
    }

    pub fn fail(&mut self) {
        self.state = SessionState::Failed;
    }

    pub fn cancel(&mut self) {
        self.state = SessionState::Cancelled;
    }

    /// Tokens spent across all recorded attempts
    pub fn tokens_used(&self) -> u64 {
        self.attempts.iter().map(|a| a.tokens_used).sum()
    }

    /// One log line per attempt
    pub fn validation_logs(&self) -> Vec<String> {
        self.attempts.iter().map(Attempt::summary).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AttemptOutcome;
    use chrono::Utc;

    fn attempt(iteration: u32, outcome: AttemptOutcome) -> Attempt {
        Attempt {
            iteration,
            prompt: String::new(),
            response: String::new(),
            candidate: None,
            reasoning: String::new(),
            outcome,
            tokens_used: 10,
            duration_ms: 0,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_budget_tracking() {
        let mut session = RefinementSession::new("t", 2);
        assert!(session.has_budget());
        session.record(attempt(
            1,
            AttemptOutcome::ValidationFailed {
                messages: vec!["x".to_string()],
            },
        ));
        assert_eq!(session.next_iteration(), 2);
        assert!(session.has_budget());
        session.record(attempt(
            2,
            AttemptOutcome::ValidationFailed {
                messages: vec!["y".to_string()],
            },
        ));
        assert!(!session.has_budget());
        assert_eq!(session.tokens_used(), 20);
    }

    #[test]
    fn test_pass_ends_session() {
        let mut session = RefinementSession::new("t", 3);
        session.record(attempt(1, AttemptOutcome::Passed));
        assert_eq!(session.state(), SessionState::Succeeded);
        assert!(!session.has_budget());
        assert_eq!(session.validation_logs(), vec!["iteration 1: validation passed"]);
    }

    #[test]
    fn test_zero_budget_raised_to_one() {
        assert_eq!(RefinementSession::new("t", 0).max_iterations(), 1);
    }
}
