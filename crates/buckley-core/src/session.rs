// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Session, Plan/Task, and Todo state, owned by the persistence layer, read
//! and written through it. The core never mutates plan shape directly; it
//! only records status transitions the orchestrator publishes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// created → active → (paused ↔ active) → completed | failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Paused,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
    pub status: SessionStatus,
    pub project_path: String,
    pub git_repo: Option<String>,
    pub git_branch: Option<String>,
    pub aggregate_tokens: u64,
    pub aggregate_cost: f64,
}

impl Session {
    pub fn new(id: impl Into<String>, project_path: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            created_at: now,
            last_active_at: now,
            status: SessionStatus::Active,
            project_path: project_path.into(),
            git_repo: None,
            git_branch: None,
            aggregate_tokens: 0,
            aggregate_cost: 0.0,
        }
    }

    /// `true` iff the session accepts new work. Completed and failed
    /// sessions are terminal.
    pub fn accepts_new_work(&self) -> bool {
        matches!(self.status, SessionStatus::Active | SessionStatus::Paused)
    }

    pub fn pause(&mut self, now: DateTime<Utc>) {
        if self.status == SessionStatus::Active {
            self.status = SessionStatus::Paused;
            self.last_active_at = now;
        }
    }

    pub fn resume(&mut self, now: DateTime<Utc>) {
        if self.status == SessionStatus::Paused {
            self.status = SessionStatus::Active;
            self.last_active_at = now;
        }
    }

    pub fn complete(&mut self, now: DateTime<Utc>) {
        self.status = SessionStatus::Completed;
        self.last_active_at = now;
    }

    pub fn fail(&mut self, now: DateTime<Utc>) {
        self.status = SessionStatus::Failed;
        self.last_active_at = now;
    }

    pub fn record_usage(&mut self, tokens: u64, cost: f64, now: DateTime<Utc>) {
        self.aggregate_tokens += tokens;
        self.aggregate_cost += cost;
        self.last_active_at = now;
    }
}

/// pending → in-progress → (completed | failed | skipped). Terminal once
/// completed, failed, or skipped: no further transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Skipped,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Skipped)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub description: String,
    pub status: TaskStatus,
}

impl Task {
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self { id: id.into(), description: description.into(), status: TaskStatus::Pending }
    }

    /// Advance to `next`, rejecting the transition once this task has
    /// reached a terminal state.
    pub fn transition(&mut self, next: TaskStatus) -> Result<(), String> {
        if self.status.is_terminal() {
            return Err(format!("task `{}` is terminal ({:?}); cannot move to {next:?}", self.id, self.status));
        }
        self.status = next;
        Ok(())
    }
}

/// An ordered list of tasks. The orchestrator publishes status transitions
/// on the event bus; this struct just holds the shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub id: String,
    pub session_id: String,
    pub tasks: Vec<Task>,
}

impl Plan {
    pub fn new(id: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self { id: id.into(), session_id: session_id.into(), tasks: Vec::new() }
    }

    pub fn is_complete(&self) -> bool {
        !self.tasks.is_empty() && self.tasks.iter().all(|t| t.status == TaskStatus::Completed)
    }

    pub fn has_failed_task(&self) -> bool {
        self.tasks.iter().any(|t| t.status == TaskStatus::Failed)
    }
}

/// A flatter checklist item, independent of any plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Todo {
    pub id: String,
    pub text: String,
    pub done: bool,
}

impl Todo {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self { id: id.into(), text: text.into(), done: false }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap().with_timezone(&Utc)
    }

    #[test]
    fn new_session_is_active_and_accepts_work() {
        let s = Session::new("s1", "/repo", now());
        assert_eq!(s.status, SessionStatus::Active);
        assert!(s.accepts_new_work());
    }

    #[test]
    fn completed_session_refuses_new_work() {
        let mut s = Session::new("s1", "/repo", now());
        s.complete(now());
        assert!(!s.accepts_new_work());
    }

    #[test]
    fn pause_then_resume_round_trips_to_active() {
        let mut s = Session::new("s1", "/repo", now());
        s.pause(now());
        assert_eq!(s.status, SessionStatus::Paused);
        s.resume(now());
        assert_eq!(s.status, SessionStatus::Active);
    }

    #[test]
    fn record_usage_accumulates_tokens_and_cost() {
        let mut s = Session::new("s1", "/repo", now());
        s.record_usage(100, 0.01, now());
        s.record_usage(50, 0.02, now());
        assert_eq!(s.aggregate_tokens, 150);
        assert!((s.aggregate_cost - 0.03).abs() < 1e-9);
    }

    #[test]
    fn task_transition_rejected_once_terminal() {
        let mut t = Task::new("t1", "do the thing");
        t.transition(TaskStatus::Completed).unwrap();
        let err = t.transition(TaskStatus::InProgress).unwrap_err();
        assert!(err.contains("terminal"));
    }

    #[test]
    fn plan_is_complete_only_when_every_task_completed() {
        let mut plan = Plan::new("p1", "s1");
        plan.tasks.push(Task::new("t1", "a"));
        plan.tasks.push(Task::new("t2", "b"));
        assert!(!plan.is_complete());
        plan.tasks[0].transition(TaskStatus::Completed).unwrap();
        plan.tasks[1].transition(TaskStatus::Completed).unwrap();
        assert!(plan.is_complete());
    }

    #[test]
    fn plan_with_empty_tasks_is_not_complete() {
        let plan = Plan::new("p1", "s1");
        assert!(!plan.is_complete());
    }

    #[test]
    fn plan_detects_failed_task() {
        let mut plan = Plan::new("p1", "s1");
        plan.tasks.push(Task::new("t1", "a"));
        plan.tasks[0].transition(TaskStatus::Failed).unwrap();
        assert!(plan.has_failed_task());
    }

    #[test]
    fn todo_starts_undone() {
        let todo = Todo::new("td1", "write tests");
        assert!(!todo.done);
    }
}
