// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The `Persistence` seam (consumed, not implemented, by the orchestration
//! core): session CRUD, atomic message append, and plan/todo storage. An
//! in-memory implementation is provided for tests and for running without a
//! durable backend.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use buckley_model::Message;

use crate::errors::BuckleyError;
use crate::session::{Plan, Session, Todo};

#[async_trait]
pub trait Persistence: Send + Sync {
    async fn create_session(&self, session: Session) -> Result<(), BuckleyError>;
    async fn get_session(&self, session_id: &str) -> Result<Option<Session>, BuckleyError>;
    async fn update_session(&self, session: Session) -> Result<(), BuckleyError>;

    /// Atomic single-message append: the message is durable before this
    /// returns, so a restart can safely resume the transcript from here.
    async fn append_message(&self, session_id: &str, message: Message) -> Result<(), BuckleyError>;
    async fn fetch_messages(
        &self,
        session_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Message>, BuckleyError>;

    async fn link_session_plan(&self, session_id: &str, plan_id: &str) -> Result<(), BuckleyError>;
    async fn save_plan(&self, plan: Plan) -> Result<(), BuckleyError>;
    async fn load_plan(&self, plan_id: &str) -> Result<Option<Plan>, BuckleyError>;
    async fn fetch_todos(&self, session_id: &str) -> Result<Vec<Todo>, BuckleyError>;
}

#[derive(Default)]
struct State {
    sessions: HashMap<String, Session>,
    messages: HashMap<String, Vec<Message>>,
    plans: HashMap<String, Plan>,
    session_plans: HashMap<String, String>,
    todos: HashMap<String, Vec<Todo>>,
}

/// In-memory `Persistence` used by tests and by any run without a durable
/// backend configured. `append_message` takes the lock for the duration of
/// the push, which is as atomic as this process gets.
#[derive(Default)]
pub struct InMemoryPersistence {
    state: Mutex<State>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Persistence for InMemoryPersistence {
    async fn create_session(&self, session: Session) -> Result<(), BuckleyError> {
        let mut state = self.state.lock().expect("persistence lock poisoned");
        state.sessions.insert(session.id.clone(), session);
        Ok(())
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<Session>, BuckleyError> {
        let state = self.state.lock().expect("persistence lock poisoned");
        Ok(state.sessions.get(session_id).cloned())
    }

    async fn update_session(&self, session: Session) -> Result<(), BuckleyError> {
        let mut state = self.state.lock().expect("persistence lock poisoned");
        if !state.sessions.contains_key(&session.id) {
            return Err(BuckleyError::InvalidInput(format!("unknown session `{}`", session.id)));
        }
        state.sessions.insert(session.id.clone(), session);
        Ok(())
    }

    async fn append_message(&self, session_id: &str, message: Message) -> Result<(), BuckleyError> {
        let mut state = self.state.lock().expect("persistence lock poisoned");
        if !state.sessions.contains_key(session_id) {
            return Err(BuckleyError::InvalidInput(format!("unknown session `{session_id}`")));
        }
        state.messages.entry(session_id.to_string()).or_default().push(message);
        Ok(())
    }

    async fn fetch_messages(
        &self,
        session_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Message>, BuckleyError> {
        let state = self.state.lock().expect("persistence lock poisoned");
        let all = state.messages.get(session_id).cloned().unwrap_or_default();
        Ok(all.into_iter().skip(offset).take(limit).collect())
    }

    async fn link_session_plan(&self, session_id: &str, plan_id: &str) -> Result<(), BuckleyError> {
        let mut state = self.state.lock().expect("persistence lock poisoned");
        if !state.sessions.contains_key(session_id) {
            return Err(BuckleyError::InvalidInput(format!("unknown session `{session_id}`")));
        }
        state.session_plans.insert(session_id.to_string(), plan_id.to_string());
        Ok(())
    }

    async fn save_plan(&self, plan: Plan) -> Result<(), BuckleyError> {
        let mut state = self.state.lock().expect("persistence lock poisoned");
        state.plans.insert(plan.id.clone(), plan);
        Ok(())
    }

    async fn load_plan(&self, plan_id: &str) -> Result<Option<Plan>, BuckleyError> {
        let state = self.state.lock().expect("persistence lock poisoned");
        Ok(state.plans.get(plan_id).cloned())
    }

    async fn fetch_todos(&self, session_id: &str) -> Result<Vec<Todo>, BuckleyError> {
        let state = self.state.lock().expect("persistence lock poisoned");
        Ok(state.todos.get(session_id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn now() -> chrono::DateTime<Utc> {
        chrono::DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap().with_timezone(&Utc)
    }

    #[tokio::test]
    async fn append_message_requires_existing_session() {
        let store = InMemoryPersistence::new();
        let err = store.append_message("missing", Message::user("hi", now())).await.unwrap_err();
        assert!(matches!(err, BuckleyError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn fetch_messages_honors_limit_and_offset() {
        let store = InMemoryPersistence::new();
        store.create_session(Session::new("s1", "/repo", now())).await.unwrap();
        for i in 0..5 {
            store.append_message("s1", Message::user(format!("msg{i}"), now())).await.unwrap();
        }
        let page = store.fetch_messages("s1", 2, 1).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].as_text(), "msg1");
    }

    #[tokio::test]
    async fn save_and_load_plan_round_trips() {
        let store = InMemoryPersistence::new();
        let plan = Plan::new("p1", "s1");
        store.save_plan(plan).await.unwrap();
        let loaded = store.load_plan("p1").await.unwrap();
        assert!(loaded.is_some());
    }

    #[tokio::test]
    async fn link_session_plan_requires_existing_session() {
        let store = InMemoryPersistence::new();
        let err = store.link_session_plan("missing", "p1").await.unwrap_err();
        assert!(matches!(err, BuckleyError::InvalidInput(_)));
    }
}
