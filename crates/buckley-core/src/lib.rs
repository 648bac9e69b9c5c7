// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Orchestration core: conversations, the event bus, the tool runner, the
//! one-shot command runner, sub-agents, and session/plan state.

mod bus;
mod cancellation;
mod command;
mod context_collector;
mod conversation;
mod dedup;
mod errors;
mod invoker;
mod persistence;
mod runner;
mod session;
mod sub_agent;
mod trace;

pub use bus::{pattern_matches, BusMessage, EventBus, Pattern, SubscriptionId, Topic};
pub use cancellation::CancellationToken;
pub use command::{Command, CommandRegistry, CommandRegistryError, CommandRunner};
pub use context_collector::{ContextBundle, ContextCollector};
pub use conversation::{Conversation, ExportedMessage};
pub use dedup::{canonicalize_arguments, dedup_key};
pub use errors::BuckleyError;
pub use invoker::{InvokeResult, ModelInvoker};
pub use persistence::{InMemoryPersistence, Persistence};
pub use runner::{RunOutcome, RunResult, ToolRunner, ToolRunnerConfig};
pub use session::{Plan, Session, SessionStatus, Task, TaskStatus, Todo};
pub use sub_agent::{SubAgentOrchestrator, SubAgentResult};
pub use trace::{compute_cost, truncate_snapshot, CostEntry, Ledger, Trace, TRACE_SNAPSHOT_CHARS};
