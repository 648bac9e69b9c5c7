// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The `ContextCollector` seam: gathers whatever ambient material (diff,
//! open files, prior turns) a one-shot command needs before invoking the
//! model. The concrete collector lives outside this crate; only the trait
//! and a renderable bundle live here.

use async_trait::async_trait;

use crate::errors::BuckleyError;

/// One section folded into a [`ContextBundle`], recorded for audit: what
/// was gathered and a rough size, so a caller can see what the model was
/// actually shown without re-rendering the whole bundle.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub title: String,
    pub tokens: usize,
}

/// Bundle of context material assembled for one command invocation.
#[derive(Debug, Clone, Default)]
pub struct ContextBundle {
    pub user_input: String,
    pub sections: Vec<(String, String)>,
    pub audit: Vec<AuditEntry>,
}

impl ContextBundle {
    pub fn new(user_input: impl Into<String>) -> Self {
        Self { user_input: user_input.into(), sections: Vec::new(), audit: Vec::new() }
    }

    /// Add a titled section, recording its approximate token cost (the same
    /// 4-chars-per-token convention used elsewhere for untokenized text) in
    /// the audit trail.
    pub fn with_section(mut self, title: impl Into<String>, body: impl Into<String>) -> Self {
        let title = title.into();
        let body = body.into();
        self.audit.push(AuditEntry { title: title.clone(), tokens: (body.len() / 4).max(1) });
        self.sections.push((title, body));
        self
    }

    /// Render the bundle into a single user-prompt string: the raw input
    /// followed by each titled section.
    pub fn render(&self) -> String {
        let mut out = self.user_input.clone();
        for (title, body) in &self.sections {
            out.push_str("\n\n## ");
            out.push_str(title);
            out.push('\n');
            out.push_str(body);
        }
        out
    }

    /// Total approximate tokens across every audited section.
    pub fn audited_tokens(&self) -> usize {
        self.audit.iter().map(|e| e.tokens).sum()
    }
}

/// Gathers ambient material for a one-shot command before it reaches the
/// model. Fallible: a concrete collector may read files, run a VCS command,
/// or call another service, any of which can fail.
#[async_trait]
pub trait ContextCollector: Send + Sync {
    async fn collect(&self, user_input: &str) -> Result<ContextBundle, BuckleyError>;
}
