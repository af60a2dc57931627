//! Question/answer session recording.
//!
//! A session is a named, append-only log of `{question, answer}` pairs.
//! While a session is active every orchestrator request appends to it;
//! re-activating a name keeps appending to the same log rather than
//! replacing it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One recorded question/answer pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaEntry {
    pub question: String,
    pub answer: String,
}

/// Append-only store of named QA sessions.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    active: Option<String>,
    logs: BTreeMap<String, Vec<QaEntry>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Activate recording under `name`. Subsequent appends land in that
    /// session's log until recording stops.
    pub fn record_qa(&mut self, name: impl Into<String>) {
        let name = name.into();
        tracing::debug!("QA recording active: {}", name);
        self.logs.entry(name.clone()).or_default();
        self.active = Some(name);
    }

    /// Stop recording. The accumulated logs remain readable.
    pub fn stop_recording(&mut self) {
        self.active = None;
    }

    /// Name of the session currently recording, if any.
    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Append a pair to the active session. A no-op when nothing records.
    pub fn append(&mut self, question: impl Into<String>, answer: impl Into<String>) {
        let Some(name) = &self.active else {
            return;
        };
        self.logs.entry(name.clone()).or_default().push(QaEntry {
            question: question.into(),
            answer: answer.into(),
        });
    }

    /// All entries recorded under `name`, in append order.
    pub fn qa_log(&self, name: &str) -> &[QaEntry] {
        self.logs.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The most recent entry recorded under `name`.
    pub fn last(&self, name: &str) -> Option<&QaEntry> {
        self.qa_log(name).last()
    }
}
