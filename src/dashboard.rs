//! Prompt playground: one request in flight at most.

use crate::completion::CompletionError;
use crate::history::ConversationStore;
use crate::stats::UsageStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Submitting,
}

/// What the last finished request left on screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Succeeded(String),
    Failed(String),
}

pub struct Dashboard {
    prompt: String,
    phase: Phase,
    outcome: Option<Outcome>,
    store: ConversationStore,
}

impl Dashboard {
    pub fn new(store: ConversationStore) -> Self {
        Dashboard {
            prompt: String::new(),
            phase: Phase::Idle,
            outcome: None,
            store,
        }
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn outcome(&self) -> Option<&Outcome> {
        self.outcome.as_ref()
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    pub fn stats(&self, today: chrono::NaiveDate) -> UsageStats {
        UsageStats::compute(self.store.records(), today)
    }

    /// Re-read history, e.g. after the history page cleared it.
    pub fn reload(&mut self) {
        self.store.reload();
    }

    pub fn is_submitting(&self) -> bool {
        self.phase == Phase::Submitting
    }

    /// The prompt field is read-only while a request is out.
    pub fn edit_prompt(&mut self, value: String) {
        if !self.is_submitting() {
            self.prompt = value;
        }
    }

    pub fn can_submit(&self) -> bool {
        !self.is_submitting() && !self.prompt.trim().is_empty()
    }

    /// Start a request. Returns the prompt to send, or `None` when nothing
    /// should go out: a request is already in flight, or the prompt is blank
    /// (which leaves a validation message on screen).
    pub fn submit(&mut self) -> Option<String> {
        if self.is_submitting() {
            return None;
        }
        if self.prompt.trim().is_empty() {
            self.outcome = Some(Outcome::Failed(CompletionError::EmptyPrompt.to_string()));
            return None;
        }

        self.phase = Phase::Submitting;
        self.outcome = None;
        Some(self.prompt.clone())
    }

    /// Settle the in-flight request. Success records the exchange and clears
    /// the prompt; failure keeps the prompt for another try.
    pub fn finish(&mut self, result: Result<String, String>) {
        if !self.is_submitting() {
            tracing::debug!("ignoring completion with no request in flight");
            return;
        }
        self.phase = Phase::Idle;

        match result {
            Ok(response) => {
                let prompt = std::mem::take(&mut self.prompt);
                self.store.append(&prompt, &response);
                self.outcome = Some(Outcome::Succeeded(response));
            }
            Err(message) => {
                self.outcome = Some(Outcome::Failed(message));
            }
        }
    }
}
