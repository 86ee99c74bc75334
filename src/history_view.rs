use std::sync::Arc;

use crate::history::{ConversationRecord, ConversationStore};
use crate::storage::KeyValueStore;

pub const CONFIRM_CLEAR: &str =
    "Are you sure you want to clear all conversation history? This cannot be undone.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Success(String),
    Failure { summary: String, detail: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyState {
    NoHistory,
    NoMatches,
}

impl EmptyState {
    pub fn message(self) -> &'static str {
        match self {
            EmptyState::NoHistory => "Your conversation history is empty.",
            EmptyState::NoMatches => "No conversations found matching your search.",
        }
    }
}

/// Searchable, clearable view over its own copy of the saved history.
pub struct HistoryView {
    store: ConversationStore,
    query: String,
    // Matches for `query`, recomputed when the query or the store changes.
    visible: Vec<ConversationRecord>,
    confirming: bool,
    notice: Option<Notice>,
}

impl HistoryView {
    /// Load from storage, newest first.
    pub fn mount(kv: Arc<dyn KeyValueStore>) -> Self {
        let mut store = ConversationStore::load(kv);
        store.sort_newest_first();

        let mut view = HistoryView {
            store,
            query: String::new(),
            visible: Vec::new(),
            confirming: false,
            notice: None,
        };
        view.refilter();
        view
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn total(&self) -> usize {
        self.store.len()
    }

    pub fn set_query(&mut self, query: String) {
        if query != self.query {
            self.query = query;
            self.refilter();
        }
    }

    pub fn visible(&self) -> &[ConversationRecord] {
        &self.visible
    }

    pub fn empty_state(&self) -> Option<EmptyState> {
        if self.store.is_empty() {
            Some(EmptyState::NoHistory)
        } else if self.visible.is_empty() {
            Some(EmptyState::NoMatches)
        } else {
            None
        }
    }

    pub fn can_clear(&self) -> bool {
        !self.store.is_empty()
    }

    pub fn is_confirming(&self) -> bool {
        self.confirming
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }

    pub fn request_clear(&mut self) {
        if self.can_clear() {
            self.confirming = true;
        }
    }

    pub fn decline_clear(&mut self) {
        self.confirming = false;
    }

    /// Escape backs out of a pending confirmation first, then clears the
    /// search.
    pub fn escape(&mut self) {
        if self.confirming {
            self.decline_clear();
        } else {
            self.set_query(String::new());
        }
    }

    /// Clear after the user said yes. Returns the notice to show.
    pub fn confirm_clear(&mut self) -> Option<&Notice> {
        if !self.confirming {
            return None;
        }
        self.confirming = false;

        let notice = match self.store.clear() {
            Ok(()) => {
                self.query.clear();
                self.refilter();
                tracing::info!("conversation history cleared");
                Notice::Success("Conversation history cleared successfully!".to_string())
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to clear conversation history");
                Notice::Failure {
                    summary: "Failed to clear history.".to_string(),
                    detail: e.to_string(),
                }
            }
        };
        self.notice = Some(notice);
        self.notice.as_ref()
    }

    fn refilter(&mut self) {
        self.visible = self.store.search(&self.query).into_iter().cloned().collect();
    }
}
