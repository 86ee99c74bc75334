use chrono::{Local, NaiveDate};

use crate::history::ConversationRecord;

/// Figures shown on the dashboard's stats tab.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageStats {
    pub total_queries: usize,
    pub queries_today: usize,
    pub estimated_tokens: usize,
}

impl UsageStats {
    /// `today` is a local calendar date.
    pub fn compute(records: &[ConversationRecord], today: NaiveDate) -> Self {
        let queries_today = records
            .iter()
            .filter(|r| r.timestamp.with_timezone(&Local).date_naive() == today)
            .count();

        let estimated_tokens = records
            .iter()
            .map(|r| estimate_tokens(&r.prompt) + estimate_tokens(&r.response))
            .sum();

        UsageStats {
            total_queries: records.len(),
            queries_today,
            estimated_tokens,
        }
    }
}

/// Roughly one token per four characters of English text.
///
/// Counts Unicode scalar values, so a character outside the Basic
/// Multilingual Plane (most emoji) counts once rather than as a UTF-16
/// surrogate pair.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}
