use std::sync::Arc;

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::storage::KeyValueStore;

pub const STORAGE_KEY: &str = "turbo-conversations";
pub const MAX_RECORDS: usize = 50;
const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub prompt: String,
    pub response: String,
}

impl ConversationRecord {
    pub fn new(prompt: impl Into<String>, response: impl Into<String>) -> Self {
        ConversationRecord {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            prompt: prompt.into(),
            response: response.into(),
        }
    }

    fn matches(&self, query: &str) -> bool {
        if query.is_empty() {
            return true;
        }
        let needle = query.to_lowercase();
        self.prompt.to_lowercase().contains(&needle) || self.response.to_lowercase().contains(&needle)
    }
}

#[derive(Serialize)]
struct Envelope<'a> {
    version: u32,
    records: &'a [ConversationRecord],
}

/// Bounded, newest-first history persisted as one blob under [`STORAGE_KEY`].
pub struct ConversationStore {
    kv: Arc<dyn KeyValueStore>,
    records: Vec<ConversationRecord>,
}

impl ConversationStore {
    /// Read the persisted history.
    ///
    /// A blob that is not a list (or a versioned envelope around one) is
    /// deleted and the store starts empty. Inside a well-formed list, records
    /// without a usable timestamp are dropped and other missing fields are
    /// filled in. Anything past [`MAX_RECORDS`] is left out.
    pub fn load(kv: Arc<dyn KeyValueStore>) -> Self {
        let mut records = match kv.get(STORAGE_KEY) {
            Ok(Some(raw)) => match decode(&raw) {
                Some(records) => records,
                None => {
                    tracing::warn!(key = STORAGE_KEY, "saved conversations are malformed, discarding");
                    if let Err(e) = kv.remove(STORAGE_KEY) {
                        tracing::warn!(error = %e, "failed to remove malformed conversations");
                    }
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!(error = %e, "failed to read saved conversations");
                Vec::new()
            }
        };
        if records.len() > MAX_RECORDS {
            tracing::debug!(count = records.len(), "saved conversations over the cap, keeping the newest");
            records.truncate(MAX_RECORDS);
        }

        tracing::debug!(count = records.len(), "loaded conversations");
        ConversationStore { kv, records }
    }

    /// Drop the in-memory copy and read storage again.
    pub fn reload(&mut self) {
        *self = Self::load(self.kv.clone());
    }

    pub fn records(&self) -> &[ConversationRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Put a new record at the head and persist. A failed write is logged;
    /// the in-memory history advances regardless.
    pub fn append(&mut self, prompt: &str, response: &str) -> &ConversationRecord {
        self.records.insert(0, ConversationRecord::new(prompt, response));
        self.records.truncate(MAX_RECORDS);

        if let Err(e) = self.persist() {
            tracing::warn!(error = %e, "failed to save conversations");
        }

        &self.records[0]
    }

    /// Remove the persisted blob, then empty memory. Callers confirm with the
    /// user first.
    pub fn clear(&mut self) -> anyhow::Result<()> {
        self.kv.remove(STORAGE_KEY)?;
        self.records.clear();
        Ok(())
    }

    /// Records whose prompt or response contains `query`, ignoring case. An
    /// empty query returns everything in order.
    pub fn search(&self, query: &str) -> Vec<&ConversationRecord> {
        self.records.iter().filter(|record| record.matches(query)).collect()
    }

    /// Reorder newest-first. Stable, so records sharing a timestamp keep
    /// their persisted order.
    pub fn sort_newest_first(&mut self) {
        self.records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    }

    fn persist(&self) -> anyhow::Result<()> {
        let blob = serde_json::to_string(&Envelope {
            version: SCHEMA_VERSION,
            records: &self.records,
        })?;
        self.kv.set(STORAGE_KEY, &blob)
    }
}

fn decode(raw: &str) -> Option<Vec<ConversationRecord>> {
    let items = match serde_json::from_str::<Value>(raw).ok()? {
        Value::Array(items) => items,
        Value::Object(mut envelope) => {
            if envelope.get("version").and_then(Value::as_u64) != Some(u64::from(SCHEMA_VERSION)) {
                return None;
            }
            match envelope.remove("records") {
                Some(Value::Array(items)) => items,
                _ => return None,
            }
        }
        _ => return None,
    };

    Some(items.iter().filter_map(recover).collect())
}

fn recover(item: &Value) -> Option<ConversationRecord> {
    let timestamp = item.get("timestamp").and_then(parse_timestamp)?;

    let id = match item.get("id") {
        Some(Value::String(id)) => id.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => Uuid::new_v4().to_string(),
    };

    let text = |field: &str| {
        item.get(field)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };

    Some(ConversationRecord {
        id,
        timestamp,
        prompt: text("prompt"),
        response: text("response"),
    })
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => {
            if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
                return Some(ts.with_timezone(&Utc));
            }
            // No offset: local wall-clock time.
            if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
                return Local
                    .from_local_datetime(&naive)
                    .earliest()
                    .map(|ts| ts.with_timezone(&Utc));
            }
            let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?;
            Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?))
        }
        Value::Number(n) => Utc.timestamp_millis_opt(n.as_i64()?).single(),
        _ => None,
    }
}
