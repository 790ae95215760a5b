//! Audit Log - what each session action did, with the seed of every draw

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Pipeline stage an event or failure belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Upload,
    Mapping,
    Translation,
    Execution,
    Draw,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    /// A condition was translated
    Translated {
        condition: String,
        query: String,
        backend: String,
        elapsed_ms: u64,
    },

    /// A query was executed and cached
    Filtered {
        query: String,
        row_count: usize,
        elapsed_ms: u64,
    },

    /// Winners were drawn
    Drawn {
        seed: u64,
        k: usize,
        source_rows: Vec<usize>,
    },

    /// An action failed; the cache was left untouched
    Failed { stage: Stage, message: String },
}

/// Audit log entry
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    /// Entry ID
    pub id: String,

    pub timestamp: DateTime<Utc>,

    #[serde(flatten)]
    pub event: AuditEvent,
}

/// Bounded in-memory audit log; the oldest entries are evicted first
#[derive(Clone, Debug)]
pub struct AuditLog {
    entries: VecDeque<AuditLogEntry>,
    max_entries: usize,
}

impl AuditLog {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            max_entries: max_entries.max(1),
        }
    }

    /// Log an event, returning the entry id
    pub fn log(&mut self, event: AuditEvent) -> String {
        let entry_id = uuid::Uuid::new_v4().to_string();
        self.entries.push_back(AuditLogEntry {
            id: entry_id.clone(),
            timestamp: Utc::now(),
            event,
        });

        // Evict oldest if at capacity
        while self.entries.len() > self.max_entries {
            self.entries.pop_front();
        }

        entry_id
    }

    pub fn entries(&self) -> impl Iterator<Item = &AuditLogEntry> {
        self.entries.iter()
    }

    pub fn get_entry(&self, entry_id: &str) -> Option<&AuditLogEntry> {
        self.entries.iter().find(|e| e.id == entry_id)
    }

    pub fn last(&self) -> Option<&AuditLogEntry> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries as a JSON array
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.entries)
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new(1000) // Default: keep last 1000 entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eviction_keeps_newest() {
        let mut log = AuditLog::new(2);
        for seed in 0..3 {
            log.log(AuditEvent::Drawn { seed, k: 1, source_rows: vec![0] });
        }
        assert_eq!(log.len(), 2);
        let seeds: Vec<u64> = log
            .entries()
            .map(|e| match &e.event {
                AuditEvent::Drawn { seed, .. } => *seed,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(seeds, vec![1, 2]);
    }

    #[test]
    fn test_lookup_by_id() {
        let mut log = AuditLog::default();
        let id = log.log(AuditEvent::Failed {
            stage: Stage::Execution,
            message: "Unknown column 'x'".to_string(),
        });
        assert!(log.get_entry(&id).is_some());
        assert!(log.get_entry("missing").is_none());
    }

    #[test]
    fn test_json_shape() {
        let mut log = AuditLog::default();
        log.log(AuditEvent::Filtered {
            query: "SELECT * FROM df".to_string(),
            row_count: 4,
            elapsed_ms: 2,
        });
        let json: serde_json::Value = serde_json::from_str(&log.to_json().unwrap()).unwrap();
        assert_eq!(json[0]["event"], "filtered");
        assert_eq!(json[0]["row_count"], 4);
        assert!(json[0]["id"].as_str().is_some());
    }
}
