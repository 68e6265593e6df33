//! Audit transcript of one request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::Domain;
use crate::ids::NodeId;

/// Who produced a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "actor", rename_all = "snake_case")]
pub enum Actor {
    /// The intent router / planner.
    Router,
    /// A domain worker process.
    Worker { domain: Domain },
    /// The task executor.
    Executor,
    /// The result aggregator.
    Aggregator,
}

/// One entry of the audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,

    /// Component that produced the event.
    #[serde(flatten)]
    pub actor: Actor,

    /// What happened, human-readable.
    pub event: String,

    /// Node the event concerns, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<NodeId>,
}

/// The ordered audit record of everything attempted during one request.
///
/// Append-only while the request runs, then handed to the audit archive
/// and discarded by the core.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    /// Create an empty transcript.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry stamped with the current time.
    pub fn record(&mut self, actor: Actor, event: impl Into<String>) {
        self.entries.push(TranscriptEntry {
            timestamp: Utc::now(),
            actor,
            event: event.into(),
            node_id: None,
        });
    }

    /// Append an entry concerning a specific plan node.
    pub fn record_node(&mut self, actor: Actor, node_id: NodeId, event: impl Into<String>) {
        self.entries.push(TranscriptEntry {
            timestamp: Utc::now(),
            actor,
            event: event.into(),
            node_id: Some(node_id),
        });
    }

    /// The entries in order of occurrence.
    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    /// Number of recorded entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether anything was recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_order_is_preserved() {
        let mut transcript = Transcript::new();
        transcript.record(Actor::Router, "planned 2 nodes");
        transcript.record_node(
            Actor::Executor,
            NodeId::new("node-1"),
            "invoking calendar.create_event",
        );
        transcript.record(Actor::Aggregator, "aggregated 2 results");

        let events: Vec<_> = transcript.entries().iter().map(|e| e.event.as_str()).collect();
        assert_eq!(
            events,
            vec![
                "planned 2 nodes",
                "invoking calendar.create_event",
                "aggregated 2 results"
            ]
        );
    }

    #[test]
    fn test_serializes_actor_tag() {
        let mut transcript = Transcript::new();
        transcript.record(Actor::Worker { domain: Domain::Mail }, "manifest sent");
        let json = serde_json::to_string(&transcript).unwrap();
        assert!(json.contains(r#""actor":"worker""#));
        assert!(json.contains(r#""domain":"mail""#));
    }
}
