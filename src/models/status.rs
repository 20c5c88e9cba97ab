use serde::{Deserialize, Serialize};

use super::cluster::{Cluster, ClusterStatus};

/// Event tag pushed by the status socket when a cluster changes state.
pub const CLUSTER_STATUS_UPDATED: &str = "cluster_status_updated";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterStatusEntry {
    #[serde(rename = "clusterId")]
    pub cluster_id: String,
    pub status: ClusterStatus,
}

/// Ordered status of every cluster the current user owns.
///
/// Membership comes only from directory fetches; socket events can change an
/// entry's status but never add or remove one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterStatusTable {
    entries: Vec<ClusterStatusEntry>,
}

impl ClusterStatusTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the table with the ids and statuses of a directory result,
    /// keeping the directory's order.
    pub fn seed(&mut self, clusters: &[Cluster]) {
        self.entries = clusters
            .iter()
            .map(|c| ClusterStatusEntry {
                cluster_id: c.id.clone(),
                status: c.status.clone(),
            })
            .collect();
    }

    /// Sets the status of `cluster_id` in place. Returns false when no entry
    /// matches, in which case the table is left as it was.
    pub fn apply(&mut self, cluster_id: &str, status: ClusterStatus) -> bool {
        match self.entries.iter_mut().find(|e| e.cluster_id == cluster_id) {
            Some(entry) => {
                entry.status = status;
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn get(&self, cluster_id: &str) -> Option<&ClusterStatus> {
        self.entries
            .iter()
            .find(|e| e.cluster_id == cluster_id)
            .map(|e| &e.status)
    }

    pub fn entries(&self) -> &[ClusterStatusEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct RawStatusEvent {
    event: String,
    #[serde(default, rename = "clusterId")]
    cluster_id_camel: Option<String>,
    #[serde(default)]
    cluster_id: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

/// A status-update push decoded from a socket text frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub cluster_id: String,
    pub status: ClusterStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusEvent {
    ClusterStatusUpdated(StatusUpdate),
    /// Well-formed frame with an event tag this dashboard does not act on.
    Ignored(String),
}

impl StatusEvent {
    /// Decodes a text frame. Both `clusterId` and `cluster_id` are accepted
    /// for the identifier; `clusterId` wins when a frame carries both.
    pub fn parse(payload: &str) -> Result<Self, serde_json::Error> {
        let raw: RawStatusEvent = serde_json::from_str(payload)?;
        if raw.event != CLUSTER_STATUS_UPDATED {
            return Ok(StatusEvent::Ignored(raw.event));
        }

        let cluster_id = raw.cluster_id_camel.or(raw.cluster_id);
        match (cluster_id, raw.status) {
            (Some(cluster_id), Some(status)) => Ok(StatusEvent::ClusterStatusUpdated(StatusUpdate {
                cluster_id,
                status: ClusterStatus::from(status),
            })),
            _ => Ok(StatusEvent::Ignored(raw.event)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster(id: &str, status: &str) -> Cluster {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "name": format!("cluster-{}", id),
            "status": status,
            "user": { "_id": "u1" }
        }))
        .unwrap()
    }

    #[test]
    fn seed_keeps_directory_order() {
        let mut table = ClusterStatusTable::new();
        table.seed(&[cluster("b", "Running"), cluster("a", "Pending")]);

        let ids: Vec<_> = table.entries().iter().map(|e| e.cluster_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(table.get("a"), Some(&ClusterStatus::Pending));
    }

    #[test]
    fn apply_changes_only_the_matching_entry() {
        let mut table = ClusterStatusTable::new();
        table.seed(&[cluster("a", "Pending"), cluster("b", "Pending"), cluster("c", "Stopped")]);

        assert!(table.apply("b", ClusterStatus::Running));
        assert_eq!(table.len(), 3);
        assert_eq!(table.get("a"), Some(&ClusterStatus::Pending));
        assert_eq!(table.get("b"), Some(&ClusterStatus::Running));
        assert_eq!(table.get("c"), Some(&ClusterStatus::Stopped));
    }

    #[test]
    fn apply_unknown_id_leaves_table_untouched() {
        let mut table = ClusterStatusTable::new();
        table.seed(&[cluster("a", "Pending")]);
        let before = table.clone();

        assert!(!table.apply("zzz", ClusterStatus::Running));
        assert_eq!(table, before);
    }

    #[test]
    fn parse_accepts_both_identifier_spellings() {
        let camel = StatusEvent::parse(r#"{"event":"cluster_status_updated","clusterId":"a","status":"Running"}"#).unwrap();
        let snake = StatusEvent::parse(r#"{"event":"cluster_status_updated","cluster_id":"a","status":"Running"}"#).unwrap();
        let expected = StatusEvent::ClusterStatusUpdated(StatusUpdate {
            cluster_id: "a".to_string(),
            status: ClusterStatus::Running,
        });
        assert_eq!(camel, expected);
        assert_eq!(snake, expected);
    }

    #[test]
    fn parse_prefers_camel_case_identifier() {
        let event = StatusEvent::parse(
            r#"{"event":"cluster_status_updated","clusterId":"a","cluster_id":"b","status":"Failed"}"#,
        )
        .unwrap();
        match event {
            StatusEvent::ClusterStatusUpdated(update) => assert_eq!(update.cluster_id, "a"),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn parse_keeps_unknown_status_verbatim() {
        let event = StatusEvent::parse(
            r#"{"event":"cluster_status_updated","clusterId":"a","status":"CrashLoopBackOff"}"#,
        )
        .unwrap();
        match event {
            StatusEvent::ClusterStatusUpdated(update) => {
                assert_eq!(update.status, ClusterStatus::Other("CrashLoopBackOff".to_string()));
                assert_eq!(update.status.to_string(), "CrashLoopBackOff");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn parse_ignores_other_events_and_rejects_garbage() {
        let event = StatusEvent::parse(r#"{"event":"connection_established","message":"hi"}"#).unwrap();
        assert_eq!(event, StatusEvent::Ignored("connection_established".to_string()));

        assert!(StatusEvent::parse("not json").is_err());
        assert!(StatusEvent::parse(r#"{"clusterId":"a"}"#).is_err());
    }
}
