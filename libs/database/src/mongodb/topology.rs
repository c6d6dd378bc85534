//! Replica-set membership and per-database collection summaries

use mongodb::bson::{Bson, Document};
use serde::Serialize;

use super::server_info::as_f64;
use crate::common::BackendError;

/// One member as reported by `replSetGetStatus`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemberHealth {
    pub name: String,
    /// `PRIMARY`, `SECONDARY`, `ARBITER`, ...
    pub state: String,
    pub healthy: bool,
    pub uptime_secs: u64,
}

/// Replica-set health snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplicaSetStatus {
    pub set: String,
    pub members: Vec<MemberHealth>,
}

impl ReplicaSetStatus {
    /// Interpret a `replSetGetStatus` reply
    pub fn from_document(reply: &Document) -> Result<Self, BackendError> {
        let set = reply
            .get_str("set")
            .map_err(|e| BackendError::Malformed(format!("replSetGetStatus.set: {e}")))?
            .to_string();
        let members = reply
            .get_array("members")
            .map_err(|e| BackendError::Malformed(format!("replSetGetStatus.members: {e}")))?
            .iter()
            .map(member_from_bson)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { set, members })
    }

    pub fn healthy_count(&self) -> usize {
        self.members.iter().filter(|m| m.healthy).count()
    }

    /// At least one member is healthy
    pub fn is_healthy(&self) -> bool {
        self.healthy_count() > 0
    }

    /// Healthy over total members, e.g. `2/3`
    pub fn nodes_health(&self) -> String {
        format!("{}/{}", self.healthy_count(), self.members.len())
    }

    pub fn primary(&self) -> Option<&MemberHealth> {
        self.members.iter().find(|m| m.state == "PRIMARY")
    }
}

fn member_from_bson(value: &Bson) -> Result<MemberHealth, BackendError> {
    let member = value
        .as_document()
        .ok_or_else(|| BackendError::Malformed("replica-set member is not a document".into()))?;

    let name = member
        .get_str("name")
        .map_err(|e| BackendError::Malformed(format!("member.name: {e}")))?
        .to_string();
    let state = member.get_str("stateStr").unwrap_or("UNKNOWN").to_string();
    let healthy = member.get("health").and_then(as_f64) == Some(1.0);
    let uptime_secs = member
        .get("uptime")
        .and_then(as_f64)
        .map(|secs| secs.max(0.0) as u64)
        .unwrap_or(0);

    Ok(MemberHealth {
        name,
        state,
        healthy,
        uptime_secs,
    })
}

/// A collection and how many documents it holds
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionInfo {
    pub name: String,
    pub count: u64,
}

/// Collections of one database, sorted by name
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatabaseSummary {
    pub name: String,
    pub collections: Vec<CollectionInfo>,
}

impl DatabaseSummary {
    pub fn new(name: impl Into<String>, counts: Vec<(String, u64)>) -> Self {
        let mut collections: Vec<_> = counts
            .into_iter()
            .map(|(name, count)| CollectionInfo { name, count })
            .collect();
        collections.sort_by(|a, b| a.name.cmp(&b.name));

        Self {
            name: name.into(),
            collections,
        }
    }

    pub fn total_documents(&self) -> u64 {
        self.collections.iter().map(|c| c.count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;

    fn reply() -> Document {
        doc! {
            "set": "rs0",
            "members": [
                { "name": "mongo1:27017", "health": 1.0, "stateStr": "PRIMARY", "uptime": 3600 },
                { "name": "mongo2:27017", "health": 1.0, "stateStr": "SECONDARY", "uptime": 3590_i64 },
                { "name": "mongo3:27017", "health": 0.0, "stateStr": "(not reachable/healthy)", "uptime": 0 },
            ],
            "ok": 1.0,
        }
    }

    #[test]
    fn test_parse_replica_set_status() {
        let status = ReplicaSetStatus::from_document(&reply()).unwrap();

        assert_eq!(status.set, "rs0");
        assert_eq!(status.members.len(), 3);
        assert_eq!(status.healthy_count(), 2);
        assert_eq!(status.nodes_health(), "2/3");
        assert!(status.is_healthy());
        assert_eq!(status.primary().map(|m| m.name.as_str()), Some("mongo1:27017"));
        assert_eq!(status.members[1].uptime_secs, 3590);
        assert!(!status.members[2].healthy);
    }

    #[test]
    fn test_no_healthy_members() {
        let reply = doc! {
            "set": "rs0",
            "members": [{ "name": "mongo1:27017", "health": 0, "stateStr": "DOWN" }],
        };
        let status = ReplicaSetStatus::from_document(&reply).unwrap();
        assert!(!status.is_healthy());
        assert!(status.primary().is_none());
    }

    #[test]
    fn test_missing_members_is_malformed() {
        let err = ReplicaSetStatus::from_document(&doc! { "set": "rs0" }).unwrap_err();
        assert!(matches!(err, BackendError::Malformed(_)));
    }

    #[test]
    fn test_database_summary_sorted() {
        let summary = DatabaseSummary::new(
            "commonDB",
            vec![("users".into(), 4), ("posts".into(), 10), ("likes".into(), 0)],
        );

        let names: Vec<_> = summary.collections.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["likes", "posts", "users"]);
        assert_eq!(summary.total_documents(), 14);
    }

    #[test]
    fn test_summary_serializes_to_json() {
        let summary = DatabaseSummary::new("commonDB", vec![("test".into(), 1)]);
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["name"], "commonDB");
        assert_eq!(json["collections"][0]["count"], 1);
    }
}
