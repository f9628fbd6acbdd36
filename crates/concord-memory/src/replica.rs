use std::time::Duration;

use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplicaError {
    #[error("replica {replica} is offline")]
    Offline { replica: String },
    #[error("replica {replica} has no collection {collection}")]
    MissingCollection { replica: String, collection: String },
    #[error("replica {replica} has no value at {path}")]
    MissingValue { replica: String, path: String },
    #[error("resolver needs {0} in scope")]
    MissingScope(&'static str),
}

/// A replica held entirely in memory as one JSON document.
///
/// The document is an object of collections; each collection is an object
/// of records keyed by id. Every access first waits out the configured
/// latency and fails if the replica has been taken offline.
#[derive(Debug, Clone)]
pub struct MemoryReplica {
    name: String,
    document: Value,
    latency: Duration,
    online: bool,
}

impl MemoryReplica {
    pub fn new(name: impl Into<String>, document: Value) -> Self {
        Self {
            name: name.into(),
            document,
            latency: Duration::ZERO,
            online: true,
        }
    }

    pub fn latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn offline(mut self) -> Self {
        self.online = false;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    pub fn is_online(&self) -> bool {
        self.online
    }

    /// Simulated round trip.
    pub async fn access(&self) -> Result<(), ReplicaError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if !self.online {
            return Err(ReplicaError::Offline {
                replica: self.name.clone(),
            });
        }
        Ok(())
    }

    pub fn collection(&self, collection: &str) -> Result<&Map<String, Value>, ReplicaError> {
        self.document
            .get(collection)
            .and_then(Value::as_object)
            .ok_or_else(|| ReplicaError::MissingCollection {
                replica: self.name.clone(),
                collection: collection.to_owned(),
            })
    }

    /// `Ok(None)` when the collection exists but the record does not.
    pub fn record(&self, collection: &str, id: &str) -> Result<Option<&Value>, ReplicaError> {
        Ok(self.collection(collection)?.get(id))
    }

    pub(crate) fn missing(&self, path: impl Into<String>) -> ReplicaError {
        ReplicaError::MissingValue {
            replica: self.name.clone(),
            path: path.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn replica() -> MemoryReplica {
        MemoryReplica::new(
            "primary",
            json!({"users": {"u1": {"name": "Ada"}}, "settings": {"theme": "dark"}}),
        )
    }

    #[test]
    fn reads_records_by_collection_and_id() {
        let replica = replica();
        assert_eq!(
            replica.record("users", "u1").unwrap(),
            Some(&json!({"name": "Ada"}))
        );
        assert_eq!(replica.record("users", "u9").unwrap(), None);
    }

    #[test]
    fn unknown_collection_is_an_error() {
        assert_eq!(
            replica().collection("groups"),
            Err(ReplicaError::MissingCollection {
                replica: "primary".to_owned(),
                collection: "groups".to_owned()
            })
        );
    }

    #[tokio::test]
    async fn offline_replica_refuses_access() {
        let replica = replica().offline();
        assert!(!replica.is_online());
        assert_eq!(
            replica.access().await,
            Err(ReplicaError::Offline {
                replica: "primary".to_owned()
            })
        );
    }

    #[tokio::test]
    async fn online_replica_waits_out_latency() {
        let replica = replica().latency(Duration::from_millis(5));
        let started = tokio::time::Instant::now();
        replica.access().await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(5));
    }
}
