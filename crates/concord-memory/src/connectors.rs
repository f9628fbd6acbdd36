//! Resolver connectors that read a [`MemoryReplica`].

use async_trait::async_trait;
use concord_protocol::{ExistenceResolver, PayloadResolver, Scope, TermsResolver, Workspace};
use serde_json::Value;
use tracing::debug;

use crate::replica::{MemoryReplica, ReplicaError};

/// Workspace key under which [`RecordExists`] publishes the found record.
pub const RECORD_KEY: &str = "record";

/// An id exists when its record is present in `collection`. The record is
/// handed to descendants through the workspace.
#[derive(Debug, Clone)]
pub struct RecordExists {
    collection: String,
}

impl RecordExists {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
        }
    }
}

#[async_trait]
impl ExistenceResolver<MemoryReplica, ReplicaError> for RecordExists {
    async fn exists(
        &self,
        replica: &MemoryReplica,
        id: &str,
        _scope: &Scope,
    ) -> Result<Option<Workspace>, ReplicaError> {
        replica.access().await?;
        let record = replica.record(&self.collection, id)?;
        Ok(record.map(|record| Workspace::new().with(RECORD_KEY, record.clone())))
    }
}

/// Reads the field named by the innermost key from the workspace record.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordField;

#[async_trait]
impl PayloadResolver<MemoryReplica, (), Value, ReplicaError> for RecordField {
    async fn resolve(
        &self,
        replica: &MemoryReplica,
        _query: &(),
        scope: &Scope,
    ) -> Result<Value, ReplicaError> {
        let field = scope
            .context
            .last_key()
            .ok_or(ReplicaError::MissingScope("a field key"))?;
        let record = scope
            .workspace
            .get(RECORD_KEY)
            .ok_or(ReplicaError::MissingScope("a record"))?;
        record
            .get(field)
            .cloned()
            .ok_or_else(|| replica.missing(scope.context.to_string()))
    }
}

/// Reads `collection[key]` for the innermost key.
#[derive(Debug, Clone)]
pub struct SettingValue {
    collection: String,
}

impl SettingValue {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
        }
    }
}

#[async_trait]
impl PayloadResolver<MemoryReplica, (), Value, ReplicaError> for SettingValue {
    async fn resolve(
        &self,
        replica: &MemoryReplica,
        _query: &(),
        scope: &Scope,
    ) -> Result<Value, ReplicaError> {
        let key = scope
            .context
            .last_key()
            .ok_or(ReplicaError::MissingScope("a setting key"))?;
        replica.access().await?;
        replica
            .collection(&self.collection)?
            .get(key)
            .cloned()
            .ok_or_else(|| replica.missing(format!("{}/{key}", self.collection)))
    }
}

/// Case-insensitive substring search over one string field of a collection.
/// Hits come back in collection order.
#[derive(Debug, Clone)]
pub struct FieldSearch {
    collection: String,
    field: String,
}

impl FieldSearch {
    pub fn new(collection: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            field: field.into(),
        }
    }
}

#[async_trait]
impl TermsResolver<MemoryReplica, ReplicaError> for FieldSearch {
    async fn search(
        &self,
        replica: &MemoryReplica,
        terms: &str,
        _scope: &Scope,
    ) -> Result<Vec<String>, ReplicaError> {
        replica.access().await?;
        let needle = terms.to_lowercase();
        let hits: Vec<String> = replica
            .collection(&self.collection)?
            .iter()
            .filter(|(_, record)| {
                record
                    .get(&self.field)
                    .and_then(Value::as_str)
                    .is_some_and(|value| value.to_lowercase().contains(&needle))
            })
            .map(|(id, _)| id.clone())
            .collect();
        debug!(replica = replica.name(), terms, hits = hits.len(), "field search");
        Ok(hits)
    }
}

/// Reads the field named by the query from the record of the innermost id.
#[derive(Debug, Clone)]
pub struct IndexedField {
    collection: String,
}

impl IndexedField {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
        }
    }
}

#[async_trait]
impl PayloadResolver<MemoryReplica, String, Value, ReplicaError> for IndexedField {
    async fn resolve(
        &self,
        replica: &MemoryReplica,
        field: &String,
        scope: &Scope,
    ) -> Result<Value, ReplicaError> {
        let id = scope
            .context
            .last_id()
            .ok_or(ReplicaError::MissingScope("a record id"))?;
        replica.access().await?;
        replica
            .record(&self.collection, id)?
            .and_then(|record| record.get(field))
            .cloned()
            .ok_or_else(|| replica.missing(format!("{}/{id}/{field}", self.collection)))
    }
}
