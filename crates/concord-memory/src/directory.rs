//! A ready-made user directory protocol over [`MemoryReplica`]s.
//!
//! The tree has four optional properties:
//!
//! - `schema`: constant schema version; replicas must agree on it
//! - `users`: `id -> field -> value`, ids may be missing from a replica
//! - `settings`: `key -> value`; later variants win on disagreement
//! - `lookup`: `terms -> id -> value` of one field of every matching user

use concord_protocol::{
    Ids, IdsAnswer, Keys, KeysAnswer, Leaf, LeafAnswer, Literal, Properties, Search,
    SearchAnswer, combine, lens,
};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::connectors::{FieldSearch, IndexedField, RecordExists, RecordField, SettingValue};
use crate::recorder::{RecordExistence, RecordPayload, RecordTerms, Recorder};
use crate::replica::{MemoryReplica, ReplicaError};

pub const SCHEMA_VERSION: u32 = 1;
pub const USERS: &str = "users";
pub const SETTINGS: &str = "settings";
/// User field matched by `lookup` terms.
pub const SEARCH_FIELD: &str = "name";

type FieldLeaf = Leaf<MemoryReplica, Recorder, (), Value, ReplicaError>;
type LookupLeaf = Leaf<MemoryReplica, Recorder, String, Value, ReplicaError>;

pub type UsersProtocol = Ids<Keys<FieldLeaf>, MemoryReplica, Recorder, ReplicaError>;
pub type SettingsProtocol = Keys<FieldLeaf>;
pub type LookupProtocol = Search<LookupLeaf, MemoryReplica, Recorder, ReplicaError>;
pub type Directory =
    Properties<MemoryReplica, Recorder, DirectoryQuery, DirectoryAnswer, ReplicaError>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DirectoryQuery {
    #[serde(
        default,
        deserialize_with = "requested",
        skip_serializing_if = "Option::is_none"
    )]
    pub schema: Option<()>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub users: Option<IndexMap<String, IndexMap<String, ()>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<IndexMap<String, ()>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lookup: Option<IndexMap<String, String>>,
}

/// A present field asks for the property, even though `()` is written as `null`.
fn requested<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<()>, D::Error> {
    <()>::deserialize(deserializer)?;
    Ok(Some(()))
}

impl DirectoryQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schema(mut self) -> Self {
        self.schema = Some(());
        self
    }

    /// Asks for `fields` of user `id`.
    pub fn user(mut self, id: impl Into<String>, fields: &[&str]) -> Self {
        let fields = fields.iter().map(|field| ((*field).to_owned(), ())).collect();
        self.users.get_or_insert_default().insert(id.into(), fields);
        self
    }

    pub fn setting(mut self, key: impl Into<String>) -> Self {
        self.settings.get_or_insert_default().insert(key.into(), ());
        self
    }

    /// Asks for `field` of every user whose name matches `terms`.
    pub fn lookup(mut self, terms: impl Into<String>, field: impl Into<String>) -> Self {
        self.lookup
            .get_or_insert_default()
            .insert(terms.into(), field.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DirectoryAnswer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub users: Option<IdsAnswer<KeysAnswer<LeafAnswer<(), Value>>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<KeysAnswer<LeafAnswer<(), Value>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lookup: Option<SearchAnswer<LeafAnswer<String, Value>>>,
}

pub fn users_protocol() -> UsersProtocol {
    Ids::new(
        Keys::new(Leaf::new(RecordField, RecordPayload)),
        RecordExists::new(USERS),
        RecordExistence,
    )
}

pub fn settings_protocol() -> SettingsProtocol {
    Keys::new(Leaf::new(SettingValue::new(SETTINGS), RecordPayload).combine_payload(combine::last()))
}

pub fn lookup_protocol() -> LookupProtocol {
    Search::new(
        Leaf::new(IndexedField::new(USERS), RecordPayload),
        FieldSearch::new(USERS, SEARCH_FIELD),
        RecordTerms,
    )
}

/// The full directory tree. Replicas are expected read-first, write-last.
pub fn directory_protocol() -> Directory {
    Properties::new()
        .property(
            "schema",
            Literal::<u32, ReplicaError>::new(SCHEMA_VERSION),
            lens!(DirectoryQuery, DirectoryAnswer, schema),
        )
        .property(
            "users",
            users_protocol(),
            lens!(DirectoryQuery, DirectoryAnswer, users),
        )
        .property(
            "settings",
            settings_protocol(),
            lens!(DirectoryQuery, DirectoryAnswer, settings),
        )
        .property(
            "lookup",
            lookup_protocol(),
            lens!(DirectoryQuery, DirectoryAnswer, lookup),
        )
}
