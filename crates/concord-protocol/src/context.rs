//! Path context and workspace threaded through query descent.
//!
//! A [`Context`] is the trail of ancestor keys, ids and search terms leading
//! to the node being processed. A [`Workspace`] carries data discovered on
//! the way down (typically by an existence check) so descendants can reuse it
//! without a second fetch. Both are immutable per descent step: children get
//! an extended copy and never touch the parent's.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One step of the path from the protocol root to a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Segment {
    Key(String),
    Id(String),
    Terms(String),
    /// Leaf query payload, appended when a leaf reports its answer.
    Query(Value),
}

impl Segment {
    pub fn key(key: impl Into<String>) -> Self {
        Self::Key(key.into())
    }

    pub fn id(id: impl Into<String>) -> Self {
        Self::Id(id.into())
    }

    pub fn terms(terms: impl Into<String>) -> Self {
        Self::Terms(terms.into())
    }

    /// Builds a query segment. The conversion is total, so distinct payloads
    /// never collapse onto the same segment.
    pub fn query(payload: impl Into<Value>) -> Self {
        Self::Query(payload.into())
    }

    /// The textual value for key, id and terms segments.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Key(value) | Self::Id(value) | Self::Terms(value) => Some(value),
            Self::Query(_) => None,
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(value) | Self::Id(value) | Self::Terms(value) => f.write_str(value),
            Self::Query(value) => write!(f, "{value}"),
        }
    }
}

/// Ordered trail of segments, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Context {
    segments: Vec<Segment>,
}

impl Context {
    pub fn root() -> Self {
        Self::default()
    }

    /// Returns a copy of this context extended by `segment`.
    pub fn child(&self, segment: Segment) -> Self {
        let mut segments = Vec::with_capacity(self.segments.len() + 1);
        segments.extend(self.segments.iter().cloned());
        segments.push(segment);
        Self { segments }
    }

    /// Segments in root-to-leaf order.
    pub fn path(&self) -> &[Segment] {
        &self.segments
    }

    pub fn last(&self) -> Option<&Segment> {
        self.segments.last()
    }

    /// Innermost key segment, if any.
    pub fn last_key(&self) -> Option<&str> {
        self.segments.iter().rev().find_map(|segment| match segment {
            Segment::Key(key) => Some(key.as_str()),
            _ => None,
        })
    }

    /// Innermost id segment, if any.
    pub fn last_id(&self) -> Option<&str> {
        self.segments.iter().rev().find_map(|segment| match segment {
            Segment::Id(id) => Some(id.as_str()),
            _ => None,
        })
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, segment) in self.segments.iter().enumerate() {
            if index > 0 {
                f.write_str("/")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl FromIterator<Segment> for Context {
    fn from_iter<I: IntoIterator<Item = Segment>>(iter: I) -> Self {
        Self {
            segments: iter.into_iter().collect(),
        }
    }
}

/// Mergeable key/value bag threaded alongside the context.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Workspace(Map<String, Value>);

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Reads a field and deserializes it into `T`.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.0
            .get(key)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    /// Returns a copy of `self` overlaid with `extra`; `extra` wins on conflicts.
    pub fn merged(&self, extra: Workspace) -> Workspace {
        let mut fields = self.0.clone();
        fields.extend(extra.0);
        Workspace(fields)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for Workspace {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

/// Everything a resolver sees besides its own payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scope {
    pub context: Context,
    pub workspace: Workspace,
}

impl Scope {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn with_workspace(workspace: Workspace) -> Self {
        Self {
            context: Context::root(),
            workspace,
        }
    }

    /// Extends the context, keeping the workspace.
    pub fn child(&self, segment: Segment) -> Self {
        Self {
            context: self.context.child(segment),
            workspace: self.workspace.clone(),
        }
    }

    /// Extends the context and overlays `extra` on the workspace.
    pub fn descend(&self, segment: Segment, extra: Workspace) -> Self {
        Self {
            context: self.context.child(segment),
            workspace: self.workspace.merged(extra),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn child_does_not_touch_parent() {
        let parent = Context::root().child(Segment::key("users"));
        let child = parent.child(Segment::id("u1"));
        assert_eq!(parent.len(), 1);
        assert_eq!(child.len(), 2);
        assert_eq!(
            child.path(),
            &[Segment::key("users"), Segment::id("u1")][..]
        );
    }

    #[test]
    fn context_renders_root_to_leaf() {
        let context: Context = [
            Segment::terms("ali"),
            Segment::id("u1"),
            Segment::query("email"),
        ]
        .into_iter()
        .collect();
        assert_eq!(context.to_string(), "ali/u1/\"email\"");
    }

    #[test]
    fn last_key_and_id_skip_other_segments() {
        let context = Context::root()
            .child(Segment::id("u1"))
            .child(Segment::key("name"))
            .child(Segment::query(()));
        assert_eq!(context.last_key(), Some("name"));
        assert_eq!(context.last_id(), Some("u1"));
        assert_eq!(Context::root().last_key(), None);
    }

    #[test]
    fn distinct_query_payloads_give_distinct_segments() {
        let by_name = Segment::query(json!({"field": "name", "limit": 1}));
        let by_email = Segment::query(json!({"field": "email", "limit": 1}));
        assert_ne!(by_name, by_email);
        assert_eq!(Segment::query(()), Segment::Query(Value::Null));
        assert_eq!(Segment::query("tea"), Segment::Query(json!("tea")));
    }

    #[test]
    fn workspace_merge_prefers_extra() {
        let parent = Workspace::new().with("record", json!({"id": 1})).with("tenant", "a");
        let extra = Workspace::new().with("record", json!({"id": 2}));
        let merged = parent.merged(extra);
        assert_eq!(merged.get("record"), Some(&json!({"id": 2})));
        assert_eq!(merged.get("tenant"), Some(&json!("a")));
        assert_eq!(parent.get("record"), Some(&json!({"id": 1})));
    }

    #[test]
    fn workspace_get_as_deserializes() {
        let workspace = Workspace::new().with("limit", 7);
        assert_eq!(workspace.get_as::<u32>("limit"), Some(7));
        assert_eq!(workspace.get_as::<String>("limit"), None);
        assert_eq!(workspace.get_as::<u32>("missing"), None);
    }

    #[test]
    fn scope_descend_extends_both() {
        let scope = Scope::with_workspace(Workspace::new().with("tenant", "a"));
        let child = scope.descend(Segment::id("u1"), Workspace::new().with("record", true));
        assert_eq!(child.context.last_id(), Some("u1"));
        assert_eq!(child.workspace.len(), 2);
        assert!(scope.context.is_empty());
        assert_eq!(scope.workspace.len(), 1);
    }

    #[test]
    fn segment_serde_is_tagged() {
        let json = serde_json::to_value(Segment::key("name")).unwrap();
        assert_eq!(json, json!({"kind": "key", "value": "name"}));
    }
}
