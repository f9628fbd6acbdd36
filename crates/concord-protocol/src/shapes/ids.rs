use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::try_join_all;
use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::context::{Context, Scope, Segment};
use crate::error::{ReduceFailure, ReduceResult, ShapeTag};
use crate::merge::{merge_asymmetric, merge_symmetric};
use crate::option::merge_option;
use crate::ports::{ExistenceReporter, ExistenceResolver};
use crate::protocol::{Alignment, Reduce, Report, Resolve};
use crate::variants::Variants;

pub type IdsAnswer<A> = IndexMap<String, Option<A>>;

type ExistenceChange = Arc<dyn Fn(&str) -> ReduceFailure + Send + Sync>;

/// Dictionary of sub-queries where each id may not exist.
///
/// Every id is first checked with the [`ExistenceResolver`]. Absent ids
/// answer `None` without touching the sub-protocol; present ids descend with
/// the discovered workspace merged over the current one. Reduction requires
/// all variants of an id to agree on existence.
pub struct Ids<S, R: ?Sized, P: ?Sized, E> {
    sub: S,
    existence: Arc<dyn ExistenceResolver<R, E>>,
    reporter: Arc<dyn ExistenceReporter<P>>,
    alignment: Alignment,
    on_existence_change: ExistenceChange,
}

impl<S, R: ?Sized, P: ?Sized, E> Ids<S, R, P, E> {
    pub fn new(
        sub: S,
        existence: impl ExistenceResolver<R, E> + 'static,
        reporter: impl ExistenceReporter<P> + 'static,
    ) -> Self {
        Self {
            sub,
            existence: Arc::new(existence),
            reporter: Arc::new(reporter),
            alignment: Alignment::Asymmetric,
            on_existence_change: Arc::new(|_: &str| ReduceFailure::structural(ShapeTag::Option)),
        }
    }

    pub fn alignment(mut self, alignment: Alignment) -> Self {
        self.alignment = alignment;
        self
    }

    /// Error returned when variants disagree on whether an id exists.
    pub fn on_existence_change(
        mut self,
        failure: impl Fn(&str) -> ReduceFailure + Send + Sync + 'static,
    ) -> Self {
        self.on_existence_change = Arc::new(failure);
        self
    }

    pub fn sub(&self) -> &S {
        &self.sub
    }

    async fn resolve_id(
        &self,
        resolvers: &R,
        id: &str,
        query: &S::Query,
        scope: &Scope,
    ) -> Result<(String, Option<S::Answer>), E>
    where
        R: Sync,
        S: Resolve<R, Error = E>,
    {
        let Some(extra) = self.existence.exists(resolvers, id, scope).await? else {
            debug!(id, context = %scope.context, "id absent, skipping sub-query");
            return Ok((id.to_owned(), None));
        };
        let child = scope.descend(Segment::id(id), extra);
        let answer = self.sub.process_query(resolvers, query, child).await?;
        Ok((id.to_owned(), Some(answer)))
    }
}

impl<S, R, P, E> Reduce for Ids<S, R, P, E>
where
    S: Reduce,
    R: ?Sized,
    P: ?Sized,
{
    type Answer = IdsAnswer<S::Answer>;

    fn reduce_result(&self, variants: Variants<Self::Answer>) -> ReduceResult<Self::Answer> {
        let lists: Vec<Vec<(String, Option<S::Answer>)>> = variants
            .into_iter()
            .map(|answer| answer.into_iter().collect())
            .collect();
        let reduce_values = |id: &String, values: Variants<Option<S::Answer>>| {
            match merge_option(values) {
                Ok(None) => Ok(None),
                Ok(Some(present)) => self.sub.reduce_result(present).map(Some),
                Err(mismatch) => {
                    warn!(
                        id = %id,
                        present = mismatch.present,
                        absent = mismatch.absent,
                        "id existence differs between variants"
                    );
                    Err((self.on_existence_change)(id))
                }
            }
        };
        let merged = match self.alignment {
            Alignment::Asymmetric => merge_asymmetric(lists, reduce_values)?,
            Alignment::Symmetric => merge_symmetric(lists, |a, b| a == b, reduce_values)
                .map_err(|error| error.or_key_mismatch(ReduceFailure::structural(ShapeTag::Ids)))?,
        };
        Ok(merged.into_iter().collect())
    }
}

#[async_trait]
impl<S, R, P, E> Resolve<R> for Ids<S, R, P, E>
where
    S: Resolve<R, Error = E>,
    R: ?Sized + Sync,
    P: ?Sized,
    E: Send,
{
    type Query = IndexMap<String, S::Query>;
    type Error = E;

    async fn process_query(
        &self,
        resolvers: &R,
        query: &Self::Query,
        scope: Scope,
    ) -> Result<Self::Answer, E> {
        debug!(ids = query.len(), context = %scope.context, "resolving ids");
        let scope = &scope;
        let pending: Vec<_> = query
            .iter()
            .map(|(id, sub_query)| self.resolve_id(resolvers, id, sub_query, scope))
            .collect();
        let answers = try_join_all(pending).await?;
        Ok(answers.into_iter().collect())
    }
}

#[async_trait]
impl<S, R, P, E> Report<P> for Ids<S, R, P, E>
where
    S: Report<P>,
    R: ?Sized,
    P: ?Sized + Sync,
{
    async fn process_result(&self, reporters: &P, answer: &Self::Answer, context: Context) {
        for (id, entry) in answer {
            self.reporter
                .report_existence(reporters, id, entry.is_some(), &context)
                .await;
            if let Some(sub_answer) = entry {
                self.sub
                    .process_result(reporters, sub_answer, context.child(Segment::id(id.as_str())))
                    .await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Workspace;
    use crate::ports::{NoopReporter, PayloadReporter, PayloadResolver};
    use crate::shapes::leaf::{Leaf, LeafAnswer};
    use parking_lot::Mutex;
    use serde_json::{Value, json};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// A tiny user table; `lookups` counts leaf resolutions.
    struct Users {
        rows: Value,
        lookups: AtomicUsize,
        fail_existence: bool,
    }

    impl Users {
        fn new(rows: Value) -> Self {
            Self {
                rows,
                lookups: AtomicUsize::new(0),
                fail_existence: false,
            }
        }
    }

    struct UserExists;

    #[async_trait]
    impl ExistenceResolver<Users, String> for UserExists {
        async fn exists(
            &self,
            resolvers: &Users,
            id: &str,
            _scope: &Scope,
        ) -> Result<Option<Workspace>, String> {
            if resolvers.fail_existence {
                return Err(format!("existence check failed for {id}"));
            }
            Ok(resolvers
                .rows
                .get(id)
                .map(|row| Workspace::new().with("record", row.clone())))
        }
    }

    /// Reads a field of the record discovered by the existence check.
    struct RecordField;

    #[async_trait]
    impl PayloadResolver<Users, String, Value, String> for RecordField {
        async fn resolve(
            &self,
            resolvers: &Users,
            field: &String,
            scope: &Scope,
        ) -> Result<Value, String> {
            resolvers.lookups.fetch_add(1, Ordering::SeqCst);
            let record = scope
                .workspace
                .get("record")
                .ok_or_else(|| format!("no record in workspace at {}", scope.context))?;
            Ok(record.get(field).cloned().unwrap_or(Value::Null))
        }
    }

    #[derive(Default)]
    struct Trail(Mutex<Vec<String>>);

    struct TrailExistence;

    #[async_trait]
    impl ExistenceReporter<Trail> for TrailExistence {
        async fn report_existence(&self, reporters: &Trail, id: &str, exists: bool, _context: &Context) {
            reporters.0.lock().push(format!("{id}:{exists}"));
        }
    }

    struct TrailValue;

    #[async_trait]
    impl PayloadReporter<Trail, Value> for TrailValue {
        async fn report(&self, reporters: &Trail, payload: &Value, context: &Context) {
            reporters.0.lock().push(format!("{context}={payload}"));
        }
    }

    type UserIds = Ids<Leaf<Users, Trail, String, Value, String>, Users, Trail, String>;

    fn ids() -> UserIds {
        Ids::new(Leaf::new(RecordField, TrailValue), UserExists, TrailExistence)
    }

    fn query(entries: &[(&str, &str)]) -> IndexMap<String, String> {
        entries
            .iter()
            .map(|(id, field)| ((*id).to_owned(), (*field).to_owned()))
            .collect()
    }

    fn present(field: &str, value: Value) -> Option<LeafAnswer<String, Value>> {
        Some(LeafAnswer::new(field.to_owned(), value))
    }

    #[tokio::test]
    async fn absent_ids_skip_the_sub_protocol() {
        let users = Users::new(json!({"u1": {"name": "Ada"}}));
        let answer = ids()
            .process_query(&users, &query(&[("u1", "name"), ("u9", "name")]), Scope::root())
            .await
            .unwrap();
        assert_eq!(answer["u1"], present("name", json!("Ada")));
        assert_eq!(answer["u9"], None);
        assert_eq!(users.lookups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn existence_workspace_reaches_the_child() {
        let users = Users::new(json!({"u1": {"email": "ada@example.com"}}));
        let scope = Scope::with_workspace(Workspace::new().with("record", "stale"));
        let answer = ids()
            .process_query(&users, &query(&[("u1", "email")]), scope)
            .await
            .unwrap();
        assert_eq!(answer["u1"], present("email", json!("ada@example.com")));
    }

    #[tokio::test]
    async fn existence_error_aborts_everything() {
        let mut users = Users::new(json!({"u1": {"name": "Ada"}}));
        users.fail_existence = true;
        let answer = ids()
            .process_query(&users, &query(&[("u1", "name")]), Scope::root())
            .await;
        assert_eq!(answer, Err("existence check failed for u1".to_owned()));
    }

    #[tokio::test]
    async fn reports_existence_then_sub_answer_in_order() {
        let users = Users::new(json!({"u2": {"name": "Grace"}}));
        let protocol = ids();
        let answer = protocol
            .process_query(&users, &query(&[("u1", "name"), ("u2", "name")]), Scope::root())
            .await
            .unwrap();
        let trail = Trail::default();
        protocol.process_result(&trail, &answer, Context::root()).await;
        assert_eq!(
            *trail.0.lock(),
            vec![
                "u1:false".to_owned(),
                "u2:true".to_owned(),
                "u2/\"name\"=\"Grace\"".to_owned(),
            ]
        );
    }

    #[test]
    fn existence_disagreement_is_a_failure() {
        let variants = Variants::new(vec![
            IndexMap::from([("id1".to_owned(), present("name", json!("x")))]),
            IndexMap::from([("id1".to_owned(), None)]),
        ])
        .unwrap();
        assert_eq!(
            ids().reduce_result(variants),
            Err(ReduceFailure::StructuralMismatch(ShapeTag::Option))
        );
    }

    #[test]
    fn existence_disagreement_uses_caller_error() {
        let protocol = ids().on_existence_change(|id| ReduceFailure::ExistenceChanged {
            id: id.to_owned(),
        });
        let variants = Variants::new(vec![
            IndexMap::from([("id1".to_owned(), None)]),
            IndexMap::from([("id1".to_owned(), present("name", json!("x")))]),
        ])
        .unwrap();
        assert_eq!(
            protocol.reduce_result(variants),
            Err(ReduceFailure::ExistenceChanged {
                id: "id1".to_owned()
            })
        );
    }

    #[test]
    fn unanimous_answers_reduce() {
        let variants = Variants::new(vec![
            IndexMap::from([
                ("gone".to_owned(), None),
                ("u1".to_owned(), present("name", json!("Ada"))),
            ]),
            IndexMap::from([
                ("gone".to_owned(), None),
                ("u1".to_owned(), present("name", json!("Ada"))),
                ("new".to_owned(), present("name", json!("Lin"))),
            ]),
        ])
        .unwrap();
        let merged = ids().reduce_result(variants).unwrap();
        let keys: Vec<&str> = merged.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["gone", "u1", "new"]);
        assert_eq!(merged["new"], present("name", json!("Lin")));
    }

    #[test]
    fn symmetric_alignment_rejects_new_ids() {
        let protocol = ids().alignment(Alignment::Symmetric);
        let variants = Variants::new(vec![
            IndexMap::from([("u1".to_owned(), None)]),
            IndexMap::from([("u1".to_owned(), None), ("u2".to_owned(), None)]),
        ])
        .unwrap();
        assert_eq!(
            protocol.reduce_result(variants),
            Err(ReduceFailure::StructuralMismatch(ShapeTag::Ids))
        );
    }

    #[tokio::test]
    async fn noop_reporter_accepts_everything() {
        let protocol: Ids<Leaf<Users, (), String, Value, String>, Users, (), String> =
            Ids::new(Leaf::new(RecordField, NoopReporter), UserExists, NoopReporter);
        let users = Users::new(json!({"u1": {"name": "Ada"}}));
        let answer = protocol
            .process_query(&users, &query(&[("u1", "name")]), Scope::root())
            .await
            .unwrap();
        protocol.process_result(&(), &answer, Context::root()).await;
        assert_eq!(answer.len(), 1);
    }
}
