use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::try_join_all;
use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::context::{Context, Scope, Segment};
use crate::error::{ReduceFailure, ReduceResult, ShapeTag};
use crate::merge::{MergeError, merge_symmetric};
use crate::ports::{TermsReporter, TermsResolver};
use crate::protocol::{Reduce, Report, Resolve};
use crate::variants::Variants;

/// `terms -> (id -> sub-answer)`.
pub type SearchAnswer<A> = IndexMap<String, IndexMap<String, A>>;

/// Dictionary keyed by search terms. Each terms entry is resolved to an
/// ordered id list, then the entry's sub-query runs once per discovered id.
///
/// Search results must reproduce exactly on every replica, so reduction is
/// symmetric at both levels: differing term sets fail with `terms`, differing
/// id lists with `ids`.
pub struct Search<S, R: ?Sized, P: ?Sized, E> {
    sub: S,
    terms: Arc<dyn TermsResolver<R, E>>,
    reporter: Arc<dyn TermsReporter<P>>,
}

impl<S, R: ?Sized, P: ?Sized, E> Search<S, R, P, E> {
    pub fn new(
        sub: S,
        terms: impl TermsResolver<R, E> + 'static,
        reporter: impl TermsReporter<P> + 'static,
    ) -> Self {
        Self {
            sub,
            terms: Arc::new(terms),
            reporter: Arc::new(reporter),
        }
    }

    pub fn sub(&self) -> &S {
        &self.sub
    }

    async fn resolve_terms(
        &self,
        resolvers: &R,
        terms: &str,
        query: &S::Query,
        scope: &Scope,
    ) -> Result<(String, IndexMap<String, S::Answer>), E>
    where
        R: Sync,
        S: Resolve<R, Error = E>,
    {
        let ids = self.terms.search(resolvers, terms, scope).await?;
        debug!(terms, hits = ids.len(), context = %scope.context, "terms resolved");
        let terms_scope = scope.child(Segment::terms(terms));
        let pending: Vec<_> = ids
            .into_iter()
            .map(|id| {
                let child = terms_scope.child(Segment::id(id.as_str()));
                self.resolve_hit(resolvers, id, query, child)
            })
            .collect();
        let answers = try_join_all(pending).await?;
        Ok((terms.to_owned(), answers.into_iter().collect()))
    }

    async fn resolve_hit(
        &self,
        resolvers: &R,
        id: String,
        query: &S::Query,
        scope: Scope,
    ) -> Result<(String, S::Answer), E>
    where
        R: Sync,
        S: Resolve<R, Error = E>,
    {
        let answer = self.sub.process_query(resolvers, query, scope).await?;
        Ok((id, answer))
    }
}

impl<S, R, P, E> Reduce for Search<S, R, P, E>
where
    S: Reduce,
    R: ?Sized,
    P: ?Sized,
{
    type Answer = SearchAnswer<S::Answer>;

    fn reduce_result(&self, variants: Variants<Self::Answer>) -> ReduceResult<Self::Answer> {
        let lists: Vec<Vec<(String, IndexMap<String, S::Answer>)>> = variants
            .into_iter()
            .map(|answer| answer.into_iter().collect())
            .collect();
        let merged = merge_symmetric(lists, |a, b| a == b, |terms: &String, hits| {
            self.reduce_hits(terms, hits)
        })
        .map_err(|error| match error {
            MergeError::KeyMismatch => {
                warn!("search variants disagree on terms");
                ReduceFailure::structural(ShapeTag::Terms)
            }
            MergeError::Values(failure) => failure,
        })?;
        Ok(merged.into_iter().collect())
    }
}

impl<S: Reduce, R: ?Sized, P: ?Sized, E> Search<S, R, P, E> {
    fn reduce_hits(
        &self,
        terms: &str,
        hits: Variants<IndexMap<String, S::Answer>>,
    ) -> ReduceResult<IndexMap<String, S::Answer>> {
        let lists: Vec<Vec<(String, S::Answer)>> = hits
            .into_iter()
            .map(|hit| hit.into_iter().collect())
            .collect();
        let merged = merge_symmetric(lists, |a, b| a == b, |_: &String, values| {
            self.sub.reduce_result(values)
        })
        .map_err(|error| match error {
            MergeError::KeyMismatch => {
                warn!(terms, "search variants disagree on ids");
                ReduceFailure::structural(ShapeTag::Ids)
            }
            MergeError::Values(failure) => failure,
        })?;
        Ok(merged.into_iter().collect())
    }
}

#[async_trait]
impl<S, R, P, E> Resolve<R> for Search<S, R, P, E>
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
        let scope = &scope;
        let pending: Vec<_> = query
            .iter()
            .map(|(terms, sub_query)| self.resolve_terms(resolvers, terms, sub_query, scope))
            .collect();
        let answers = try_join_all(pending).await?;
        Ok(answers.into_iter().collect())
    }
}

#[async_trait]
impl<S, R, P, E> Report<P> for Search<S, R, P, E>
where
    S: Report<P>,
    R: ?Sized,
    P: ?Sized + Sync,
{
    async fn process_result(&self, reporters: &P, answer: &Self::Answer, context: Context) {
        for (terms, hits) in answer {
            let ids: Vec<String> = hits.keys().cloned().collect();
            self.reporter
                .report_terms(reporters, terms, &ids, &context)
                .await;
            let terms_context = context.child(Segment::terms(terms.as_str()));
            for (id, sub_answer) in hits {
                self.sub
                    .process_result(
                        reporters,
                        sub_answer,
                        terms_context.child(Segment::id(id.as_str())),
                    )
                    .await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{PayloadReporter, PayloadResolver};
    use crate::shapes::leaf::{Leaf, LeafAnswer};
    use parking_lot::Mutex;

    /// Names indexed by id; search is a case-insensitive substring match.
    struct Index {
        names: Vec<(&'static str, &'static str)>,
    }

    struct NameSearch;

    #[async_trait]
    impl TermsResolver<Index, String> for NameSearch {
        async fn search(
            &self,
            resolvers: &Index,
            terms: &str,
            _scope: &Scope,
        ) -> Result<Vec<String>, String> {
            if terms.is_empty() {
                return Err("empty terms".to_owned());
            }
            let needle = terms.to_lowercase();
            Ok(resolvers
                .names
                .iter()
                .filter(|(_, name)| name.to_lowercase().contains(&needle))
                .map(|(id, _)| (*id).to_owned())
                .collect())
        }
    }

    /// Echoes the path it was resolved under.
    struct PathOf;

    #[async_trait]
    impl PayloadResolver<Index, (), String, String> for PathOf {
        async fn resolve(&self, _resolvers: &Index, _query: &(), scope: &Scope) -> Result<String, String> {
            Ok(scope.context.to_string())
        }
    }

    #[derive(Default)]
    struct Feed(Mutex<Vec<String>>);

    struct FeedTerms;

    #[async_trait]
    impl TermsReporter<Feed> for FeedTerms {
        async fn report_terms(&self, reporters: &Feed, terms: &str, ids: &[String], _context: &Context) {
            reporters.0.lock().push(format!("{terms}->{}", ids.join(",")));
        }
    }

    struct FeedPath;

    #[async_trait]
    impl PayloadReporter<Feed, String> for FeedPath {
        async fn report(&self, reporters: &Feed, payload: &String, _context: &Context) {
            reporters.0.lock().push(payload.clone());
        }
    }

    type NameSearchProtocol = Search<Leaf<Index, Feed, (), String, String>, Index, Feed, String>;

    fn search() -> NameSearchProtocol {
        Search::new(Leaf::new(PathOf, FeedPath), NameSearch, FeedTerms)
    }

    fn index() -> Index {
        Index {
            names: vec![("u1", "Ada Lovelace"), ("u2", "Grace Hopper"), ("u3", "Ada Yonath")],
        }
    }

    fn query(terms: &[&str]) -> IndexMap<String, ()> {
        terms.iter().map(|t| ((*t).to_owned(), ())).collect()
    }

    fn hits(entries: Vec<(&str, Vec<&str>)>) -> SearchAnswer<LeafAnswer<(), String>> {
        entries
            .into_iter()
            .map(|(terms, ids)| {
                let per_id: IndexMap<String, LeafAnswer<(), String>> = ids
                    .into_iter()
                    .map(|id| (id.to_owned(), LeafAnswer::new((), format!("{terms}/{id}"))))
                    .collect();
                (terms.to_owned(), per_id)
            })
            .collect()
    }

    #[tokio::test]
    async fn resolves_each_discovered_id_under_terms_then_id() {
        let answer = search()
            .process_query(&index(), &query(&["ada", "grace"]), Scope::root())
            .await
            .unwrap();
        assert_eq!(answer, hits(vec![("ada", vec!["u1", "u3"]), ("grace", vec!["u2"])]));
    }

    #[tokio::test]
    async fn terms_error_aborts() {
        let answer = search()
            .process_query(&index(), &query(&["ada", ""]), Scope::root())
            .await;
        assert_eq!(answer, Err("empty terms".to_owned()));
    }

    #[tokio::test]
    async fn reports_ids_before_each_sub_answer() {
        let protocol = search();
        let answer = protocol
            .process_query(&index(), &query(&["ada", "hopper"]), Scope::root())
            .await
            .unwrap();
        let feed = Feed::default();
        protocol.process_result(&feed, &answer, Context::root()).await;
        assert_eq!(
            *feed.0.lock(),
            vec![
                "ada->u1,u3".to_owned(),
                "ada/u1".to_owned(),
                "ada/u3".to_owned(),
                "hopper->u2".to_owned(),
                "hopper/u2".to_owned(),
            ]
        );
    }

    #[test]
    fn identical_results_reduce() {
        let variant = hits(vec![("ada", vec!["u1", "u3"])]);
        let variants = Variants::new(vec![variant.clone(), variant.clone()]).unwrap();
        assert_eq!(search().reduce_result(variants), Ok(variant));
    }

    #[test]
    fn differing_terms_fail_with_terms_tag() {
        let variants = Variants::new(vec![
            hits(vec![("ada", vec!["u1"])]),
            hits(vec![("ada", vec!["u1"]), ("grace", vec!["u2"])]),
        ])
        .unwrap();
        assert_eq!(
            search().reduce_result(variants),
            Err(ReduceFailure::StructuralMismatch(ShapeTag::Terms))
        );
    }

    #[test]
    fn differing_ids_fail_with_ids_tag() {
        let variants = Variants::new(vec![
            hits(vec![("ada", vec!["u1", "u3"])]),
            hits(vec![("ada", vec!["u1"])]),
        ])
        .unwrap();
        assert_eq!(
            search().reduce_result(variants),
            Err(ReduceFailure::StructuralMismatch(ShapeTag::Ids))
        );
    }

    #[test]
    fn reordered_ids_fail_with_ids_tag() {
        let variants = Variants::new(vec![
            hits(vec![("ada", vec!["u1", "u3"])]),
            hits(vec![("ada", vec!["u3", "u1"])]),
        ])
        .unwrap();
        assert_eq!(
            search().reduce_result(variants),
            Err(ReduceFailure::StructuralMismatch(ShapeTag::Ids))
        );
    }
}
