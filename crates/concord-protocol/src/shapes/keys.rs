use async_trait::async_trait;
use futures_util::future::try_join_all;
use indexmap::IndexMap;
use tracing::debug;

use crate::context::{Context, Scope, Segment};
use crate::error::{ReduceFailure, ReduceResult, ShapeTag};
use crate::merge::{merge_asymmetric, merge_symmetric};
use crate::protocol::{Alignment, Reduce, Report, Resolve};
use crate::variants::Variants;

pub type KeysAnswer<A> = IndexMap<String, A>;

/// Dictionary of sub-queries where every key is guaranteed to resolve.
///
/// Keys resolve concurrently; reports run one key at a time in declaration
/// order. Variants are aligned asymmetrically unless configured otherwise.
pub struct Keys<S> {
    sub: S,
    alignment: Alignment,
}

impl<S> Keys<S> {
    pub fn new(sub: S) -> Self {
        Self {
            sub,
            alignment: Alignment::Asymmetric,
        }
    }

    pub fn alignment(mut self, alignment: Alignment) -> Self {
        self.alignment = alignment;
        self
    }

    pub fn sub(&self) -> &S {
        &self.sub
    }

    async fn resolve_key<R>(
        &self,
        resolvers: &R,
        key: &str,
        query: &S::Query,
        scope: Scope,
    ) -> Result<(String, S::Answer), S::Error>
    where
        R: ?Sized + Sync,
        S: Resolve<R>,
    {
        let answer = self.sub.process_query(resolvers, query, scope).await?;
        Ok((key.to_owned(), answer))
    }
}

impl<S: Reduce> Reduce for Keys<S> {
    type Answer = KeysAnswer<S::Answer>;

    fn reduce_result(&self, variants: Variants<Self::Answer>) -> ReduceResult<Self::Answer> {
        let lists: Vec<Vec<(String, S::Answer)>> = variants
            .into_iter()
            .map(|answer| answer.into_iter().collect())
            .collect();
        let reduce_values = |_: &String, values| self.sub.reduce_result(values);
        let merged = match self.alignment {
            Alignment::Asymmetric => merge_asymmetric(lists, reduce_values)?,
            Alignment::Symmetric => merge_symmetric(lists, |a, b| a == b, reduce_values)
                .map_err(|error| error.or_key_mismatch(ReduceFailure::structural(ShapeTag::Keys)))?,
        };
        Ok(merged.into_iter().collect())
    }
}

#[async_trait]
impl<R, S> Resolve<R> for Keys<S>
where
    R: ?Sized + Sync,
    S: Resolve<R>,
{
    type Query = IndexMap<String, S::Query>;
    type Error = S::Error;

    async fn process_query(
        &self,
        resolvers: &R,
        query: &Self::Query,
        scope: Scope,
    ) -> Result<Self::Answer, Self::Error> {
        debug!(keys = query.len(), context = %scope.context, "resolving keys");
        let pending: Vec<_> = query
            .iter()
            .map(|(key, sub_query)| {
                self.resolve_key(resolvers, key, sub_query, scope.child(Segment::key(key.as_str())))
            })
            .collect();
        let answers = try_join_all(pending).await?;
        Ok(answers.into_iter().collect())
    }
}

#[async_trait]
impl<P, S> Report<P> for Keys<S>
where
    P: ?Sized + Sync,
    S: Report<P>,
{
    async fn process_result(&self, reporters: &P, answer: &Self::Answer, context: Context) {
        for (key, sub_answer) in answer {
            self.sub
                .process_result(reporters, sub_answer, context.child(Segment::key(key.as_str())))
                .await;
        }
    }
}
