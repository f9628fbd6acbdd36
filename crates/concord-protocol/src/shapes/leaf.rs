use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::combine::{self, Combiner};
use crate::context::{Context, Scope, Segment};
use crate::error::ReduceResult;
use crate::ports::{PayloadReporter, PayloadResolver};
use crate::protocol::{Reduce, Report, Resolve};
use crate::variants::Variants;

/// A resolved leaf: the query payload together with the payload it produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeafAnswer<Q, T> {
    pub query: Q,
    pub payload: T,
}

impl<Q, T> LeafAnswer<Q, T> {
    pub fn new(query: Q, payload: T) -> Self {
        Self { query, payload }
    }
}

/// Terminal node that fetches one payload through a [`PayloadResolver`].
///
/// Reporting appends the query payload to the context so reporters can tell
/// apart answers produced by different queries under the same path. The
/// payload must convert to JSON without failing (`Q: Into<Value>`).
/// Reduction folds queries and payloads independently with their combiners,
/// starting from the first variant; either combiner failing aborts.
pub struct Leaf<R: ?Sized, P: ?Sized, Q, T, E> {
    resolver: Arc<dyn PayloadResolver<R, Q, T, E>>,
    reporter: Arc<dyn PayloadReporter<P, T>>,
    combine_query: Combiner<Q>,
    combine_payload: Combiner<T>,
}

impl<R, P, Q, T, E> Leaf<R, P, Q, T, E>
where
    R: ?Sized,
    P: ?Sized,
    Q: PartialEq + Debug + Send + Sync + 'static,
    T: PartialEq + Debug + Send + Sync + 'static,
{
    /// A leaf whose queries and payloads must agree exactly across variants.
    pub fn new(
        resolver: impl PayloadResolver<R, Q, T, E> + 'static,
        reporter: impl PayloadReporter<P, T> + 'static,
    ) -> Self {
        Self {
            resolver: Arc::new(resolver),
            reporter: Arc::new(reporter),
            combine_query: combine::equal(),
            combine_payload: combine::equal(),
        }
    }
}

impl<R: ?Sized, P: ?Sized, Q, T, E> Leaf<R, P, Q, T, E> {
    pub fn combine_query(mut self, combiner: Combiner<Q>) -> Self {
        self.combine_query = combiner;
        self
    }

    pub fn combine_payload(mut self, combiner: Combiner<T>) -> Self {
        self.combine_payload = combiner;
        self
    }
}

impl<R, P, Q, T, E> Reduce for Leaf<R, P, Q, T, E>
where
    R: ?Sized,
    P: ?Sized,
    Q: Send + Sync,
    T: Send + Sync,
{
    type Answer = LeafAnswer<Q, T>;

    fn reduce_result(&self, variants: Variants<Self::Answer>) -> ReduceResult<Self::Answer> {
        let (queries, payloads) = variants
            .map(|answer| (answer.query, answer.payload))
            .unzip();
        let query = combine::fold(queries, &self.combine_query)?;
        let payload = combine::fold(payloads, &self.combine_payload)?;
        Ok(LeafAnswer { query, payload })
    }
}

#[async_trait]
impl<R, P, Q, T, E> Resolve<R> for Leaf<R, P, Q, T, E>
where
    R: ?Sized + Sync,
    P: ?Sized,
    Q: Clone + Send + Sync,
    T: Send + Sync,
    E: Send,
{
    type Query = Q;
    type Error = E;

    async fn process_query(
        &self,
        resolvers: &R,
        query: &Q,
        scope: Scope,
    ) -> Result<LeafAnswer<Q, T>, E> {
        let payload = self.resolver.resolve(resolvers, query, &scope).await?;
        debug!(context = %scope.context, "leaf resolved");
        Ok(LeafAnswer {
            query: query.clone(),
            payload,
        })
    }
}

#[async_trait]
impl<R, P, Q, T, E> Report<P> for Leaf<R, P, Q, T, E>
where
    R: ?Sized,
    P: ?Sized + Sync,
    Q: Clone + Into<Value> + Send + Sync,
    T: Send + Sync,
{
    async fn process_result(&self, reporters: &P, answer: &LeafAnswer<Q, T>, context: Context) {
        let context = context.child(Segment::query(answer.query.clone()));
        self.reporter
            .report(reporters, &answer.payload, &context)
            .await;
    }
}
