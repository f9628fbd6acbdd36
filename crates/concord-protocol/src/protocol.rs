//! The protocol bundle: resolve a query, report a result, reduce variants.
//!
//! Each behavior lives in its own trait so it is generic only over the
//! capability it consumes. [`Reduce`] is pure and synchronous; [`Resolve`]
//! fans out over caller resolvers; [`Report`] walks a result tree in order.

use async_trait::async_trait;

use crate::context::{Context, Scope};
use crate::error::ReduceResult;
use crate::variants::Variants;

/// Folds N variants of a result tree into one.
pub trait Reduce: Send + Sync {
    /// The result tree produced by this node.
    type Answer: Send + Sync;

    fn reduce_result(&self, variants: Variants<Self::Answer>) -> ReduceResult<Self::Answer>;
}

/// Drives a query tree to a result tree against resolvers `R`.
#[async_trait]
pub trait Resolve<R: ?Sized>: Reduce {
    type Query: Send + Sync;
    type Error: Send;

    async fn process_query(
        &self,
        resolvers: &R,
        query: &Self::Query,
        scope: Scope,
    ) -> Result<Self::Answer, Self::Error>;
}

/// Reports a result tree to reporters `P`, sequentially and in declaration order.
#[async_trait]
pub trait Report<P: ?Sized>: Reduce {
    async fn process_result(&self, reporters: &P, answer: &Self::Answer, context: Context);
}

/// A node that resolves against `R` and reports to `P`.
pub trait Protocol<R: ?Sized, P: ?Sized>: Resolve<R> + Report<P> {}

impl<T, R, P> Protocol<R, P> for T
where
    T: Resolve<R> + Report<P>,
    R: ?Sized,
    P: ?Sized,
{
}

/// How dictionary shapes line up keys across variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Alignment {
    /// The last variant's keys are canonical; earlier variants may lag.
    #[default]
    Asymmetric,
    /// Every variant must list the same keys in the same order.
    Symmetric,
}
