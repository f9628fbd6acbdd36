use std::fmt::Debug;
use std::marker::PhantomData;

use async_trait::async_trait;
use tracing::warn;

use crate::context::{Context, Scope};
use crate::error::{ReduceFailure, ReduceResult, ShapeTag};
use crate::protocol::{Reduce, Report, Resolve};
use crate::variants::Variants;

/// Constant node: answers every query with the configured value.
///
/// Nothing is resolved or reported. Reduction requires every variant to be
/// structurally equal (`PartialEq`) to the others.
pub struct Literal<T, E> {
    value: T,
    _error: PhantomData<fn() -> E>,
}

impl<T, E> Literal<T, E> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            _error: PhantomData,
        }
    }

    pub fn value(&self) -> &T {
        &self.value
    }
}

impl<T, E> Reduce for Literal<T, E>
where
    T: PartialEq + Debug + Send + Sync,
{
    type Answer = T;

    fn reduce_result(&self, variants: Variants<T>) -> ReduceResult<T> {
        let (first, rest) = variants.split_first();
        if let Some(other) = rest.iter().find(|other| **other != first) {
            warn!(expected = ?first, found = ?other, "literal variants disagree");
            return Err(ReduceFailure::structural(ShapeTag::Literal));
        }
        Ok(first)
    }
}

#[async_trait]
impl<R, T, E> Resolve<R> for Literal<T, E>
where
    R: ?Sized + Sync,
    T: Clone + PartialEq + Debug + Send + Sync,
    E: Send,
{
    type Query = ();
    type Error = E;

    async fn process_query(&self, _resolvers: &R, _query: &(), _scope: Scope) -> Result<T, E> {
        Ok(self.value.clone())
    }
}

#[async_trait]
impl<P, T, E> Report<P> for Literal<T, E>
where
    P: ?Sized + Sync,
    T: PartialEq + Debug + Send + Sync,
{
    async fn process_result(&self, _reporters: &P, _answer: &T, _context: Context) {}
}
