use async_trait::async_trait;
use futures_util::future::try_join_all;
use tracing::{debug, warn};

use crate::context::{Context, Scope};
use crate::error::{ReduceFailure, ReduceResult, ShapeTag};
use crate::option::merge_option;
use crate::protocol::{Reduce, Report, Resolve};
use crate::variants::Variants;

/// Field accessors tying one optional property of a query record `Q` and an
/// answer record `A` to a sub-protocol with query `SQ` and answer `SA`.
///
/// Usually built with [`lens!`](crate::lens).
pub struct Lens<Q, A, SQ, SA> {
    pub query: fn(&Q) -> &Option<SQ>,
    pub answer: fn(&A) -> &Option<SA>,
    pub answer_mut: fn(&mut A) -> &mut Option<SA>,
}

/// Builds a [`Lens`] over a field present in both the query and answer record.
///
/// ```ignore
/// lens!(DirectoryQuery, DirectoryAnswer, users)
/// ```
#[macro_export]
macro_rules! lens {
    ($query:ty, $answer:ty, $field:ident) => {
        $crate::Lens {
            query: |query: &$query| &query.$field,
            answer: |answer: &$answer| &answer.$field,
            answer_mut: |answer: &mut $answer| &mut answer.$field,
        }
    };
}

type Assign<A> = Box<dyn FnOnce(&mut A) + Send>;

/// Type-erased property slot so sub-protocols of different shapes can share
/// one `Properties` node.
#[async_trait]
trait Slot<R: ?Sized, P: ?Sized, Q, A, E>: Send + Sync {
    fn name(&self) -> &str;

    async fn process_query(&self, resolvers: &R, query: &Q, scope: Scope)
    -> Result<Option<Assign<A>>, E>;

    async fn process_result(&self, reporters: &P, answer: &A, context: Context);

    fn reduce_result(&self, variants: &mut [A], merged: &mut A) -> ReduceResult<()>;
}

struct Property<S, Q, A, SQ, SA> {
    name: String,
    protocol: S,
    lens: Lens<Q, A, SQ, SA>,
}

#[async_trait]
impl<R, P, Q, A, E, S, SQ, SA> Slot<R, P, Q, A, E> for Property<S, Q, A, SQ, SA>
where
    R: ?Sized + Sync,
    P: ?Sized + Sync,
    Q: Sync,
    A: Send + Sync + 'static,
    E: Send,
    S: Resolve<R, Query = SQ, Answer = SA, Error = E> + Report<P>,
    SQ: Send + Sync,
    SA: Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn process_query(
        &self,
        resolvers: &R,
        query: &Q,
        scope: Scope,
    ) -> Result<Option<Assign<A>>, E> {
        let Some(sub_query) = (self.lens.query)(query) else {
            return Ok(None);
        };
        debug!(property = %self.name, context = %scope.context, "resolving property");
        let answer = self.protocol.process_query(resolvers, sub_query, scope).await?;
        let answer_mut = self.lens.answer_mut;
        let assign: Assign<A> = Box::new(move |target: &mut A| {
            *answer_mut(target) = Some(answer);
        });
        Ok(Some(assign))
    }

    async fn process_result(&self, reporters: &P, answer: &A, context: Context) {
        if let Some(sub_answer) = (self.lens.answer)(answer) {
            self.protocol
                .process_result(reporters, sub_answer, context)
                .await;
        }
    }

    fn reduce_result(&self, variants: &mut [A], merged: &mut A) -> ReduceResult<()> {
        let values: Vec<Option<SA>> = variants
            .iter_mut()
            .map(|variant| (self.lens.answer_mut)(variant).take())
            .collect();
        let Some(values) = Variants::new(values) else {
            return Ok(());
        };
        match merge_option(values) {
            Ok(None) => Ok(()),
            Ok(Some(present)) => {
                *(self.lens.answer_mut)(merged) = Some(self.protocol.reduce_result(present)?);
                Ok(())
            }
            Err(mismatch) => {
                warn!(
                    property = %self.name,
                    present = mismatch.present,
                    absent = mismatch.absent,
                    "property presence differs between variants"
                );
                Err(ReduceFailure::structural(ShapeTag::Option))
            }
        }
    }
}

/// A fixed set of named optional sub-protocols composed into one record.
///
/// `Q` and `A` are caller-defined records whose fields are `Option`s; each
/// property maps one field of each through a [`Lens`]. Present properties
/// resolve concurrently, report in declaration order, and reduce one after
/// another, stopping at the first failure.
pub struct Properties<R: ?Sized, P: ?Sized, Q, A, E> {
    slots: Vec<Box<dyn Slot<R, P, Q, A, E>>>,
}

impl<R, P, Q, A, E> Default for Properties<R, P, Q, A, E>
where
    R: ?Sized,
    P: ?Sized,
{
    fn default() -> Self {
        Self { slots: Vec::new() }
    }
}

impl<R, P, Q, A, E> Properties<R, P, Q, A, E>
where
    R: ?Sized + Sync,
    P: ?Sized + Sync,
    Q: Sync + 'static,
    A: Send + Sync + 'static,
    E: Send + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a property. Declaration order is reporting order.
    pub fn property<S>(
        mut self,
        name: impl Into<String>,
        protocol: S,
        lens: Lens<Q, A, S::Query, S::Answer>,
    ) -> Self
    where
        S: Resolve<R, Error = E> + Report<P> + 'static,
        S::Query: 'static,
        S::Answer: 'static,
    {
        self.slots.push(Box::new(Property {
            name: name.into(),
            protocol,
            lens,
        }));
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|slot| slot.name())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl<R, P, Q, A, E> Reduce for Properties<R, P, Q, A, E>
where
    R: ?Sized,
    P: ?Sized,
    A: Default + Send + Sync,
{
    type Answer = A;

    fn reduce_result(&self, variants: Variants<A>) -> ReduceResult<A> {
        let mut variants = variants.into_vec();
        let mut merged = A::default();
        for slot in &self.slots {
            slot.reduce_result(&mut variants, &mut merged)?;
        }
        Ok(merged)
    }
}

#[async_trait]
impl<R, P, Q, A, E> Resolve<R> for Properties<R, P, Q, A, E>
where
    R: ?Sized + Sync,
    P: ?Sized,
    Q: Send + Sync,
    A: Default + Send + Sync,
    E: Send,
{
    type Query = Q;
    type Error = E;

    async fn process_query(&self, resolvers: &R, query: &Q, scope: Scope) -> Result<A, E> {
        let pending: Vec<_> = self
            .slots
            .iter()
            .map(|slot| slot.process_query(resolvers, query, scope.clone()))
            .collect();
        let assigns = try_join_all(pending).await?;
        let mut answer = A::default();
        for assign in assigns.into_iter().flatten() {
            assign(&mut answer);
        }
        Ok(answer)
    }
}

#[async_trait]
impl<R, P, Q, A, E> Report<P> for Properties<R, P, Q, A, E>
where
    R: ?Sized,
    P: ?Sized + Sync,
    A: Default + Send + Sync,
{
    async fn process_result(&self, reporters: &P, answer: &A, context: Context) {
        for slot in &self.slots {
            slot.process_result(reporters, answer, context.clone()).await;
        }
    }
}
