//! Reconciliation entry points: resolve one query against every replica the
//! caller hands in, then reduce the variants to a single answer.

use futures_util::future::try_join_all;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::context::Scope;
use crate::error::ReduceFailure;
use crate::protocol::Resolve;
use crate::variants::Variants;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError<E> {
    #[error("no replicas to reconcile")]
    NoReplicas,
    #[error("replica {index} failed to resolve")]
    Resolve {
        index: usize,
        #[source]
        source: E,
    },
    #[error(transparent)]
    Reduce(#[from] ReduceFailure),
}

impl<E> ReconcileError<E> {
    /// Index of the replica that failed to resolve, if that is what happened.
    pub fn replica(&self) -> Option<usize> {
        match self {
            Self::Resolve { index, .. } => Some(*index),
            _ => None,
        }
    }
}

/// Resolves `query` against each replica concurrently. Variant `i` is the
/// answer of `replicas[i]`; the first failure aborts the rest.
#[instrument(skip_all, fields(replicas = replicas.len()))]
pub async fn resolve_variants<Pr, R>(
    protocol: &Pr,
    query: &Pr::Query,
    replicas: &[&R],
) -> Result<Variants<Pr::Answer>, ReconcileError<Pr::Error>>
where
    Pr: Resolve<R>,
    R: ?Sized + Sync,
{
    if replicas.is_empty() {
        return Err(ReconcileError::NoReplicas);
    }
    let pending: Vec<_> = replicas
        .iter()
        .enumerate()
        .map(|(index, replica)| resolve_replica(protocol, query, *replica, index))
        .collect();
    let answers = try_join_all(pending).await?;
    debug!(variants = answers.len(), "replicas resolved");
    Variants::new(answers).ok_or(ReconcileError::NoReplicas)
}

async fn resolve_replica<Pr, R>(
    protocol: &Pr,
    query: &Pr::Query,
    replica: &R,
    index: usize,
) -> Result<Pr::Answer, ReconcileError<Pr::Error>>
where
    Pr: Resolve<R>,
    R: ?Sized + Sync,
{
    protocol
        .process_query(replica, query, Scope::root())
        .await
        .map_err(|source| {
            warn!(replica = index, "replica failed to resolve");
            ReconcileError::Resolve { index, source }
        })
}

/// [`resolve_variants`] followed by [`Reduce::reduce_result`](crate::Reduce::reduce_result).
#[instrument(skip_all, fields(replicas = replicas.len()))]
pub async fn reconcile<Pr, R>(
    protocol: &Pr,
    query: &Pr::Query,
    replicas: &[&R],
) -> Result<Pr::Answer, ReconcileError<Pr::Error>>
where
    Pr: Resolve<R>,
    R: ?Sized + Sync,
{
    let variants = resolve_variants(protocol, query, replicas).await?;
    let answer = protocol.reduce_result(variants).inspect_err(|failure| {
        warn!(%failure, "replicas did not reconcile");
    })?;
    Ok(answer)
}
