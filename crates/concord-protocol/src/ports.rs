//! Connector ports between the shapes and caller capabilities.
//!
//! Resolvers (`R`) and reporters (`P`) are capability bundles owned by the
//! caller and handed to every invocation by reference. A connector adapts one
//! of those bundles to the exact call a shape needs: fetch a payload, test
//! existence, search terms, or report a resolved fact.
//!
//! Reporters have no failure channel. A reporter that can fail must handle
//! the failure itself (retry, log) before returning.
//!
//! Object-safety note: all ports use `async-trait` so shapes can hold them as
//! `Arc<dyn …>`.

use async_trait::async_trait;

use crate::context::{Context, Scope, Workspace};

/// Fetches a leaf payload for a query payload.
#[async_trait]
pub trait PayloadResolver<R: ?Sized, Q, T, E>: Send + Sync {
    async fn resolve(&self, resolvers: &R, query: &Q, scope: &Scope) -> Result<T, E>;
}

/// Tests whether an id exists. `Some(extra)` means present, with `extra`
/// merged into the workspace seen by the id's descendants.
#[async_trait]
pub trait ExistenceResolver<R: ?Sized, E>: Send + Sync {
    async fn exists(&self, resolvers: &R, id: &str, scope: &Scope)
    -> Result<Option<Workspace>, E>;
}

/// Discovers the ordered ids matching a search terms entry.
#[async_trait]
pub trait TermsResolver<R: ?Sized, E>: Send + Sync {
    async fn search(&self, resolvers: &R, terms: &str, scope: &Scope) -> Result<Vec<String>, E>;
}

/// Receives a resolved leaf payload.
#[async_trait]
pub trait PayloadReporter<P: ?Sized, T>: Send + Sync {
    async fn report(&self, reporters: &P, payload: &T, context: &Context);
}

/// Receives the existence fact for an id.
#[async_trait]
pub trait ExistenceReporter<P: ?Sized>: Send + Sync {
    async fn report_existence(&self, reporters: &P, id: &str, exists: bool, context: &Context);
}

/// Receives the ids discovered for a terms entry.
#[async_trait]
pub trait TermsReporter<P: ?Sized>: Send + Sync {
    async fn report_terms(&self, reporters: &P, terms: &str, ids: &[String], context: &Context);
}

/// Reporter that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopReporter;

#[async_trait]
impl<P: ?Sized + Sync, T: Sync> PayloadReporter<P, T> for NoopReporter {
    async fn report(&self, _reporters: &P, _payload: &T, _context: &Context) {}
}

#[async_trait]
impl<P: ?Sized + Sync> ExistenceReporter<P> for NoopReporter {
    async fn report_existence(&self, _reporters: &P, _id: &str, _exists: bool, _context: &Context) {
    }
}

#[async_trait]
impl<P: ?Sized + Sync> TermsReporter<P> for NoopReporter {
    async fn report_terms(&self, _reporters: &P, _terms: &str, _ids: &[String], _context: &Context) {
    }
}

/// Existence resolver that reports every id as present with no extra workspace.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysExists;

#[async_trait]
impl<R: ?Sized + Sync, E: Send> ExistenceResolver<R, E> for AlwaysExists {
    async fn exists(
        &self,
        _resolvers: &R,
        _id: &str,
        _scope: &Scope,
    ) -> Result<Option<Workspace>, E> {
        Ok(Some(Workspace::new()))
    }
}
