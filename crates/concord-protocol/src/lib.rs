//! # concord-protocol — Reconcilable Query Protocols
//!
//! Combinators for typed, recursively structured query/result protocols.
//! A protocol tree resolves a query tree against caller-supplied data
//! sources, reports the result tree to caller-supplied sinks, and reduces
//! several independently obtained copies of a result (one per replica) into
//! one answer or a tagged inconsistency.
//!
//! The crate has no runtime dependency: resolution fans out with plain
//! futures and works under any executor.
//!
//! ## Module Overview
//!
//! - [`protocol`] — `Reduce`, `Resolve`, `Report` and the `Protocol` bundle
//! - [`shapes`] — Literal, Leaf, Keys, Ids, Search, Properties
//! - [`context`] — Segment, Context, Workspace, Scope
//! - [`variants`] — Non-empty variant lists
//! - [`merge`] — Symmetric and asymmetric dictionary alignment
//! - [`option`] — Presence agreement across optional variants
//! - [`combine`] — Payload combiners for leaves
//! - [`ports`] — Connector traits for resolvers and reporters
//! - [`driver`] — `resolve_variants` and `reconcile` across replicas
//! - [`error`] — ReduceFailure, ShapeTag

pub mod combine;
pub mod context;
pub mod driver;
pub mod error;
pub mod merge;
pub mod option;
pub mod ports;
pub mod protocol;
pub mod shapes;
pub mod variants;

// Re-export the most commonly used types at the crate root.
pub use combine::Combiner;
pub use context::{Context, Scope, Segment, Workspace};
pub use driver::{ReconcileError, reconcile, resolve_variants};
pub use error::{ReduceFailure, ReduceResult, ShapeTag};
pub use merge::{MergeError, NoUniqueKey, merge_asymmetric, merge_symmetric};
pub use option::{PresenceMismatch, merge_option};
pub use ports::{
    AlwaysExists, ExistenceReporter, ExistenceResolver, NoopReporter, PayloadReporter,
    PayloadResolver, TermsReporter, TermsResolver,
};
pub use protocol::{Alignment, Protocol, Reduce, Report, Resolve};
pub use shapes::{
    Ids, IdsAnswer, Keys, KeysAnswer, Leaf, LeafAnswer, Lens, Literal, Properties, Search,
    SearchAnswer,
};
pub use variants::{EmptyVariants, Variants};
