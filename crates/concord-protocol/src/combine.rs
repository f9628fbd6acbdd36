//! Binary payload combiners for leaf reduction.
//!
//! A combiner folds two payload variants into one or rejects them with
//! [`ReduceFailure::PayloadMismatch`]. [`fold`] applies it left to right,
//! starting from the first (write-side) variant.

use std::fmt::Debug;
use std::sync::Arc;

use tracing::warn;

use crate::error::{ReduceFailure, ReduceResult};
use crate::variants::Variants;

pub type Combiner<T> = Arc<dyn Fn(T, T) -> ReduceResult<T> + Send + Sync>;

/// Folds all variants into the first one.
pub fn fold<T>(variants: Variants<T>, combiner: &Combiner<T>) -> ReduceResult<T> {
    let (first, rest) = variants.split_first();
    rest.into_iter()
        .try_fold(first, |merged, next| combiner(merged, next))
}

/// Accepts only equal payloads.
pub fn equal<T>() -> Combiner<T>
where
    T: PartialEq + Debug + Send + Sync + 'static,
{
    Arc::new(|left: T, right: T| {
        if left == right {
            Ok(left)
        } else {
            warn!(left = ?left, right = ?right, "payload variants disagree");
            Err(ReduceFailure::payload(format!("{left:?} != {right:?}")))
        }
    })
}

/// Keeps the earliest variant.
pub fn first<T: Send + Sync + 'static>() -> Combiner<T> {
    Arc::new(|left: T, _right: T| Ok(left))
}

/// Keeps the latest variant.
pub fn last<T: Send + Sync + 'static>() -> Combiner<T> {
    Arc::new(|_left: T, right: T| Ok(right))
}

pub fn max<T: Ord + Send + Sync + 'static>() -> Combiner<T> {
    Arc::new(|left: T, right: T| Ok(left.max(right)))
}

pub fn min<T: Ord + Send + Sync + 'static>() -> Combiner<T> {
    Arc::new(|left: T, right: T| Ok(left.min(right)))
}

/// Wraps a plain closure as a combiner.
pub fn from_fn<T, F>(f: F) -> Combiner<T>
where
    F: Fn(T, T) -> ReduceResult<T> + Send + Sync + 'static,
{
    Arc::new(f)
}
