//! Association-list merge engine.
//!
//! Aligns N `(key, value)` lists (one per variant) and folds the values found
//! under each key with a caller-supplied reducer. Two alignment policies:
//!
//! - [`merge_symmetric`]: every variant must list exactly the same keys in
//!   the same positions. Any divergence is [`MergeError::KeyMismatch`].
//! - [`merge_asymmetric`]: the last variant's key set is canonical. Keys it
//!   lacks are dropped; keys missing from earlier variants form smaller
//!   groups. Meant for read replicas lagging behind the write replica.

use std::collections::HashSet;
use std::hash::Hash;

use indexmap::IndexMap;
use thiserror::Error;

use crate::variants::Variants;

/// Failure of a merge: either the keys did not line up or a value reducer failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeError<E> {
    #[error("variant key sets do not match")]
    KeyMismatch,
    #[error(transparent)]
    Values(E),
}

impl<E> MergeError<E> {
    /// Collapses into the value error type, substituting `mismatch` for key divergence.
    pub fn or_key_mismatch(self, mismatch: E) -> E {
        match self {
            Self::KeyMismatch => mismatch,
            Self::Values(error) => error,
        }
    }
}

/// A merge group whose keys did not collapse to a single key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no unique key in merge group ({distinct} distinct)")]
pub struct NoUniqueKey {
    pub distinct: usize,
}

/// Regroups rows positionally: column `i` holds the `i`-th element of every
/// row that has one. Shorter rows simply contribute to fewer columns.
pub fn transpose<T>(rows: Vec<Vec<T>>) -> Vec<Vec<T>> {
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    let mut columns: Vec<Vec<T>> = (0..width).map(|_| Vec::with_capacity(rows.len())).collect();
    for row in rows {
        for (column, item) in columns.iter_mut().zip(row) {
            column.push(item);
        }
    }
    columns
}

/// Removes `eq`-duplicates from `keys` and returns the one survivor.
pub fn reduce_duplicate_keys<K>(
    keys: Vec<K>,
    eq: impl Fn(&K, &K) -> bool,
) -> Result<K, NoUniqueKey> {
    let mut unique: Vec<K> = Vec::new();
    for key in keys {
        if !unique.iter().any(|seen| eq(seen, &key)) {
            unique.push(key);
        }
    }
    match unique.len() {
        1 => unique.pop().ok_or(NoUniqueKey { distinct: 0 }),
        distinct => Err(NoUniqueKey { distinct }),
    }
}

/// Groups every occurrence of each key across all variants, restricted to
/// keys present in the last variant. Group order follows first appearance.
pub fn sort_and_transpose<K, V>(variants: Vec<Vec<(K, V)>>) -> Vec<Vec<(K, V)>>
where
    K: Eq + Hash + Clone,
{
    let Some(canonical) = variants.last() else {
        return Vec::new();
    };
    let canonical: HashSet<K> = canonical.iter().map(|(key, _)| key.clone()).collect();

    let mut groups: IndexMap<K, Vec<(K, V)>> = IndexMap::new();
    for variant in variants {
        for (key, value) in variant {
            if canonical.contains(&key) {
                groups.entry(key.clone()).or_default().push((key, value));
            }
        }
    }
    groups.into_values().collect()
}

/// Merges variants that must enumerate identical keys in identical order.
pub fn merge_symmetric<K, V, M, E, Q, F>(
    variants: Vec<Vec<(K, V)>>,
    eq: Q,
    mut reduce_values: F,
) -> Result<Vec<(K, M)>, MergeError<E>>
where
    Q: Fn(&K, &K) -> bool,
    F: FnMut(&K, Variants<V>) -> Result<M, E>,
{
    let count = variants.len();
    if let Some(first) = variants.first() {
        let expected = first.len();
        if variants.iter().any(|variant| variant.len() != expected) {
            return Err(MergeError::KeyMismatch);
        }
    }

    transpose(variants)
        .into_iter()
        .map(|group| {
            if group.len() != count {
                return Err(MergeError::KeyMismatch);
            }
            let (keys, values): (Vec<K>, Vec<V>) = group.into_iter().unzip();
            let key = reduce_duplicate_keys(keys, &eq).map_err(|_| MergeError::KeyMismatch)?;
            let values = Variants::new(values).ok_or(MergeError::KeyMismatch)?;
            let merged = reduce_values(&key, values).map_err(MergeError::Values)?;
            Ok((key, merged))
        })
        .collect()
}

/// Merges variants taking the last one's key set as canonical.
///
/// # Panics
///
/// If a group formed under one key still holds more than one distinct key
/// after deduplication. Groups are keyed by `Eq`, so this only happens when
/// `K`'s `Eq` and `Hash` disagree.
pub fn merge_asymmetric<K, V, M, E, F>(
    variants: Vec<Vec<(K, V)>>,
    mut reduce_values: F,
) -> Result<Vec<(K, M)>, E>
where
    K: Eq + Hash + Clone,
    F: FnMut(&K, Variants<V>) -> Result<M, E>,
{
    let mut merged = Vec::new();
    for group in sort_and_transpose(variants) {
        let (keys, values): (Vec<K>, Vec<V>) = group.into_iter().unzip();
        let key = match reduce_duplicate_keys(keys, |a, b| a == b) {
            Ok(key) => key,
            Err(defect) => panic!("malformed merge group: {defect}"),
        };
        let Some(values) = Variants::new(values) else {
            continue;
        };
        let value = reduce_values(&key, values)?;
        merged.push((key, value));
    }
    Ok(merged)
}
