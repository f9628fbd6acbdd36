//! Non-empty lists of result variants.

use thiserror::Error;

/// Returned when a variant list would be empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("variant list must not be empty")]
pub struct EmptyVariants;

/// N >= 1 independently obtained copies of the same logical result.
///
/// Order is meaningful: callers decide which replica comes first, and the
/// shapes rely on it (leaf combiners fold from the first variant, asymmetric
/// key alignment takes the last variant's key set as canonical).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variants<T>(Vec<T>);

impl<T> Variants<T> {
    pub fn new(items: Vec<T>) -> Option<Self> {
        if items.is_empty() {
            None
        } else {
            Some(Self(items))
        }
    }

    pub fn single(item: T) -> Self {
        Self(vec![item])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; kept for API symmetry with collections.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn first(&self) -> &T {
        &self.0[0]
    }

    pub fn last(&self) -> &T {
        &self.0[self.0.len() - 1]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<T> {
        self.0
    }

    /// Splits into the first variant and the remainder.
    pub fn split_first(self) -> (T, Vec<T>) {
        let mut items = self.0.into_iter();
        match items.next() {
            Some(first) => (first, items.collect()),
            None => unreachable!("variants are non-empty by construction"),
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Variants<U> {
        Variants(self.0.into_iter().map(f).collect())
    }
}

impl<A, B> Variants<(A, B)> {
    pub fn unzip(self) -> (Variants<A>, Variants<B>) {
        let (left, right) = self.0.into_iter().unzip();
        (Variants(left), Variants(right))
    }
}

impl<T> TryFrom<Vec<T>> for Variants<T> {
    type Error = EmptyVariants;

    fn try_from(items: Vec<T>) -> Result<Self, Self::Error> {
        Self::new(items).ok_or(EmptyVariants)
    }
}

impl<T> IntoIterator for Variants<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a Variants<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
