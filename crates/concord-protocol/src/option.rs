//! Presence agreement across optional variants.

use thiserror::Error;

use crate::variants::Variants;

/// Optional variants that disagree on presence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("variants disagree on presence: {present} present, {absent} absent")]
pub struct PresenceMismatch {
    pub present: usize,
    pub absent: usize,
}

pub fn is_all_none<T>(values: &[Option<T>]) -> bool {
    values.iter().all(Option::is_none)
}

pub fn is_all_some<T>(values: &[Option<T>]) -> bool {
    values.iter().all(Option::is_some)
}

/// Unanimously absent gives `Ok(None)`, unanimously present gives the
/// unwrapped values, anything else is a [`PresenceMismatch`].
pub fn merge_option<T>(
    variants: Variants<Option<T>>,
) -> Result<Option<Variants<T>>, PresenceMismatch> {
    if is_all_none(variants.as_slice()) {
        return Ok(None);
    }
    if is_all_some(variants.as_slice()) {
        return Ok(Variants::new(variants.into_iter().flatten().collect()));
    }
    let present = variants.iter().filter(|value| value.is_some()).count();
    Err(PresenceMismatch {
        present,
        absent: variants.len() - present,
    })
}
