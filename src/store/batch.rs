//! Batch validation shared by both backends
//!
//! All checks run before the first write of a batch.

use std::collections::HashSet;
use std::fmt::Display;
use std::hash::Hash;

use super::errors::{StoreError, StoreResult};

/// Ids of `incoming` that already exist or repeat within the batch, in
/// batch order, each reported once.
pub(crate) fn collisions<'a, Id, F>(incoming: &'a [Id], mut exists: F) -> Vec<&'a Id>
where
    Id: Eq + Hash,
    F: FnMut(&Id) -> bool,
{
    let mut seen = HashSet::with_capacity(incoming.len());
    let mut reported = HashSet::new();
    let mut colliding = Vec::new();

    for id in incoming {
        let repeated = !seen.insert(id);
        if (repeated || exists(id)) && reported.insert(id) {
            colliding.push(id);
        }
    }

    colliding
}

/// Ids of `incoming` that are not stored, in batch order, each reported
/// once.
pub(crate) fn missing<'a, Id, F>(incoming: &'a [Id], mut exists: F) -> Vec<&'a Id>
where
    Id: Eq + Hash,
    F: FnMut(&Id) -> bool,
{
    let mut reported = HashSet::new();
    incoming
        .iter()
        .filter(|id| !exists(id) && reported.insert(*id))
        .collect()
}

/// Fails with `IdChanged` when a mutator changed a record's identity.
pub(crate) fn ensure_same_id<Id: Eq + Display>(before: &Id, after: &Id) -> StoreResult<()> {
    if before == after {
        Ok(())
    } else {
        Err(StoreError::id_changed(before, after))
    }
}
