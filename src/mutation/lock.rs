use super::patch::PatchField;
use crate::core::{FeedError, ItemId, Result};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::warn;

type LockKey = (ItemId, PatchField);

/// Registry of targets with a mutation in flight.
///
/// A lock covers one field of a target: a pending like on a post does not
/// block a comment on the same post. Clones share the registry. Every coordinator that can render a given
/// target must hold a clone of the same registry, so that the target is
/// exclusive across all of them.
#[derive(Debug, Clone, Default)]
pub struct TargetLocks {
    held: Arc<Mutex<HashSet<LockKey>>>,
}

impl TargetLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take `field` of `target`, or fail with [`FeedError::Locked`] if it is
    /// already held.
    pub fn try_acquire(&self, target: &ItemId, field: PatchField) -> Result<TargetLease> {
        let mut held = self.held.lock()?;
        if !held.insert((target.clone(), field)) {
            return Err(FeedError::Locked(target.clone()));
        }
        Ok(TargetLease {
            target: target.clone(),
            field,
            held: Arc::clone(&self.held),
        })
    }

    pub fn is_held(&self, target: &ItemId, field: PatchField) -> bool {
        self.held
            .lock()
            .map(|held| held.contains(&(target.clone(), field)))
            .unwrap_or(false)
    }

    /// Whether any field of `target` is held
    pub fn is_locked(&self, target: &ItemId) -> bool {
        self.held
            .lock()
            .map(|held| held.iter().any(|(held_target, _)| held_target == target))
            .unwrap_or(false)
    }

    pub fn held_count(&self) -> usize {
        self.held.lock().map(|held| held.len()).unwrap_or(0)
    }
}

/// Exclusive hold on one field of a target; released on drop.
#[derive(Debug)]
pub struct TargetLease {
    target: ItemId,
    field: PatchField,
    held: Arc<Mutex<HashSet<LockKey>>>,
}

impl TargetLease {
    pub fn target(&self) -> &ItemId {
        &self.target
    }

    pub fn field(&self) -> PatchField {
        self.field
    }
}

impl Drop for TargetLease {
    fn drop(&mut self) {
        let key = (self.target.clone(), self.field);
        match self.held.lock() {
            Ok(mut held) => {
                held.remove(&key);
            }
            Err(poisoned) => {
                warn!(target_id = %self.target, "target lock registry poisoned; releasing anyway");
                poisoned.into_inner().remove(&key);
            }
        }
    }
}
