use crate::core::{ItemId, LikeState};
use crate::thread::CommentThread;

/// Which piece of render state a patch overlays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatchField {
    Like,
    Thread,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchValue {
    Like(LikeState),
    Thread(CommentThread),
}

impl PatchValue {
    pub fn field(&self) -> PatchField {
        match self {
            PatchValue::Like(_) => PatchField::Like,
            PatchValue::Thread(_) => PatchField::Thread,
        }
    }

    pub fn as_like(&self) -> Option<LikeState> {
        match self {
            PatchValue::Like(state) => Some(*state),
            PatchValue::Thread(_) => None,
        }
    }

    pub fn as_thread(&self) -> Option<&CommentThread> {
        match self {
            PatchValue::Thread(thread) => Some(thread),
            PatchValue::Like(_) => None,
        }
    }
}

/// Speculative overlay for one in-flight mutation.
///
/// The value to restore travels with the patch as data, so reverting needs
/// nothing but the patch itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptimisticPatch {
    target: ItemId,
    previous: PatchValue,
    speculative: PatchValue,
}

impl OptimisticPatch {
    /// Both values must overlay the same field.
    pub fn new(target: ItemId, previous: PatchValue, speculative: PatchValue) -> Option<Self> {
        if previous.field() != speculative.field() {
            return None;
        }
        Some(Self {
            target,
            previous,
            speculative,
        })
    }

    pub fn target(&self) -> &ItemId {
        &self.target
    }

    pub fn field(&self) -> PatchField {
        self.previous.field()
    }

    pub fn previous(&self) -> &PatchValue {
        &self.previous
    }

    pub fn speculative(&self) -> &PatchValue {
        &self.speculative
    }

    /// The value to put back when the mutation fails
    pub fn revert(self) -> PatchValue {
        self.previous
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mismatched_fields_are_rejected() {
        let patch = OptimisticPatch::new(
            ItemId::new("x"),
            PatchValue::Like(LikeState::default()),
            PatchValue::Thread(CommentThread::new()),
        );
        assert!(patch.is_none());
    }

    #[test]
    fn revert_yields_previous_value() {
        let before = LikeState::new(false, 5);
        let patch = OptimisticPatch::new(
            ItemId::new("x"),
            PatchValue::Like(before),
            PatchValue::Like(before.toggled()),
        )
        .unwrap();

        assert_eq!(patch.speculative().as_like(), Some(LikeState::new(true, 6)));
        assert_eq!(patch.field(), PatchField::Like);
        assert_eq!(patch.revert(), PatchValue::Like(before));
    }
}
