use super::patch::{PatchField, PatchValue};
use crate::core::{Comment, ItemId, LikeState};
use crate::thread::CommentThread;
use std::collections::HashMap;

/// What presentation draws for mutable targets: like counters and comment
/// threads, with any optimistic overlay already applied.
#[derive(Debug, Clone, Default)]
pub struct RenderState {
    likes: HashMap<ItemId, LikeState>,
    threads: HashMap<ItemId, CommentThread>,
}

impl RenderState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn like(&self, target: &ItemId) -> LikeState {
        self.likes.get(target).copied().unwrap_or_default()
    }

    pub fn thread(&self, post_id: &ItemId) -> CommentThread {
        self.threads.get(post_id).cloned().unwrap_or_default()
    }

    pub fn set_like(&mut self, target: ItemId, state: LikeState) {
        self.likes.insert(target, state);
    }

    pub fn set_thread(&mut self, post_id: ItemId, comments: impl IntoIterator<Item = Comment>) {
        self.threads
            .insert(post_id, CommentThread::from_comments(comments));
    }

    /// Current value of `field` for `target`, defaulted when never seen
    pub fn read(&self, target: &ItemId, field: PatchField) -> PatchValue {
        match field {
            PatchField::Like => PatchValue::Like(self.like(target)),
            PatchField::Thread => PatchValue::Thread(self.thread(target)),
        }
    }

    pub fn write(&mut self, target: &ItemId, value: PatchValue) {
        match value {
            PatchValue::Like(state) => {
                self.likes.insert(target.clone(), state);
            }
            PatchValue::Thread(thread) => {
                self.threads.insert(target.clone(), thread);
            }
        }
    }
}
