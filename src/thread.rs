//! Comment threads: a post's comments with replies grouped under their parent.

use crate::core::{Comment, ItemId};
use std::collections::HashSet;

/// Flat list of a post's comments in arrival order.
///
/// Replies reference their parent by id; grouping happens on read, so an
/// optimistic comment can be appended or swapped without rebuilding a tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentThread {
    comments: Vec<Comment>,
}

/// One comment together with its direct and indirect replies
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadNode<'a> {
    pub comment: &'a Comment,
    pub replies: Vec<ThreadNode<'a>>,
}

impl CommentThread {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_comments(comments: impl IntoIterator<Item = Comment>) -> Self {
        let mut thread = Self::new();
        for comment in comments {
            thread.push(comment);
        }
        thread
    }

    /// Append a comment unless one with the same id is already present.
    pub fn push(&mut self, comment: Comment) -> bool {
        if self.get(&comment.id).is_some() {
            return false;
        }
        self.comments.push(comment);
        true
    }

    pub fn get(&self, id: &ItemId) -> Option<&Comment> {
        self.comments.iter().find(|comment| &comment.id == id)
    }

    /// Swap the comment `id` for `with`, keeping its position.
    pub fn replace(&mut self, id: &ItemId, with: Comment) -> bool {
        match self.comments.iter_mut().find(|comment| &comment.id == id) {
            Some(slot) => {
                *slot = with;
                true
            }
            None => false,
        }
    }

    /// Remove `id` and every reply below it. Returns how many were removed.
    pub fn remove_with_replies(&mut self, id: &ItemId) -> usize {
        let mut doomed = vec![id.clone()];
        let mut seen: HashSet<ItemId> = HashSet::from([id.clone()]);
        let mut idx = 0;
        while idx < doomed.len() {
            let parent = doomed[idx].clone();
            for reply in self
                .comments
                .iter()
                .filter(|c| c.parent_id.as_ref() == Some(&parent))
            {
                // Seeded data may contain parent cycles.
                if seen.insert(reply.id.clone()) {
                    doomed.push(reply.id.clone());
                }
            }
            idx += 1;
        }

        let before = self.comments.len();
        self.comments.retain(|comment| !seen.contains(&comment.id));
        before - self.comments.len()
    }

    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    pub fn len(&self) -> usize {
        self.comments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.comments.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.comments.iter().filter(|comment| comment.pending).count()
    }

    /// Top-level comments (no parent, or a parent that is not loaded)
    pub fn roots(&self) -> Vec<&Comment> {
        self.comments
            .iter()
            .filter(|comment| match &comment.parent_id {
                None => true,
                Some(parent) => self.get(parent).is_none(),
            })
            .collect()
    }

    pub fn replies_to(&self, parent: &ItemId) -> Vec<&Comment> {
        self.comments
            .iter()
            .filter(|comment| comment.parent_id.as_ref() == Some(parent))
            .collect()
    }

    /// Nested view for rendering
    pub fn tree(&self) -> Vec<ThreadNode<'_>> {
        self.roots()
            .into_iter()
            .map(|root| self.node(root))
            .collect()
    }

    fn node<'a>(&'a self, comment: &'a Comment) -> ThreadNode<'a> {
        ThreadNode {
            comment,
            replies: self
                .replies_to(&comment.id)
                .into_iter()
                .map(|reply| self.node(reply))
                .collect(),
        }
    }
}
