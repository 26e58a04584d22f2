use crate::core::{Identified, ItemId};
use std::collections::HashSet;

/// Ordered, de-duplicated items of one committed term.
///
/// Append-only: items keep server order and the first occurrence of an id
/// wins, so later duplicates never move rows that are already on screen.
#[derive(Debug, Clone)]
pub struct ResultSet<T> {
    items: Vec<T>,
    seen: HashSet<ItemId>,
}

impl<T> Default for ResultSet<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            seen: HashSet::new(),
        }
    }
}

impl<T: Identified> ResultSet<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a page, skipping ids already present. Returns how many were added.
    pub fn extend<I>(&mut self, page: I) -> usize
    where
        I: IntoIterator<Item = T>,
    {
        let before = self.items.len();
        for item in page {
            if self.seen.insert(item.item_id().clone()) {
                self.items.push(item);
            }
        }
        self.items.len() - before
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.seen.clear();
    }

    pub fn contains(&self, id: &ItemId) -> bool {
        self.seen.contains(id)
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
