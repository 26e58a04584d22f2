pub mod error;
pub mod types;

pub use error::{FeedError, Result};
pub use types::{
    Comment, ContentKind, Cursor, Document, Identified, ItemId, LikeState, Page, Session,
    SortOrder,
};
