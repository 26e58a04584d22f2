// ============================================================================
// Fellowship Feed Library
// ============================================================================

//! Searchable, infinitely scrolling content lists and optimistic mutations
//! for the fellowship site.
//!
//! - [`ListController`] owns a list's query state, cursor and result set. It
//!   debounces search input, fetches pages on demand and drops responses that
//!   belong to an outdated search.
//! - [`MutationCoordinator`] renders likes and comments immediately and
//!   reconciles them with the content store, reverting on failure.
//! - [`store`] holds the collaborator traits plus an in-memory store and an
//!   HTTP client for the API in [`web`].

pub mod config;
pub mod core;
pub mod list;
pub mod mutation;
pub mod store;
pub mod sync;
pub mod thread;
pub mod web;

// Re-export main types for convenience
pub use config::{FeedConfig, ServerConfig};
pub use core::{
    Comment, ContentKind, Cursor, Document, FeedError, Identified, ItemId, LikeState, Page,
    Result, Session, SortOrder,
};
pub use list::{FetchOutcome, FetchStatus, ListController, ListSnapshot, ListSource};
pub use mutation::{MutationCoordinator, OptimisticPatch, PatchValue, TargetLocks};
pub use store::{
    ContentMutationClient, ContentQueryClient, HttpContentClient, InMemoryContentStore,
    MutationDescriptor, MutationOutcome, MutationRecord, QueryDescriptor, QueryOutcome,
};
pub use sync::{BottomReachedNotifier, ChannelBottomNotifier, QueryParamUrlSync, UrlSync};
pub use thread::CommentThread;
pub use web::{AppState, build_router};
