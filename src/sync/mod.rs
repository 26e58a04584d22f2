//! Capabilities a list controller is wired to instead of ambient globals:
//! the browser location and the scroll observer.

pub mod bottom;
pub mod url_sync;

pub use bottom::{BottomReachedNotifier, ChannelBottomNotifier};
pub use url_sync::{NoUrlSync, QueryParamUrlSync, UrlSync};
