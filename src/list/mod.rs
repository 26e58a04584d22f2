//! Paginated list controller and the state it owns.

pub mod controller;
pub mod query_state;
pub mod result_set;
pub mod status;

pub use controller::{ListController, ListSnapshot, ListSource};
pub use query_state::QueryState;
pub use result_set::ResultSet;
pub use status::{FetchOutcome, FetchStatus};
