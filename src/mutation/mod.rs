//! Optimistic mutation coordinator: speculative render state, per-target
//! locks, and reconciliation with the content store.

pub mod coordinator;
pub mod lock;
pub mod patch;
pub mod render;

pub use coordinator::{MutationCoordinator, PENDING_AUTHOR};
pub use lock::{TargetLease, TargetLocks};
pub use patch::{OptimisticPatch, PatchField, PatchValue};
pub use render::RenderState;
