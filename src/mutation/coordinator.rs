use super::lock::{TargetLease, TargetLocks};
use super::patch::{OptimisticPatch, PatchField, PatchValue};
use super::render::RenderState;
use crate::config::FeedConfig;
use crate::core::{Comment, FeedError, ItemId, LikeState, Result, Session};
use crate::store::{ContentMutationClient, MutationDescriptor, MutationRecord, with_deadline};
use crate::store::memory::MAX_COMMENT_LEN;
use crate::thread::CommentThread;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, warn};

/// Author label shown on a comment until the store returns the real one
pub const PENDING_AUTHOR: &str = "you";

struct InFlight {
    patch: OptimisticPatch,
    _lease: TargetLease,
}

struct Shared {
    client: Arc<dyn ContentMutationClient>,
    locks: TargetLocks,
    timeout: Duration,
    render: Mutex<RenderState>,
    in_flight: Mutex<HashMap<(ItemId, PatchField), InFlight>>,
}

/// Applies speculative changes immediately and reconciles them with the
/// content store.
///
/// Per target field the lifecycle is `settled -> pending -> settled`: a field
/// with a mutation in flight rejects new actions instead of queueing them.
/// The like counter and the comment thread of one post are separate fields. The
/// request and its reconciliation run on a spawned task bounded by the
/// request timeout, so a target is always released eventually.
#[derive(Clone)]
pub struct MutationCoordinator {
    shared: Arc<Shared>,
}

impl MutationCoordinator {
    pub fn new(client: Arc<dyn ContentMutationClient>, config: &FeedConfig) -> Self {
        Self::with_locks(client, config, TargetLocks::new())
    }

    /// Coordinator sharing `locks` with other coordinators that render the
    /// same targets.
    pub fn with_locks(
        client: Arc<dyn ContentMutationClient>,
        config: &FeedConfig,
        locks: TargetLocks,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                client,
                locks,
                timeout: config.request_timeout,
                render: Mutex::new(RenderState::new()),
                in_flight: Mutex::new(HashMap::new()),
            }),
        }
    }

    fn render(&self) -> Result<MutexGuard<'_, RenderState>> {
        Ok(self.shared.render.lock()?)
    }

    fn in_flight(&self) -> Result<MutexGuard<'_, HashMap<(ItemId, PatchField), InFlight>>> {
        Ok(self.shared.in_flight.lock()?)
    }

    pub fn locks(&self) -> &TargetLocks {
        &self.shared.locks
    }

    /// Seed the authoritative like state of `target` as loaded from the store
    pub fn seed_like(&self, target: ItemId, state: LikeState) -> Result<()> {
        self.render()?.set_like(target, state);
        Ok(())
    }

    /// Seed the loaded comments of `post_id`
    pub fn seed_thread(
        &self,
        post_id: ItemId,
        comments: impl IntoIterator<Item = Comment>,
    ) -> Result<()> {
        self.render()?.set_thread(post_id, comments);
        Ok(())
    }

    pub fn like_state(&self, target: &ItemId) -> Result<LikeState> {
        Ok(self.render()?.like(target))
    }

    pub fn thread(&self, post_id: &ItemId) -> Result<CommentThread> {
        Ok(self.render()?.thread(post_id))
    }

    /// Whether any field of `target` has a mutation in flight
    pub fn is_locked(&self, target: &ItemId) -> bool {
        self.shared.locks.is_locked(target)
    }

    pub fn is_field_locked(&self, target: &ItemId, field: PatchField) -> bool {
        self.shared.locks.is_held(target, field)
    }

    /// Lock the field of `target` that `speculative` overlays and write it
    /// to the render state.
    ///
    /// The current value is captured as the patch's `previous` before the
    /// overlay is written. Fails with [`FeedError::Locked`] without touching
    /// anything if the target already has a mutation in flight.
    pub fn apply_optimistic(
        &self,
        target: &ItemId,
        speculative: PatchValue,
    ) -> Result<OptimisticPatch> {
        self.begin(target, speculative.field(), |_| Ok(speculative))
    }

    fn begin<F>(&self, target: &ItemId, field: PatchField, speculate: F) -> Result<OptimisticPatch>
    where
        F: FnOnce(&PatchValue) -> Result<PatchValue>,
    {
        let lease = self.shared.locks.try_acquire(target, field)?;

        let mut render = self.render()?;
        let previous = render.read(target, field);
        let speculative = speculate(&previous)?;
        let patch = OptimisticPatch::new(target.clone(), previous, speculative.clone())
            .ok_or_else(|| FeedError::validation("patch must overlay a single field"))?;
        render.write(target, speculative);
        drop(render);

        self.in_flight()?.insert(
            (target.clone(), field),
            InFlight {
                patch: patch.clone(),
                _lease: lease,
            },
        );
        debug!(target_id = %target, field = ?field, "optimistic patch applied");
        Ok(patch)
    }

    fn take(&self, target: &ItemId, field: PatchField) -> Result<InFlight> {
        self.in_flight()?
            .remove(&(target.clone(), field))
            .ok_or_else(|| {
                FeedError::Conflict(format!("no {field:?} mutation in flight for '{target}'"))
            })
    }

    /// Replace the speculative value with the store's and release the field.
    pub fn commit(&self, target: &ItemId, authoritative: PatchValue) -> Result<()> {
        let field = authoritative.field();
        let in_flight = self.take(target, field)?;
        self.render()?.write(target, authoritative);
        drop(in_flight);
        debug!(target_id = %target, field = ?field, "optimistic patch committed");
        Ok(())
    }

    /// Restore the captured value of `field` and release it.
    pub fn revert(&self, target: &ItemId, field: PatchField) -> Result<PatchValue> {
        let in_flight = self.take(target, field)?;
        let restored = in_flight.patch.revert();
        self.render()?.write(target, restored.clone());
        debug!(target_id = %target, field = ?field, "optimistic patch reverted");
        Ok(restored)
    }

    /// Speculative value still in flight for `field` of `target`, if any
    pub fn pending_patch(
        &self,
        target: &ItemId,
        field: PatchField,
    ) -> Result<Option<OptimisticPatch>> {
        Ok(self
            .in_flight()?
            .get(&(target.clone(), field))
            .map(|in_flight| in_flight.patch.clone()))
    }

    /// Issue `descriptor` and reconcile `target` with the outcome.
    ///
    /// `settle` turns the store's record into the committed value. Transport
    /// failures, timeouts, error payloads and unexpected records all revert.
    async fn reconcile<R, S>(
        &self,
        target: ItemId,
        field: PatchField,
        session: Option<Session>,
        descriptor: MutationDescriptor,
        settle: S,
    ) -> Result<R>
    where
        R: Send + 'static,
        S: FnOnce(&OptimisticPatch, MutationRecord) -> Result<(PatchValue, R)> + Send + 'static,
    {
        let task = tokio::spawn(Self::run_to_settlement(
            self.clone(),
            target,
            field,
            session,
            descriptor,
            settle,
        ));
        task.await?
    }

    async fn run_to_settlement<R, S>(
        self,
        target: ItemId,
        field: PatchField,
        session: Option<Session>,
        descriptor: MutationDescriptor,
        settle: S,
    ) -> Result<R>
    where
        S: FnOnce(&OptimisticPatch, MutationRecord) -> Result<(PatchValue, R)>,
    {
        let request = self.shared.client.mutate(session.as_ref(), descriptor);
        let outcome = with_deadline(self.shared.timeout, request)
            .await
            .and_then(|outcome| outcome.into_result());

        let settled = outcome.and_then(|record| {
            let patch = self
                .pending_patch(&target, field)?
                .ok_or_else(|| FeedError::Conflict(format!("patch for '{target}' vanished")))?;
            let (value, result) = settle(&patch, record)?;
            if value.field() != field {
                return Err(FeedError::Decode(format!(
                    "settled {:?} value for a {field:?} mutation",
                    value.field()
                )));
            }
            Ok((value, result))
        });

        match settled {
            Ok((value, result)) => {
                self.commit(&target, value)?;
                Ok(result)
            }
            Err(err) => {
                warn!(
                    target_id = %target,
                    error = %err,
                    requires_auth = err.requires_authentication(),
                    "mutation failed; reverting"
                );
                self.revert(&target, field)?;
                Err(err)
            }
        }
    }

    /// Flip the like state of `target` and confirm it with the store.
    ///
    /// Renders the flipped state immediately; resolves to the store's state
    /// or to the failure after the flip has been undone.
    pub async fn toggle_like(&self, target: ItemId, session: Option<Session>) -> Result<LikeState> {
        self.begin(&target, PatchField::Like, |previous| {
            let current = previous.as_like().unwrap_or_default();
            Ok(PatchValue::Like(current.toggled()))
        })?;

        let descriptor = MutationDescriptor::ToggleLike {
            target: target.clone(),
        };
        self.reconcile(target, PatchField::Like, session, descriptor, |_, record| match record {
            MutationRecord::Like { state, .. } => Ok((PatchValue::Like(state), state)),
            other => Err(FeedError::Decode(format!(
                "expected like record, got {other:?}"
            ))),
        })
        .await
    }

    /// Post a comment, or a reply when `parent_id` is set, on `post_id`.
    ///
    /// A pending comment shows up in the thread immediately and is swapped
    /// for the stored comment on success. The whole thread is the target, so
    /// one comment mutation per post is in flight at a time.
    pub async fn submit_comment(
        &self,
        post_id: ItemId,
        parent_id: Option<ItemId>,
        body: &str,
        session: Option<Session>,
    ) -> Result<Comment> {
        let body = body.trim();
        if body.is_empty() {
            return Err(FeedError::field("body", "comment must not be empty"));
        }
        if body.chars().count() > MAX_COMMENT_LEN {
            return Err(FeedError::field(
                "body",
                format!("comment must be at most {MAX_COMMENT_LEN} characters"),
            ));
        }

        let placeholder = Comment {
            id: ItemId::new(format!("pending-{}", uuid::Uuid::new_v4())),
            post_id: post_id.clone(),
            parent_id: parent_id.clone(),
            author: PENDING_AUTHOR.to_string(),
            body: body.to_string(),
            created_at: Utc::now(),
            like_count: 0,
            pending: true,
        };
        let placeholder_id = placeholder.id.clone();

        self.begin(&post_id, PatchField::Thread, |previous| {
            let mut thread = previous.as_thread().cloned().unwrap_or_default();
            thread.push(placeholder);
            Ok(PatchValue::Thread(thread))
        })?;

        let descriptor = MutationDescriptor::CreateComment {
            post_id: post_id.clone(),
            parent_id,
            body: body.to_string(),
        };
        self.reconcile(post_id, PatchField::Thread, session, descriptor, move |patch, record| {
            let stored = match record {
                MutationRecord::Comment(stored) => stored,
                other => {
                    return Err(FeedError::Decode(format!(
                        "expected comment record, got {other:?}"
                    )));
                }
            };
            let mut thread = patch.speculative().as_thread().cloned().unwrap_or_default();
            thread.replace(&placeholder_id, stored.clone());
            Ok((PatchValue::Thread(thread), stored))
        })
        .await
    }

    /// Remove `comment_id` (and its replies) from the thread of `post_id`.
    pub async fn delete_comment(
        &self,
        post_id: ItemId,
        comment_id: ItemId,
        session: Option<Session>,
    ) -> Result<()> {
        let removed = comment_id.clone();
        self.begin(&post_id, PatchField::Thread, |previous| {
            let mut thread = previous.as_thread().cloned().unwrap_or_default();
            if thread.remove_with_replies(&removed) == 0 {
                return Err(FeedError::NotFound(format!("comment '{removed}'")));
            }
            Ok(PatchValue::Thread(thread))
        })?;

        let descriptor = MutationDescriptor::DeleteComment { comment_id };
        self.reconcile(post_id, PatchField::Thread, session, descriptor, |patch, record| {
            match record {
                MutationRecord::Deleted { .. } => Ok((patch.speculative().clone(), ())),
                other => Err(FeedError::Decode(format!(
                    "expected deletion record, got {other:?}"
                ))),
            }
        })
        .await
    }
}
