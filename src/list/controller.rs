use super::query_state::QueryState;
use super::result_set::ResultSet;
use super::status::{FetchOutcome, FetchStatus};
use crate::config::FeedConfig;
use crate::core::{ContentKind, Cursor, FeedError, Identified, ItemId, Page, Result, SortOrder};
use crate::store::{ContentQueryClient, QueryDescriptor, with_deadline};
use crate::sync::{BottomReachedNotifier, UrlSync};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Which collection a list pages through
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListSource {
    pub kind: ContentKind,
    pub sort: SortOrder,
    /// Parent record for scoped lists (comments of one post)
    pub scope: Option<ItemId>,
}

impl ListSource {
    pub fn new(kind: ContentKind) -> Self {
        Self {
            kind,
            sort: SortOrder::default(),
            scope: None,
        }
    }

    /// Comments of `post_id`, oldest first
    pub fn comments_of(post_id: ItemId) -> Self {
        Self {
            kind: ContentKind::Comment,
            sort: SortOrder::OldestFirst,
            scope: Some(post_id),
        }
    }

    pub fn sort(mut self, sort: SortOrder) -> Self {
        self.sort = sort;
        self
    }
}

/// Read-only view handed to presentation
#[derive(Debug, Clone, PartialEq)]
pub struct ListSnapshot<T> {
    pub raw_input: String,
    pub committed_term: String,
    pub items: Vec<T>,
    pub status: FetchStatus,
    pub has_more: bool,
    pub error: Option<FeedError>,
    pub debounce_pending: bool,
}

struct ListState<T> {
    query: QueryState,
    /// Bumped on every commit; responses carrying an older epoch are stale
    epoch: u64,
    cursor: Option<Cursor>,
    results: ResultSet<T>,
    status: FetchStatus,
    has_more: bool,
    last_error: Option<FeedError>,
}

struct Shared<T> {
    client: Arc<dyn ContentQueryClient<T>>,
    url_sync: Arc<dyn UrlSync>,
    config: FeedConfig,
    source: ListSource,
    state: Mutex<ListState<T>>,
}

/// Paginated, searchable, infinite-scroll list.
///
/// Cloning yields another handle to the same list. Every request runs on its
/// own task and lands through the epoch check, so a response is applied at
/// most once and only while its term is still committed.
pub struct ListController<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for ListController<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> ListController<T>
where
    T: Identified + Clone + Send + Sync + 'static,
{
    /// Create a list whose initial committed term comes from `url_sync`.
    ///
    /// Nothing is fetched until [`fetch_next_page`](Self::fetch_next_page) is
    /// called for the first time.
    pub fn new(
        client: Arc<dyn ContentQueryClient<T>>,
        url_sync: Arc<dyn UrlSync>,
        config: FeedConfig,
        source: ListSource,
    ) -> Result<Self> {
        config.validate()?;
        let initial_term = url_sync.read().trim().to_string();

        let state = ListState {
            query: QueryState::new(initial_term),
            epoch: 0,
            cursor: None,
            results: ResultSet::new(),
            status: FetchStatus::Idle,
            has_more: true,
            last_error: None,
        };

        Ok(Self {
            shared: Arc::new(Shared {
                client,
                url_sync,
                config,
                source,
                state: Mutex::new(state),
            }),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, ListState<T>>> {
        Ok(self.shared.state.lock()?)
    }

    pub fn source(&self) -> &ListSource {
        &self.shared.source
    }

    pub fn snapshot(&self) -> Result<ListSnapshot<T>> {
        let state = self.lock()?;
        Ok(ListSnapshot {
            raw_input: state.query.raw_input().to_string(),
            committed_term: state.query.committed_term().to_string(),
            items: state.results.items().to_vec(),
            status: state.status,
            has_more: state.has_more,
            error: state.last_error.clone(),
            debounce_pending: state.query.has_pending_debounce(),
        })
    }

    pub fn status(&self) -> Result<FetchStatus> {
        Ok(self.lock()?.status)
    }

    /// Echo a keystroke and (re)start the debounce timer.
    ///
    /// When the timer fires without newer input, the trimmed text is
    /// committed if it differs from the current term, which resets the list
    /// and fetches the first page. Must be called inside a tokio runtime.
    pub fn set_search_input(&self, text: &str) -> Result<()> {
        let mut state = self.lock()?;
        let seq = state.query.record_input(text);

        let controller = self.clone();
        let window = self.shared.config.debounce_window;
        let text = text.to_string();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(window).await;
            if let Err(err) = controller.debounce_fired(seq, &text).await {
                debug!(error = %err, "debounced search fetch failed");
            }
        });

        // Armed under the lock, so the timer cannot observe a state without it.
        state.query.arm(seq, handle);
        Ok(())
    }

    async fn debounce_fired(&self, seq: u64, text: &str) -> Result<FetchOutcome> {
        {
            let mut state = self.lock()?;
            if !state.query.take_fired(seq) {
                return Ok(FetchOutcome::Skipped);
            }
            if !self.commit_locked(&mut state, text.trim(), false) {
                return Ok(FetchOutcome::Skipped);
            }
        }
        self.fetch_next_page().await
    }

    /// Commit the current input right away (Enter key or search button).
    ///
    /// Always resets and refetches, even when the term is unchanged.
    pub async fn submit_search(&self) -> Result<FetchOutcome> {
        {
            let mut state = self.lock()?;
            state.query.cancel_debounce();
            let term = state.query.raw_input().trim().to_string();
            self.commit_locked(&mut state, &term, true);
        }
        self.fetch_next_page().await
    }

    /// Empty both the input and the committed term.
    pub async fn clear_search(&self) -> Result<FetchOutcome> {
        {
            let mut state = self.lock()?;
            state.query.cancel_debounce();
            state.query.clear_input();
            if !self.commit_locked(&mut state, "", false) {
                return Ok(FetchOutcome::Skipped);
            }
        }
        self.fetch_next_page().await
    }

    /// Returns whether a reset happened.
    fn commit_locked(&self, state: &mut ListState<T>, term: &str, force: bool) -> bool {
        if !state.query.commit(term) && !force {
            return false;
        }

        state.epoch += 1;
        state.cursor = None;
        state.results.clear();
        state.has_more = true;
        state.status = FetchStatus::Idle;
        state.last_error = None;
        self.shared.url_sync.write(term);

        debug!(
            kind = %self.shared.source.kind,
            term,
            epoch = state.epoch,
            "search term committed"
        );
        true
    }

    /// Fetch the page after the current cursor for the committed term.
    ///
    /// A no-op while a page is loading, once the end has been reached, or
    /// after a failure; only [`retry`](Self::retry) or a new search leaves
    /// the error state.
    pub async fn fetch_next_page(&self) -> Result<FetchOutcome> {
        self.fetch_page(false).await
    }

    async fn fetch_page(&self, retrying: bool) -> Result<FetchOutcome> {
        let (epoch, first_page, descriptor) = {
            let mut state = self.lock()?;
            let blocked = state.status.is_error() && !retrying;
            if state.status.is_loading() || blocked || !state.has_more {
                return Ok(FetchOutcome::Skipped);
            }

            let first_page = state.cursor.is_none();
            state.status = if first_page {
                FetchStatus::LoadingFirstPage
            } else {
                FetchStatus::LoadingNextPage
            };

            let source = &self.shared.source;
            let mut descriptor =
                QueryDescriptor::first_page(source.kind, self.shared.config.page_size)
                    .term(state.query.committed_term())
                    .cursor(state.cursor.clone())
                    .sort(source.sort);
            descriptor.scope = source.scope.clone();

            (state.epoch, first_page, descriptor)
        };

        let controller = self.clone();
        let client = Arc::clone(&self.shared.client);
        let timeout = self.shared.config.request_timeout;

        // The request lands on its own task, so dropping this future cannot
        // leave the list stuck in a loading state.
        let request = tokio::spawn(async move {
            let result = with_deadline(timeout, client.query(descriptor)).await;
            controller.land(epoch, first_page, result)
        });
        request.await?
    }

    fn land(
        &self,
        epoch: u64,
        first_page: bool,
        result: Result<Page<T>>,
    ) -> Result<FetchOutcome> {
        let mut state = self.lock()?;
        if state.epoch != epoch {
            debug!(
                epoch,
                current = state.epoch,
                "dropping response for a superseded search term"
            );
            return Ok(FetchOutcome::Stale);
        }

        match result {
            Ok(page) => {
                let has_more = page.has_more();
                let added = state.results.extend(page.items);
                state.cursor = page.next_cursor;
                state.has_more = has_more;
                state.status = FetchStatus::Success { has_more };
                state.last_error = None;
                debug!(
                    kind = %self.shared.source.kind,
                    added,
                    total = state.results.len(),
                    has_more,
                    "page appended"
                );
                Ok(FetchOutcome::Appended { added, has_more })
            }
            Err(err) => {
                if first_page {
                    state.results.clear();
                }
                state.status = FetchStatus::Error;
                state.last_error = Some(err.clone());
                warn!(
                    kind = %self.shared.source.kind,
                    first_page,
                    error = %err,
                    "page fetch failed"
                );
                Err(err)
            }
        }
    }

    /// Scroll observer callback.
    pub async fn on_bottom_reached(&self) -> Result<FetchOutcome> {
        self.fetch_next_page().await
    }

    /// User-triggered retry after a failed fetch; a no-op otherwise.
    pub async fn retry(&self) -> Result<FetchOutcome> {
        let failed = self.lock()?.status.is_error();
        if !failed {
            return Ok(FetchOutcome::Skipped);
        }
        self.fetch_page(true).await
    }

    /// Forward every signal of `notifier` to [`on_bottom_reached`](Self::on_bottom_reached).
    ///
    /// Signals that arrive while a page is loading hit the in-flight guard
    /// and are dropped. The task ends when the notifier closes.
    pub fn attach_notifier(&self, notifier: Arc<dyn BottomReachedNotifier>) -> JoinHandle<()> {
        let controller = self.clone();
        tokio::spawn(async move {
            while notifier.wait_for_bottom().await {
                let controller = controller.clone();
                tokio::spawn(async move {
                    if let Err(err) = controller.on_bottom_reached().await {
                        debug!(error = %err, "bottom-reached fetch failed");
                    }
                });
            }
        })
    }
}
