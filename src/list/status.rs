use std::fmt;

/// Fetch lifecycle of a list, as presentation sees it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchStatus {
    #[default]
    Idle,
    LoadingFirstPage,
    LoadingNextPage,
    Error,
    Success {
        has_more: bool,
    },
}

impl FetchStatus {
    pub fn is_loading(&self) -> bool {
        matches!(
            self,
            FetchStatus::LoadingFirstPage | FetchStatus::LoadingNextPage
        )
    }

    pub fn is_error(&self) -> bool {
        matches!(self, FetchStatus::Error)
    }
}

impl fmt::Display for FetchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchStatus::Idle => write!(f, "IDLE"),
            FetchStatus::LoadingFirstPage => write!(f, "LOADING_FIRST_PAGE"),
            FetchStatus::LoadingNextPage => write!(f, "LOADING_NEXT_PAGE"),
            FetchStatus::Error => write!(f, "ERROR"),
            FetchStatus::Success { has_more: true } => write!(f, "SUCCESS(more)"),
            FetchStatus::Success { has_more: false } => write!(f, "SUCCESS(end)"),
        }
    }
}

/// What a single fetch request ended up doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// A page landed; `added` counts items that were not already present
    Appended { added: usize, has_more: bool },
    /// Guarded no-op: a page is already loading, the end was reached, or
    /// nothing changed
    Skipped,
    /// The response belonged to a term that is no longer committed
    Stale,
}
