use tokio::task::JoinHandle;

/// Search intent of one list: what the user typed versus what is being fetched.
///
/// `committed_term` moves only when a debounce timer fires without newer
/// input, or on an explicit submit or clear. `raw_input` always echoes the
/// last keystroke.
#[derive(Debug, Default)]
pub struct QueryState {
    raw_input: String,
    committed_term: String,
    pending_debounce: Option<JoinHandle<()>>,
    /// Bumped whenever the pending timer is replaced or cancelled
    debounce_seq: u64,
}

impl QueryState {
    pub fn new(committed_term: impl Into<String>) -> Self {
        let committed_term = committed_term.into();
        Self {
            raw_input: committed_term.clone(),
            committed_term,
            pending_debounce: None,
            debounce_seq: 0,
        }
    }

    pub fn raw_input(&self) -> &str {
        &self.raw_input
    }

    pub fn committed_term(&self) -> &str {
        &self.committed_term
    }

    pub fn has_pending_debounce(&self) -> bool {
        self.pending_debounce.is_some()
    }

    /// Record a keystroke and invalidate any pending timer. Returns the
    /// sequence number the replacement timer must present when it fires.
    pub fn record_input(&mut self, text: &str) -> u64 {
        self.raw_input = text.to_string();
        self.cancel_debounce();
        self.debounce_seq
    }

    /// Install the timer armed for `seq`; ignored if a newer input arrived.
    pub fn arm(&mut self, seq: u64, handle: JoinHandle<()>) {
        if seq == self.debounce_seq {
            self.pending_debounce = Some(handle);
        } else {
            handle.abort();
        }
    }

    pub fn cancel_debounce(&mut self) {
        self.debounce_seq = self.debounce_seq.wrapping_add(1);
        if let Some(handle) = self.pending_debounce.take() {
            handle.abort();
        }
    }

    /// Called by a firing timer. `true` when the timer is still the current
    /// one; it is then detached so later input cannot abort work it started.
    pub fn take_fired(&mut self, seq: u64) -> bool {
        if seq != self.debounce_seq {
            return false;
        }
        self.pending_debounce = None;
        true
    }

    pub fn clear_input(&mut self) {
        self.raw_input.clear();
    }

    /// Make `term` the committed term. Returns whether it changed.
    pub fn commit(&mut self, term: &str) -> bool {
        if self.committed_term == term {
            return false;
        }
        self.committed_term = term.to_string();
        true
    }
}
