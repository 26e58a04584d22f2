use crate::core::{FeedError, Result};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::warn;
use url::Url;

/// One-way mirror of the committed search term into the navigable URL.
///
/// `read` is consulted once when a list controller is created, so reloading
/// or sharing the URL reproduces the same committed term.
pub trait UrlSync: Send + Sync {
    fn read(&self) -> String;
    fn write(&self, term: &str);
}

/// Keeps the term in a single query parameter of an in-memory location.
///
/// Writes replace the current location in place; no history entry is added,
/// mirroring `history.replaceState` rather than a navigation.
#[derive(Debug)]
pub struct QueryParamUrlSync {
    param: String,
    location: Mutex<Url>,
    replacements: AtomicUsize,
}

impl QueryParamUrlSync {
    pub fn new(location: &str, param: &str) -> Result<Self> {
        let location = Url::parse(location)
            .map_err(|err| FeedError::Config(format!("invalid location '{location}': {err}")))?;
        Ok(Self {
            param: param.to_string(),
            location: Mutex::new(location),
            replacements: AtomicUsize::new(0),
        })
    }

    /// Current location, as the address bar would show it
    pub fn location(&self) -> Result<Url> {
        Ok(self.location.lock()?.clone())
    }

    /// Number of in-place location replacements performed so far
    pub fn replacements(&self) -> usize {
        self.replacements.load(Ordering::SeqCst)
    }

    fn replace_term(&self, term: &str) -> Result<()> {
        let mut location = self.location.lock()?;

        let kept: Vec<(String, String)> = location
            .query_pairs()
            .into_owned()
            .filter(|(key, _)| key != &self.param)
            .collect();

        if kept.is_empty() && term.is_empty() {
            location.set_query(None);
        } else {
            let mut pairs = location.query_pairs_mut();
            pairs.clear();
            for (key, value) in &kept {
                pairs.append_pair(key, value);
            }
            if !term.is_empty() {
                pairs.append_pair(&self.param, term);
            }
        }

        self.replacements.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl UrlSync for QueryParamUrlSync {
    fn read(&self) -> String {
        match self.location.lock() {
            Ok(location) => location
                .query_pairs()
                .find(|(key, _)| key == &self.param)
                .map(|(_, value)| value.trim().to_string())
                .unwrap_or_default(),
            Err(err) => {
                warn!(error = %err, "url location lock poisoned");
                String::new()
            }
        }
    }

    fn write(&self, term: &str) {
        if let Err(err) = self.replace_term(term) {
            warn!(error = %err, "failed to mirror search term into url");
        }
    }
}

/// Discards writes; reads an empty term. For lists without a URL.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoUrlSync;

impl UrlSync for NoUrlSync {
    fn read(&self) -> String {
        String::new()
    }

    fn write(&self, _term: &str) {}
}
