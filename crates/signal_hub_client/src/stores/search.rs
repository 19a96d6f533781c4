//! crates/signal_hub_client/src/stores/search.rs
//!
//! Search state: turns free-text input into a debounced, cancelable query
//! against the gateway's search procedure. Intermediate keystrokes inside
//! the quiet window never reach the gateway, and only the response to the
//! most recently issued query may update the visible result set.

use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use signal_hub_core::domain::Chapter;
use signal_hub_core::ports::DataGateway;

struct SearchInner {
    query: String,
    results: Vec<Chapter>,
    loading: bool,
    last_error: Option<String>,
    /// Bumped on every query change; a scheduled or in-flight search whose
    /// generation is no longer current discards its result.
    generation: u64,
}

struct PendingQuery {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct SearchStore {
    data: Arc<dyn DataGateway>,
    debounce: Duration,
    state: Arc<RwLock<SearchInner>>,
    pending: Mutex<Option<PendingQuery>>,
}

impl SearchStore {
    pub fn new(data: Arc<dyn DataGateway>, debounce: Duration) -> Self {
        Self {
            data,
            debounce,
            state: Arc::new(RwLock::new(SearchInner {
                query: String::new(),
                results: Vec::new(),
                loading: false,
                last_error: None,
                generation: 0,
            })),
            pending: Mutex::new(None),
        }
    }

    /// Records the new query string and schedules a search after the quiet
    /// period. An empty query clears the results synchronously without any
    /// remote call.
    pub fn set_query(&self, query: &str) {
        // Supersede whatever was scheduled before.
        if let Some(previous) = self
            .pending
            .lock()
            .expect("search pending lock poisoned")
            .take()
        {
            previous.token.cancel();
        }

        let term = query.trim().to_string();
        let generation = {
            let mut state = self.state.write().expect("search state lock poisoned");
            state.query = query.to_string();
            state.generation += 1;
            if term.is_empty() {
                state.results.clear();
                state.loading = false;
                state.last_error = None;
            }
            state.generation
        };
        if term.is_empty() {
            return;
        }

        let token = CancellationToken::new();
        let handle = tokio::spawn(run_search(
            Arc::clone(&self.data),
            Arc::clone(&self.state),
            token.clone(),
            self.debounce,
            term,
            generation,
        ));
        *self
            .pending
            .lock()
            .expect("search pending lock poisoned") = Some(PendingQuery { token, handle });
    }

    /// Awaits the currently scheduled search, if any. Useful for tests and
    /// for views that want to block on the final keystroke.
    pub async fn flush(&self) {
        let pending = self
            .pending
            .lock()
            .expect("search pending lock poisoned")
            .take();
        if let Some(pending) = pending {
            let _ = pending.handle.await;
        }
    }

    pub fn query(&self) -> String {
        self.read().query.clone()
    }

    pub fn results(&self) -> Vec<Chapter> {
        self.read().results.clone()
    }

    pub fn loading(&self) -> bool {
        self.read().loading
    }

    pub fn last_error(&self) -> Option<String> {
        self.read().last_error.clone()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, SearchInner> {
        self.state.read().expect("search state lock poisoned")
    }
}

/// Waits out the quiet period, then runs the search and publishes the
/// outcome, unless a newer query has superseded this one at any point.
async fn run_search(
    data: Arc<dyn DataGateway>,
    state: Arc<RwLock<SearchInner>>,
    token: CancellationToken,
    debounce: Duration,
    term: String,
    generation: u64,
) {
    tokio::select! {
        _ = token.cancelled() => return,
        _ = tokio::time::sleep(debounce) => {}
    }

    {
        let mut state = state.write().expect("search state lock poisoned");
        if state.generation != generation {
            return;
        }
        state.loading = true;
    }

    let result = data.search_chapters(&term).await;

    let mut state = state.write().expect("search state lock poisoned");
    if state.generation != generation {
        debug!(term, "Discarding stale search response");
        return;
    }
    state.loading = false;
    match result {
        Ok(results) => {
            state.results = results;
            state.last_error = None;
        }
        Err(err) => {
            warn!(term, "Search failed: {err}");
            state.results.clear();
            state.last_error = Some(err.to_string());
        }
    }
}
