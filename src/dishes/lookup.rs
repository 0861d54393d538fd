use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::debug;

use super::draft::DishDraft;
use super::{DishCatalog, NutritionEstimate};
use crate::config::LookupConfig;
use crate::error::{ClientError, ClientResult};

/// Form state shared between a form and the lookups it starts.
#[derive(Debug, Default)]
pub struct LookupState {
    pub draft: DishDraft,
    /// Lookups currently waiting on the server, manual and automatic.
    in_flight: u32,
    pub error: Option<String>,
}

impl LookupState {
    pub fn is_searching(&self) -> bool {
        self.in_flight > 0
    }

    fn start_search(&mut self) {
        self.in_flight += 1;
        self.error = None;
    }

    fn finish_search(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
    }
}

pub(crate) type SharedState = Arc<Mutex<LookupState>>;

pub(crate) fn lock(state: &SharedState) -> MutexGuard<'_, LookupState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Nutrition auto-fill for one dish draft.
///
/// Automatic lookups are debounced: each edit of the name or weight
/// cancels the pending timer and starts a new one, so only the last edit
/// of a burst reaches the network. Once a timer has fired its request
/// runs to completion. Manual lookups bypass the timer entirely and may
/// overlap an automatic one; whichever response lands last wins.
pub struct NutritionLookup {
    catalog: Arc<dyn DishCatalog>,
    state: SharedState,
    settings: LookupConfig,
    pending: Option<JoinHandle<()>>,
}

impl NutritionLookup {
    pub(crate) fn new(
        catalog: Arc<dyn DishCatalog>,
        state: SharedState,
        settings: LookupConfig,
    ) -> Self {
        Self {
            catalog,
            state,
            settings,
            pending: None,
        }
    }

    /// Long enough name and no macro filled in yet.
    pub fn is_eligible(draft: &DishDraft, min_name_chars: usize) -> bool {
        let name = draft.name.trim();
        !name.is_empty() && draft.name.chars().count() >= min_name_chars && !draft.has_macros()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Restarts the quiet-period timer after an edit. Outside a tokio
    /// runtime there is nothing to drive the timer, so no lookup is
    /// scheduled.
    pub fn schedule(&mut self) {
        self.cancel();

        let Ok(runtime) = Handle::try_current() else {
            debug!("no runtime, automatic lookup disabled");
            return;
        };

        let (name, weight) = {
            let state = lock(&self.state);
            if !Self::is_eligible(&state.draft, self.settings.min_name_chars) {
                return;
            }
            (state.draft.name.clone(), state.draft.weight)
        };

        let catalog = Arc::clone(&self.catalog);
        let state = Arc::clone(&self.state);
        let debounce = self.settings.debounce;
        let min_name_chars = self.settings.min_name_chars;

        self.pending = Some(runtime.spawn(async move {
            tokio::time::sleep(debounce).await;
            // detached so that a later cancel() cannot abort an in-flight request
            tokio::spawn(run_automatic(catalog, state, name, weight, min_name_chars));
        }));
    }

    /// Drops the pending timer, if any. No-op once it has fired.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }

    /// Explicit lookup; failures are recorded for display and returned.
    pub async fn run_manual(&self) -> ClientResult<NutritionEstimate> {
        let (name, weight) = {
            let mut state = lock(&self.state);
            if state.draft.name.trim().is_empty() {
                let err = ClientError::validation("name", "Enter a dish name");
                state.error = Some(err.user_message());
                return Err(err);
            }
            state.start_search();
            (state.draft.name.clone(), state.draft.weight)
        };

        let result = self.catalog.search_nutrition(&name, weight).await;

        let mut state = lock(&self.state);
        state.finish_search();
        match &result {
            Ok(estimate) => state.draft.apply_estimate(estimate),
            Err(e) => state.error = Some(e.user_message()),
        }
        result
    }
}

impl Drop for NutritionLookup {
    fn drop(&mut self) {
        self.cancel();
    }
}

async fn run_automatic(
    catalog: Arc<dyn DishCatalog>,
    state: SharedState,
    name: String,
    weight: u32,
    min_name_chars: usize,
) {
    {
        let mut guard = lock(&state);
        // macros typed during the quiet period must not be overwritten
        if !NutritionLookup::is_eligible(&guard.draft, min_name_chars) {
            debug!("automatic lookup skipped, draft no longer eligible");
            return;
        }
        guard.start_search();
    }

    debug!(name = %name, weight, "automatic nutrition lookup");
    let result = catalog.search_nutrition(&name, weight).await;

    let mut guard = lock(&state);
    guard.finish_search();
    match result {
        Ok(estimate) => guard.draft.apply_estimate(&estimate),
        Err(e) => {
            debug!(error = %e, "automatic lookup failed");
            guard.error = None;
        }
    }
}
