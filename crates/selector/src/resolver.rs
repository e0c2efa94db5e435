use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::candidate::{Candidate, matches_keyword};
use crate::lock;
use crate::source::{EntitySource, SearchQuery};

/// Receives `(selected_id, selected_entity)` whenever the user changes the
/// selection.
pub type ChangeFn<E> = Arc<dyn Fn(Option<String>, Option<E>) + Send + Sync>;

/// Renders an entity for labels and option lists.
pub type DisplayFn<E> = Arc<dyn Fn(&E) -> String + Send + Sync>;

/// Everything one picker knows about its selection.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionState<E> {
    pub selected_id: Option<String>,
    /// `None`, or an entity whose id equals `selected_id`.
    pub selected_entity: Option<E>,
    pub search_text: String,
    pub candidates: Vec<E>,
    pub is_loading: bool,
    pub open: bool,
}

impl<E> Default for SelectionState<E> {
    fn default() -> Self {
        Self {
            selected_id: None,
            selected_entity: None,
            search_text: String::new(),
            candidates: Vec::new(),
            is_loading: false,
            open: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Closed,
    Loading,
    Ready,
}

/// Fill in the entity of a selected id that the new candidates contain.
fn reconcile<E: Candidate>(state: &mut SelectionState<E>) {
    if state.selected_entity.is_some() {
        return;
    }
    if let Some(id) = state.selected_id.as_deref() {
        state.selected_entity = state.candidates.iter().find(|c| c.id() == id).cloned();
    }
}

fn refine<E: Candidate>(pool: &[E], keyword: &str) -> Vec<E> {
    pool.iter().filter(|e| matches_keyword(*e, keyword)).cloned().collect()
}

/// Identifier-to-entity resolver behind every picker.
///
/// The owner hands in an identifier with [`set_value`](Self::set_value) and
/// hears back through the change callback only when the user picks or clears
/// an entry. Each search is numbered; a response that is not for the latest
/// search, or that arrives after [`unmount`](Self::unmount), is dropped.
///
/// For sources that filter locally, the unfiltered list of the current scope
/// is kept and keyword changes narrow it without another request.
pub struct Resolver<S: EntitySource> {
    source: S,
    state: Mutex<SelectionState<S::Entity>>,
    /// Locked after `state` when both are held.
    local_pool: Mutex<Option<Vec<S::Entity>>>,
    parent_scope: Mutex<Option<String>>,
    search_seq: AtomicU64,
    mounted: AtomicBool,
    on_change: Option<ChangeFn<S::Entity>>,
    display: DisplayFn<S::Entity>,
}

impl<S: EntitySource> Resolver<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            state: Mutex::new(SelectionState::default()),
            local_pool: Mutex::new(None),
            parent_scope: Mutex::new(None),
            search_seq: AtomicU64::new(0),
            mounted: AtomicBool::new(true),
            on_change: None,
            display: Arc::new(|e: &S::Entity| e.display_name().to_string()),
        }
    }

    pub fn on_change(mut self, f: impl Fn(Option<String>, Option<S::Entity>) + Send + Sync + 'static) -> Self {
        self.on_change = Some(Arc::new(f));
        self
    }

    pub fn with_display(mut self, f: impl Fn(&S::Entity) -> String + Send + Sync + 'static) -> Self {
        self.display = Arc::new(f);
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    // ── Queries ───────────────────────────────────────────────────────────

    pub fn state(&self) -> SelectionState<S::Entity> {
        lock(&self.state).clone()
    }

    pub fn phase(&self) -> Phase {
        let state = lock(&self.state);
        match (state.open, state.is_loading) {
            (false, _) => Phase::Closed,
            (true, true) => Phase::Loading,
            (true, false) => Phase::Ready,
        }
    }

    /// Text for the closed picker: the resolved entity, else the raw id,
    /// else the placeholder.
    pub fn label(&self, placeholder: &str) -> String {
        let state = lock(&self.state);
        match (&state.selected_entity, &state.selected_id) {
            (Some(entity), _) => (self.display)(entity),
            (None, Some(id)) => id.clone(),
            (None, None) => placeholder.to_string(),
        }
    }

    /// Candidates to render, with the selected entity first when the current
    /// search did not return it.
    pub fn visible_candidates(&self) -> Vec<S::Entity> {
        let state = lock(&self.state);
        let mut visible = Vec::with_capacity(state.candidates.len() + 1);
        if let Some(selected) = &state.selected_entity {
            if !state.candidates.iter().any(|c| c.id() == selected.id()) {
                visible.push(selected.clone());
            }
        }
        visible.extend(state.candidates.iter().cloned());
        visible
    }

    pub fn is_checked(&self, entity: &S::Entity) -> bool {
        lock(&self.state).selected_id.as_deref() == Some(entity.id())
    }

    pub fn display(&self, entity: &S::Entity) -> String {
        (self.display)(entity)
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }

    // ── Interaction ───────────────────────────────────────────────────────

    /// Open the option list and search with the current text.
    pub async fn open(&self) {
        let keyword = {
            let mut state = lock(&self.state);
            state.open = true;
            state.is_loading = true;
            state.search_text.clone()
        };
        self.search(keyword).await;
    }

    /// Dismiss the option list. The selection is untouched.
    pub fn close(&self) {
        let mut state = lock(&self.state);
        state.open = false;
        state.is_loading = false;
    }

    pub async fn set_search_text(&self, text: &str) {
        {
            let mut state = lock(&self.state);
            state.search_text = text.to_string();
            if !state.open {
                return;
            }
            if let Some(pool) = lock(&self.local_pool).as_deref() {
                state.candidates = refine(pool, text);
                reconcile(&mut state);
                return;
            }
            state.is_loading = true;
        }
        self.search(text.to_string()).await;
    }

    pub fn select(&self, entity: S::Entity) {
        {
            let mut state = lock(&self.state);
            state.selected_id = Some(entity.id().to_string());
            state.selected_entity = Some(entity.clone());
            state.open = false;
            state.is_loading = false;
        }
        self.emit(Some(entity.id().to_string()), Some(entity));
    }

    pub fn clear(&self) {
        {
            let mut state = lock(&self.state);
            state.selected_id = None;
            state.selected_entity = None;
        }
        self.emit(None, None);
    }

    /// Reconcile an identifier handed in by the owner.
    ///
    /// Resolves against the current candidates first, then against one
    /// fallback page. An id that neither contains stays selected without an
    /// entity. Never emits.
    pub async fn set_value(&self, value: Option<&str>) {
        let Some(id) = value else {
            let mut state = lock(&self.state);
            state.selected_id = None;
            state.selected_entity = None;
            return;
        };

        {
            let mut state = lock(&self.state);
            if state.selected_entity.as_ref().is_some_and(|e| e.id() == id) {
                state.selected_id = Some(id.to_string());
                return;
            }
            state.selected_id = Some(id.to_string());
            state.selected_entity = state.candidates.iter().find(|c| c.id() == id).cloned();
            if state.selected_entity.is_some() {
                return;
            }
        }

        let fallback = self.source.fallback().await;
        if !self.is_mounted() {
            debug!("resolver unmounted; dropping fallback for {id}");
            return;
        }
        let mut state = lock(&self.state);
        if state.selected_id.as_deref() != Some(id) {
            debug!("selection moved on; dropping fallback for {id}");
            return;
        }
        if state.selected_entity.is_some() {
            debug!("{id} resolved meanwhile; dropping fallback");
            return;
        }
        match fallback {
            Ok(list) => match list.into_iter().find(|e| e.id() == id) {
                Some(entity) => state.selected_entity = Some(entity),
                None => debug!("{id} not found in fallback page; keeping id only"),
            },
            Err(e) => debug!("fallback for {id} failed: {e}"),
        }
    }

    /// Point a dependent picker at another parent. A selection recorded under
    /// a different parent is cleared and the owner is told. An open list is
    /// fetched again for the new parent.
    pub async fn set_parent_scope(&self, scope: Option<&str>) {
        {
            let mut current = lock(&self.parent_scope);
            if current.as_deref() == scope {
                return;
            }
            *current = scope.map(str::to_string);
        }

        let (stale, refetch) = {
            let mut state = lock(&self.state);
            *lock(&self.local_pool) = None;
            let stale = match scope {
                Some(scope) => {
                    state.candidates.retain(|c| c.parent_scope() == Some(scope));
                    state
                        .selected_entity
                        .as_ref()
                        .is_some_and(|e| e.parent_scope() != Some(scope))
                }
                None => false,
            };
            if stale {
                state.selected_id = None;
                state.selected_entity = None;
            }
            if state.open {
                state.is_loading = true;
            }
            (stale, state.open.then(|| state.search_text.clone()))
        };
        if stale {
            self.emit(None, None);
        }
        if let Some(keyword) = refetch {
            self.search(keyword).await;
        }
    }

    /// Detach from the owner. Responses that arrive later are ignored.
    pub fn unmount(&self) {
        self.mounted.store(false, Ordering::SeqCst);
    }

    // ── Internals ─────────────────────────────────────────────────────────

    async fn search(&self, keyword: String) {
        let local = self.source.filters_locally();
        let seq = self.search_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let query = SearchQuery {
            keyword: if local { String::new() } else { keyword },
            parent_scope: lock(&self.parent_scope).clone(),
        };
        let outcome = self.source.search(&query).await;

        if !self.is_mounted() {
            debug!("resolver unmounted; dropping search #{seq}");
            return;
        }
        if self.search_seq.load(Ordering::SeqCst) != seq {
            debug!("dropping stale search #{seq} ({:?})", query.keyword);
            return;
        }

        let mut state = lock(&self.state);
        state.is_loading = false;
        match outcome {
            Ok(list) if local => {
                // The text may have changed while the list was in flight.
                state.candidates = refine(&list, &state.search_text);
                *lock(&self.local_pool) = Some(list);
            }
            Ok(list) => state.candidates = list,
            Err(e) => {
                // Already notified by the client.
                debug!("search #{seq} failed: {e}");
                state.candidates.clear();
            }
        }
        reconcile(&mut state);
    }

    fn emit(&self, id: Option<String>, entity: Option<S::Entity>) {
        if let Some(on_change) = &self.on_change {
            on_change(id, entity);
        }
    }
}
