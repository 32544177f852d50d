//! Reactive collection state.
//!
//! Each store keeps one `{items, loading, error}` value in a
//! [`tokio::sync::watch`] channel. Reads are synchronous borrows, UI code
//! awaits [`StateHandle::subscribe`] receivers to re-render, and the only way
//! to change the value is to send a [`CollectionAction`] through the pure
//! [`CollectionReducer`].
//!
//! Fetches are numbered. [`StateHandle::start`] opens a new generation and
//! [`StateHandle::finish`] only applies a result from the newest one, so a
//! slow fetch can never overwrite what a later fetch (or a sign-out)
//! installed.

use event_planner_core::model::Entity;
use event_planner_core::reducer::Reducer;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;

/// What a store exposes to the UI.
#[derive(Clone, Debug, PartialEq)]
pub struct CollectionState<T> {
    /// Cached entities, in display order
    pub items: Vec<T>,
    /// A fetch is in flight
    pub loading: bool,
    /// Message of the last failure, cleared by the next success
    pub error: Option<String>,
}

impl<T> Default for CollectionState<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            loading: false,
            error: None,
        }
    }
}

impl<T: Entity> CollectionState<T> {
    /// Cached entity by id
    #[must_use]
    pub fn get(&self, id: &T::Id) -> Option<&T> {
        self.items.iter().find(|item| item.id() == id)
    }
}

/// State transitions of a cached collection.
#[derive(Clone, Debug)]
pub enum CollectionAction<T: Entity> {
    /// A fetch started
    Started,
    /// A fetch finished: replace everything
    Loaded(Vec<T>),
    /// A fetch failed: clear items so nothing unauthorized lingers
    LoadFailed(String),
    /// A remote update succeeded: merge the patch in place
    Patched {
        /// Entity to patch
        id: T::Id,
        /// Fields that changed
        patch: T::Patch,
    },
    /// A remote create succeeded: put the record first
    Inserted(T),
    /// A remote delete succeeded
    Removed(T::Id),
    /// A mutation failed: keep items and the loading flag, record the
    /// message
    Failed(String),
}

/// The reducer behind every store's cache.
#[derive(Debug)]
pub struct CollectionReducer<T>(PhantomData<fn() -> T>);

impl<T> CollectionReducer<T> {
    /// Create the reducer
    #[must_use]
    pub const fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for CollectionReducer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Entity> Reducer for CollectionReducer<T> {
    type State = CollectionState<T>;
    type Action = CollectionAction<T>;

    fn reduce(&self, state: &mut Self::State, action: Self::Action) {
        match action {
            CollectionAction::Started => {
                state.loading = true;
                state.error = None;
            }
            CollectionAction::Loaded(items) => {
                state.items = items;
                state.loading = false;
                state.error = None;
            }
            CollectionAction::LoadFailed(message) => {
                state.items.clear();
                state.loading = false;
                state.error = Some(message);
            }
            CollectionAction::Patched { id, patch } => {
                if let Some(item) = state.items.iter_mut().find(|item| *item.id() == id) {
                    item.apply(&patch);
                }
                state.error = None;
            }
            CollectionAction::Inserted(item) => {
                state.items.retain(|existing| existing.id() != item.id());
                state.items.insert(0, item);
                state.error = None;
            }
            CollectionAction::Removed(id) => {
                state.items.retain(|item| *item.id() != id);
                state.error = None;
            }
            CollectionAction::Failed(message) => {
                state.error = Some(message);
            }
        }
    }
}

/// Shared handle to one store's reactive state.
pub struct StateHandle<T: Entity> {
    tx: Arc<watch::Sender<CollectionState<T>>>,
    reducer: Arc<CollectionReducer<T>>,
    generation: Arc<AtomicU64>,
}

impl<T: Entity> Clone for StateHandle<T> {
    fn clone(&self) -> Self {
        Self {
            tx: Arc::clone(&self.tx),
            reducer: Arc::clone(&self.reducer),
            generation: Arc::clone(&self.generation),
        }
    }
}

impl<T: Entity> Default for StateHandle<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Entity> std::fmt::Debug for StateHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.tx.borrow();
        f.debug_struct("StateHandle")
            .field("items", &state.items.len())
            .field("loading", &state.loading)
            .field("error", &state.error)
            .field("generation", &self.generation.load(Ordering::Acquire))
            .finish()
    }
}

impl<T: Entity> StateHandle<T> {
    /// Empty, idle state
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(CollectionState::default());
        Self {
            tx: Arc::new(tx),
            reducer: Arc::new(CollectionReducer::new()),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Apply an action and wake subscribers
    pub fn send(&self, action: CollectionAction<T>) {
        self.tx
            .send_modify(|state| self.reducer.reduce(state, action));
    }

    /// Begin a fetch: supersede every fetch still in flight and send
    /// [`CollectionAction::Started`]. Returns the new generation.
    #[must_use]
    pub fn start(&self) -> u64 {
        self.supersede(CollectionAction::Started)
    }

    /// Supersede every fetch still in flight and apply `action`.
    pub fn supersede(&self, action: CollectionAction<T>) -> u64 {
        let mut generation = 0;
        self.tx.send_modify(|state| {
            generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
            self.reducer.reduce(state, action);
        });
        generation
    }

    /// Apply the result of the fetch that began at `generation`, unless a
    /// newer one has started since. Returns whether it was applied.
    pub fn finish(&self, generation: u64, action: CollectionAction<T>) -> bool {
        self.tx.send_if_modified(|state| {
            if self.generation.load(Ordering::Acquire) != generation {
                return false;
            }
            self.reducer.reduce(state, action);
            true
        })
    }

    /// Read the current state without suspending
    pub fn state<R>(&self, f: impl FnOnce(&CollectionState<T>) -> R) -> R {
        f(&self.tx.borrow())
    }

    /// Receiver that observes every future change
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CollectionState<T>> {
        self.tx.subscribe()
    }
}
