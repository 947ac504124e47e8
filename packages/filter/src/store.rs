//! Observable owner of the session's [`FilterState`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::thread::{self, ThreadId};

use world_map_models::CityId;

use crate::{AqiRange, DateRange, FilterPatch, FilterState, MAX_SELECTED_CITIES};

type Listener = Arc<dyn Fn(&FilterState) + Send + Sync>;

/// Outcome of [`FilterStore::toggle_city`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionChange {
    /// The city was appended to the selection.
    Added,
    /// The city was already selected and has been removed.
    Removed,
    /// The selection is full; nothing changed.
    Full,
}

struct Inner {
    state: Mutex<FilterState>,
    listeners: Mutex<Vec<(u64, Listener)>>,
    /// Held for the whole mutate-then-notify round so rounds never
    /// interleave.
    dispatch: Mutex<()>,
    /// Thread currently calling subscribers, if any.
    dispatching: Mutex<Option<ThreadId>>,
    next_listener_id: AtomicU64,
    revision: AtomicU64,
}

/// The single owner of the dashboard's [`FilterState`].
///
/// Cloning the store yields another handle to the same state.
///
/// [`merge`](Self::merge), [`reset`](Self::reset) and the `toggle_*` /
/// `set_*` helpers apply their change and then call every subscriber, in
/// registration order, with the same post-change snapshot before
/// returning. Rounds are serialized: a subscriber never sees a state from
/// a later round before every subscriber has seen the current one.
///
/// Subscribers may call [`get`](Self::get) but must not mutate the store
/// from inside the callback; schedule the work instead. Doing so would
/// deadlock, so debug builds panic and release builds log an error first.
#[derive(Clone)]
pub struct FilterStore {
    inner: Arc<Inner>,
}

impl Default for FilterStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FilterStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterStore")
            .field("state", &*lock(&self.inner.state))
            .field("subscribers", &lock(&self.inner.listeners).len())
            .field("revision", &self.revision())
            .finish()
    }
}

impl FilterStore {
    /// Creates a store holding the default (empty) filter state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(FilterState::default()),
                listeners: Mutex::new(Vec::new()),
                dispatch: Mutex::new(()),
                dispatching: Mutex::new(None),
                next_listener_id: AtomicU64::new(0),
                revision: AtomicU64::new(0),
            }),
        }
    }

    /// Returns a snapshot of the current state.
    #[must_use]
    pub fn get(&self) -> FilterState {
        lock(&self.inner.state).clone()
    }

    /// Number of notification rounds completed so far.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.inner.revision.load(Ordering::SeqCst)
    }

    /// Shallow-merges `patch` into the state and notifies subscribers.
    pub fn merge(&self, patch: FilterPatch) {
        self.mutate(|state| {
            state.apply(patch);
            ((), true)
        });
    }

    /// Restores the default empty state and notifies subscribers.
    pub fn reset(&self) {
        self.mutate(|state| {
            *state = FilterState::default();
            ((), true)
        });
    }

    /// Replaces the date window.
    pub fn set_date_range(&self, range: DateRange) {
        self.merge(FilterPatch::new().date_range(range));
    }

    /// Replaces the AQI window.
    pub fn set_aqi_range(&self, range: AqiRange) {
        self.merge(FilterPatch::new().aqi_range(range));
    }

    /// Replaces the city search text.
    pub fn set_city_search(&self, search: impl Into<String>) {
        self.merge(FilterPatch::new().city_search(search));
    }

    /// Adds `disaster_type` to the selection, or removes it if present.
    pub fn toggle_disaster_type(&self, disaster_type: &str) {
        self.mutate(|state| {
            let mut types = state.disaster_types.clone();
            if let Some(pos) = types.iter().position(|t| t == disaster_type) {
                types.remove(pos);
            } else {
                types.push(disaster_type.to_string());
            }
            state.apply(FilterPatch::new().disaster_types(types));
            ((), true)
        });
    }

    /// Adds `city` to the comparison selection, or removes it if present.
    ///
    /// Adding to a full selection is a no-op and does not notify.
    pub fn toggle_city(&self, city: CityId) -> SelectionChange {
        self.mutate(|state| {
            let mut cities = state.selected_cities.clone();
            if let Some(pos) = cities.iter().position(|c| *c == city) {
                cities.remove(pos);
                state.apply(FilterPatch::new().selected_cities(cities));
                (SelectionChange::Removed, true)
            } else if cities.len() >= MAX_SELECTED_CITIES {
                log::debug!("Ignoring selection of city {city}: selection is full");
                (SelectionChange::Full, false)
            } else {
                cities.push(city);
                state.apply(FilterPatch::new().selected_cities(cities));
                (SelectionChange::Added, true)
            }
        })
    }

    /// Registers `listener` to be called after every change.
    ///
    /// The listener is not called with the current state on registration.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&FilterState) + Send + Sync + 'static,
    {
        let id = self.inner.next_listener_id.fetch_add(1, Ordering::SeqCst);
        lock(&self.inner.listeners).push((id, Arc::new(listener)));
        Subscription {
            id,
            store: Arc::downgrade(&self.inner),
        }
    }

    /// Number of registered subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        lock(&self.inner.listeners).len()
    }

    /// Applies `change` under the dispatch lock and, if it reports a
    /// change, notifies every subscriber with the resulting snapshot.
    fn mutate<R>(&self, change: impl FnOnce(&mut FilterState) -> (R, bool)) -> R {
        let current = thread::current().id();
        let reentrant = *lock(&self.inner.dispatching) == Some(current);
        if reentrant {
            log::error!("FilterStore mutated from inside a subscriber callback; this deadlocks");
        }
        debug_assert!(
            !reentrant,
            "subscribers must not mutate the FilterStore during notification"
        );

        let _round = lock(&self.inner.dispatch);

        let (result, snapshot) = {
            let mut state = lock(&self.inner.state);
            let (result, changed) = change(&mut state);
            (result, changed.then(|| state.clone()))
        };

        let Some(snapshot) = snapshot else {
            return result;
        };

        let listeners: Vec<Listener> = lock(&self.inner.listeners)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        let revision = self.inner.revision.fetch_add(1, Ordering::SeqCst) + 1;
        log::debug!(
            "Filter revision {revision}: notifying {} subscriber(s)",
            listeners.len()
        );
        log::trace!("Filter revision {revision}: {snapshot:?}");

        *lock(&self.inner.dispatching) = Some(current);
        let _dispatching = ClearOnDrop(&self.inner.dispatching);
        for listener in &listeners {
            listener(&snapshot);
        }

        result
    }
}

/// Clears the dispatching thread when a round ends, including by panic.
struct ClearOnDrop<'a>(&'a Mutex<Option<ThreadId>>);

impl Drop for ClearOnDrop<'_> {
    fn drop(&mut self) {
        *lock(self.0) = None;
    }
}

/// Handle returned by [`FilterStore::subscribe`].
///
/// Dropping the handle keeps the subscription alive; call
/// [`unsubscribe`](Self::unsubscribe) to remove it.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    store: Weak<Inner>,
}

impl Subscription {
    /// Removes the listener. Later changes no longer reach it.
    pub fn unsubscribe(self) {
        if let Some(inner) = self.store.upgrade() {
            lock(&inner.listeners).retain(|(id, _)| *id != self.id);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
