//! Per-view adapters over a [`SharedStateStore`].
//!
//! A view owns a pure [`Projection`] of the collection. The adapter loads the
//! collection on mount, recomputes the projection on every store
//! notification, and releases its subscription on unmount.

mod projections;

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Local};

use crate::clock::Clock;
use crate::models::Record;
use crate::store::{SharedStateStore, Subscription};

pub use projections::{
    AppointmentPartition, DashboardSummary, Notification, NotificationFeed, NotificationKind,
    Partition, Summary,
};

/// Pure derivation of a view's state from the collection.
pub trait Projection: Send + Sync + 'static {
    type Output: Clone + Send + 'static;

    /// Derive the view state. `now` is passed in, never read from a clock.
    fn project(&self, records: &[Record], now: DateTime<Local>) -> Self::Output;
}

type Observer<O> = Arc<dyn Fn(&O) + Send + Sync>;

struct ViewState<O> {
    output: O,
    revision: u64,
    observer: Option<Observer<O>>,
}

/// A mounted view: keeps `P::Output` current with the store.
pub struct ViewAdapter<P: Projection> {
    store: Arc<SharedStateStore>,
    projection: Arc<P>,
    clock: Arc<dyn Clock>,
    state: Arc<Mutex<ViewState<P::Output>>>,
    subscription: Option<Subscription>,
}

impl<P: Projection> ViewAdapter<P> {
    /// Subscribe, load the collection, and compute the projection.
    ///
    /// Uses the store's clock for `now`.
    pub fn mount(store: Arc<SharedStateStore>, projection: P) -> Self {
        let clock = store.clock();
        Self::mount_with_clock(store, projection, clock)
    }

    pub fn mount_with_clock(
        store: Arc<SharedStateStore>,
        projection: P,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let projection = Arc::new(projection);
        let state = Arc::new(Mutex::new(ViewState {
            output: projection.project(&store.snapshot(), clock.now()),
            revision: 0,
            observer: None,
        }));

        // Subscribe before loading so no write between the two goes unseen.
        let subscription = {
            let projection = Arc::clone(&projection);
            let clock = Arc::clone(&clock);
            let state = Arc::clone(&state);
            store.subscribe(move |records| {
                let output = projection.project(records, clock.now());
                publish(&state, output);
            })
        };

        store.load();
        {
            let mut state = lock(&state);
            state.output = projection.project(&store.snapshot(), clock.now());
        }

        Self {
            store,
            projection,
            clock,
            state,
            subscription: Some(subscription),
        }
    }

    /// Latest projected state.
    pub fn current(&self) -> P::Output {
        lock(&self.state).output.clone()
    }

    /// Number of recomputations since mount.
    pub fn revision(&self) -> u64 {
        lock(&self.state).revision
    }

    /// Call `observer` with every recomputed state.
    pub fn on_change<F>(&self, observer: F)
    where
        F: Fn(&P::Output) + Send + Sync + 'static,
    {
        lock(&self.state).observer = Some(Arc::new(observer));
    }

    /// Recompute against the clock's current time without touching storage.
    ///
    /// Date-relative views go stale when midnight passes with no write.
    pub fn refresh_clock(&self) {
        let output = self
            .projection
            .project(&self.store.snapshot(), self.clock.now());
        publish(&self.state, output);
    }

    pub const fn is_mounted(&self) -> bool {
        self.subscription.is_some()
    }

    /// Stop receiving updates. Safe to call more than once.
    pub fn unmount(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
    }
}

fn publish<O: Clone>(state: &Mutex<ViewState<O>>, output: O) {
    let observer = {
        let mut state = lock(state);
        state.output = output.clone();
        state.revision += 1;
        state.observer.clone()
    };
    if let Some(observer) = observer {
        observer(&output);
    }
}

fn lock<O>(state: &Mutex<ViewState<O>>) -> std::sync::MutexGuard<'_, ViewState<O>> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::models::{NewRecord, RecordStatus};
    use crate::storage::{MemoryStorage, StorageBackend};
    use chrono::{NaiveDate, TimeZone};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn setup() -> (Arc<SharedStateStore>, Arc<FixedClock>) {
        let clock = Arc::new(FixedClock::new(
            Local.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap(),
        ));
        let storage: Arc<dyn StorageBackend> = Arc::new(MemoryStorage::new());
        let store = SharedStateStore::new("appointments", storage)
            .with_clock(Arc::clone(&clock) as Arc<dyn Clock>);
        (Arc::new(store), clock)
    }

    /// Counts records; enough to observe recomputation.
    struct Count;

    impl Projection for Count {
        type Output = usize;

        fn project(&self, records: &[Record], _now: DateTime<Local>) -> usize {
            records.len()
        }
    }

    #[test]
    fn test_mount_projects_existing_records() {
        let (store, _clock) = setup();
        store
            .append(NewRecord::new("Sam", "Dr. A", date(2025, 3, 1), "10:00"))
            .unwrap();

        let view = ViewAdapter::mount(Arc::clone(&store), Count);
        assert_eq!(view.current(), 1);
        assert_eq!(view.revision(), 0);
        assert!(view.is_mounted());
    }

    #[test]
    fn test_view_follows_store_changes() {
        let (store, _clock) = setup();
        let view = ViewAdapter::mount(Arc::clone(&store), AppointmentPartition);

        let record = store
            .append(NewRecord::new("Sam", "Dr. A", date(2025, 3, 4), "10:00"))
            .unwrap();
        assert_eq!(view.current().upcoming.len(), 1);

        store
            .update_status(&record.id, RecordStatus::Completed)
            .unwrap();
        let partition = view.current();
        assert!(partition.upcoming.is_empty());
        assert_eq!(partition.past.len(), 1);
        assert_eq!(view.revision(), 2);
    }

    #[test]
    fn test_unmount_releases_subscription() {
        let (store, _clock) = setup();
        let mut view = ViewAdapter::mount(Arc::clone(&store), Count);
        assert_eq!(store.subscriber_count(), 1);

        view.unmount();
        view.unmount();
        assert!(!view.is_mounted());
        assert_eq!(store.subscriber_count(), 0);

        store
            .append(NewRecord::new("Sam", "Dr. A", date(2025, 3, 1), "10:00"))
            .unwrap();
        assert_eq!(view.current(), 0);
    }

    #[test]
    fn test_repeated_mounts_do_not_accumulate_handlers() {
        let (store, _clock) = setup();
        for _ in 0..25 {
            let mut view = ViewAdapter::mount(Arc::clone(&store), Count);
            view.unmount();
        }
        for _ in 0..25 {
            let _view = ViewAdapter::mount(Arc::clone(&store), Count);
        }
        assert_eq!(store.subscriber_count(), 0);
    }

    #[test]
    fn test_refresh_clock_moves_today_into_past() {
        let (store, clock) = setup();
        store
            .append(NewRecord::new("Sam", "Dr. A", date(2025, 3, 1), "10:00"))
            .unwrap();
        let view = ViewAdapter::mount(Arc::clone(&store), AppointmentPartition);
        assert_eq!(view.current().upcoming.len(), 1);

        clock.advance(chrono::Duration::days(1));
        assert_eq!(view.current().upcoming.len(), 1);

        view.refresh_clock();
        assert!(view.current().upcoming.is_empty());
        assert_eq!(view.current().past.len(), 1);
    }

    #[test]
    fn test_on_change_observer_sees_each_recompute() {
        let (store, _clock) = setup();
        let view = ViewAdapter::mount(Arc::clone(&store), Count);
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_in_observer = Arc::clone(&calls);
        view.on_change(move |count| {
            calls_in_observer.store(*count, Ordering::SeqCst);
        });

        store
            .append(NewRecord::new("Sam", "Dr. A", date(2025, 3, 1), "10:00"))
            .unwrap();
        store
            .append(NewRecord::new("Ana", "Dr. B", date(2025, 3, 2), "11:00"))
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    /// Books an appointment the first time it is projected.
    struct BookOnFirstProjection {
        store: Arc<SharedStateStore>,
        booked: AtomicBool,
    }

    impl Projection for BookOnFirstProjection {
        type Output = usize;

        fn project(&self, records: &[Record], _now: DateTime<Local>) -> usize {
            if !self.booked.swap(true, Ordering::SeqCst) {
                self.store
                    .append(NewRecord::new("Sam", "Dr. A", date(2025, 3, 2), "10:00"))
                    .unwrap();
            }
            records.len()
        }
    }

    #[test]
    fn test_write_during_mount_is_not_missed() {
        let (store, _clock) = setup();
        let mut view = ViewAdapter::mount(
            Arc::clone(&store),
            BookOnFirstProjection {
                store: Arc::clone(&store),
                booked: AtomicBool::new(false),
            },
        );

        assert_eq!(store.snapshot().len(), 1);
        assert_eq!(view.current(), 1);
        view.unmount();
    }
}
