use std::{
    cell::{Cell, RefCell},
    collections::{BTreeMap, VecDeque},
    fmt,
    mem::take,
    rc::{Rc, Weak},
};

use derive_ex::derive_ex;
use log::{trace, warn};
use parse_display::Display;
use serde::{Deserialize, Serialize};
use slabmap::SlabMap;

use crate::{Derived, Subscription, UpdateError};


/// Describes the next value of a [`StateCell`].
pub enum Updater<T> {
    /// Replaces the current value.
    Value(T),
    /// Computes the next value from the current one.
    ///
    /// The function must not have side effects other than computing its result.
    Fn(Box<dyn FnOnce(&T) -> T>),
}
impl<T> Updater<T> {
    pub fn from_fn(f: impl FnOnce(&T) -> T + 'static) -> Self {
        Updater::Fn(Box::new(f))
    }
    fn apply(self, current: &T) -> T {
        match self {
            Updater::Value(value) => value,
            Updater::Fn(f) => f(current),
        }
    }
}
impl<T> From<T> for Updater<T> {
    fn from(value: T) -> Self {
        Updater::Value(value)
    }
}
impl<T: fmt::Debug> fmt::Debug for Updater<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Updater::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Updater::Fn(_) => write!(f, "Fn(..)"),
        }
    }
}

/// Notification state of a [`StateCell`].
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Default)]
#[display(style = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    Notifying,
}

/// A value holder that notifies observers when its value changes.
///
/// The value is never mutated in place. Every accepted mutation installs a new snapshot,
/// increments [`generation`](Self::generation), and runs one notification pass over the observers in subscription order.
///
/// Cloning a `StateCell` clones the handle; all clones share the same value.
#[derive_ex(Clone, bound())]
pub struct StateCell<T: 'static>(Rc<StateCellNode<T>>);

impl<T: PartialEq + 'static> StateCell<T> {
    /// Create a new `StateCell` that detects changes with `PartialEq`.
    pub fn new(value: T) -> Self {
        Self::with_eq(value, <T as PartialEq>::eq)
    }
}
impl<T: 'static> StateCell<T> {
    /// Create a new `StateCell` that detects changes with `eq`.
    ///
    /// A mutation is ignored when `eq(next, current)` returns `true`.
    pub fn with_eq(value: T, eq: fn(&T, &T) -> bool) -> Self {
        Self(Rc::new(StateCellNode {
            value: RefCell::new(Rc::new(value)),
            generation: Cell::new(0),
            phase: Cell::new(Phase::Idle),
            observers: RefCell::new(Observers::new()),
            pending: RefCell::new(VecDeque::new()),
            eq,
        }))
    }

    /// Gets a clone of the current value.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        T::clone(&self.snapshot())
    }

    /// Gets the current snapshot.
    ///
    /// Snapshots are immutable; a later mutation installs a new one and leaves this one untouched.
    pub fn snapshot(&self) -> Rc<T> {
        self.0.value.borrow().clone()
    }

    /// Calls `f` with the current value.
    pub fn with<U>(&self, f: impl FnOnce(&T) -> U) -> U {
        f(&self.snapshot())
    }

    /// Sets the next value and notifies observers if it differs from the current value.
    ///
    /// Returns `true` if the value was changed.
    ///
    /// When called from inside an observer, the mutation is queued until the current notification pass completes, and `false` is returned.
    ///
    /// Consecutive calls with literal values computed from one snapshot overwrite each other.
    /// Use [`update`](Self::update) to compose with the latest value.
    pub fn set(&self, update: impl Into<Updater<T>>) -> bool {
        self.0.set(update.into(), None)
    }

    /// Computes the next value from the latest value.
    ///
    /// Equivalent to `set(Updater::from_fn(f))`.
    pub fn update(&self, f: impl FnOnce(&T) -> T + 'static) -> bool {
        self.set(Updater::from_fn(f))
    }

    /// Same as [`set`](Self::set), then calls `after` with the latest value once the mutation, its notification pass
    /// and any mutations queued by observers are complete.
    ///
    /// `after` is called even if the value did not change.
    pub fn set_then(&self, update: impl Into<Updater<T>>, after: impl FnOnce(&T) + 'static) {
        self.0.set(update.into(), Some(Box::new(after)));
    }

    /// Computes the next value with a fallible function.
    ///
    /// If `f` fails, the cell is left unchanged and no observer is called.
    pub fn try_update<E>(
        &self,
        f: impl FnOnce(&T) -> Result<T, E>,
    ) -> Result<bool, UpdateError<E>> {
        if self.0.phase.get() == Phase::Notifying {
            return Err(UpdateError::Reentrant);
        }
        let current = self.snapshot();
        let next = f(&current).map_err(UpdateError::Updater)?;
        let changed = self.0.replace(&current, next);
        self.0.run_pending();
        Ok(changed)
    }

    /// Registers an observer called after each accepted mutation.
    ///
    /// The observer is released when the returned [`Subscription`] is unsubscribed or dropped.
    pub fn subscribe(&self, observer: impl Fn() + 'static) -> Subscription {
        let key = self.0.observers.borrow_mut().insert(Rc::new(observer));
        Subscription::from_weak_fn(Rc::downgrade(&self.0), move |node: Rc<StateCellNode<T>>| {
            let observer = node.observers.borrow_mut().remove(key);
            drop(observer);
        })
    }

    /// Creates a value derived from this cell that is recomputed only after the cell changes.
    pub fn derive<U: 'static>(&self, f: impl Fn(&T) -> U + 'static) -> Derived<T, U> {
        Derived::new(self.clone(), f)
    }

    /// Number of accepted mutations since creation.
    pub fn generation(&self) -> u64 {
        self.0.generation.get()
    }
    /// Returns [`Phase::Notifying`] while observers of this cell are running.
    pub fn phase(&self) -> Phase {
        self.0.phase.get()
    }
    /// Number of active subscriptions.
    pub fn observer_count(&self) -> usize {
        self.0.observers.borrow().len()
    }

    /// Creates a handle that does not keep the cell alive.
    ///
    /// Observers that re-read their own cell should capture this to avoid a reference cycle.
    pub fn downgrade(&self) -> WeakStateCell<T> {
        WeakStateCell(Rc::downgrade(&self.0))
    }

    /// Returns `true` if both handles refer to the same cell.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}
impl<T: fmt::Debug> fmt::Debug for StateCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.value.try_borrow() {
            Ok(value) => fmt::Debug::fmt(&**value, f),
            Err(_) => write!(f, "<borrowed>"),
        }
    }
}
impl<T: Default + PartialEq + 'static> Default for StateCell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}
impl<T> Serialize for StateCell<T>
where
    T: Serialize,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        match self.0.value.try_borrow() {
            Ok(value) => T::serialize(&**value, serializer),
            Err(_) => Err(serde::ser::Error::custom("borrowed")),
        }
    }
}
impl<'de, T> Deserialize<'de> for StateCell<T>
where
    T: Deserialize<'de> + PartialEq + 'static,
{
    fn deserialize<D>(deserializer: D) -> Result<StateCell<T>, D::Error>
    where
        D: serde::de::Deserializer<'de>,
    {
        T::deserialize(deserializer).map(StateCell::new)
    }
}

/// A non-owning handle to a [`StateCell`].
#[derive_ex(Clone, bound())]
pub struct WeakStateCell<T: 'static>(Weak<StateCellNode<T>>);

impl<T: 'static> WeakStateCell<T> {
    pub fn upgrade(&self) -> Option<StateCell<T>> {
        self.0.upgrade().map(StateCell)
    }
}
impl<T> fmt::Debug for WeakStateCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(WeakStateCell)")
    }
}

type Observer = Rc<dyn Fn()>;
type AfterFn<T> = Box<dyn FnOnce(&T)>;

struct PendingSet<T> {
    updater: Updater<T>,
    after: Option<AfterFn<T>>,
}

/// Observers in subscription order.
///
/// Slab keys are reused after removal, so `order` maps a sequence number to each key.
struct Observers {
    entries: SlabMap<(u64, Observer)>,
    order: BTreeMap<u64, usize>,
    next_seq: u64,
}
impl Observers {
    fn new() -> Self {
        Self {
            entries: SlabMap::new(),
            order: BTreeMap::new(),
            next_seq: 0,
        }
    }
    fn insert(&mut self, observer: Observer) -> usize {
        let seq = self.next_seq;
        self.next_seq += 1;
        let key = self.entries.insert((seq, observer));
        self.order.insert(seq, key);
        key
    }
    fn remove(&mut self, key: usize) -> Option<Observer> {
        let (seq, observer) = self.entries.remove(key)?;
        self.order.remove(&seq);
        Some(observer)
    }
    fn len(&self) -> usize {
        self.entries.len()
    }
    fn snapshot(&self) -> Vec<Observer> {
        self.order
            .values()
            .filter_map(|&key| self.entries.get(key))
            .map(|(_, observer)| observer.clone())
            .collect()
    }
}

struct StateCellNode<T: 'static> {
    value: RefCell<Rc<T>>,
    generation: Cell<u64>,
    phase: Cell<Phase>,
    observers: RefCell<Observers>,
    pending: RefCell<VecDeque<PendingSet<T>>>,
    eq: fn(&T, &T) -> bool,
}
impl<T: 'static> StateCellNode<T> {
    fn set(&self, updater: Updater<T>, after: Option<AfterFn<T>>) -> bool {
        if self.phase.get() == Phase::Notifying {
            trace!("StateCell: mutation queued during notification pass");
            self.pending
                .borrow_mut()
                .push_back(PendingSet { updater, after });
            return false;
        }
        let changed = self.commit(updater, None);
        self.run_pending();
        if let Some(after) = after {
            let latest = self.value.borrow().clone();
            after(&latest);
        }
        changed
    }
    fn commit(&self, updater: Updater<T>, after: Option<AfterFn<T>>) -> bool {
        let current = self.value.borrow().clone();
        let changed = self.replace(&current, updater.apply(&current));
        if let Some(after) = after {
            let latest = self.value.borrow().clone();
            after(&latest);
        }
        changed
    }
    fn replace(&self, current: &T, next: T) -> bool {
        if (self.eq)(&next, current) {
            trace!("StateCell: value unchanged, notification skipped");
            return false;
        }
        *self.value.borrow_mut() = Rc::new(next);
        self.generation.set(self.generation.get().wrapping_add(1));
        trace!("StateCell: generation {}", self.generation.get());
        self.notify();
        true
    }
    fn discard_pending(&self, source: &str) {
        let discarded = take(&mut *self.pending.borrow_mut());
        if !discarded.is_empty() {
            warn!(
                "StateCell: {source} panicked, {} queued mutation(s) discarded",
                discarded.len()
            );
        }
    }
    fn notify(&self) {
        let observers = self.observers.borrow().snapshot();
        let _guard = NotifyGuard::enter(self);
        for observer in observers {
            observer();
        }
    }
    fn run_pending(&self) {
        let _guard = DrainGuard(self);
        loop {
            let next = self.pending.borrow_mut().pop_front();
            let Some(PendingSet { updater, after }) = next else {
                break;
            };
            self.commit(updater, after);
        }
    }
}

struct NotifyGuard<'a, T: 'static>(&'a StateCellNode<T>);

impl<'a, T: 'static> NotifyGuard<'a, T> {
    fn enter(node: &'a StateCellNode<T>) -> Self {
        node.phase.set(Phase::Notifying);
        Self(node)
    }
}
impl<T: 'static> Drop for NotifyGuard<'_, T> {
    fn drop(&mut self) {
        self.0.phase.set(Phase::Idle);
        if std::thread::panicking() {
            self.0.discard_pending("observer");
        }
    }
}

/// Discards the rest of the queue if a queued mutation unwinds.
struct DrainGuard<'a, T: 'static>(&'a StateCellNode<T>);

impl<T: 'static> Drop for DrainGuard<'_, T> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.discard_pending("queued mutation");
        }
    }
}
