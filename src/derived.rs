use std::{cell::RefCell, fmt, rc::Rc};

use crate::{MemoSlot, StateCell};


/// A value computed from a [`StateCell`], cached until the cell's generation changes.
///
/// Created by [`StateCell::derive`].
pub struct Derived<T: 'static, U> {
    source: StateCell<T>,
    f: Box<dyn Fn(&T) -> U>,
    slot: RefCell<MemoSlot<Rc<U>, u64>>,
}

impl<T: 'static, U> Derived<T, U> {
    pub(crate) fn new(source: StateCell<T>, f: impl Fn(&T) -> U + 'static) -> Self {
        Self {
            source,
            f: Box::new(f),
            slot: RefCell::new(MemoSlot::new()),
        }
    }

    /// Gets a clone of the derived value.
    pub fn get(&self) -> U
    where
        U: Clone,
    {
        self.with(U::clone)
    }

    /// Calls `g` with the derived value, recomputing it first if the source changed.
    ///
    /// No borrow of the cache is held while the derive function or `g` runs,
    /// so both may read this value or mutate the source.
    pub fn with<R>(&self, g: impl FnOnce(&U) -> R) -> R {
        g(&self.value())
    }

    fn value(&self) -> Rc<U> {
        let generation = self.source.generation();
        let cached = {
            let slot = self.slot.borrow();
            match (slot.deps(), slot.get()) {
                (Some([g]), Some(value)) if *g == generation => Some(value.clone()),
                _ => None,
            }
        };
        if let Some(value) = cached {
            return value;
        }
        let value = Rc::new(self.source.with(|v| (self.f)(v)));
        self.slot
            .borrow_mut()
            .memo(|| value, &[generation])
            .clone()
    }

    /// Returns `true` if the next read will recompute the value.
    pub fn is_stale(&self) -> bool {
        self.slot.borrow().deps() != Some(&[self.source.generation()][..])
    }

    pub fn source(&self) -> &StateCell<T> {
        &self.source
    }
}
impl<T: 'static, U: fmt::Debug> fmt::Debug for Derived<T, U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.slot.try_borrow() {
            Ok(slot) => match slot.get() {
                Some(value) => fmt::Debug::fmt(value, f),
                None => write!(f, "<not computed>"),
            },
            Err(_) => write!(f, "<borrowed>"),
        }
    }
}
