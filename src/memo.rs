use std::{fmt, rc::Rc};


/// Caches a computed value keyed by a dependency sequence.
///
/// The value is recomputed only when the dependency sequence differs from the last one,
/// compared element by element with `PartialEq` (different lengths always differ).
pub struct MemoSlot<T, D> {
    state: Option<Memoized<T, D>>,
}

struct Memoized<T, D> {
    deps: Vec<D>,
    value: T,
}

impl<T, D> MemoSlot<T, D> {
    pub fn new() -> Self {
        Self { state: None }
    }

    /// Returns the cached value, recomputing it with `compute` if `deps` changed since the last call.
    ///
    /// If `compute` panics, the previously cached value and dependencies are kept.
    pub fn memo(&mut self, compute: impl FnOnce() -> T, deps: &[D]) -> &T
    where
        D: PartialEq + Clone,
    {
        if !matches!(&self.state, Some(m) if m.deps.as_slice() == deps) {
            let value = compute();
            self.state = Some(Memoized {
                deps: deps.to_vec(),
                value,
            });
        }
        match &self.state {
            Some(m) => &m.value,
            None => unreachable!(),
        }
    }

    /// Returns the cached value without recomputing.
    pub fn get(&self) -> Option<&T> {
        self.state.as_ref().map(|m| &m.value)
    }

    /// Returns the dependencies the cached value was computed with.
    pub fn deps(&self) -> Option<&[D]> {
        self.state.as_ref().map(|m| m.deps.as_slice())
    }

    /// Discards the cached value so the next [`memo`](Self::memo) call recomputes.
    pub fn invalidate(&mut self) {
        self.state = None;
    }
}
impl<T, D> Default for MemoSlot<T, D> {
    fn default() -> Self {
        Self::new()
    }
}
impl<T: fmt::Debug, D: fmt::Debug> fmt::Debug for MemoSlot<T, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.state {
            Some(m) => f
                .debug_struct("MemoSlot")
                .field("deps", &m.deps)
                .field("value", &m.value)
                .finish(),
            None => write!(f, "MemoSlot(<empty>)"),
        }
    }
}

/// Keeps a function identity stable while its dependencies are unchanged.
///
/// Consumers that compare callbacks with [`Rc::ptr_eq`] can skip re-registering them.
pub struct CallbackMemo<F, D>(MemoSlot<Rc<F>, D>);

impl<F, D> CallbackMemo<F, D> {
    pub fn new() -> Self {
        Self(MemoSlot::new())
    }

    /// Returns the cached function if `deps` are unchanged, otherwise stores and returns `f`.
    pub fn callback(&mut self, f: F, deps: &[D]) -> Rc<F>
    where
        D: PartialEq + Clone,
    {
        self.0.memo(|| Rc::new(f), deps).clone()
    }

    pub fn invalidate(&mut self) {
        self.0.invalidate();
    }
}
impl<F, D> Default for CallbackMemo<F, D> {
    fn default() -> Self {
        Self::new()
    }
}
