use crate::Subscription;


/// Runs a side effect when its dependencies change, releasing the previous run's cleanup first.
///
/// The last cleanup is released when the slot is dropped or [`dispose`](Self::dispose)d.
pub struct EffectSlot<D> {
    deps: Option<Vec<D>>,
    has_run: bool,
    cleanup: Subscription,
}

impl<D> EffectSlot<D> {
    pub fn new() -> Self {
        Self {
            deps: None,
            has_run: false,
            cleanup: Subscription::empty(),
        }
    }

    /// Runs `effect` if required by `deps`.
    ///
    /// - `None` : runs on every call.
    /// - `Some(&[])` : runs on the first call only.
    /// - `Some(deps)` : runs on the first call and whenever `deps` differs from the previous call.
    ///
    /// The [`Subscription`] returned by `effect` is the cleanup, released before the next run.
    /// Returns `true` if `effect` was called.
    pub fn run(&mut self, deps: Option<&[D]>, effect: impl FnOnce() -> Subscription) -> bool
    where
        D: PartialEq + Clone,
    {
        let should_run = !self.has_run || deps.is_none() || self.deps.as_deref() != deps;
        if !should_run {
            return false;
        }
        self.cleanup.unsubscribe();
        self.has_run = false;
        self.cleanup = effect();
        self.deps = deps.map(<[D]>::to_vec);
        self.has_run = true;
        true
    }

    /// Releases the current cleanup. The next [`run`](Self::run) will call the effect again.
    pub fn dispose(&mut self) {
        self.cleanup.unsubscribe();
        self.deps = None;
        self.has_run = false;
    }

    pub fn has_run(&self) -> bool {
        self.has_run
    }
}
impl<D> Default for EffectSlot<D> {
    fn default() -> Self {
        Self::new()
    }
}
