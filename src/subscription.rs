use std::{
    fmt,
    mem::take,
    rc::{Rc, Weak},
};


/// A handle that releases a registration exactly once.
///
/// The registration is released when [`unsubscribe`](Self::unsubscribe) is called or when the handle is dropped,
/// whichever comes first. Releasing twice is a no-op.
#[derive(Default)]
#[must_use]
pub struct Subscription(RawSubscription);

impl Subscription {
    pub fn empty() -> Self {
        Subscription(RawSubscription::Empty)
    }
    pub fn from_fn(f: impl FnOnce() + 'static) -> Self {
        Subscription(RawSubscription::Fn(Box::new(f)))
    }

    /// Create a subscription that calls `unsubscribe` with the target, if it is still alive at release time.
    pub fn from_weak_fn<T: ?Sized + 'static>(
        this: Weak<T>,
        unsubscribe: impl FnOnce(Rc<T>) + 'static,
    ) -> Self {
        Self::from_fn(move || {
            if let Some(this) = this.upgrade() {
                unsubscribe(this)
            }
        })
    }

    /// Releases the registration.
    ///
    /// Only the first call has an effect.
    pub fn unsubscribe(&mut self) {
        match take(&mut self.0) {
            RawSubscription::Empty => {}
            RawSubscription::Fn(f) => f(),
        }
    }

    /// Returns `true` if the registration has not been released yet.
    pub fn is_active(&self) -> bool {
        !matches!(self.0, RawSubscription::Empty)
    }

    /// Consumes the handle without releasing the registration.
    pub fn detach(mut self) {
        let _ = take(&mut self.0);
    }
}
impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

#[derive(Default)]
enum RawSubscription {
    #[default]
    Empty,
    Fn(Box<dyn FnOnce() + 'static>),
}
