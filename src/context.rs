use std::{
    any::{type_name, Any},
    cell::RefCell,
    collections::{hash_map::Entry, HashMap},
    marker::PhantomData,
    ops::Deref,
};

use derive_ex::derive_ex;
use log::debug;
use parse_display::Display;

use crate::{Error, Result, StateCell, Subscription};


thread_local! {
    static CONTEXTS: RefCell<HashMap<&'static str, Box<dyn Any>>> = RefCell::new(HashMap::new());
}

/// Identifies a shared [`StateCell`] in the per-thread context registry.
///
/// ```
/// use statecell::Context;
///
/// const COLOR: Context<&str> = Context::new("color");
///
/// let provider = statecell::provide(&COLOR, "black").unwrap();
/// let color = statecell::consume(&COLOR).unwrap();
/// color.set("red");
/// assert_eq!(provider.get(), "red");
/// ```
#[derive_ex(Clone, bound())]
#[derive(Display)]
#[display("{name}")]
pub struct Context<T: 'static> {
    name: &'static str,
    _phantom: PhantomData<fn() -> T>,
}
impl<T: 'static> Copy for Context<T> {}

impl<T: 'static> Context<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _phantom: PhantomData,
        }
    }
    pub fn name(&self) -> &'static str {
        self.name
    }
}
impl<T: 'static> std::fmt::Debug for Context<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Context({}: {})", self.name, type_name::<T>())
    }
}

/// Registers a new `StateCell` holding `value` under `ctx`.
///
/// The registration lasts until the returned [`Provider`] is dropped.
pub fn provide<T: PartialEq + 'static>(ctx: &Context<T>, value: T) -> Result<Provider<T>> {
    provide_cell(ctx, StateCell::new(value))
}

/// Registers an existing `StateCell` under `ctx`.
pub fn provide_cell<T: 'static>(ctx: &Context<T>, cell: StateCell<T>) -> Result<Provider<T>> {
    CONTEXTS.with(|contexts| match contexts.borrow_mut().entry(ctx.name) {
        Entry::Occupied(_) => Err(Error::ContextAlreadyProvided(ctx.name)),
        Entry::Vacant(e) => {
            e.insert(Box::new(cell.clone()));
            Ok(())
        }
    })?;
    debug!("context `{ctx}` provided");
    Ok(Provider { ctx: *ctx, cell })
}

/// Looks up the `StateCell` registered under `ctx`.
pub fn consume<T: 'static>(ctx: &Context<T>) -> Result<StateCell<T>> {
    CONTEXTS.with(|contexts| {
        let contexts = contexts.borrow();
        let value = contexts
            .get(ctx.name)
            .ok_or(Error::ContextNotProvided(ctx.name))?;
        value
            .downcast_ref::<StateCell<T>>()
            .cloned()
            .ok_or(Error::ContextTypeMismatch {
                name: ctx.name,
                expected: type_name::<T>(),
            })
    })
}

/// Looks up the `StateCell` registered under `ctx` and subscribes `observer` to it.
///
/// The observer stays registered until the returned [`ContextConsumer`] is dropped.
pub fn use_context<T: 'static>(
    ctx: &Context<T>,
    observer: impl Fn() + 'static,
) -> Result<ContextConsumer<T>> {
    let cell = consume(ctx)?;
    let subscription = cell.subscribe(observer);
    Ok(ContextConsumer { cell, subscription })
}

pub fn is_provided<T: 'static>(ctx: &Context<T>) -> bool {
    CONTEXTS.with(|contexts| contexts.borrow().contains_key(ctx.name))
}

/// Keeps a context registered. Dropping it removes the registration.
///
/// Consumers that already hold the `StateCell` keep a working handle.
#[must_use]
pub struct Provider<T: 'static> {
    ctx: Context<T>,
    cell: StateCell<T>,
}
impl<T: 'static> Provider<T> {
    pub fn context(&self) -> Context<T> {
        self.ctx
    }
    pub fn cell(&self) -> &StateCell<T> {
        &self.cell
    }
}
impl<T: 'static> Deref for Provider<T> {
    type Target = StateCell<T>;
    fn deref(&self) -> &Self::Target {
        &self.cell
    }
}
impl<T: 'static> Drop for Provider<T> {
    fn drop(&mut self) {
        let removed = CONTEXTS
            .try_with(|contexts| contexts.borrow_mut().remove(self.ctx.name))
            .ok()
            .flatten();
        if removed.is_some() {
            debug!("context `{}` released", self.ctx);
        }
    }
}

/// A subscribed handle to a context's `StateCell`.
///
/// Dropping it unsubscribes the observer.
#[must_use]
pub struct ContextConsumer<T: 'static> {
    cell: StateCell<T>,
    subscription: Subscription,
}
impl<T: 'static> ContextConsumer<T> {
    pub fn cell(&self) -> &StateCell<T> {
        &self.cell
    }

    /// Unsubscribes the observer. Calling this more than once has no effect.
    pub fn release(&mut self) {
        self.subscription.unsubscribe();
    }
}
impl<T: 'static> Deref for ContextConsumer<T> {
    type Target = StateCell<T>;
    fn deref(&self) -> &Self::Target {
        &self.cell
    }
}
