//! A minimal reactive state container for single-threaded view layers.
//!
//! - [`StateCell`] holds an immutable value, replaced by [`set`](StateCell::set) or [`update`](StateCell::update),
//!   and notifies observers synchronously after every accepted change.
//! - [`MemoSlot`], [`CallbackMemo`] and [`Derived`] cache values until their dependencies change.
//! - [`EffectSlot`] runs dependency-gated side effects with cleanup.
//! - [`Context`] shares a `StateCell` by name within the current thread.
//!
//! ```
//! use std::{cell::Cell, rc::Rc};
//! use statecell::StateCell;
//!
//! let count = StateCell::new(0);
//! let renders = Rc::new(Cell::new(0));
//! let r = renders.clone();
//! let _s = count.subscribe(move || r.set(r.get() + 1));
//!
//! count.set(1);
//! count.set(1);
//! count.update(|n| n + 1);
//! assert_eq!(count.get(), 2);
//! assert_eq!(renders.get(), 2);
//! ```
mod cell;
mod context;
mod derived;
mod effect;
mod error;
mod memo;
mod subscription;

#[cfg(test)]
mod test_helpers;

pub use cell::*;
pub use context::*;
pub use derived::*;
pub use effect::*;
pub use error::*;
pub use memo::*;
pub use subscription::*;

#[cfg(doctest)]
#[doc = include_str!("../README.md")]
mod tests_readme {}
