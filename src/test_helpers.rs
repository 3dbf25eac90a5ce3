use std::any::Any;

use assert_call::call;

use crate::{StateCell, Subscription};

/// Subscribes an observer that records `"{name} {value}"` on each notification.
pub fn record<T: std::fmt::Display + 'static>(
    cell: &StateCell<T>,
    name: &'static str,
) -> Subscription {
    let c = cell.downgrade();
    cell.subscribe(move || {
        if let Some(c) = c.upgrade() {
            c.with(|value| call!("{} {}", name, value))
        }
    })
}

pub fn call_on_drop(s: &'static str) -> impl Any {
    struct OnDrop(&'static str);
    impl Drop for OnDrop {
        fn drop(&mut self) {
            call!("{}", self.0);
        }
    }
    OnDrop(s)
}
