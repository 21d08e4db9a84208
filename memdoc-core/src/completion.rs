//! Deferred completion of store operations.
//!
//! Store operations run their work to completion and then hand their result to a
//! [`Deferred`] future. The first poll of a `Deferred` always returns `Poll::Pending` (after
//! waking its own task); the value is delivered on a later poll. A caller awaiting an
//! operation therefore always yields to the executor once, and nothing can rely on an
//! operation completing synchronously. This works on any executor.

use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

/// A future that resolves to a ready value, but never on its first poll.
#[derive(Debug)]
#[must_use = "futures do nothing unless polled"]
pub struct Deferred<T> {
    value: Option<T>,
    yielded: bool,
}

impl<T> Deferred<T> {
    /// Wraps a value whose delivery is deferred by one poll.
    pub fn new(value: T) -> Self {
        Self { value: Some(value), yielded: false }
    }
}

// `T` is moved out by value and never pinned.
impl<T> Unpin for Deferred<T> {}

impl<T> Future for Deferred<T> {
    type Output = T;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
        let this = self.get_mut();

        if !this.yielded {
            this.yielded = true;
            cx.waker().wake_by_ref();
            return Poll::Pending;
        }

        match this.value.take() {
            Some(value) => Poll::Ready(value),
            None => panic!("Deferred polled after completion"),
        }
    }
}

/// Delivers `value` after yielding once to the executor.
pub async fn complete<T>(value: T) -> T {
    Deferred::new(value).await
}
