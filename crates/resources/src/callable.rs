//! Work items accepted by the dispatcher
//!
//! A [`Callable`] wraps one of five shapes of work. The shape is fixed when
//! the callable is built and acted on exactly once, in [`Callable::invoke`].
//! Arguments are bound by the closures themselves.

use futures::future::{BoxFuture, FutureExt};
use std::fmt;
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::task::{Context, Poll};
use tracing::Dispatch;

/// Shape of the work wrapped by a [`Callable`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallableKind {
    /// Function returning a future, called then awaited
    AsyncFn,
    /// Future that already exists, awaited as is
    Future,
    /// Function returning something awaitable, called then awaited
    Awaitable,
    /// Plain function, its return value is the result
    SyncFn,
    /// Value returned as is
    Value,
}

enum Inner<'a, T> {
    AsyncFn(Box<dyn FnOnce() -> BoxFuture<'a, T> + Send + 'a>),
    Future(BoxFuture<'a, T>),
    Awaitable(Box<dyn FnOnce() -> BoxFuture<'a, T> + Send + 'a>),
    SyncFn(Box<dyn FnOnce() -> T + Send + 'a>),
    Value(T),
}

/// Unit of work run under a gate permit
pub struct Callable<'a, T> {
    inner: Inner<'a, T>,
}

impl<'a, T> Callable<'a, T> {
    /// Function returning a future
    pub fn async_fn<F, Fut>(f: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'a,
        Fut: Future<Output = T> + Send + 'a,
    {
        Self {
            inner: Inner::AsyncFn(Box::new(move || f().boxed())),
        }
    }

    /// Future created by the caller; it runs with whatever it captured
    pub fn future<Fut>(fut: Fut) -> Self
    where
        Fut: Future<Output = T> + Send + 'a,
    {
        Self {
            inner: Inner::Future(fut.boxed()),
        }
    }

    /// Function returning a value that can be turned into a future
    pub fn awaitable<F, A>(f: F) -> Self
    where
        F: FnOnce() -> A + Send + 'a,
        A: IntoFuture<Output = T>,
        A::IntoFuture: Send + 'a,
    {
        Self {
            inner: Inner::Awaitable(Box::new(move || f().into_future().boxed())),
        }
    }

    /// Synchronous function
    pub fn sync<F>(f: F) -> Self
    where
        F: FnOnce() -> T + Send + 'a,
    {
        Self {
            inner: Inner::SyncFn(Box::new(f)),
        }
    }

    /// Plain value
    pub fn value(value: T) -> Self {
        Self {
            inner: Inner::Value(value),
        }
    }

    #[must_use]
    pub fn kind(&self) -> CallableKind {
        match self.inner {
            Inner::AsyncFn(_) => CallableKind::AsyncFn,
            Inner::Future(_) => CallableKind::Future,
            Inner::Awaitable(_) => CallableKind::Awaitable,
            Inner::SyncFn(_) => CallableKind::SyncFn,
            Inner::Value(_) => CallableKind::Value,
        }
    }

    /// Run the work and produce its result.
    ///
    /// With `suppress_warnings`, diagnostics the work emits through `tracing`
    /// are discarded. The suppression is installed around every poll and
    /// never outlives it.
    pub async fn invoke(self, suppress_warnings: bool) -> T {
        let quiet = suppress_warnings.then(Dispatch::none);
        match self.inner {
            Inner::AsyncFn(f) | Inner::Awaitable(f) => {
                let fut = muted(quiet.as_ref(), f);
                Muted { inner: fut, quiet }.await
            }
            Inner::Future(fut) => Muted { inner: fut, quiet }.await,
            Inner::SyncFn(f) => muted(quiet.as_ref(), f),
            Inner::Value(value) => value,
        }
    }
}

impl<T> fmt::Debug for Callable<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callable")
            .field("kind", &self.kind())
            .finish_non_exhaustive()
    }
}

fn muted<R>(quiet: Option<&Dispatch>, f: impl FnOnce() -> R) -> R {
    match quiet {
        Some(dispatch) => tracing::dispatcher::with_default(dispatch, f),
        None => f(),
    }
}

struct Muted<'a, T> {
    inner: BoxFuture<'a, T>,
    quiet: Option<Dispatch>,
}

impl<T> Future for Muted<'_, T> {
    type Output = T;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
        let this = &mut *self;
        muted(this.quiet.as_ref(), || this.inner.as_mut().poll(cx))
    }
}
