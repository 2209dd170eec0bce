// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Shared async values stored in the caches.
//!
//! A cache stores the pending computation itself, not just its eventual result, so every
//! caller that arrives before the computation settles awaits the same backend call.

use std::{fmt, future::Future, sync::Arc};

use futures::{
    FutureExt,
    future::{BoxFuture, Shared},
};

use crate::{Result, bounded::BoundedCache, bounded::EntryId, is_abort_error, spi::AbortSignal};

/// A clonable handle to a pending or settled computation.
pub(crate) type AsyncValue<T> = Shared<BoxFuture<'static, Result<T>>>;

/// Callback run when a cached computation fails with an abort-class error.
pub(crate) type AbortHook = Arc<dyn Fn() + Send + Sync>;

/// Wraps a not-yet-started future into an [`AsyncValue`].
pub(crate) fn shared<T>(future: impl Future<Output = Result<T>> + Send + 'static) -> AsyncValue<T>
where
    T: Clone + Send + Sync + 'static,
{
    future.boxed().shared()
}

/// An [`AsyncValue`] that is already settled with `value`.
pub(crate) fn ready<T>(value: T) -> AsyncValue<T>
where
    T: Clone + Send + Sync + 'static,
{
    shared(futures::future::ready(Ok(value)))
}

/// Makes `future` remove its own cache entry when it fails.
///
/// The entry is only removed while it is still the one inserted as `id`, so a failure never
/// discards a newer value stored under the same key. On an abort-class error `on_abort` runs
/// as well. The returned value holds the cache weakly: it is stored in that cache and may never
/// be polled to completion.
pub(crate) fn settle<T, V>(
    cache: &BoundedCache<V>,
    key: impl Into<String>,
    id: EntryId,
    on_abort: Option<AbortHook>,
    future: impl Future<Output = Result<T>> + Send + 'static,
) -> AsyncValue<T>
where
    T: Clone + Send + Sync + 'static,
    V: Send + 'static,
{
    let cache = cache.downgrade();
    let key = key.into();

    shared(async move {
        let result = future.await;
        if let Err(error) = &result {
            if let Some(cache) = cache.upgrade() {
                cache.remove_entry(&key, id);
            }
            if is_abort_error(error) {
                if let Some(on_abort) = on_abort {
                    on_abort();
                }
            }
        }
        result
    })
}

/// A cached value produced under an optional cancellation signal.
///
/// A value whose signal was aborted can no longer be trusted to settle successfully and is
/// replaced by the next caller instead of being reused.
pub(crate) struct Signalled<T> {
    pub value: AsyncValue<T>,
    pub signal: Option<AbortSignal>,
}

impl<T> Clone for Signalled<T> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            signal: self.signal.clone(),
        }
    }
}

impl<T: Clone> fmt::Debug for Signalled<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signalled")
            .field("settled", &self.value.peek().is_some())
            .field("signal", &self.signal)
            .finish()
    }
}

impl<T> Signalled<T> {
    pub fn new(value: AsyncValue<T>, signal: Option<AbortSignal>) -> Self {
        Self { value, signal }
    }

    /// Returns `true` unless the signal the value was produced under has been aborted.
    pub fn is_live(&self) -> bool {
        !self.signal.as_ref().is_some_and(AbortSignal::is_cancelled)
    }
}
