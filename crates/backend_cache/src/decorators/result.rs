// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Caching of data read from an execution result.

use std::{fmt, future::Future, sync::Arc};

use async_trait::async_trait;

use super::execution::{CachingPreparedExecution, WeakExecutionCaches};
use crate::{
    Result,
    bounded::BoundedCache,
    keys,
    model::{DataView, ExecutionDefinition, ForecastConfig, ForecastResult},
    pending::{AbortHook, AsyncValue, Signalled, settle},
    spi::{AbortSignal, ExecutionResult, PreparedExecution},
};

const ALL_DATA_KEY: &str = "all";

/// Data already read from one execution result, shared by every signal-rebased view of it.
#[derive(Debug, Clone)]
struct ReadCaches {
    all: BoundedCache<Signalled<DataView>>,
    windows: Option<BoundedCache<Signalled<DataView>>>,
    forecast: BoundedCache<Signalled<ForecastResult>>,
}

/// An execution result that caches the data read from it.
///
/// A read failing with an abort-class error drops the whole execution from the execution
/// cache: the backend's cancellation token is single-use, so the next caller has to execute
/// again. The result lives in the execution cache and only holds it weakly; once the caching
/// backend is gone, `transform()` hands out an uncached execution.
pub(crate) struct CachingExecutionResult {
    inner: Arc<dyn ExecutionResult>,
    caches: WeakExecutionCaches,
    reads: ReadCaches,
    on_abort: AbortHook,
}

impl fmt::Debug for CachingExecutionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachingExecutionResult")
            .field("inner", &self.inner)
            .field("reads", &self.reads)
            .finish_non_exhaustive()
    }
}

impl CachingExecutionResult {
    pub fn new(inner: Arc<dyn ExecutionResult>, caches: WeakExecutionCaches, fingerprint: String) -> Self {
        let executions = caches.clone();
        let on_abort: AbortHook = Arc::new(move || executions.forget(&fingerprint));

        let reads = ReadCaches {
            all: BoundedCache::new("execution_results.all", 1),
            windows: caches
                .max_result_windows
                .map(|max| BoundedCache::new("execution_results.windows", max)),
            forecast: BoundedCache::new("execution_results.forecast", 1),
        };

        Self {
            inner,
            caches,
            reads,
            on_abort,
        }
    }

    /// Returns the cached read under `key`, or stores and returns the read built by `load`.
    ///
    /// A read started under a since-aborted signal is not reused.
    fn read_through<T, F>(&self, cache: &BoundedCache<Signalled<T>>, key: &str, load: impl FnOnce() -> F) -> AsyncValue<T>
    where
        T: Clone + Send + Sync + 'static,
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let signal = self.inner.signal();
        let on_abort = Arc::clone(&self.on_abort);

        cache
            .get_or_refresh_with(key, Signalled::is_live, |id| {
                Signalled::new(settle(cache, key, id, Some(on_abort), load()), signal)
            })
            .value
    }
}

#[async_trait]
impl ExecutionResult for CachingExecutionResult {
    fn definition(&self) -> &ExecutionDefinition {
        self.inner.definition()
    }

    fn fingerprint(&self) -> String {
        self.inner.fingerprint()
    }

    fn signal(&self) -> Option<AbortSignal> {
        self.inner.signal()
    }

    fn with_signal(&self, signal: Option<AbortSignal>) -> Arc<dyn ExecutionResult> {
        Arc::new(Self {
            inner: self.inner.with_signal(signal),
            caches: self.caches.clone(),
            reads: self.reads.clone(),
            on_abort: Arc::clone(&self.on_abort),
        })
    }

    async fn read_all(&self) -> Result<DataView> {
        let inner = Arc::clone(&self.inner);
        self.read_through(&self.reads.all, ALL_DATA_KEY, || async move { inner.read_all().await })
            .await
    }

    async fn read_window(&self, offset: &[u32], size: &[u32]) -> Result<DataView> {
        let Some(windows) = &self.reads.windows else {
            return self.inner.read_window(offset, size).await;
        };

        let key = keys::window_key(offset, size);
        let inner = Arc::clone(&self.inner);
        let (offset, size) = (offset.to_vec(), size.to_vec());
        self.read_through(windows, &key, || async move { inner.read_window(&offset, &size).await })
            .await
    }

    async fn read_forecast_all(&self, config: &ForecastConfig) -> Result<ForecastResult> {
        let key = keys::stable_key(config);
        let inner = Arc::clone(&self.inner);
        let config = config.clone();
        self.read_through(&self.reads.forecast, &key, || async move { inner.read_forecast_all(&config).await })
            .await
    }

    fn transform(&self) -> Arc<dyn PreparedExecution> {
        match self.caches.upgrade() {
            Some(caches) => Arc::new(CachingPreparedExecution::new(self.inner.transform(), caches)),
            None => self.inner.transform(),
        }
    }
}

/// Presents a shared execution result under the definition a particular caller asked for.
#[derive(Debug)]
pub(crate) struct SanitizedExecutionResult {
    inner: Arc<dyn ExecutionResult>,
    definition: ExecutionDefinition,
}

impl SanitizedExecutionResult {
    pub fn new(inner: Arc<dyn ExecutionResult>, definition: ExecutionDefinition) -> Self {
        Self { inner, definition }
    }
}

#[async_trait]
impl ExecutionResult for SanitizedExecutionResult {
    fn definition(&self) -> &ExecutionDefinition {
        &self.definition
    }

    fn fingerprint(&self) -> String {
        self.inner.fingerprint()
    }

    fn signal(&self) -> Option<AbortSignal> {
        self.inner.signal()
    }

    fn with_signal(&self, signal: Option<AbortSignal>) -> Arc<dyn ExecutionResult> {
        Arc::new(Self::new(self.inner.with_signal(signal), self.definition.clone()))
    }

    async fn read_all(&self) -> Result<DataView> {
        self.inner.read_all().await
    }

    async fn read_window(&self, offset: &[u32], size: &[u32]) -> Result<DataView> {
        self.inner.read_window(offset, size).await
    }

    async fn read_forecast_all(&self, config: &ForecastConfig) -> Result<ForecastResult> {
        self.inner.read_forecast_all(config).await
    }

    fn transform(&self) -> Arc<dyn PreparedExecution> {
        self.inner.transform()
    }
}
