// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Execution caching.
//!
//! Executions are keyed by the fingerprint of their definition. The cache stores the pending
//! execution, so concurrent callers with the same definition share one backend call.
//!
//! A caller that attaches a cancellation signal either reuses a live cached execution rebased
//! onto its own signal, or starts a fresh execution when there is nothing live to reuse. In
//! every case the caller gets back the definition it asked for, even when a different
//! definition with the same fingerprint populated the cache.

use std::sync::Arc;

use async_trait::async_trait;

use super::result::{CachingExecutionResult, SanitizedExecutionResult};
use crate::{
    Result,
    bounded::{BoundedCache, EntryId, WeakBoundedCache},
    context::ExecutionEntry,
    model::ExecutionDefinition,
    pending::{AsyncValue, Signalled, settle},
    spi::{AbortSignal, ExecutionFactory, ExecutionResult, PreparedExecution},
};

/// The execution cache together with the sizing of the result caches it creates.
#[derive(Debug, Clone)]
pub(crate) struct ExecutionCaches {
    pub executions: BoundedCache<ExecutionEntry>,
    pub max_result_windows: Option<usize>,
}

impl ExecutionCaches {
    pub fn downgrade(&self) -> WeakExecutionCaches {
        WeakExecutionCaches {
            executions: self.executions.downgrade(),
            max_result_windows: self.max_result_windows,
        }
    }
}

/// [`ExecutionCaches`] as held by the cached results themselves.
///
/// Results are stored in the execution cache, so they must not keep it alive.
#[derive(Debug, Clone)]
pub(crate) struct WeakExecutionCaches {
    executions: WeakBoundedCache<ExecutionEntry>,
    pub max_result_windows: Option<usize>,
}

impl WeakExecutionCaches {
    pub fn upgrade(&self) -> Option<ExecutionCaches> {
        self.executions.upgrade().map(|executions| ExecutionCaches {
            executions,
            max_result_windows: self.max_result_windows,
        })
    }

    /// Drops the execution cached under `fingerprint`, if the cache still exists.
    pub fn forget(&self, fingerprint: &str) {
        if let Some(executions) = self.executions.upgrade() {
            executions.delete(fingerprint);
        }
    }
}

#[derive(Debug)]
pub(crate) struct CachingExecutionFactory {
    inner: Arc<dyn ExecutionFactory>,
    caches: ExecutionCaches,
}

impl CachingExecutionFactory {
    pub fn new(inner: Arc<dyn ExecutionFactory>, executions: BoundedCache<ExecutionEntry>, max_result_windows: Option<usize>) -> Self {
        Self {
            inner,
            caches: ExecutionCaches {
                executions,
                max_result_windows,
            },
        }
    }
}

impl ExecutionFactory for CachingExecutionFactory {
    fn for_definition(&self, definition: ExecutionDefinition) -> Arc<dyn PreparedExecution> {
        Arc::new(CachingPreparedExecution::new(self.inner.for_definition(definition), self.caches.clone()))
    }
}

#[derive(Debug)]
pub(crate) struct CachingPreparedExecution {
    inner: Arc<dyn PreparedExecution>,
    caches: ExecutionCaches,
}

impl CachingPreparedExecution {
    pub fn new(inner: Arc<dyn PreparedExecution>, caches: ExecutionCaches) -> Self {
        Self { inner, caches }
    }

    /// Builds the not-yet-started execution stored as entry `id` under `key`.
    fn start(&self, key: &str, id: EntryId) -> AsyncValue<Arc<dyn ExecutionResult>> {
        let inner = Arc::clone(&self.inner);
        let caches = self.caches.downgrade();
        let fingerprint = key.to_string();

        settle(&self.caches.executions, key, id, None, async move {
            let result = inner.execute().await?;
            Ok(Arc::new(CachingExecutionResult::new(result, caches, fingerprint)) as Arc<dyn ExecutionResult>)
        })
    }

    /// Reuses the cached execution `cached`, with reads bound to `signal`.
    fn rebase(&self, key: &str, id: EntryId, cached: AsyncValue<Arc<dyn ExecutionResult>>, signal: AbortSignal) -> AsyncValue<Arc<dyn ExecutionResult>> {
        settle(&self.caches.executions, key, id, None, async move {
            let result = cached.await?;
            Ok(result.with_signal(Some(signal)))
        })
    }
}

#[async_trait]
impl PreparedExecution for CachingPreparedExecution {
    fn definition(&self) -> &ExecutionDefinition {
        self.inner.definition()
    }

    fn fingerprint(&self) -> String {
        self.inner.fingerprint()
    }

    fn signal(&self) -> Option<AbortSignal> {
        self.inner.signal()
    }

    fn with_signal(&self, signal: AbortSignal) -> Arc<dyn PreparedExecution> {
        Arc::new(Self::new(self.inner.with_signal(signal), self.caches.clone()))
    }

    async fn execute(&self) -> Result<Arc<dyn ExecutionResult>> {
        let key = self.inner.fingerprint();
        let executions = &self.caches.executions;

        let entry = match self.inner.signal() {
            None => executions.get_or_refresh_with(&key, Signalled::is_live, |id| Signalled::new(self.start(&key, id), None)),
            Some(signal) => executions.replace_with(&key, |current, id| match current {
                Some(current) if current.is_live() && !signal.is_cancelled() => {
                    Signalled::new(self.rebase(&key, id, current.value, signal.clone()), Some(signal.clone()))
                }
                _ => Signalled::new(self.start(&key, id), Some(signal.clone())),
            }),
        };

        let result = entry.value.await?;
        Ok(Arc::new(SanitizedExecutionResult::new(result, self.inner.definition().clone())))
    }
}
