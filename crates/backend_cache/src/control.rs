// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::{fmt, sync::Arc};

use crate::{bounded::BoundedCache, context::CacheContext, telemetry};

/// Explicit invalidation of the caches of one caching backend.
///
/// Handed to [`CachingConfiguration::on_cache_ready`](crate::CachingConfiguration::on_cache_ready)
/// once the backend is set up. Resetting clears the top-level caches only: execution results
/// already handed out to callers keep the data windows they have read so far.
#[derive(Clone)]
pub struct CacheControl {
    context: Arc<CacheContext>,
}

impl fmt::Debug for CacheControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheControl").finish_non_exhaustive()
    }
}

impl CacheControl {
    pub(crate) fn new(context: Arc<CacheContext>) -> Self {
        Self { context }
    }

    /// Forgets every cached execution.
    pub fn reset_executions(&self) {
        reset("executions", self.context.executions.as_ref());
    }

    /// Forgets every cached catalog.
    pub fn reset_catalogs(&self) {
        reset("catalogs", self.context.catalogs.as_ref());
    }

    /// Forgets every cached URL validation.
    pub fn reset_security_settings(&self) {
        reset("security_settings", self.context.security_settings.as_ref());
    }

    /// Forgets every cached attribute, display form, dataset and attribute element page.
    pub fn reset_attributes(&self) {
        reset("attributes", self.context.attributes.as_ref());
    }

    /// Forgets every cached workspace settings read.
    pub fn reset_workspace_settings(&self) {
        reset("workspace_settings", self.context.workspace_settings.as_ref());
    }

    /// Forgets every cached automations listing and query.
    pub fn reset_automations(&self) {
        reset("automations", self.context.automations.as_ref());
    }

    /// Forgets everything.
    pub fn reset_all(&self) {
        self.reset_executions();
        self.reset_catalogs();
        self.reset_security_settings();
        self.reset_attributes();
        self.reset_workspace_settings();
        self.reset_automations();
    }
}

fn reset<V>(family: &'static str, cache: Option<&BoundedCache<V>>) {
    if let Some(cache) = cache {
        cache.clear();
        telemetry::record_reset(family);
    }
}
