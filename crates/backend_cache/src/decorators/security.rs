// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    Result,
    context::CacheContext,
    keys,
    model::UrlValidationContext,
    pending::settle,
    spi::SecuritySettingsService,
};

/// Caches URL validations per organization for a bounded time.
#[derive(Debug)]
pub(crate) struct CachingSecuritySettings {
    inner: Arc<dyn SecuritySettingsService>,
    context: Arc<CacheContext>,
}

impl CachingSecuritySettings {
    pub fn new(inner: Arc<dyn SecuritySettingsService>, context: Arc<CacheContext>) -> Self {
        Self { inner, context }
    }
}

#[async_trait]
impl SecuritySettingsService for CachingSecuritySettings {
    fn scope(&self) -> &str {
        self.inner.scope()
    }

    async fn is_url_valid(&self, url: &str, context: UrlValidationContext) -> Result<bool> {
        let Some(entry) = self.context.security_entry(self.inner.scope()) else {
            return self.inner.is_url_valid(url, context).await;
        };

        let key = keys::url_key(context, url);
        let value = entry.valid.get_or_insert_with(&key, |id| {
            let inner = Arc::clone(&self.inner);
            let url = url.to_string();
            settle(&entry.valid, key.as_str(), id, None, async move { inner.is_url_valid(&url, context).await })
        });

        value.await
    }

    async fn is_dashboard_plugin_url_valid(&self, url: &str, workspace: &str) -> Result<bool> {
        let Some(entry) = self.context.security_entry(&keys::plugin_scope(workspace)) else {
            return self.inner.is_dashboard_plugin_url_valid(url, workspace).await;
        };

        let value = entry.valid.get_or_insert_with(url, |id| {
            let inner = Arc::clone(&self.inner);
            let (plugin_url, workspace) = (url.to_string(), workspace.to_string());
            settle(&entry.valid, url, id, None, async move {
                inner.is_dashboard_plugin_url_valid(&plugin_url, &workspace).await
            })
        });

        value.await
    }
}
