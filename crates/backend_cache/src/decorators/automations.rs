// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    Result,
    context::CacheContext,
    keys,
    model::{Automation, AutomationDefinition, AutomationsLoadOptions, AutomationsQueryResult, AutomationsQuerySettings},
    pending::settle,
    spi::AutomationsService,
};

/// Caches automation listings and query pages per workspace.
///
/// Every mutation drops both caches of the workspace once the wrapped call has settled,
/// whether it succeeded or not.
#[derive(Debug)]
pub(crate) struct CachingAutomations {
    inner: Arc<dyn AutomationsService>,
    workspace: String,
    context: Arc<CacheContext>,
}

impl CachingAutomations {
    pub fn new(inner: Arc<dyn AutomationsService>, workspace: String, context: Arc<CacheContext>) -> Self {
        Self { inner, workspace, context }
    }

    fn invalidate<T>(&self, result: Result<T>) -> Result<T> {
        if let Some(entry) = self.context.automations_entry(&self.workspace) {
            entry.listings.clear();
            entry.queries.clear();
        }
        result
    }
}

#[async_trait]
impl AutomationsService for CachingAutomations {
    async fn get_automation(&self, id: &str) -> Result<Automation> {
        self.inner.get_automation(id).await
    }

    async fn get_automations(&self, options: &AutomationsLoadOptions) -> Result<Vec<Automation>> {
        let Some(entry) = self.context.automations_entry(&self.workspace) else {
            return self.inner.get_automations(options).await;
        };

        let key = keys::stable_key(options);
        let value = entry.listings.get_or_insert_with(&key, |id| {
            let inner = Arc::clone(&self.inner);
            let options = options.clone();
            settle(&entry.listings, key.as_str(), id, None, async move { inner.get_automations(&options).await })
        });

        value.await
    }

    async fn query_automations(&self, settings: &AutomationsQuerySettings) -> Result<AutomationsQueryResult> {
        let Some(entry) = self.context.automations_entry(&self.workspace) else {
            return self.inner.query_automations(settings).await;
        };

        let key = keys::stable_key(settings);
        let value = entry.queries.get_or_insert_with(&key, |id| {
            let inner = Arc::clone(&self.inner);
            let settings = settings.clone();
            settle(&entry.queries, key.as_str(), id, None, async move { inner.query_automations(&settings).await })
        });

        value.await
    }

    async fn create_automation(&self, definition: &AutomationDefinition) -> Result<Automation> {
        self.invalidate(self.inner.create_automation(definition).await)
    }

    async fn update_automation(&self, definition: &AutomationDefinition) -> Result<Automation> {
        self.invalidate(self.inner.update_automation(definition).await)
    }

    async fn delete_automation(&self, id: &str) -> Result<()> {
        self.invalidate(self.inner.delete_automation(id).await)
    }

    async fn delete_automations(&self, ids: &[String]) -> Result<()> {
        self.invalidate(self.inner.delete_automations(ids).await)
    }

    async fn unsubscribe_automation(&self, id: &str) -> Result<()> {
        self.invalidate(self.inner.unsubscribe_automation(id).await)
    }

    async fn unsubscribe_automations(&self, ids: &[String]) -> Result<()> {
        self.invalidate(self.inner.unsubscribe_automations(ids).await)
    }
}
