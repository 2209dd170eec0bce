// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    Result,
    context::{AttributeEntry, CacheContext},
    keys,
    model::{Catalog, CatalogLoadOptions},
    pending::{ready, settle},
    spi::CatalogService,
};

/// Caches loaded catalogs per workspace and load options.
///
/// A successfully loaded catalog also primes the attribute caches of the workspace, without
/// overwriting anything already cached there. A pending load is stored in the cache context,
/// so it reaches the attribute caches through a weak handle.
#[derive(Debug)]
pub(crate) struct CachingCatalog {
    inner: Arc<dyn CatalogService>,
    workspace: String,
    context: Arc<CacheContext>,
}

impl CachingCatalog {
    pub fn new(inner: Arc<dyn CatalogService>, workspace: String, context: Arc<CacheContext>) -> Self {
        Self { inner, workspace, context }
    }
}

#[async_trait]
impl CatalogService for CachingCatalog {
    async fn load(&self, options: &CatalogLoadOptions) -> Result<Arc<Catalog>> {
        let Some(entry) = self.context.catalog_entry(&self.workspace) else {
            return self.inner.load(options).await;
        };

        let key = keys::stable_key(options);
        let value = entry.catalogs.get_or_insert_with(&key, |id| {
            let inner = Arc::clone(&self.inner);
            let context = Arc::downgrade(&self.context);
            let workspace = self.workspace.clone();
            let options = options.clone();

            settle(&entry.catalogs, key.as_str(), id, None, async move {
                let catalog = inner.load(&options).await?;
                if let Some(attributes) = context.upgrade().and_then(|context| context.attribute_entry(&workspace)) {
                    prime_attribute_caches(&attributes, &catalog);
                }
                Ok(catalog)
            })
        });

        value.await
    }
}

fn prime_attribute_caches(entry: &AttributeEntry, catalog: &Catalog) {
    for item in &catalog.attributes {
        for display_form in &item.display_forms {
            entry
                .attributes_by_display_form
                .insert_if_absent(&keys::ref_key(&display_form.obj_ref), ready(item.attribute.clone()));
        }

        if let (Some(dataset), Some(identifier)) = (&item.dataset, item.attribute.obj_ref.as_identifier()) {
            entry
                .dataset_by_attribute
                .insert_if_absent(&keys::identifier_key(identifier), ready(dataset.clone()));
        }
    }
}
