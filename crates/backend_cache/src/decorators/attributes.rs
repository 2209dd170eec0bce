// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Attribute, display form and dataset caching.
//!
//! Metadata objects can be requested by identifier or by URI. A lookup is keyed by the form
//! it was requested with; once resolved, the object is also stored under its other form, so a
//! later lookup by either reference is served from the cache.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;

use super::elements;
use crate::{
    Result,
    bounded::BoundedCache,
    context::{AttributeEntry, CacheContext},
    keys,
    model::{
        AttributeMetadata, AttributeWithReferences, DatasetMetadata, DisplayFormMetadata, ElementsQueryResult, ElementsQuerySettings,
        MetadataObject, ObjRef, ref_matches,
    },
    pending::{AsyncValue, ready, settle},
    spi::{AbortSignal, AttributesService},
};

#[derive(Debug)]
pub(crate) struct CachingAttributes {
    inner: Arc<dyn AttributesService>,
    workspace: String,
    context: Arc<CacheContext>,
}

impl CachingAttributes {
    pub fn new(inner: Arc<dyn AttributesService>, workspace: String, context: Arc<CacheContext>) -> Self {
        Self { inner, workspace, context }
    }

    fn entry(&self) -> Option<AttributeEntry> {
        self.context.attribute_entry(&self.workspace)
    }

    fn allows_inconsistent_relations(&self) -> bool {
        self.context.capabilities.allows_inconsistent_relations
    }
}

#[async_trait]
impl AttributesService for CachingAttributes {
    async fn get_attribute(&self, attribute: &ObjRef) -> Result<AttributeMetadata> {
        self.inner.get_attribute(attribute).await
    }

    async fn get_attribute_display_form(&self, display_form: &ObjRef) -> Result<DisplayFormMetadata> {
        let Some(entry) = self.entry() else {
            return self.inner.get_attribute_display_form(display_form).await;
        };

        let key = keys::ref_key(display_form);
        let value = entry.display_forms.get_or_insert_with(&key, |id| {
            let inner = Arc::clone(&self.inner);
            let display_form = display_form.clone();
            settle(&entry.display_forms, key.as_str(), id, None, async move {
                inner.get_attribute_display_form(&display_form).await
            })
        });

        let resolved = value.await?;
        alias(&entry.display_forms, &resolved, &resolved);
        Ok(resolved)
    }

    async fn get_attribute_display_forms(&self, display_forms: &[ObjRef]) -> Result<Vec<DisplayFormMetadata>> {
        let Some(entry) = self.entry() else {
            return self.inner.get_attribute_display_forms(display_forms).await;
        };

        let (hits, misses) = partition(&entry.display_forms, display_forms);
        let mut resolved = try_join_all(hits).await?;
        if !misses.is_empty() {
            let loaded = self.inner.get_attribute_display_forms(&misses).await?;
            store(&entry.display_forms, &loaded);
            resolved.extend(loaded);
        }

        Ok(restore_order(display_forms, &resolved, self.allows_inconsistent_relations(), "display form"))
    }

    async fn get_attribute_by_display_form(&self, display_form: &ObjRef) -> Result<AttributeMetadata> {
        let Some(entry) = self.entry() else {
            return self.inner.get_attribute_by_display_form(display_form).await;
        };

        let key = keys::ref_key(display_form);
        let value = entry.attributes_by_display_form.get_or_insert_with(&key, |id| {
            let inner = Arc::clone(&self.inner);
            let display_form = display_form.clone();
            settle(&entry.attributes_by_display_form, key.as_str(), id, None, async move {
                inner.get_attribute_by_display_form(&display_form).await
            })
        });

        let resolved = value.await?;
        if let Some(form) = resolved.display_forms.iter().find(|form| ref_matches(display_form, *form)) {
            alias(&entry.attributes_by_display_form, form, &resolved);
        }
        Ok(resolved)
    }

    async fn get_attributes_with_references(&self, attributes: &[ObjRef]) -> Result<Vec<AttributeWithReferences>> {
        let Some(entry) = self.entry() else {
            return self.inner.get_attributes_with_references(attributes).await;
        };

        let (hits, misses) = partition(&entry.attributes_with_references, attributes);
        let mut resolved = try_join_all(hits).await?;
        if !misses.is_empty() {
            let loaded = self.inner.get_attributes_with_references(&misses).await?;
            store(&entry.attributes_with_references, &loaded);
            resolved.extend(loaded);
        }

        Ok(restore_order(attributes, &resolved, self.allows_inconsistent_relations(), "attribute"))
    }

    async fn get_attribute_dataset_meta(&self, attribute: &ObjRef) -> Result<DatasetMetadata> {
        let Some(entry) = self.entry() else {
            return self.inner.get_attribute_dataset_meta(attribute).await;
        };

        let key = keys::ref_key(attribute);
        let value = entry.dataset_by_attribute.get_or_insert_with(&key, |id| {
            let inner = Arc::clone(&self.inner);
            let attribute = attribute.clone();
            settle(&entry.dataset_by_attribute, key.as_str(), id, None, async move {
                inner.get_attribute_dataset_meta(&attribute).await
            })
        });

        value.await
    }

    async fn get_common_attributes(&self, attributes: &[ObjRef]) -> Result<Vec<ObjRef>> {
        self.inner.get_common_attributes(attributes).await
    }

    async fn query_elements(
        &self,
        display_form: &ObjRef,
        settings: &ElementsQuerySettings,
        signal: Option<AbortSignal>,
    ) -> Result<ElementsQueryResult> {
        let cache = self.entry().and_then(|entry| entry.elements);
        elements::query(&self.inner, cache, display_form, settings, signal).await
    }
}

/// Stores `value` under both keys of `object`, unless something is already stored there.
fn alias<M, V>(cache: &BoundedCache<AsyncValue<V>>, object: &M, value: &V)
where
    M: MetadataObject + ?Sized,
    V: Clone + Send + Sync + 'static,
{
    for key in keys::object_keys(object) {
        cache.insert_if_absent(&key, ready(value.clone()));
    }
}

/// Stores bulk-loaded objects under both of their keys.
fn store<M>(cache: &BoundedCache<AsyncValue<M>>, objects: &[M])
where
    M: MetadataObject + Clone + Send + Sync + 'static,
{
    for object in objects {
        for key in keys::object_keys(object) {
            cache.set(key, ready(object.clone()));
        }
    }
}

/// Splits `refs` into cached values and references that have to be loaded.
///
/// Runs before anything is awaited, so a concurrent bulk load cannot evict a hit in between.
fn partition<M: Clone>(cache: &BoundedCache<AsyncValue<M>>, refs: &[ObjRef]) -> (Vec<AsyncValue<M>>, Vec<ObjRef>) {
    let mut hits = Vec::new();
    let mut misses = Vec::new();
    for obj_ref in refs {
        match cache.get(&keys::ref_key(obj_ref)) {
            Some(value) => hits.push(value),
            None => misses.push(obj_ref.clone()),
        }
    }
    (hits, misses)
}

/// Returns the `candidates` matching `requested`, in the requested order.
///
/// # Panics
///
/// Panics if a requested reference has no match and the backend does not allow inconsistent
/// relations.
fn restore_order<M: MetadataObject + Clone>(requested: &[ObjRef], candidates: &[M], allows_inconsistent_relations: bool, what: &str) -> Vec<M> {
    requested
        .iter()
        .filter_map(|obj_ref| {
            let found = candidates.iter().find(|candidate| ref_matches(obj_ref, *candidate)).cloned();
            assert!(
                found.is_some() || allows_inconsistent_relations,
                "no {what} was resolved for {obj_ref} and the backend does not allow inconsistent relations"
            );
            found
        })
        .collect()
}
