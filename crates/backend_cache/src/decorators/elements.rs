// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Attribute elements caching.
//!
//! Only queries without a free-text filter are cached. Without a cancellation signal the
//! pending query is cached, like every other read. With a signal, a live cached page is reused;
//! otherwise the query runs uncached and only its successful result is stored.

use std::sync::Arc;

use crate::{
    Result,
    bounded::BoundedCache,
    keys,
    model::{ElementsQueryResult, ElementsQuerySettings, ObjRef},
    pending::{Signalled, ready, settle},
    spi::{AbortSignal, AttributesService},
};

pub(super) async fn query(
    inner: &Arc<dyn AttributesService>,
    cache: Option<BoundedCache<Signalled<ElementsQueryResult>>>,
    display_form: &ObjRef,
    settings: &ElementsQuerySettings,
    signal: Option<AbortSignal>,
) -> Result<ElementsQueryResult> {
    let Some(cache) = cache.filter(|_| settings.text_filter().is_none()) else {
        return inner.query_elements(display_form, settings, signal).await;
    };

    let key = keys::elements_key(display_form, settings);

    let Some(signal) = signal else {
        let entry = cache.get_or_refresh_with(&key, Signalled::is_live, |id| {
            let inner = Arc::clone(inner);
            let (display_form, settings) = (display_form.clone(), settings.clone());
            let value = settle(&cache, key.as_str(), id, None, async move {
                inner.query_elements(&display_form, &settings, None).await
            });
            Signalled::new(value, None)
        });
        return entry.value.await;
    };

    if let Some(entry) = cache.get(&key).filter(Signalled::is_live) {
        return entry.value.await;
    }

    let result = inner.query_elements(display_form, settings, Some(signal.clone())).await;
    match &result {
        Ok(page) => cache.set(key, Signalled::new(ready(page.clone()), Some(signal))),
        Err(_) => {
            cache.delete(&key);
        }
    }
    result
}
