// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Transparent, bounded in-memory caching layered over an analytical backend client.
//!
//! [`with_caching`] wraps any [`AnalyticalBackend`](spi::AnalyticalBackend) into a backend with
//! the same interface that remembers the results of expensive, mostly read-only calls:
//! executions and their data, catalogs, URL validations, attribute metadata, attribute
//! elements, workspace settings and automations.
//!
//! # Overview
//!
//! Every cache is a bounded least-recently-used map. A facility whose limit is `None` or zero is
//! disabled, and the backend hands out the wrapped service for it unchanged.
//!
//! Caches store pending computations, not just their results. Concurrent callers asking for the
//! same thing share a single backend call, and a call that fails is removed from the cache so the
//! next caller retries it.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use backend_cache::{CachingConfiguration, spi::AnalyticalBackend, with_caching};
//!
//! # async fn example(backend: Arc<dyn AnalyticalBackend>) -> backend_cache::Result<()> {
//! let config = CachingConfiguration::recommended()
//!     .with_max_executions(20)
//!     .on_cache_ready(|control| {
//!         // Keep `control` around to reset caches later.
//!         control.reset_catalogs();
//!     });
//!
//! let backend = with_caching(backend, config);
//! let settings = backend.workspace("ws").settings().get_settings().await?;
//! # let _ = settings;
//! # Ok(())
//! # }
//! ```
//!
//! # Testing
//!
//! The `test-util` feature enables the `testing` module with an in-memory backend that
//! records every call it receives.
//!
//! # Resetting caches
//!
//! The [`CacheControl`] handed to [`CachingConfiguration::on_cache_ready`] clears whole cache
//! families, for example after the caller learns that the data model of a workspace changed.

mod bounded;
mod config;
mod context;
mod control;
mod decorators;
mod error;
mod keys;
mod pending;
mod telemetry;

pub mod model;
pub mod spi;
#[cfg(any(feature = "test-util", test))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-util")))]
pub mod testing;

use std::sync::Arc;

pub use bounded::BoundedCache;
pub use config::{CacheReadyCallback, CachingConfiguration, RECOMMENDED_CACHING_CONFIGURATION};
pub use control::CacheControl;
pub use error::{Error, Result, is_abort_error};

use crate::{context::CacheContext, decorators::CachingBackend, spi::AnalyticalBackend};

/// Wraps `backend` into a backend that caches according to `config`.
///
/// The returned backend exposes the same capabilities as `backend`. The
/// [`on_cache_ready`](CachingConfiguration::on_cache_ready) callback, if any, runs once before
/// this function returns.
///
/// # Panics
///
/// Panics if `config` enables a facility while setting one of its per-item limits to zero, for
/// example a catalog cache with `max_catalog_options` of `Some(0)`.
#[must_use]
pub fn with_caching(backend: Arc<dyn AnalyticalBackend>, config: CachingConfiguration) -> Arc<dyn AnalyticalBackend> {
    config.validate();

    let context = Arc::new(CacheContext::new(&config, backend.capabilities()));
    telemetry::record_setup(&config);

    if let Some(on_cache_ready) = &config.on_cache_ready {
        on_cache_ready(CacheControl::new(Arc::clone(&context)));
    }

    Arc::new(CachingBackend::new(backend, context))
}
