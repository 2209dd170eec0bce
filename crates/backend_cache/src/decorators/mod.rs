// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Caching wrappers of the backend capability traits.
//!
//! Each facility wraps the service of the real backend and implements the same trait. The
//! composed [`CachingBackend`] decides per facility whether to hand out the wrapper or the
//! real service, based on which caches the [`CacheContext`](crate::context::CacheContext) holds.

mod attributes;
mod automations;
mod backend;
mod catalog;
mod elements;
mod execution;
mod result;
mod security;
mod settings;

pub(crate) use backend::CachingBackend;
