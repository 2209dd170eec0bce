// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Plain data types exchanged with the analytical backend.
//!
//! The caching layer treats most of these as opaque payloads. It only looks inside to derive
//! cache keys (object references, query settings, execution fingerprints) and to prime the
//! attribute caches from a loaded catalog.

mod automations;
mod execution;
mod metadata;
mod refs;
mod settings;

pub use automations::*;
pub use execution::*;
pub use metadata::*;
pub use refs::*;
pub use settings::*;
