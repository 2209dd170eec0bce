// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Derivation of cache keys.
//!
//! Structured inputs (load options, query settings) are keyed by their canonical JSON form
//! (RFC 8785), which does not depend on field order or map iteration order.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::model::{ElementsQuerySettings, MetadataObject, ObjRef, UrlValidationContext};

/// Key used when a value has no serialized form.
pub(crate) const UNDEFINED_KEY: &str = "undefined";

/// Returns the canonical JSON form of `value`.
pub(crate) fn stable_key<T: Serialize>(value: &T) -> String {
    serde_json_canonicalizer::to_vec(value)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .filter(|json| json != "null")
        .unwrap_or_else(|| UNDEFINED_KEY.to_string())
}

/// Returns the hex encoded SHA-256 digest of the concatenated `parts`.
pub(crate) fn content_hash<'a>(parts: impl IntoIterator<Item = &'a str>) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Key of a window read: offsets and sizes of every dimension.
pub(crate) fn window_key(offset: &[u32], size: &[u32]) -> String {
    let join = |values: &[u32]| values.iter().map(u32::to_string).collect::<Vec<_>>().join(",");
    format!("o{}_s{}", join(offset), join(size))
}

/// Key of an elements query over `display_form`.
///
/// The free-text filter is not part of the key; filtered queries are never cached.
pub(crate) fn elements_key(display_form: &ObjRef, settings: &ElementsQuerySettings) -> String {
    let mut settings = settings.clone();
    if let Some(options) = settings.options.as_mut() {
        options.filter = None;
    }

    let display_form = display_form.to_string();
    let settings = stable_key(&settings);
    content_hash([display_form.as_str(), settings.as_str()])
}

/// Key of a URL validation within an organization.
pub(crate) fn url_key(context: UrlValidationContext, url: &str) -> String {
    format!("{}_{url}", context.as_str())
}

/// Security settings scope of the dashboard plugins used by `workspace`.
pub(crate) fn plugin_scope(workspace: &str) -> String {
    format!("plugins_{workspace}")
}

/// Key of a metadata lookup by reference.
pub(crate) fn ref_key(obj_ref: &ObjRef) -> String {
    match obj_ref {
        ObjRef::Identifier { identifier, .. } => identifier_key(identifier),
        ObjRef::Uri { uri } => uri_key(uri),
    }
}

pub(crate) fn identifier_key(identifier: &str) -> String {
    format!("id:{identifier}")
}

pub(crate) fn uri_key(uri: &str) -> String {
    format!("uri:{uri}")
}

/// Both keys under which a resolved metadata object can be looked up.
pub(crate) fn object_keys<M: MetadataObject + ?Sized>(object: &M) -> [String; 2] {
    [identifier_key(object.id()), uri_key(object.uri())]
}
