// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of a metadata object addressed by an identifier reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub enum ObjectType {
    /// An attribute.
    Attribute,
    /// A display form (label) of an attribute.
    DisplayForm,
    /// A dataset.
    Dataset,
    /// A fact.
    Fact,
    /// A measure (metric).
    Measure,
    /// A dashboard.
    Dashboard,
    /// A theme.
    Theme,
    /// A color palette.
    ColorPalette,
}

/// Reference to a metadata object, either by identifier or by URI.
///
/// The same object is usually addressable both ways, which is why the caches key lookups
/// by both forms once an object has been resolved.
///
/// # Examples
///
/// ```
/// use backend_cache::model::{ObjRef, ObjectType};
///
/// let by_id = ObjRef::identifier("label.region", ObjectType::DisplayForm);
/// let by_uri = ObjRef::uri("/gdc/md/ws/obj/42");
///
/// assert_eq!(by_id.to_string(), "id:label.region");
/// assert_eq!(by_uri.to_string(), "uri:/gdc/md/ws/obj/42");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ObjRef {
    /// Identifier-based reference.
    Identifier {
        /// Object identifier.
        identifier: String,
        /// Optional object type; identifiers are only unique per type.
        #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
        object_type: Option<ObjectType>,
    },
    /// URI-based reference.
    Uri {
        /// Object URI.
        uri: String,
    },
}

impl ObjRef {
    /// Creates an identifier reference for an object of the given type.
    pub fn identifier(identifier: impl Into<String>, object_type: ObjectType) -> Self {
        Self::Identifier {
            identifier: identifier.into(),
            object_type: Some(object_type),
        }
    }

    /// Creates an identifier reference without a type.
    pub fn untyped(identifier: impl Into<String>) -> Self {
        Self::Identifier {
            identifier: identifier.into(),
            object_type: None,
        }
    }

    /// Creates a URI reference.
    pub fn uri(uri: impl Into<String>) -> Self {
        Self::Uri { uri: uri.into() }
    }

    /// Returns the identifier if this is an identifier reference.
    #[must_use]
    pub fn as_identifier(&self) -> Option<&str> {
        match self {
            Self::Identifier { identifier, .. } => Some(identifier),
            Self::Uri { .. } => None,
        }
    }

    /// Returns the URI if this is a URI reference.
    #[must_use]
    pub fn as_uri(&self) -> Option<&str> {
        match self {
            Self::Uri { uri } => Some(uri),
            Self::Identifier { .. } => None,
        }
    }
}

impl fmt::Display for ObjRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identifier { identifier, .. } => write!(f, "id:{identifier}"),
            Self::Uri { uri } => write!(f, "uri:{uri}"),
        }
    }
}

/// A metadata object addressable by both identifier and URI.
pub trait MetadataObject {
    /// The canonical reference of the object.
    fn obj_ref(&self) -> &ObjRef;

    /// The object identifier.
    fn id(&self) -> &str;

    /// The object URI.
    fn uri(&self) -> &str;
}

/// Returns `true` if `requested` addresses `object`.
///
/// A reference matches when it equals the object's own reference, or when it is an
/// identifier reference naming the object's identifier, or a URI reference naming its URI.
#[must_use]
pub fn ref_matches<M: MetadataObject + ?Sized>(requested: &ObjRef, object: &M) -> bool {
    if requested == object.obj_ref() {
        return true;
    }

    match requested {
        ObjRef::Identifier { identifier, .. } => identifier == object.id(),
        ObjRef::Uri { uri } => uri == object.uri(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Label {
        obj_ref: ObjRef,
        id: String,
        uri: String,
    }

    impl MetadataObject for Label {
        fn obj_ref(&self) -> &ObjRef {
            &self.obj_ref
        }

        fn id(&self) -> &str {
            &self.id
        }

        fn uri(&self) -> &str {
            &self.uri
        }
    }

    fn label() -> Label {
        Label {
            obj_ref: ObjRef::identifier("label.region", ObjectType::DisplayForm),
            id: "label.region".to_string(),
            uri: "/obj/1".to_string(),
        }
    }

    #[test]
    fn matches_own_ref() {
        assert!(ref_matches(&ObjRef::identifier("label.region", ObjectType::DisplayForm), &label()));
    }

    #[test]
    fn matches_untyped_identifier_and_uri() {
        assert!(ref_matches(&ObjRef::untyped("label.region"), &label()));
        assert!(ref_matches(&ObjRef::uri("/obj/1"), &label()));
    }

    #[test]
    fn does_not_match_other_objects() {
        assert!(!ref_matches(&ObjRef::untyped("label.city"), &label()));
        assert!(!ref_matches(&ObjRef::uri("/obj/2"), &label()));
    }

    #[test]
    fn serializes_untagged() {
        let json = serde_json::to_string(&ObjRef::uri("/obj/1")).unwrap();
        assert_eq!(json, r#"{"uri":"/obj/1"}"#);

        let json = serde_json::to_string(&ObjRef::untyped("label.region")).unwrap();
        assert_eq!(json, r#"{"identifier":"label.region"}"#);
    }
}
