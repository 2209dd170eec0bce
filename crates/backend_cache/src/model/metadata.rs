// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{MetadataObject, ObjRef};

macro_rules! metadata_object {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl MetadataObject for $ty {
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
        )+
    };
}

/// Metadata of an attribute display form (label).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayFormMetadata {
    /// Canonical reference.
    #[serde(rename = "ref")]
    pub obj_ref: ObjRef,
    /// Identifier.
    pub id: String,
    /// URI.
    pub uri: String,
    /// Title.
    pub title: String,
    /// The attribute this display form belongs to.
    pub attribute: ObjRef,
    /// Display form type, for example a hyperlink or geo pushpin.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_form_type: Option<String>,
    /// Whether this is the attribute's default display form.
    #[serde(default)]
    pub is_default: bool,
}

/// Metadata of an attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeMetadata {
    /// Canonical reference.
    #[serde(rename = "ref")]
    pub obj_ref: ObjRef,
    /// Identifier.
    pub id: String,
    /// URI.
    pub uri: String,
    /// Title.
    pub title: String,
    /// Display forms of the attribute.
    #[serde(default)]
    pub display_forms: Vec<DisplayFormMetadata>,
}

/// Metadata of a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetMetadata {
    /// Canonical reference.
    #[serde(rename = "ref")]
    pub obj_ref: ObjRef,
    /// Identifier.
    pub id: String,
    /// URI.
    pub uri: String,
    /// Title.
    pub title: String,
    /// Timestamp of the last data load, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_loaded_at: Option<String>,
}

metadata_object!(DisplayFormMetadata, AttributeMetadata, DatasetMetadata);

/// Objects referenced by an attribute.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferencedObjects {
    /// Datasets the attribute belongs to.
    #[serde(default)]
    pub datasets: Vec<DatasetMetadata>,
}

/// An attribute together with the objects it references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeWithReferences {
    /// The attribute.
    pub attribute: AttributeMetadata,
    /// Objects referenced by the attribute.
    #[serde(default)]
    pub referenced_objects: ReferencedObjects,
}

impl MetadataObject for AttributeWithReferences {
    fn obj_ref(&self) -> &ObjRef {
        &self.attribute.obj_ref
    }

    fn id(&self) -> &str {
        &self.attribute.id
    }

    fn uri(&self) -> &str {
        &self.attribute.uri
    }
}

/// Kind of catalog item requested by a catalog load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub enum CatalogItemType {
    /// Attributes.
    Attribute,
    /// Facts.
    Fact,
    /// Measures.
    Measure,
    /// Date datasets.
    DateDataset,
}

/// Options of a catalog load.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogLoadOptions {
    /// Item types to load; all types when empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub types: Vec<CatalogItemType>,
    /// Only load items carrying one of these tags.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include_tags: Vec<String>,
    /// Skip items carrying one of these tags.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude_tags: Vec<String>,
    /// Restrict the catalog to a single dataset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset: Option<ObjRef>,
    /// Load from the production data model rather than the staging one.
    #[serde(default)]
    pub production: bool,
    /// Load catalog groups as well.
    #[serde(default)]
    pub load_groups: bool,
}

impl CatalogLoadOptions {
    /// Restricts the load to the given item types.
    #[must_use]
    pub fn for_types(mut self, types: impl IntoIterator<Item = CatalogItemType>) -> Self {
        self.types = types.into_iter().collect();
        self
    }

    /// Only loads items carrying one of the given tags.
    #[must_use]
    pub fn with_include_tags(mut self, tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.include_tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Skips items carrying one of the given tags.
    #[must_use]
    pub fn with_exclude_tags(mut self, tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.exclude_tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

/// An attribute item of the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogAttribute {
    /// The attribute.
    pub attribute: AttributeMetadata,
    /// Default display form.
    pub default_display_form: DisplayFormMetadata,
    /// All display forms of the attribute.
    pub display_forms: Vec<DisplayFormMetadata>,
    /// Geo pushpin display forms of the attribute.
    #[serde(default)]
    pub geo_pin_display_forms: Vec<DisplayFormMetadata>,
    /// Dataset the attribute belongs to, when the backend includes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset: Option<DatasetMetadata>,
    /// Catalog groups (tags) of the item.
    #[serde(default)]
    pub groups: Vec<ObjRef>,
}

/// A measure item of the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogMeasure {
    /// Canonical reference.
    #[serde(rename = "ref")]
    pub obj_ref: ObjRef,
    /// Title.
    pub title: String,
    /// MAQL or other expression of the measure.
    pub expression: String,
    /// Catalog groups (tags) of the item.
    #[serde(default)]
    pub groups: Vec<ObjRef>,
}

/// A fact item of the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogFact {
    /// Canonical reference.
    #[serde(rename = "ref")]
    pub obj_ref: ObjRef,
    /// Title.
    pub title: String,
    /// Dataset the fact belongs to, when the backend includes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset: Option<DatasetMetadata>,
    /// Catalog groups (tags) of the item.
    #[serde(default)]
    pub groups: Vec<ObjRef>,
}

/// A date dataset of the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogDateDataset {
    /// The dataset.
    pub dataset: DatasetMetadata,
    /// Date attributes (granularities) of the dataset.
    pub date_attributes: Vec<CatalogAttribute>,
}

/// A catalog group (tag).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogGroup {
    /// Reference of the tag.
    pub tag: ObjRef,
    /// Title.
    pub title: String,
}

/// The logical data model catalog of a workspace.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    /// Attributes.
    #[serde(default)]
    pub attributes: Vec<CatalogAttribute>,
    /// Measures.
    #[serde(default)]
    pub measures: Vec<CatalogMeasure>,
    /// Facts.
    #[serde(default)]
    pub facts: Vec<CatalogFact>,
    /// Date datasets.
    #[serde(default)]
    pub date_datasets: Vec<CatalogDateDataset>,
    /// Catalog groups.
    #[serde(default)]
    pub groups: Vec<CatalogGroup>,
}

/// Sort order of attribute elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortDirection {
    /// Ascending.
    Asc,
    /// Descending.
    Desc,
}

/// Options of an attribute elements query.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementsQueryOptions {
    /// Sort order of the elements.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<SortDirection>,
    /// Free-text search; queries carrying one are never cached.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    /// Restrict the query to these element values.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elements: Option<Vec<String>>,
    /// Include the total count ignoring other filters.
    #[serde(default)]
    pub include_total_count_without_filters: bool,
    /// Do not return the primary label of each element.
    #[serde(default)]
    pub exclude_primary_label: bool,
}

/// Settings of an attribute elements query.
///
/// Each `with_*` call on [`ElementsQuery`](crate::spi::ElementsQuery) produces an updated copy of
/// this value, so a partially built query can be reused safely.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementsQuerySettings {
    /// Page size.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    /// Page offset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
    /// Query options.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<ElementsQueryOptions>,
    /// Attribute filters limiting the elements.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attribute_filters: Vec<Value>,
    /// Date filters limiting the elements.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub date_filters: Vec<Value>,
    /// Measures limiting the elements.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub measures: Vec<ObjRef>,
    /// Objects the elements are validated against.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validate_by: Vec<ObjRef>,
}

impl ElementsQuerySettings {
    /// Returns the free-text search of the query, if any.
    #[must_use]
    pub fn text_filter(&self) -> Option<&str> {
        self.options.as_ref().and_then(|options| options.filter.as_deref())
    }
}

/// A single attribute element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeElement {
    /// Element title; `None` for the empty value.
    pub title: Option<String>,
    /// Element URI or primary key.
    pub uri: Option<String>,
    /// Title formatted by the display form, if it differs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formatted_title: Option<String>,
}

/// One page of attribute elements.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementsQueryResult {
    /// Elements on this page.
    pub items: Vec<AttributeElement>,
    /// Page size.
    pub limit: u32,
    /// Page offset.
    pub offset: u32,
    /// Total number of elements.
    pub total_count: u32,
    /// Total number of elements ignoring filters, when requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_count_without_filters: Option<u32>,
}
