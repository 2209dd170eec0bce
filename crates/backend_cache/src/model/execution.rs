// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use super::ObjRef;

/// A measure (metric) requested by an execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Measure {
    /// Local identifier of the measure within the execution.
    pub local_id: String,
    /// The measured metadata object.
    pub item: ObjRef,
    /// Aggregation applied to the item, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregation: Option<String>,
    /// Display title. Presentation only, it does not influence the computed data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Number format. Presentation only, it does not influence the computed data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl Measure {
    /// Creates a measure over `item`.
    pub fn new(local_id: impl Into<String>, item: ObjRef) -> Self {
        Self {
            local_id: local_id.into(),
            item,
            aggregation: None,
            title: None,
            format: None,
        }
    }

    /// Sets the display title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// An attribute requested by an execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attribute {
    /// Local identifier of the attribute within the execution.
    pub local_id: String,
    /// The display form used to render the attribute.
    pub display_form: ObjRef,
}

impl Attribute {
    /// Creates an attribute rendered by `display_form`.
    pub fn new(local_id: impl Into<String>, display_form: ObjRef) -> Self {
        Self {
            local_id: local_id.into(),
            display_form,
        }
    }
}

/// One dimension of the execution result.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dimension {
    /// Local identifiers of the items laid out in this dimension.
    pub item_identifiers: Vec<String>,
}

/// Definition of a query execution.
///
/// Filters, sorts and post-processing are kept as opaque JSON documents: the caching layer
/// never interprets them, it only needs them to be part of the execution identity.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionDefinition {
    /// Workspace the execution runs in.
    pub workspace: String,
    /// Requested attributes.
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    /// Requested measures.
    #[serde(default)]
    pub measures: Vec<Measure>,
    /// Filters applied to the execution.
    #[serde(default)]
    pub filters: Vec<Value>,
    /// Sort items.
    #[serde(default)]
    pub sort_by: Vec<Value>,
    /// Result dimensions.
    #[serde(default)]
    pub dimensions: Vec<Dimension>,
    /// Backend specific post-processing hints.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_processing: Option<Value>,
}

impl ExecutionDefinition {
    /// Creates an empty definition for the given workspace.
    pub fn new(workspace: impl Into<String>) -> Self {
        Self {
            workspace: workspace.into(),
            ..Self::default()
        }
    }

    /// Adds an attribute.
    #[must_use]
    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Adds a measure.
    #[must_use]
    pub fn with_measure(mut self, measure: Measure) -> Self {
        self.measures.push(measure);
        self
    }

    /// Adds a filter.
    #[must_use]
    pub fn with_filter(mut self, filter: Value) -> Self {
        self.filters.push(filter);
        self
    }

    /// Sets the result dimensions.
    #[must_use]
    pub fn with_dimensions(mut self, dimensions: Vec<Dimension>) -> Self {
        self.dimensions = dimensions;
        self
    }

    /// Computes a content-derived identity of the definition.
    ///
    /// Presentation-only fields (measure titles and formats) are left out, so two definitions
    /// that compute the same data share a fingerprint. Backends are free to use their own
    /// fingerprinting; the caching layer treats the value as opaque.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut canonical = self.clone();
        for measure in &mut canonical.measures {
            measure.title = None;
            measure.format = None;
        }

        let bytes = serde_json_canonicalizer::to_vec(&canonical).unwrap_or_default();
        hex::encode(Sha256::digest(&bytes))
    }
}

/// A page of computed data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataView {
    /// Offset of the page in each dimension.
    pub offset: Vec<u32>,
    /// Number of items included in each dimension.
    pub count: Vec<u32>,
    /// Total number of items available in each dimension.
    pub total_count: Vec<u32>,
    /// The data, row-major.
    pub data: Value,
    /// Fingerprint of the view; views of the same result with the same window share it.
    pub fingerprint: String,
}

/// Configuration of a forecast computed over an execution result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastConfig {
    /// Number of periods to forecast.
    pub forecast_period: u32,
    /// Confidence level of the prediction interval, between 0 and 1.
    pub confidence_level: f64,
    /// Whether the data is seasonal.
    pub seasonal: bool,
}

/// Forecasted values for an execution result.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastResult {
    /// Forecasted attribute headers.
    pub headers: Vec<String>,
    /// Lower bounds of the prediction interval.
    pub low: Vec<f64>,
    /// Predicted values.
    pub prediction: Vec<f64>,
    /// Upper bounds of the prediction interval.
    pub high: Vec<f64>,
    /// Whether the prediction was computed with a trimmed history.
    pub loading: bool,
}
