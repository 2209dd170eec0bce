// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of scheduled automation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub enum AutomationType {
    /// A scheduled export.
    Schedule,
    /// An alert triggered by a data condition.
    Alert,
}

/// Lifecycle state of an automation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum AutomationStatus {
    /// The automation runs.
    Active,
    /// The automation is paused.
    Paused,
}

/// A stored automation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Automation {
    /// Automation identifier.
    pub id: String,
    /// Title.
    pub title: String,
    /// Kind of automation.
    pub automation_type: AutomationType,
    /// Lifecycle state.
    pub status: AutomationStatus,
    /// Dashboard the automation belongs to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dashboard: Option<String>,
    /// Creator of the automation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    /// Recipients of the automation.
    #[serde(default)]
    pub recipients: Vec<String>,
    /// Schedule or alert details, opaque to the caching layer.
    #[serde(default)]
    pub details: Value,
}

/// Definition of an automation to create or update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationDefinition {
    /// Identifier; required for updates, ignored for creation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Title.
    pub title: String,
    /// Kind of automation.
    pub automation_type: AutomationType,
    /// Dashboard the automation belongs to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dashboard: Option<String>,
    /// Recipients of the automation.
    #[serde(default)]
    pub recipients: Vec<String>,
    /// Schedule or alert details.
    #[serde(default)]
    pub details: Value,
}

/// Options of an automations listing.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationsLoadOptions {
    /// Include the result of the last automation run.
    #[serde(default)]
    pub include_automation_result: bool,
    /// Only list automations of this kind.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub automation_type: Option<AutomationType>,
    /// Only list automations created by this user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

/// Sort order of an automations query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationsSort {
    /// Sorted property.
    pub property: String,
    /// Whether the order is descending.
    pub descending: bool,
}

/// Settings of a paginated automations query.
///
/// Each `with_*` call on [`AutomationsQuery`](crate::spi::AutomationsQuery) produces an updated
/// copy of this value; the full value is the cache identity of the query.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationsQuerySettings {
    /// Page size.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,
    /// Zero-based page number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    /// Free-text filter on titles.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    /// Sort order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<AutomationsSort>,
    /// Kind of automation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub automation_type: Option<AutomationType>,
    /// Creator of the automation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Recipient user of the automation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    /// External (e-mail) recipient of the automation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_recipient: Option<String>,
    /// User that is either the author or a recipient.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Dashboard the automation belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dashboard: Option<String>,
    /// Lifecycle state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<AutomationStatus>,
    /// Include the result of the last automation run.
    #[serde(default)]
    pub include_automation_result: bool,
}

/// One page of an automations query.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationsQueryResult {
    /// Automations on this page.
    pub items: Vec<Automation>,
    /// Page size.
    pub limit: u32,
    /// Offset of the first item of the page.
    pub offset: u32,
    /// Total number of matching automations.
    pub total_count: u32,
}
