// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Settings stored on a workspace.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceSettings {
    /// Workspace the settings belong to.
    pub workspace: String,
    /// Feature flags and settings by name.
    #[serde(default)]
    pub settings: BTreeMap<String, Value>,
}

/// Workspace settings resolved for the current user.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserWorkspaceSettings {
    /// Workspace the settings belong to.
    pub workspace: String,
    /// The user the settings were resolved for.
    pub user_id: String,
    /// Effective locale of the user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    /// Merged workspace and user settings by name.
    #[serde(default)]
    pub settings: BTreeMap<String, Value>,
}

/// Decimal and thousand separators used when formatting numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Separators {
    /// Decimal separator.
    pub decimal: String,
    /// Thousand separator.
    pub thousand: String,
}

/// First day of the week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeekStart {
    /// Weeks start on Sunday.
    Sunday,
    /// Weeks start on Monday.
    Monday,
}

/// Context in which an organization validates a URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum UrlValidationContext {
    /// Cross-origin resource sharing allow-list.
    Cors,
    /// Links rendered in the user interface.
    UiLink,
    /// Drill-to-URL targets.
    DrillToUri,
}

impl UrlValidationContext {
    /// Returns the wire name of the context.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cors => "CORS",
            Self::UiLink => "UI_LINK",
            Self::DrillToUri => "DRILL_TO_URI",
        }
    }
}

impl fmt::Display for UrlValidationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
