// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Status conditions reported by a reconcile pass.

use crate::status_reasons::{CONDITION_TYPE_READY, STATUS_TRUE};
use chrono::Utc;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Condition represents an observation of a reconcile pass.
///
/// Shaped like a Kubernetes status condition so callers running zonemux inside a
/// controller can copy it into a resource status as is.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition, always `Ready` today.
    pub r#type: String,

    /// Status of the condition: True, False, or Unknown.
    pub status: String,

    /// Brief `CamelCase` reason for the condition's last transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Human-readable message; the raw backend message on provider failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Last time the condition transitioned (RFC3339 format).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

impl Condition {
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.r#type == CONDITION_TYPE_READY && self.status == STATUS_TRUE
    }
}

/// Create a condition stamped with the current time.
///
/// # Example
///
/// ```rust
/// # use zonemux::status::create_condition;
/// let condition = create_condition("Ready", "True", "ReconcileSuccess", "3 changes applied");
/// assert!(condition.is_ready());
/// ```
#[must_use]
pub fn create_condition(
    condition_type: &str,
    status: &str,
    reason: &str,
    message: &str,
) -> Condition {
    Condition {
        r#type: condition_type.to_string(),
        status: status.to_string(),
        reason: Some(reason.to_string()),
        message: Some(message.to_string()),
        last_transition_time: Some(Utc::now().to_rfc3339()),
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod status_tests;
