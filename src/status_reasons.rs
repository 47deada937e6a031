// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Condition reasons reported by a reconcile pass.
//!
//! Reasons are programmatic `CamelCase` identifiers following Kubernetes conventions.
//! A pass reports a single `type: Ready` condition:
//!
//! ```yaml
//! conditions:
//!   - type: Ready
//!     status: "False"
//!     reason: ProviderError
//!     message: "HTTP 403 from https://dns.googleapis.com/...: {\"error\": ...}"
//! ```

// ============================================================================
// Condition Types
// ============================================================================

/// The single condition type reported by a reconcile pass
pub const CONDITION_TYPE_READY: &str = "Ready";

/// Condition status values
pub const STATUS_TRUE: &str = "True";
pub const STATUS_FALSE: &str = "False";

// ============================================================================
// Success Reasons
// ============================================================================

/// Every planned change was accepted by the provider, or nothing needed to change.
pub const REASON_RECONCILE_SUCCESS: &str = "ReconcileSuccess";

/// Changes were planned and logged but not submitted.
pub const REASON_DRY_RUN: &str = "DryRun";

// ============================================================================
// Failure Reasons
// ============================================================================

/// The provider rejected a request or could not be reached.
///
/// The condition message carries the backend's message verbatim.
pub const REASON_PROVIDER_ERROR: &str = "ProviderError";

/// Credentials or settings are missing or invalid.
pub const REASON_CONFIGURATION_ERROR: &str = "ConfigurationError";

/// The pass was cancelled before it finished.
pub const REASON_CANCELLED: &str = "Cancelled";

#[cfg(test)]
#[path = "status_reasons_tests.rs"]
mod status_reasons_tests;
