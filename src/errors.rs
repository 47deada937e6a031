// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for zonemux.
//!
//! Errors fall into four categories:
//! - **Configuration errors** ([`ConfigError`]) - missing credentials, unknown provider names,
//!   invalid owner identifiers. Fatal at construction time.
//! - **Provider errors** ([`ProviderError`]) - transport, authentication and API failures
//!   returned by a DNS backend. Propagated verbatim so the caller can retry the whole pass.
//! - **Data errors** - malformed native records, unparsable weights, records outside every
//!   zone. These are never returned: the offending item is logged and skipped.
//! - **Batch capacity errors** - a single DNS name with more changes than the batch size.
//!   Also logged and skipped rather than returned.

use thiserror::Error;

/// Errors raised while building providers and registries from configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required key is absent from the credential bundle
    #[error("Credential key '{key}' is required by provider '{provider}'")]
    MissingCredential {
        /// Provider being constructed
        provider: String,
        /// Missing key
        key: String,
    },

    /// A credential value is present but cannot be used
    #[error("Credential key '{key}' is invalid: {reason}")]
    InvalidCredential {
        /// Offending key
        key: String,
        /// Why the value was rejected
        reason: String,
    },

    /// No constructor was registered under the requested name
    #[error("Unknown DNS provider '{name}' (registered: {registered})")]
    UnknownProvider {
        /// Requested provider name
        name: String,
        /// Comma separated list of registered names
        registered: String,
    },

    /// Owner identifiers end up inside DNS labels and must be label-safe
    #[error("Invalid owner id '{owner}': {reason}")]
    InvalidOwnerId {
        /// Rejected owner identifier
        owner: String,
        /// Why it was rejected
        reason: String,
    },
}

/// Errors returned by a DNS provider backend.
///
/// The message of the backend is kept verbatim so that it can be surfaced in a
/// status condition without further interpretation.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The HTTP request could not be sent or its body could not be read
    #[error("HTTP request to {url} failed: {source}")]
    Transport {
        /// Request URL
        url: String,
        /// Underlying client error
        #[source]
        source: reqwest::Error,
    },

    /// The backend answered with a non-success HTTP status
    #[error("HTTP {status} from {url}: {body}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Request URL
        url: String,
        /// Raw response body
        body: String,
    },

    /// The backend response could not be decoded as a whole
    #[error("Failed to decode response from {context}: {reason}")]
    Decode {
        /// What was being decoded
        context: String,
        /// Decoder message
        reason: String,
    },

    /// A DNS server rejected a query or an update
    #[error("DNS server {server} rejected {operation} for zone '{zone}': {reason}")]
    Dns {
        /// Server address
        server: String,
        /// Zone the operation targeted
        zone: String,
        /// Operation (e.g. "UPDATE", "AXFR")
        operation: String,
        /// Response code or client error
        reason: String,
    },

    /// A change could not be applied because it does not match the provider state
    #[error("Invalid change for zone '{zone}': {reason}")]
    InvalidChange {
        /// Zone the change targeted
        zone: String,
        /// Why it was rejected
        reason: String,
    },

    /// The caller cancelled the operation or its deadline expired
    #[error("Operation cancelled while {during}")]
    Cancelled {
        /// What was in progress
        during: String,
    },
}

impl ProviderError {
    /// Shorthand for a cancellation error.
    pub fn cancelled(during: impl Into<String>) -> Self {
        Self::Cancelled {
            during: during.into(),
        }
    }

    /// Returns `true` if this error is a cancellation rather than a backend failure.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// Errors parsing endpoint fields.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EndpointError {
    /// The record type string is not a known DNS record type
    #[error("Unknown DNS record type '{0}'")]
    UnknownRecordType(String),
}

/// Errors surfaced by a reconciliation pass.
#[derive(Error, Debug)]
pub enum ReconcileError {
    /// Provider or registry could not be built
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The backend failed while listing or applying
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl ReconcileError {
    /// Returns `true` if the pass was aborted by cancellation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Provider(e) if e.is_cancelled())
    }
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod errors_tests;
