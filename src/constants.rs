// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for zonemux.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// Change Batching Constants
// ============================================================================

/// Default maximum number of record changes submitted in one provider change request
pub const DEFAULT_BATCH_CHANGE_SIZE: usize = 1000;

/// Default pause between two consecutive batch submissions (1 second)
pub const DEFAULT_BATCH_CHANGE_INTERVAL_MILLIS: u64 = 1000;

/// Default TTL applied when an endpoint leaves its TTL unset or zero (5 minutes)
pub const DEFAULT_RECORD_TTL_SECS: u32 = 300;

// ============================================================================
// Provider Names
// ============================================================================

/// Google Cloud DNS provider name
pub const PROVIDER_GOOGLE: &str = "google";

/// RFC 2136 (authoritative nameserver with dynamic updates) provider name
pub const PROVIDER_RFC2136: &str = "rfc2136";

/// In-memory provider name (tests and dry runs)
pub const PROVIDER_INMEMORY: &str = "inmemory";

// ============================================================================
// Credential Keys
// ============================================================================

/// Service-account style JSON blob for Google Cloud DNS
pub const CREDENTIALS_KEY_GOOGLE: &str = "GOOGLE";

/// Google Cloud project identifier
pub const CREDENTIALS_KEY_PROJECT_ID: &str = "PROJECT_ID";

/// Nameserver host (IP address) accepting RFC 2136 updates
pub const CREDENTIALS_KEY_RFC2136_HOST: &str = "RFC2136_HOST";

/// Nameserver port, defaults to [`DNS_PORT`]
pub const CREDENTIALS_KEY_RFC2136_PORT: &str = "RFC2136_PORT";

/// Comma separated list of zones served by the nameserver
pub const CREDENTIALS_KEY_RFC2136_ZONES: &str = "RFC2136_ZONES";

/// TSIG key name
pub const CREDENTIALS_KEY_RFC2136_TSIG_KEYNAME: &str = "RFC2136_TSIG_KEYNAME";

/// Base64-encoded TSIG secret
pub const CREDENTIALS_KEY_RFC2136_TSIG_SECRET: &str = "RFC2136_TSIG_SECRET";

/// TSIG algorithm (e.g. `hmac-sha256`)
pub const CREDENTIALS_KEY_RFC2136_TSIG_SECRET_ALG: &str = "RFC2136_TSIG_SECRET_ALG";

/// Comma separated list of zones pre-created in the in-memory provider
pub const CREDENTIALS_KEY_INMEMORY_ZONES: &str = "INMEMORY_ZONES";

// ============================================================================
// DNS Protocol Constants
// ============================================================================

/// Standard DNS port for queries, updates and zone transfers
pub const DNS_PORT: u16 = 53;

/// TSIG fudge time in seconds (allows for clock skew)
pub const TSIG_FUDGE_TIME_SECS: u64 = 300;

/// Maximum length in bytes of one TXT character-string
pub const MAX_TXT_STRING_LEN: usize = 255;

// ============================================================================
// Google Cloud DNS Constants
// ============================================================================

/// Base URL of the Cloud DNS v1 REST API
pub const GOOGLE_DNS_API_BASE_URL: &str = "https://dns.googleapis.com/dns/v1";

/// Page size requested from list endpoints
pub const GOOGLE_LIST_PAGE_SIZE: u32 = 100;

// ============================================================================
// Routing Policy Constants
// ============================================================================

/// Provider-specific key holding the routing policy of a merged endpoint
pub const ROUTING_POLICY_KEY: &str = "routingpolicy";

/// Routing policy value for geographic routing
pub const ROUTING_POLICY_GEO: &str = "geo";

/// Routing policy value for weighted round-robin routing
pub const ROUTING_POLICY_WEIGHTED: &str = "weighted";

/// Provider-specific key carrying the geo code of an unmerged endpoint
pub const GEO_CODE_KEY: &str = "geo-code";

/// Provider-specific key carrying the weight of an unmerged endpoint
pub const WEIGHT_KEY: &str = "weight";

// ============================================================================
// Ownership Registry Constants
// ============================================================================

/// Heritage marker written into every registry TXT record
pub const REGISTRY_HERITAGE: &str = "zonemux";

/// Schema version of the registry TXT payload
pub const REGISTRY_VERSION: &str = "1";

/// Maximum length of an owner identifier
pub const MAX_OWNER_ID_LEN: usize = 40;
