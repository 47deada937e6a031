// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#![allow(unexpected_cfgs)]

//! # zonemux - multi-owner DNS endpoint reconciliation
//!
//! zonemux keeps the records of a DNS backend in line with a desired set of endpoints.
//! Several independent owners can publish into the same zones, and even onto the same
//! hostname, without overwriting each other.
//!
//! ## Overview
//!
//! A reconcile pass moves desired endpoints through a fixed pipeline:
//!
//! 1. [`health`] drops targets an external prober reported dead
//! 2. the provider normalizes endpoints to its own shape (geo/weighted grouping)
//! 3. the [`registry`] reads current records and attaches ownership
//! 4. the [`plan`] diffs current against desired, on behalf of one owner
//! 5. the registry adds its TXT bookkeeping and the [`provider`] submits the changes
//!    zone by zone, in paced batches that never split a record name
//!
//! ## Modules
//!
//! - [`endpoint`] - canonical record model, routing policies and ownership labels
//! - [`zone`] - zones and domain/zone filters
//! - [`plan`] - change planning and batched submission
//! - [`provider`] - backend adapters (Cloud DNS, RFC 2136, in-memory) and their factory
//! - [`registry`] - TXT ownership registry
//! - [`health`] - liveness filter
//! - [`reconciler`] - the pipeline above, reported as a status condition
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use zonemux::endpoint::{Endpoint, RecordType};
//! use zonemux::health::Liveness;
//! use zonemux::provider::inmemory::InMemoryProvider;
//! use zonemux::provider::ProviderConfig;
//! use zonemux::reconciler::{Reconciler, ReconcilerConfig};
//! use zonemux::registry::txt::TxtRegistry;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let provider = Arc::new(InMemoryProvider::new(
//!     &["example.net".to_string()],
//!     ProviderConfig::default(),
//! ));
//! let registry = Arc::new(TxtRegistry::new(provider, "team-a", "")?);
//! let reconciler = Reconciler::new(registry, ReconcilerConfig::default());
//!
//! let desired = vec![Endpoint::new(
//!     "www.example.net",
//!     RecordType::A,
//!     vec!["192.0.2.10".to_string()],
//! )];
//! let outcome = reconciler
//!     .reconcile(desired, &Liveness::new(), &CancellationToken::new())
//!     .await;
//! assert!(outcome.condition.is_ready());
//! # Ok(())
//! # }
//! ```

pub mod constants;
pub mod endpoint;
pub mod errors;
pub mod health;
pub mod metrics;
pub mod plan;
pub mod provider;
pub mod reconciler;
pub mod registry;
pub mod status;
pub mod status_reasons;
pub mod zone;
