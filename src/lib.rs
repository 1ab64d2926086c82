// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! # Primary Labeler - replication role labels for database pods
//!
//! A small Kubernetes controller that keeps the `kubedb.com/role` label of every
//! member pod of a replicated database in line with the role the database itself
//! reports, so services and clients can select the writable member by label.
//!
//! ## Overview
//!
//! Supported clusters:
//!
//! - `MySQL` Group Replication (single-primary mode)
//! - `MongoDB` replica sets
//!
//! The controller runs either as a sidecar of each database pod (it evaluates only
//! its own pod) or as a single deployment evaluating every member.
//!
//! ## Modules
//!
//! - [`controller`] - Pod controller, requeue policy and own-pod mapping
//! - [`reconciler`] - Per-pod reconciliation
//! - [`detector`] - `MySQL` and `MongoDB` primary detection
//! - [`labeler`] - Idempotent role label updates with stale-primary healing
//! - [`context`] - Wiring of the above for the binary
//!
//! ## Example
//!
//! ```rust,no_run
//! use primary_labeler::cluster::{ClusterIdentity, ClusterKind};
//! use primary_labeler::config::ControllerConfig;
//!
//! let cluster = ClusterIdentity::new(ClusterKind::MySql, "my-group");
//! let config = ControllerConfig::new(cluster, "demo");
//!
//! assert_eq!(config.cluster.member_selector(), "kubedb.com/kind=MySQL,kubedb.com/name=my-group");
//! ```

pub mod cluster;
pub mod config;
pub mod constants;
pub mod context;
pub mod controller;
pub mod crd;
pub mod credentials;
pub mod detector;
pub mod errors;
pub mod kube_api;
pub mod labeler;
pub mod labels;
pub mod reconciler;
pub mod retry;

#[cfg(test)]
mod test_support;
