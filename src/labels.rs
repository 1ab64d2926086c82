// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Label constants and selector helpers.
//!
//! Database pods are identified by the kind and name labels set by the database
//! operator. The role label is the only label this controller ever writes.

use std::collections::BTreeMap;

// ============================================================================
// Database Labels
// ============================================================================

/// Label carrying the database kind (`MySQL` or `MongoDB`)
pub const DATABASE_KIND_LABEL: &str = "kubedb.com/kind";

/// Label carrying the database custom resource name
pub const DATABASE_NAME_LABEL: &str = "kubedb.com/name";

/// Label indicating the replication role of a database pod
pub const ROLE_LABEL: &str = "kubedb.com/role";

// ============================================================================
// Role Values
// ============================================================================

/// Role value for the writable member
pub const ROLE_PRIMARY: &str = "primary";

/// Role value for every other member
pub const ROLE_SECONDARY: &str = "secondary";

/// Labels selecting every member of a cluster.
#[must_use]
pub fn member_labels(kind: &str, name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (DATABASE_KIND_LABEL.to_string(), kind.to_string()),
        (DATABASE_NAME_LABEL.to_string(), name.to_string()),
    ])
}

/// Labels selecting the members of a cluster currently marked primary.
#[must_use]
pub fn primary_labels(kind: &str, name: &str) -> BTreeMap<String, String> {
    let mut labels = member_labels(kind, name);
    labels.insert(ROLE_LABEL.to_string(), ROLE_PRIMARY.to_string());
    labels
}

/// Render a label map as an equality-based selector string (`k1=v1,k2=v2`).
#[must_use]
pub fn to_selector(labels: &BTreeMap<String, String>) -> String {
    labels
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Check whether `labels` contains every entry of `selector`.
#[must_use]
pub fn matches(selector: &BTreeMap<String, String>, labels: &BTreeMap<String, String>) -> bool {
    selector
        .iter()
        .all(|(k, v)| labels.get(k).is_some_and(|actual| actual == v))
}

#[cfg(test)]
#[path = "labels_tests.rs"]
mod labels_tests;
