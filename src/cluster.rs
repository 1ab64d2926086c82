// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Cluster identity and role types.

use crate::constants::{KIND_MONGODB, KIND_MYSQL};
use crate::labels::{self, ROLE_LABEL, ROLE_PRIMARY, ROLE_SECONDARY};
use k8s_openapi::api::core::v1::Pod;
use kube::ResourceExt;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Replication technology of the watched cluster.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ClusterKind {
    /// `MySQL` Group Replication
    MySql,
    /// `MongoDB` replica set
    MongoDb,
}

impl ClusterKind {
    /// Value of the database kind label for this kind.
    #[must_use]
    pub fn label_value(self) -> &'static str {
        match self {
            ClusterKind::MySql => KIND_MYSQL,
            ClusterKind::MongoDb => KIND_MONGODB,
        }
    }
}

impl fmt::Display for ClusterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label_value())
    }
}

impl FromStr for ClusterKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mysql" => Ok(ClusterKind::MySql),
            "mongodb" | "mongo" => Ok(ClusterKind::MongoDb),
            other => Err(format!(
                "unsupported cluster kind '{other}', expected 'mysql' or 'mongodb'"
            )),
        }
    }
}

/// The database cluster whose members are labelled.
///
/// Fixed for the controller's lifetime.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClusterIdentity {
    pub kind: ClusterKind,
    /// Name of the database custom resource
    pub name: String,
}

impl ClusterIdentity {
    #[must_use]
    pub fn new(kind: ClusterKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }

    /// Labels shared by every member pod of this cluster.
    #[must_use]
    pub fn member_labels(&self) -> BTreeMap<String, String> {
        labels::member_labels(self.kind.label_value(), &self.name)
    }

    /// Selector string matching every member pod of this cluster.
    #[must_use]
    pub fn member_selector(&self) -> String {
        labels::to_selector(&self.member_labels())
    }

    /// Selector string matching the members currently labelled primary.
    #[must_use]
    pub fn primary_selector(&self) -> String {
        labels::to_selector(&labels::primary_labels(
            self.kind.label_value(),
            &self.name,
        ))
    }
}

/// Role label state of a pod.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoleLabel {
    Primary,
    Secondary,
    /// Not labelled yet, or carrying a value this controller does not write
    Unset,
}

impl RoleLabel {
    /// Read the role label of a pod.
    #[must_use]
    pub fn of(pod: &Pod) -> Self {
        match pod.labels().get(ROLE_LABEL).map(String::as_str) {
            Some(ROLE_PRIMARY) => RoleLabel::Primary,
            Some(ROLE_SECONDARY) => RoleLabel::Secondary,
            _ => RoleLabel::Unset,
        }
    }

    /// Label value written for this role, `None` for [`RoleLabel::Unset`].
    #[must_use]
    pub fn value(self) -> Option<&'static str> {
        match self {
            RoleLabel::Primary => Some(ROLE_PRIMARY),
            RoleLabel::Secondary => Some(ROLE_SECONDARY),
            RoleLabel::Unset => None,
        }
    }
}

#[cfg(test)]
#[path = "cluster_tests.rs"]
mod cluster_tests;
