// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Runtime configuration consumed by the controller.
//!
//! The binary builds a [`ControllerConfig`] from its command line; library code
//! only ever sees this struct.

use crate::cluster::{ClusterIdentity, ClusterKind};
use crate::constants::{
    DEFAULT_CACHE_SYNC_TIMEOUT_SECS, DEFAULT_CERT_DIR, DEFAULT_MAX_REQUEUES,
    DEFAULT_MYSQL_ROOT_PASSWORD_ENV, DEFAULT_MYSQL_ROOT_USERNAME_ENV, DEFAULT_RESYNC_PERIOD_SECS,
    DEFAULT_WORKERS,
};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// What happens to a sibling still labelled primary once another pod is confirmed primary.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DemotionPolicy {
    /// Relabel the sibling `secondary`
    #[default]
    Relabel,
    /// Remove the role label from the sibling
    Remove,
}

impl FromStr for DemotionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "relabel" => Ok(DemotionPolicy::Relabel),
            "remove" => Ok(DemotionPolicy::Remove),
            other => Err(format!(
                "unsupported demotion policy '{other}', expected 'relabel' or 'remove'"
            )),
        }
    }
}

/// Environment variable names holding the `MySQL` root credentials.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CredentialEnv {
    pub username: String,
    pub password: String,
}

impl Default for CredentialEnv {
    fn default() -> Self {
        Self {
            username: DEFAULT_MYSQL_ROOT_USERNAME_ENV.to_string(),
            password: DEFAULT_MYSQL_ROOT_PASSWORD_ENV.to_string(),
        }
    }
}

/// Namespace/name of a pod.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PodIdentity {
    pub namespace: String,
    pub name: String,
}

impl PodIdentity {
    #[must_use]
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// `namespace/name` form used in logs.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

/// Controller configuration.
#[derive(Clone, Debug)]
pub struct ControllerConfig {
    /// Cluster whose members are labelled
    pub cluster: ClusterIdentity,

    /// Namespace the controller runs in
    pub operator_namespace: String,

    /// The controller's own pod; when set every member event reconciles this pod
    pub self_pod: Option<PodIdentity>,

    /// Watch only `operator_namespace` instead of every namespace
    pub restrict_to_operator_namespace: bool,

    /// Pods reconciled concurrently
    pub workers: usize,

    /// Requeues allowed for a failing pod before it is dropped
    pub max_requeues: u32,

    /// Period after which a reconciled pod is reconciled again; zero disables resync
    pub resync_period: Duration,

    /// Time allowed for the initial cache synchronization
    pub cache_sync_timeout: Duration,

    /// Environment variable names of the `MySQL` root credentials
    pub credential_env: CredentialEnv,

    /// Directory where client certificates are written
    pub cert_dir: PathBuf,

    /// Treatment of stale primary siblings
    pub demotion: DemotionPolicy,
}

impl ControllerConfig {
    /// Configuration with defaults for everything but the cluster and namespace.
    #[must_use]
    pub fn new(cluster: ClusterIdentity, operator_namespace: impl Into<String>) -> Self {
        Self {
            cluster,
            operator_namespace: operator_namespace.into(),
            self_pod: None,
            restrict_to_operator_namespace: true,
            workers: DEFAULT_WORKERS,
            max_requeues: DEFAULT_MAX_REQUEUES,
            resync_period: Duration::from_secs(DEFAULT_RESYNC_PERIOD_SECS),
            cache_sync_timeout: Duration::from_secs(DEFAULT_CACHE_SYNC_TIMEOUT_SECS),
            credential_env: CredentialEnv::default(),
            cert_dir: PathBuf::from(DEFAULT_CERT_DIR),
            demotion: DemotionPolicy::default(),
        }
    }

    /// Namespace to watch, `None` meaning all namespaces.
    #[must_use]
    pub fn watch_namespace(&self) -> Option<&str> {
        self.restrict_to_operator_namespace
            .then_some(self.operator_namespace.as_str())
    }

    #[must_use]
    pub fn kind(&self) -> ClusterKind {
        self.cluster.kind
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
