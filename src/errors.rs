// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for detection, labelling and reconciliation.
//!
//! Every error surfaced by a reconciliation causes the pod to be requeued with
//! backoff. Transient connectivity is the only class absorbed below the
//! reconciler, by the bounded connection poll of the detectors.

use std::time::Duration;
use thiserror::Error;

/// Errors returned by a query executor for a single detection call.
#[derive(Error, Debug)]
pub enum ExecError {
    /// The database process is not reachable yet
    ///
    /// Connection refused, reset or timed out while connecting. Retried by the
    /// detector until the connection ceiling.
    #[error("database at {endpoint} is unreachable: {reason}")]
    Unreachable {
        /// Host and port that was dialled
        endpoint: String,
        /// Underlying error message
        reason: String,
    },

    /// The connection could not be set up for a non-transient reason
    ///
    /// Authentication failure, TLS configuration error or invalid options.
    #[error("failed to connect to database at {endpoint}: {reason}")]
    Connect {
        /// Host and port that was dialled
        endpoint: String,
        /// Underlying error message
        reason: String,
    },

    /// The query or command failed or returned a malformed result
    #[error("detection query against {endpoint} failed: {reason}")]
    Query {
        /// Host and port that was queried
        endpoint: String,
        /// Underlying error message
        reason: String,
    },
}

impl ExecError {
    /// Whether the detector should retry the call.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, ExecError::Unreachable { .. })
    }
}

/// Errors returned by a primary detector.
#[derive(Error, Debug)]
pub enum DetectError {
    #[error(transparent)]
    Exec(#[from] ExecError),

    /// The database reported no ONLINE primary member
    #[error("no online primary member reported by {cluster}")]
    NoPrimaryRow {
        /// Cluster name
        cluster: String,
    },

    /// The database stayed unreachable for the whole connection ceiling
    #[error("database still unreachable after {elapsed:?}: {last_error}")]
    ConnectTimeout {
        elapsed: Duration,
        last_error: String,
    },

    /// A credential environment variable is not set
    #[error("missing value of {variable} variable in pod {pod}")]
    MissingCredential {
        /// Environment variable name
        variable: String,
        /// Pod the detection ran for (`namespace/name`)
        pod: String,
    },

    /// A secret exists but lacks a required key
    #[error("secret {secret} has no key {key}")]
    MissingSecretKey { secret: String, key: String },

    /// The cluster resource has no auth secret reference
    #[error("{cluster} does not reference an auth secret")]
    MissingAuthSecret { cluster: String },

    /// A Kubernetes read (cluster resource or secret) failed
    #[error("failed to read {what}: {source}")]
    Kube {
        what: String,
        #[source]
        source: kube::Error,
    },

    /// Client certificate material could not be written to disk
    #[error("failed to store certificates under {path}: {source}")]
    CertificateStore {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors returned by the label updater.
#[derive(Error, Debug)]
pub enum LabelError {
    /// Patching a pod's labels failed
    #[error("failed to patch labels of pod {pod}: {source}")]
    Patch {
        /// Pod that was patched (`namespace/name`)
        pod: String,
        #[source]
        source: kube::Error,
    },

    /// Listing sibling pods failed
    #[error("failed to list pods with selector {selector}: {source}")]
    List {
        selector: String,
        #[source]
        source: kube::Error,
    },
}

/// Errors returned by a reconciliation.
#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error(transparent)]
    Detect(#[from] DetectError),

    #[error(transparent)]
    Label(#[from] LabelError),
}

impl ReconcileError {
    /// Short error class used as a log field.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            ReconcileError::Detect(DetectError::Exec(_) | DetectError::ConnectTimeout { .. }) => {
                "database"
            }
            ReconcileError::Detect(DetectError::NoPrimaryRow { .. }) => "no_primary",
            ReconcileError::Detect(
                DetectError::MissingCredential { .. }
                | DetectError::MissingSecretKey { .. }
                | DetectError::MissingAuthSecret { .. }
                | DetectError::CertificateStore { .. },
            ) => "configuration",
            ReconcileError::Detect(DetectError::Kube { .. }) | ReconcileError::Label(_) => {
                "kubernetes"
            }
        }
    }
}

/// Errors of the initial watch cache synchronization. Fatal to the process.
#[derive(Error, Debug)]
pub enum CacheSyncError {
    #[error("pod cache did not synchronize within {0:?}")]
    TimedOut(Duration),

    #[error("pod watcher stopped before the cache synchronized")]
    WatcherStopped,
}

/// Check whether a Kubernetes error is an HTTP 404.
#[must_use]
pub fn is_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(api_err) if api_err.code == 404)
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod errors_tests;
