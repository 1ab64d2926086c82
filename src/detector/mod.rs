// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Primary detection.
//!
//! A detector answers one question for one pod: is the database member running in
//! this pod the cluster's primary? The implementation is chosen once at startup
//! from the cluster kind and holds no state between calls.
//!
//! - [`mysql::MySqlDetector`] - asks Group Replication for the ONLINE primary member host
//! - [`mongodb::MongoDetector`] - issues `isMaster` against the pod's replica set member

pub mod mongodb;
pub mod mysql;

use crate::cluster::ClusterKind;
use crate::errors::DetectError;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::ResourceExt;
use tracing::{debug, warn};

pub use mongodb::MongoDetector;
pub use mysql::MySqlDetector;

/// Decides whether a pod hosts the primary member of its cluster.
#[async_trait]
pub trait DetectPrimary: Send + Sync {
    async fn is_primary(&self, pod: &Pod) -> Result<bool, DetectError>;
}

/// Detector for the configured cluster kind.
pub enum PrimaryDetector {
    MySql(MySqlDetector),
    MongoDb(MongoDetector),
}

impl PrimaryDetector {
    #[must_use]
    pub fn kind(&self) -> ClusterKind {
        match self {
            PrimaryDetector::MySql(_) => ClusterKind::MySql,
            PrimaryDetector::MongoDb(_) => ClusterKind::MongoDb,
        }
    }
}

#[async_trait]
impl DetectPrimary for PrimaryDetector {
    async fn is_primary(&self, pod: &Pod) -> Result<bool, DetectError> {
        let result = match self {
            PrimaryDetector::MySql(detector) => detector.is_primary(pod).await,
            PrimaryDetector::MongoDb(detector) => detector.is_primary(pod).await,
        };

        let kind = self.kind().label_value();
        match &result {
            Ok(is_primary) => {
                debug!(
                    cluster_kind = kind,
                    pod = %pod.name_any(),
                    primary = is_primary,
                    "Primary detection completed"
                );
            }
            Err(err) => {
                warn!(cluster_kind = kind, pod = %pod.name_any(), error = %err, "Primary detection failed");
            }
        }
        result
    }
}
