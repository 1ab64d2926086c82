// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Per-pod reconciliation.
//!
//! ## Reconciliation Logic
//!
//! 1. Ask the detector whether the pod hosts the primary
//! 2. Label it primary (demoting stale siblings) or secondary
//!
//! The controller hands over the latest cached pod; a pod gone from the cache is
//! never reconciled. Detector and label errors are returned unchanged so the
//! controller requeues the pod.

use crate::cluster::ClusterKind;
use crate::detector::DetectPrimary;
use crate::errors::ReconcileError;
use crate::labeler::LabelUpdater;
use k8s_openapi::api::core::v1::Pod;
use kube::ResourceExt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Evaluates one pod and writes its role label.
pub struct Reconciler {
    kind: ClusterKind,
    detector: Arc<dyn DetectPrimary>,
    labeler: LabelUpdater,
}

impl Reconciler {
    #[must_use]
    pub fn new(kind: ClusterKind, detector: Arc<dyn DetectPrimary>, labeler: LabelUpdater) -> Self {
        Self {
            kind,
            detector,
            labeler,
        }
    }

    /// Reconcile one pod.
    ///
    /// # Errors
    ///
    /// Returns the detector or label updater error unchanged.
    pub async fn reconcile(&self, pod: &Pod) -> Result<(), ReconcileError> {
        let start = Instant::now();
        let namespace = pod.namespace().unwrap_or_default();
        let name = pod.name_any();

        debug!(
            cluster_kind = self.kind.label_value(),
            namespace = %namespace,
            pod = %name,
            "Reconciling pod role"
        );

        let result = self.evaluate(pod).await;
        match &result {
            Ok(()) => debug!(
                namespace = %namespace,
                pod = %name,
                duration_ms = start.elapsed().as_millis(),
                "Reconciliation completed"
            ),
            Err(e) => warn!(
                namespace = %namespace,
                pod = %name,
                error_type = e.kind(),
                error = %e,
                duration_ms = start.elapsed().as_millis(),
                "Reconciliation failed"
            ),
        }
        result
    }

    async fn evaluate(&self, pod: &Pod) -> Result<(), ReconcileError> {
        if self.detector.is_primary(pod).await? {
            info!(pod = %pod.name_any(), "Pod hosts the primary");
            self.labeler.ensure_primary(pod).await?;
        } else {
            debug!(pod = %pod.name_any(), "Pod hosts a secondary");
            self.labeler.ensure_secondary(pod).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "reconciler_tests.rs"]
mod reconciler_tests;
