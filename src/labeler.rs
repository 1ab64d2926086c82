// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Role label updates.
//!
//! [`LabelUpdater`] is the only writer of the role label. Both operations skip
//! the patch when the cached pod already carries the wanted role, and every patch
//! carries the cached `resourceVersion`, so a concurrent change to the pod fails
//! the patch with a conflict and the pod is retried against fresher state.
//!
//! After confirming a primary, the updater lists the cluster's other members still
//! labelled primary and demotes them according to the [`DemotionPolicy`].

use crate::cluster::{ClusterIdentity, RoleLabel};
use crate::config::DemotionPolicy;
use crate::errors::{is_not_found, LabelError};
use crate::kube_api::PodClient;
use crate::labels::ROLE_LABEL;
use k8s_openapi::api::core::v1::Pod;
use kube::ResourceExt;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Writes role labels on the member pods of one cluster.
#[derive(Clone)]
pub struct LabelUpdater {
    pods: Arc<dyn PodClient>,
    cluster: ClusterIdentity,
    demotion: DemotionPolicy,
}

impl LabelUpdater {
    #[must_use]
    pub fn new(pods: Arc<dyn PodClient>, cluster: ClusterIdentity, demotion: DemotionPolicy) -> Self {
        Self {
            pods,
            cluster,
            demotion,
        }
    }

    /// Label `pod` primary and demote any other member still labelled primary.
    ///
    /// # Errors
    ///
    /// Returns [`LabelError`] when a patch or the sibling listing fails. A pod
    /// deleted in the meantime is not an error.
    pub async fn ensure_primary(&self, pod: &Pod) -> Result<(), LabelError> {
        self.set_role(pod, RoleLabel::Primary).await?;
        self.demote_stale_primaries(pod).await
    }

    /// Label `pod` secondary.
    ///
    /// # Errors
    ///
    /// Returns [`LabelError::Patch`] when the patch fails.
    pub async fn ensure_secondary(&self, pod: &Pod) -> Result<(), LabelError> {
        self.set_role(pod, RoleLabel::Secondary).await
    }

    async fn set_role(&self, pod: &Pod, role: RoleLabel) -> Result<(), LabelError> {
        if RoleLabel::of(pod) == role {
            debug!(
                namespace = ?pod.namespace(),
                pod = %pod.name_any(),
                role = ?role,
                "Role label already up to date"
            );
            return Ok(());
        }
        self.patch_role(pod, role.value()).await
    }

    async fn demote_stale_primaries(&self, primary: &Pod) -> Result<(), LabelError> {
        let namespace = primary.namespace().unwrap_or_default();
        let selector = self.cluster.primary_selector();

        let stale: Vec<Pod> = self
            .pods
            .list_pods(&namespace, &selector)
            .await
            .map_err(|source| LabelError::List {
                selector: selector.clone(),
                source,
            })?
            .into_iter()
            .filter(|pod| pod.name_any() != primary.name_any())
            .collect();

        for sibling in &stale {
            warn!(
                namespace = %namespace,
                pod = %sibling.name_any(),
                primary = %primary.name_any(),
                "Demoting member still labelled primary"
            );
            let role = match self.demotion {
                DemotionPolicy::Relabel => RoleLabel::Secondary.value(),
                DemotionPolicy::Remove => None,
            };
            self.patch_role(sibling, role).await?;
        }
        Ok(())
    }

    /// Patch the role label of `pod`; `None` removes it.
    async fn patch_role(&self, pod: &Pod, role: Option<&str>) -> Result<(), LabelError> {
        let namespace = pod.namespace().unwrap_or_default();
        let name = pod.name_any();
        let labels = BTreeMap::from([(ROLE_LABEL.to_string(), role.map(str::to_string))]);

        match self
            .pods
            .patch_labels(&namespace, &name, pod.resource_version().as_deref(), &labels)
            .await
        {
            Ok(()) => {
                info!(
                    namespace = %namespace,
                    pod = %name,
                    role = role.unwrap_or("<removed>"),
                    "Updated role label"
                );
                Ok(())
            }
            Err(e) if is_not_found(&e) => {
                debug!(namespace = %namespace, pod = %name, "Pod deleted before its role label was patched");
                Ok(())
            }
            Err(source) => Err(LabelError::Patch {
                pod: format!("{namespace}/{name}"),
                source,
            }),
        }
    }
}

#[cfg(test)]
#[path = "labeler_tests.rs"]
mod labeler_tests;
