// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Orchestration API access used by the detectors and the label updater.
//!
//! The controller talks to the API server through three narrow traits so that
//! detection and labelling can be exercised against in-memory fakes. [`KubeApi`]
//! implements all of them on top of a [`kube::Client`].

use crate::constants::FIELD_MANAGER;
use crate::crd::{MongoDB, MySQL};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Pod, Secret};
use kube::api::{ListParams, Patch, PatchParams};
use kube::{Api, Client};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use tracing::debug;

/// Pod reads and label patches.
#[async_trait]
pub trait PodClient: Send + Sync {
    /// Apply a JSON merge patch to a pod's labels.
    ///
    /// A `None` value removes the label. When `resource_version` is set the API
    /// server rejects the patch with a conflict if the pod changed in between.
    async fn patch_labels(
        &self,
        namespace: &str,
        name: &str,
        resource_version: Option<&str>,
        labels: &BTreeMap<String, Option<String>>,
    ) -> Result<(), kube::Error>;

    /// List pods in `namespace` matching an equality-based label selector.
    async fn list_pods(&self, namespace: &str, selector: &str) -> Result<Vec<Pod>, kube::Error>;
}

/// Reads of the database custom resources.
#[async_trait]
pub trait ClusterSpecSource: Send + Sync {
    async fn mysql(&self, namespace: &str, name: &str) -> Result<MySQL, kube::Error>;

    async fn mongodb(&self, namespace: &str, name: &str) -> Result<MongoDB, kube::Error>;
}

/// Reads of secret material.
#[async_trait]
pub trait SecretSource: Send + Sync {
    /// Decoded data of a secret; a secret without data yields an empty map.
    async fn secret_data(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<BTreeMap<String, Vec<u8>>, kube::Error>;
}

/// Build the merge patch body for a label change.
#[must_use]
pub fn label_patch(
    resource_version: Option<&str>,
    labels: &BTreeMap<String, Option<String>>,
) -> Value {
    let labels: Map<String, Value> = labels
        .iter()
        .map(|(k, v)| (k.clone(), v.clone().map_or(Value::Null, Value::String)))
        .collect();

    let mut metadata = Map::new();
    metadata.insert("labels".to_string(), Value::Object(labels));
    if let Some(rv) = resource_version {
        metadata.insert("resourceVersion".to_string(), json!(rv));
    }

    json!({ "metadata": metadata })
}

/// [`kube::Client`] backed implementation of the API traits.
#[derive(Clone)]
pub struct KubeApi {
    client: Client,
}

impl KubeApi {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PodClient for KubeApi {
    async fn patch_labels(
        &self,
        namespace: &str,
        name: &str,
        resource_version: Option<&str>,
        labels: &BTreeMap<String, Option<String>>,
    ) -> Result<(), kube::Error> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let patch = label_patch(resource_version, labels);
        debug!(namespace = %namespace, pod = %name, patch = %patch, "Patching pod labels");
        api.patch(name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }

    async fn list_pods(&self, namespace: &str, selector: &str) -> Result<Vec<Pod>, kube::Error> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let pods = api.list(&ListParams::default().labels(selector)).await?;
        Ok(pods.items)
    }
}

#[async_trait]
impl ClusterSpecSource for KubeApi {
    async fn mysql(&self, namespace: &str, name: &str) -> Result<MySQL, kube::Error> {
        Api::<MySQL>::namespaced(self.client.clone(), namespace)
            .get(name)
            .await
    }

    async fn mongodb(&self, namespace: &str, name: &str) -> Result<MongoDB, kube::Error> {
        Api::<MongoDB>::namespaced(self.client.clone(), namespace)
            .get(name)
            .await
    }
}

#[async_trait]
impl SecretSource for KubeApi {
    async fn secret_data(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<BTreeMap<String, Vec<u8>>, kube::Error> {
        let secret = Api::<Secret>::namespaced(self.client.clone(), namespace)
            .get(name)
            .await?;
        Ok(secret
            .data
            .unwrap_or_default()
            .into_iter()
            .map(|(k, v)| (k, v.0))
            .collect())
    }
}

#[cfg(test)]
#[path = "kube_api_tests.rs"]
mod kube_api_tests;
