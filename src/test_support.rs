// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-memory fakes and builders shared by the unit tests.

use crate::cluster::{ClusterIdentity, ClusterKind};
use crate::crd::{MongoDB, MySQL};
use crate::detector::DetectPrimary;
use crate::errors::DetectError;
use crate::kube_api::{ClusterSpecSource, PodClient, SecretSource};
use crate::labels::{self, ROLE_LABEL};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Pod, PodIP, PodStatus};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::core::Status;
use kube::ResourceExt;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub const NAMESPACE: &str = "demo";
pub const CLUSTER: &str = "my-group";

pub fn mysql_cluster() -> ClusterIdentity {
    ClusterIdentity::new(ClusterKind::MySql, CLUSTER)
}

pub fn api_error(code: u16, reason: &str) -> kube::Error {
    kube::Error::Api(
        Status::failure(&format!("{reason} ({code})"), reason)
            .with_code(code)
            .boxed(),
    )
}

/// Member pod of `cluster` with an optional IP and role label.
pub fn member_pod(cluster: &ClusterIdentity, name: &str, ip: Option<&str>, role: Option<&str>) -> Pod {
    let mut pod_labels = cluster.member_labels();
    if let Some(role) = role {
        pod_labels.insert(ROLE_LABEL.to_string(), role.to_string());
    }

    Pod {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(NAMESPACE.to_string()),
            labels: Some(pod_labels),
            resource_version: Some("1".to_string()),
            ..Default::default()
        },
        status: ip.map(|ip| PodStatus {
            pod_ip: Some(ip.to_string()),
            pod_ips: Some(vec![PodIP { ip: ip.to_string() }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// A label patch sent through [`FakePodClient`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedPatch {
    pub namespace: String,
    pub name: String,
    pub resource_version: Option<String>,
    pub labels: BTreeMap<String, Option<String>>,
}

/// Pod API backed by a map, with optimistic concurrency on `resourceVersion`.
#[derive(Default)]
pub struct FakePodClient {
    pods: Mutex<BTreeMap<(String, String), Pod>>,
    patches: Mutex<Vec<RecordedPatch>>,
    fail_patches_with: Mutex<Option<u16>>,
}

impl FakePodClient {
    pub fn with_pods(pods: impl IntoIterator<Item = Pod>) -> Self {
        let client = Self::default();
        for pod in pods {
            client.insert(pod);
        }
        client
    }

    pub fn insert(&self, pod: Pod) {
        let key = (pod.namespace().unwrap_or_default(), pod.name_any());
        self.pods.lock().unwrap().insert(key, pod);
    }

    pub fn get(&self, name: &str) -> Option<Pod> {
        self.pods
            .lock()
            .unwrap()
            .get(&(NAMESPACE.to_string(), name.to_string()))
            .cloned()
    }

    pub fn role_of(&self, name: &str) -> Option<String> {
        self.get(name)
            .and_then(|pod| pod.labels().get(ROLE_LABEL).cloned())
    }

    pub fn patches(&self) -> Vec<RecordedPatch> {
        self.patches.lock().unwrap().clone()
    }

    pub fn fail_patches_with(&self, code: u16) {
        *self.fail_patches_with.lock().unwrap() = Some(code);
    }
}

#[async_trait]
impl PodClient for FakePodClient {
    async fn patch_labels(
        &self,
        namespace: &str,
        name: &str,
        resource_version: Option<&str>,
        patch: &BTreeMap<String, Option<String>>,
    ) -> Result<(), kube::Error> {
        self.patches.lock().unwrap().push(RecordedPatch {
            namespace: namespace.to_string(),
            name: name.to_string(),
            resource_version: resource_version.map(str::to_string),
            labels: patch.clone(),
        });

        if let Some(code) = *self.fail_patches_with.lock().unwrap() {
            return Err(api_error(code, "Injected"));
        }

        let mut pods = self.pods.lock().unwrap();
        let Some(pod) = pods.get_mut(&(namespace.to_string(), name.to_string())) else {
            return Err(api_error(404, "NotFound"));
        };

        let current = pod.metadata.resource_version.clone().unwrap_or_default();
        if resource_version.is_some_and(|rv| rv != current) {
            return Err(api_error(409, "Conflict"));
        }

        let pod_labels = pod.metadata.labels.get_or_insert_with(BTreeMap::new);
        for (key, value) in patch {
            match value {
                Some(value) => {
                    pod_labels.insert(key.clone(), value.clone());
                }
                None => {
                    pod_labels.remove(key);
                }
            }
        }
        let next = current.parse::<u64>().unwrap_or(0) + 1;
        pod.metadata.resource_version = Some(next.to_string());
        Ok(())
    }

    async fn list_pods(&self, namespace: &str, selector: &str) -> Result<Vec<Pod>, kube::Error> {
        let wanted: BTreeMap<String, String> = selector
            .split(',')
            .filter_map(|pair| pair.split_once('='))
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        Ok(self
            .pods
            .lock()
            .unwrap()
            .iter()
            .filter(|((ns, _), pod)| ns == namespace && labels::matches(&wanted, pod.labels()))
            .map(|(_, pod)| pod.clone())
            .collect())
    }
}

/// Secret API backed by a map.
#[derive(Default)]
pub struct FakeSecrets {
    secrets: HashMap<(String, String), BTreeMap<String, Vec<u8>>>,
}

impl FakeSecrets {
    pub fn with(mut self, namespace: &str, name: &str, data: &[(&str, &str)]) -> Self {
        self.secrets.insert(
            (namespace.to_string(), name.to_string()),
            data.iter()
                .map(|(k, v)| ((*k).to_string(), v.as_bytes().to_vec()))
                .collect(),
        );
        self
    }
}

#[async_trait]
impl SecretSource for FakeSecrets {
    async fn secret_data(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<BTreeMap<String, Vec<u8>>, kube::Error> {
        self.secrets
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| api_error(404, "NotFound"))
    }
}

/// Custom resource API backed by a list of resources.
#[derive(Default)]
pub struct FakeClusterSpecs {
    mysql: Vec<MySQL>,
    mongodb: Vec<MongoDB>,
}

impl FakeClusterSpecs {
    pub fn with_mysql(mut self, mut resource: MySQL) -> Self {
        resource.metadata.namespace = Some(NAMESPACE.to_string());
        self.mysql.push(resource);
        self
    }

    pub fn with_mongodb(mut self, mut resource: MongoDB) -> Self {
        resource.metadata.namespace = Some(NAMESPACE.to_string());
        self.mongodb.push(resource);
        self
    }
}

fn find<K: ResourceExt + Clone>(items: &[K], namespace: &str, name: &str) -> Result<K, kube::Error> {
    items
        .iter()
        .find(|item| item.namespace().as_deref() == Some(namespace) && item.name_any() == name)
        .cloned()
        .ok_or_else(|| api_error(404, "NotFound"))
}

#[async_trait]
impl ClusterSpecSource for FakeClusterSpecs {
    async fn mysql(&self, namespace: &str, name: &str) -> Result<MySQL, kube::Error> {
        find(&self.mysql, namespace, name)
    }

    async fn mongodb(&self, namespace: &str, name: &str) -> Result<MongoDB, kube::Error> {
        find(&self.mongodb, namespace, name)
    }
}

/// Detector answering from a mutable set of primary pod names.
#[derive(Default)]
pub struct FakeDetector {
    primaries: Mutex<HashSet<String>>,
    failure: Mutex<Option<String>>,
    calls: Mutex<Vec<Pod>>,
    call_count: AtomicUsize,
}

impl FakeDetector {
    pub fn primary(name: &str) -> Self {
        let detector = Self::default();
        detector.set_primary(name);
        detector
    }

    pub fn set_primary(&self, name: &str) {
        let mut primaries = self.primaries.lock().unwrap();
        primaries.clear();
        primaries.insert(name.to_string());
    }

    pub fn fail_with(&self, cluster: &str) {
        *self.failure.lock().unwrap() = Some(cluster.to_string());
    }

    pub fn calls(&self) -> Vec<Pod> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DetectPrimary for FakeDetector {
    async fn is_primary(&self, pod: &Pod) -> Result<bool, DetectError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().unwrap().push(pod.clone());

        if let Some(cluster) = self.failure.lock().unwrap().clone() {
            return Err(DetectError::NoPrimaryRow { cluster });
        }
        Ok(self.primaries.lock().unwrap().contains(&pod.name_any()))
    }
}
