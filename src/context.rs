// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared context of the running controller.
//!
//! The binary builds one [`Context`] at startup and hands it to the pod
//! controller. It holds:
//! - Controller configuration
//! - The reconciler, wired with the detector chosen for the cluster kind
//! - The per-pod requeue policy applied after each reconciliation
//!
//! [`Collaborators`] is the seam between the controller and the API server; the
//! binary fills it with a [`KubeApi`], tests with in-memory fakes.

use crate::cluster::ClusterKind;
use crate::config::ControllerConfig;
use crate::controller::RequeuePolicy;
use crate::credentials::{EnvCredentialProvider, SecretCredentialProvider};
use crate::detector::mongodb::DriverMongoExecutor;
use crate::detector::mysql::{MySqlHost, SqlxMySqlExecutor};
use crate::detector::{MongoDetector, MySqlDetector, PrimaryDetector};
use crate::kube_api::{ClusterSpecSource, KubeApi, PodClient, SecretSource};
use crate::labeler::LabelUpdater;
use crate::reconciler::Reconciler;
use crate::retry::ItemExponentialBackoff;
use kube::Client;
use std::sync::Arc;

/// API access used by detection and labelling.
#[derive(Clone)]
pub struct Collaborators {
    pub pods: Arc<dyn PodClient>,
    pub specs: Arc<dyn ClusterSpecSource>,
    pub secrets: Arc<dyn SecretSource>,
}

impl Collaborators {
    /// All collaborators backed by one Kubernetes client.
    #[must_use]
    pub fn from_client(client: Client) -> Self {
        let api = Arc::new(KubeApi::new(client));
        Self {
            pods: api.clone(),
            specs: api.clone(),
            secrets: api,
        }
    }
}

/// Shared context of the running controller.
pub struct Context {
    /// Controller configuration
    pub config: Arc<ControllerConfig>,

    /// Handler of reconcile requests
    pub reconciler: Reconciler,

    /// Requeue decisions after success and failure
    pub requeue: RequeuePolicy,
}

impl Context {
    #[must_use]
    pub fn new(config: ControllerConfig, collaborators: &Collaborators) -> Self {
        let reconciler = build_reconciler(&config, collaborators);
        Self::with_reconciler(config, reconciler)
    }

    /// Context around an already built reconciler.
    #[must_use]
    pub fn with_reconciler(config: ControllerConfig, reconciler: Reconciler) -> Self {
        let requeue = RequeuePolicy::new(
            ItemExponentialBackoff::default(),
            config.max_requeues,
            config.resync_period,
        );
        Self {
            config: Arc::new(config),
            reconciler,
            requeue,
        }
    }
}

/// Address the `MySQL` detector dials for the configured mode.
///
/// A self-monitoring controller runs beside its database and uses loopback.
#[must_use]
pub fn mysql_host(config: &ControllerConfig) -> MySqlHost {
    if config.self_pod.is_some() {
        MySqlHost::Loopback
    } else {
        MySqlHost::PodIp
    }
}

/// Detector for the configured cluster kind.
#[must_use]
pub fn build_detector(config: &ControllerConfig, collaborators: &Collaborators) -> PrimaryDetector {
    match config.kind() {
        ClusterKind::MySql => PrimaryDetector::MySql(MySqlDetector::new(
            config.cluster.clone(),
            collaborators.specs.clone(),
            collaborators.secrets.clone(),
            Arc::new(EnvCredentialProvider::from_process_env(
                config.credential_env.clone(),
            )),
            Arc::new(SqlxMySqlExecutor),
            mysql_host(config),
        )),
        ClusterKind::MongoDb => PrimaryDetector::MongoDb(MongoDetector::new(
            config.cluster.clone(),
            collaborators.specs.clone(),
            collaborators.secrets.clone(),
            Arc::new(SecretCredentialProvider::new(collaborators.secrets.clone())),
            Arc::new(DriverMongoExecutor),
            config.cert_dir.clone(),
        )),
    }
}

/// Reconciler wired with the detector and label updater for `config`.
#[must_use]
pub fn build_reconciler(config: &ControllerConfig, collaborators: &Collaborators) -> Reconciler {
    Reconciler::new(
        config.kind(),
        Arc::new(build_detector(config, collaborators)),
        LabelUpdater::new(
            collaborators.pods.clone(),
            config.cluster.clone(),
            config.demotion,
        ),
    )
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod context_tests;
