// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Pod controller built on [`kube::runtime::Controller`].
//!
//! The controller watches the member pods of the configured cluster and hands the
//! cached pod to [`reconcile`]. The runtime keeps one pending request per pod and
//! never reconciles the same pod twice at once.
//!
//! ## Modes
//!
//! - **Multi-pod**: every member pod is its own reconcile key.
//! - **Self-monitoring**: the controller watches its own pod, and every member
//!   event is mapped to that pod with [`own_pod_mapper`]. All reconciliations
//!   therefore share one key and run one at a time.
//!
//! ## Requeues
//!
//! [`RequeuePolicy`] counts failures per pod. A failing pod is retried with
//! exponential backoff until `max_requeues` is reached, then dropped until the
//! next watch event or resync. A successful reconciliation clears the counter and
//! schedules the periodic resync of that pod.

use crate::config::{ControllerConfig, PodIdentity};
use crate::context::Context;
use crate::errors::{CacheSyncError, ReconcileError};
use crate::retry::ItemExponentialBackoff;
use futures::StreamExt;
use k8s_openapi::api::core::v1::Pod;
use kube::runtime::controller::{self, Action, Controller};
use kube::runtime::reflector::{ObjectRef, Store};
use kube::runtime::watcher;
use kube::{Api, Client};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Watch configuration selecting the member pods of the cluster.
#[must_use]
pub fn member_watch_config(config: &ControllerConfig) -> watcher::Config {
    watcher::Config::default().labels(&config.cluster.member_selector())
}

/// Watch configuration selecting only the controller's own pod.
#[must_use]
pub fn self_watch_config(own: &PodIdentity) -> watcher::Config {
    watcher::Config::default().fields(&format!("metadata.name={}", own.name))
}

#[must_use]
pub fn self_pod_ref(own: &PodIdentity) -> ObjectRef<Pod> {
    ObjectRef::new(&own.name).within(&own.namespace)
}

/// Maps any member pod event to a reconciliation of the own pod.
pub fn own_pod_mapper(
    own: ObjectRef<Pod>,
) -> impl Fn(Pod) -> Option<ObjectRef<Pod>> + Send + Sync + 'static {
    move |_member| Some(own.clone())
}

fn member_api(client: Client, config: &ControllerConfig) -> Api<Pod> {
    match config.watch_namespace() {
        Some(namespace) => Api::namespaced(client, namespace),
        None => Api::all(client),
    }
}

/// Build the pod controller for the configured mode.
#[must_use]
pub fn build_controller(client: Client, config: &ControllerConfig) -> Controller<Pod> {
    let members = member_api(client.clone(), config);

    let controller = match &config.self_pod {
        Some(own) => {
            debug!(pod = %own.key(), "Mapping member events to own pod");
            Controller::new(
                Api::namespaced(client, &own.namespace),
                self_watch_config(own),
            )
            .watches(
                members,
                member_watch_config(config),
                own_pod_mapper(self_pod_ref(own)),
            )
        }
        None => Controller::new(members, member_watch_config(config)),
    };

    let concurrency = u16::try_from(config.workers).unwrap_or(u16::MAX);
    controller.with_config(controller::Config::default().concurrency(concurrency))
}

/// Failure counting and requeue decisions per pod.
pub struct RequeuePolicy {
    backoff: ItemExponentialBackoff,
    max_requeues: u32,
    resync_period: Duration,
    failures: Mutex<HashMap<ObjectRef<Pod>, u32>>,
}

impl RequeuePolicy {
    #[must_use]
    pub fn new(backoff: ItemExponentialBackoff, max_requeues: u32, resync_period: Duration) -> Self {
        Self {
            backoff,
            max_requeues,
            resync_period,
            failures: Mutex::new(HashMap::new()),
        }
    }

    /// Clear the failure count of `pod` and schedule its resync.
    pub fn on_success(&self, pod: &ObjectRef<Pod>) -> Action {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(pod);
        self.resync()
    }

    /// Record a failure of `pod` and decide when to retry it.
    pub fn on_failure(&self, pod: &ObjectRef<Pod>) -> Action {
        let mut failures = self.failures.lock().unwrap_or_else(PoisonError::into_inner);
        let count = failures.get(pod).copied().unwrap_or(0);

        if count >= self.max_requeues {
            failures.remove(pod);
            warn!(
                pod = %pod,
                requeues = count,
                "Dropping pod after repeated failures"
            );
            return self.resync();
        }

        failures.insert(pod.clone(), count + 1);
        Action::requeue(self.backoff.delay(count))
    }

    /// Failures recorded for `pod` since its last success or drop.
    #[must_use]
    pub fn failures_of(&self, pod: &ObjectRef<Pod>) -> u32 {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(pod)
            .copied()
            .unwrap_or(0)
    }

    fn resync(&self) -> Action {
        if self.resync_period.is_zero() {
            Action::await_change()
        } else {
            Action::requeue(self.resync_period)
        }
    }
}

/// Reconcile one cached pod.
///
/// # Errors
///
/// Returns the reconciler error; [`error_policy`] decides the retry.
pub async fn reconcile(pod: Arc<Pod>, ctx: Arc<Context>) -> Result<Action, ReconcileError> {
    ctx.reconciler.reconcile(&pod).await?;
    Ok(ctx.requeue.on_success(&ObjectRef::from_obj(pod.as_ref())))
}

pub fn error_policy(pod: Arc<Pod>, err: &ReconcileError, ctx: Arc<Context>) -> Action {
    let pod_ref = ObjectRef::from_obj(pod.as_ref());
    let action = ctx.requeue.on_failure(&pod_ref);
    debug!(
        pod = %pod_ref,
        error_type = err.kind(),
        next = ?action,
        "Requeue decided"
    );
    action
}

fn log_outcome(
    result: Result<(ObjectRef<Pod>, Action), controller::Error<ReconcileError, watcher::Error>>,
) {
    match result {
        Ok((pod, _)) => debug!(pod = %pod, "Reconciled"),
        Err(controller::Error::ObjectNotFound(pod)) => {
            debug!(pod = %pod, "Pod no longer cached, nothing to label");
        }
        Err(controller::Error::ReconcilerFailed(_, pod)) => {
            debug!(pod = %pod, "Reconciliation failed, error policy applied");
        }
        Err(e) => warn!(error = %e, "Pod controller error"),
    }
}

/// Wait until the pod cache holds the initial listing.
///
/// # Errors
///
/// Returns [`CacheSyncError::TimedOut`] when `timeout` elapses first and
/// [`CacheSyncError::WatcherStopped`] when the cache writer goes away.
pub async fn wait_for_cache_sync(store: &Store<Pod>, timeout: Duration) -> Result<(), CacheSyncError> {
    match tokio::time::timeout(timeout, store.wait_until_ready()).await {
        Ok(Ok(())) => {
            info!(pods = store.state().len(), "Pod cache synchronized");
            Ok(())
        }
        Ok(Err(_)) => Err(CacheSyncError::WatcherStopped),
        Err(_) => Err(CacheSyncError::TimedOut(timeout)),
    }
}

/// Run the pod controller until SIGINT or SIGTERM.
///
/// # Errors
///
/// Returns an error when the initial cache synchronization fails or the
/// controller task panics.
pub async fn run(client: Client, context: Arc<Context>) -> anyhow::Result<()> {
    let controller = build_controller(client, &context.config).shutdown_on_signal();
    let store = controller.store();
    let cache_sync_timeout = context.config.cache_sync_timeout;

    info!(
        workers = context.config.workers,
        self_monitoring = context.config.self_pod.is_some(),
        "Starting pod controller"
    );

    let mut task = tokio::spawn(async move {
        controller
            .run(reconcile, error_policy, context)
            .for_each(|result| {
                log_outcome(result);
                futures::future::ready(())
            })
            .await;
    });

    tokio::select! {
        synced = wait_for_cache_sync(&store, cache_sync_timeout) => {
            if let Err(e) = synced {
                error!(error = %e, "CRITICAL: initial pod cache synchronization failed");
                task.abort();
                return Err(e.into());
            }
        }
        joined = &mut task => {
            joined?;
            return Err(CacheSyncError::WatcherStopped.into());
        }
    }

    task.await?;
    info!("Pod controller stopped");
    Ok(())
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod controller_tests;
