// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::Result;
use clap::{ArgAction, Parser};
use kube::Client;
use primary_labeler::{
    cluster::{ClusterIdentity, ClusterKind},
    config::{ControllerConfig, CredentialEnv, DemotionPolicy, PodIdentity},
    constants::{
        DEFAULT_CACHE_SYNC_TIMEOUT_SECS, DEFAULT_CERT_DIR, DEFAULT_MAX_REQUEUES,
        DEFAULT_MYSQL_ROOT_PASSWORD_ENV, DEFAULT_MYSQL_ROOT_USERNAME_ENV,
        DEFAULT_RESYNC_PERIOD_SECS, DEFAULT_WORKERS, TOKIO_WORKER_THREADS,
    },
    context::{Collaborators, Context},
    controller,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Labels the primary member of a `MySQL` Group Replication or `MongoDB` replica set.
#[derive(Parser, Debug, Clone)]
#[command(name = "primary-labeler", version, about)]
struct Options {
    /// Database kind: mysql or mongodb
    #[arg(long, env = "DB_KIND")]
    db_kind: ClusterKind,

    /// Name of the database custom resource
    #[arg(long, env = "DB_NAME")]
    db_name: String,

    /// Own pod name; when set only this pod is evaluated
    #[arg(long, env = "POD_NAME")]
    pod_name: Option<String>,

    /// Namespace the controller runs in
    #[arg(long, env = "POD_NAMESPACE", default_value = "default")]
    pod_namespace: String,

    /// Watch only the controller's namespace
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    restrict_to_operator_namespace: bool,

    /// Pods reconciled concurrently
    #[arg(long, default_value_t = DEFAULT_WORKERS)]
    workers: usize,

    /// Requeues of a failing pod before it is dropped
    #[arg(long, default_value_t = DEFAULT_MAX_REQUEUES)]
    max_requeues: u32,

    /// Seconds between full resyncs of the pod cache (0 disables)
    #[arg(long, default_value_t = DEFAULT_RESYNC_PERIOD_SECS)]
    resync_period: u64,

    /// Seconds allowed for the initial cache synchronization
    #[arg(long, default_value_t = DEFAULT_CACHE_SYNC_TIMEOUT_SECS)]
    cache_sync_timeout: u64,

    /// Environment variable holding the MySQL root username
    #[arg(long, default_value = DEFAULT_MYSQL_ROOT_USERNAME_ENV)]
    mysql_root_username_env: String,

    /// Environment variable holding the MySQL root password
    #[arg(long, default_value = DEFAULT_MYSQL_ROOT_PASSWORD_ENV)]
    mysql_root_password_env: String,

    /// Directory for client certificates
    #[arg(long, default_value = DEFAULT_CERT_DIR)]
    cert_dir: PathBuf,

    /// Treatment of stale primary labels: relabel or remove
    #[arg(long, default_value = "relabel")]
    demotion: DemotionPolicy,
}

impl Options {
    fn into_config(self) -> ControllerConfig {
        let mut config = ControllerConfig::new(
            ClusterIdentity::new(self.db_kind, self.db_name),
            self.pod_namespace.clone(),
        );
        config.self_pod = self
            .pod_name
            .map(|name| PodIdentity::new(self.pod_namespace, name));
        config.restrict_to_operator_namespace = self.restrict_to_operator_namespace;
        config.workers = self.workers;
        config.max_requeues = self.max_requeues;
        config.resync_period = Duration::from_secs(self.resync_period);
        config.cache_sync_timeout = Duration::from_secs(self.cache_sync_timeout);
        config.credential_env = CredentialEnv {
            username: self.mysql_root_username_env,
            password: self.mysql_root_password_env,
        };
        config.cert_dir = self.cert_dir;
        config.demotion = self.demotion;
        config
    }
}

fn main() -> Result<()> {
    let options = Options::parse();

    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("primary-labeler")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(options.into_config()))
}

fn init_tracing() {
    // Respects RUST_LOG, defaults to INFO; RUST_LOG_FORMAT=json switches to JSON output
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }
}

async fn async_main(config: ControllerConfig) -> Result<()> {
    init_tracing();

    info!(
        cluster_kind = %config.kind(),
        cluster = %config.cluster.name,
        namespace = %config.operator_namespace,
        self_pod = ?config.self_pod.as_ref().map(PodIdentity::key),
        all_namespaces = !config.restrict_to_operator_namespace,
        workers = config.workers,
        "Starting primary labeler"
    );

    debug!("Initializing Kubernetes client");
    let client = Client::try_default().await?;

    let context = Context::new(config, &Collaborators::from_client(client.clone()));

    controller::run(client, Arc::new(context)).await?;

    info!("Primary labeler stopped");
    Ok(())
}
