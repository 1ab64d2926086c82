// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `MySQL` Group Replication primary detection.
//!
//! The detector connects to the member's `MySQL` process, asks for the host of
//! the ONLINE member whose id is the recorded primary member id, and compares
//! that host with the pod's addresses and name. An unreachable server is retried
//! every 5 seconds for up to 5 minutes; any other failure is returned at once.

use crate::cluster::ClusterIdentity;
use crate::constants::{MYSQL_DATABASE, MYSQL_LOOPBACK_HOST, MYSQL_PORT, SECRET_KEY_CA_CERT};
use crate::credentials::{CredentialProvider, CredentialRequest, RootCredentials};
use crate::detector::DetectPrimary;
use crate::errors::{DetectError, ExecError};
use crate::kube_api::{ClusterSpecSource, SecretSource};
use crate::retry::{poll_immediate, PollError, PollSettings};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::ResourceExt;
use sqlx::mysql::{MySqlConnectOptions, MySqlSslMode};
use sqlx::{ConnectOptions, Connection};
use std::sync::Arc;
use tracing::debug;

/// Host of the ONLINE member holding the primary member id.
///
/// `global_status` carries the primary id on 5.7; 8.x also exposes it there, so the
/// join works on both.
pub const PRIMARY_MEMBER_QUERY: &str = "SELECT members.MEMBER_HOST \
     FROM performance_schema.replication_group_members AS members \
     INNER JOIN performance_schema.global_status AS status \
     ON members.MEMBER_ID = status.VARIABLE_VALUE \
     WHERE status.VARIABLE_NAME = 'group_replication_primary_member' \
     AND members.MEMBER_STATE = 'ONLINE'";

/// TLS mode of a `MySQL` connection.
#[derive(Clone, PartialEq, Eq)]
pub enum MySqlTls {
    Disabled,
    /// Encrypted, server certificate not verified
    SkipVerify,
    /// Encrypted, server certificate verified against this PEM CA
    VerifyCa { ca_pem: Vec<u8> },
}

impl std::fmt::Debug for MySqlTls {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MySqlTls::Disabled => f.write_str("Disabled"),
            MySqlTls::SkipVerify => f.write_str("SkipVerify"),
            MySqlTls::VerifyCa { ca_pem } => write!(f, "VerifyCa({} bytes)", ca_pem.len()),
        }
    }
}

/// Everything an executor needs for one detection query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MySqlTarget {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub credentials: RootCredentials,
    pub tls: MySqlTls,
}

impl MySqlTarget {
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Runs the primary member query over one short-lived connection.
#[async_trait]
pub trait MySqlExecutor: Send + Sync {
    /// Host of the current primary, `None` when no row matched.
    async fn primary_member_host(&self, target: &MySqlTarget) -> Result<Option<String>, ExecError>;
}

/// [`MySqlExecutor`] on a single `sqlx` connection.
#[derive(Clone, Copy, Debug, Default)]
pub struct SqlxMySqlExecutor;

fn classify_connect_error(endpoint: &str, err: sqlx::Error) -> ExecError {
    match err {
        sqlx::Error::Io(io) => ExecError::Unreachable {
            endpoint: endpoint.to_string(),
            reason: io.to_string(),
        },
        other => ExecError::Connect {
            endpoint: endpoint.to_string(),
            reason: other.to_string(),
        },
    }
}

#[async_trait]
impl MySqlExecutor for SqlxMySqlExecutor {
    async fn primary_member_host(&self, target: &MySqlTarget) -> Result<Option<String>, ExecError> {
        let endpoint = target.endpoint();

        let options = MySqlConnectOptions::new()
            .host(&target.host)
            .port(target.port)
            .username(&target.credentials.username)
            .password(&target.credentials.password)
            .database(&target.database);
        let options = match &target.tls {
            MySqlTls::Disabled => options.ssl_mode(MySqlSslMode::Disabled),
            MySqlTls::SkipVerify => options.ssl_mode(MySqlSslMode::Required),
            MySqlTls::VerifyCa { ca_pem } => options
                .ssl_mode(MySqlSslMode::VerifyCa)
                .ssl_ca_from_pem(ca_pem.clone()),
        };

        let mut conn = options
            .connect()
            .await
            .map_err(|e| classify_connect_error(&endpoint, e))?;

        let host = sqlx::query_scalar::<_, String>(PRIMARY_MEMBER_QUERY)
            .fetch_optional(&mut conn)
            .await
            .map_err(|e| ExecError::Query {
                endpoint: endpoint.clone(),
                reason: e.to_string(),
            });

        if let Err(e) = conn.close().await {
            debug!(endpoint = %endpoint, error = %e, "Failed to close MySQL connection cleanly");
        }

        host
    }
}

/// Which address the detector dials.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MySqlHost {
    /// The local `MySQL` process (the controller runs beside it)
    Loopback,
    /// The pod's own IP address
    PodIp,
}

/// Addresses of a pod: `status.podIPs`, or `status.podIP` when the list is empty.
#[must_use]
pub fn pod_ips(pod: &Pod) -> Vec<String> {
    let Some(status) = pod.status.as_ref() else {
        return Vec::new();
    };

    let ips: Vec<String> = status
        .pod_ips
        .iter()
        .flatten()
        .map(|pod_ip| pod_ip.ip.clone())
        .filter(|ip| !ip.is_empty())
        .collect();
    if !ips.is_empty() {
        return ips;
    }

    status
        .pod_ip
        .iter()
        .filter(|ip| !ip.is_empty())
        .cloned()
        .collect()
}

/// Whether the primary member `host` designates this pod.
///
/// The host matches when it equals one of the pod's IPs, or when its DNS short
/// name (text before the first dot) equals the pod name.
#[must_use]
pub fn host_matches_pod(host: &str, pod_ips: &[String], pod_name: &str) -> bool {
    if pod_ips.iter().any(|ip| ip == host) {
        return true;
    }
    host.split('.').next() == Some(pod_name)
}

/// Primary detector for `MySQL` Group Replication.
pub struct MySqlDetector {
    cluster: ClusterIdentity,
    specs: Arc<dyn ClusterSpecSource>,
    secrets: Arc<dyn SecretSource>,
    credentials: Arc<dyn CredentialProvider>,
    executor: Arc<dyn MySqlExecutor>,
    host: MySqlHost,
    poll: PollSettings,
}

impl MySqlDetector {
    #[must_use]
    pub fn new(
        cluster: ClusterIdentity,
        specs: Arc<dyn ClusterSpecSource>,
        secrets: Arc<dyn SecretSource>,
        credentials: Arc<dyn CredentialProvider>,
        executor: Arc<dyn MySqlExecutor>,
        host: MySqlHost,
    ) -> Self {
        Self {
            cluster,
            specs,
            secrets,
            credentials,
            executor,
            host,
            poll: PollSettings::default(),
        }
    }

    #[must_use]
    pub fn with_poll_settings(mut self, poll: PollSettings) -> Self {
        self.poll = poll;
        self
    }

    /// Resolve credentials, TLS and address for `pod`.
    async fn target(&self, pod: &Pod) -> Result<MySqlTarget, DetectError> {
        let namespace = pod.namespace().unwrap_or_default();
        let pod_name = pod.name_any();

        let resource = self
            .specs
            .mysql(&namespace, &self.cluster.name)
            .await
            .map_err(|source| DetectError::Kube {
                what: format!("MySQL {namespace}/{}", self.cluster.name),
                source,
            })?;

        let credentials = self
            .credentials
            .root_credentials(CredentialRequest {
                namespace: &namespace,
                cluster: &self.cluster.name,
                pod: &pod_name,
                auth_secret: resource.spec.auth_secret.as_ref().map(|s| s.name.as_str()),
            })
            .await?;

        let tls = if resource.spec.tls.is_some() {
            let secret = resource.server_cert_secret_name();
            let data = self
                .secrets
                .secret_data(&namespace, &secret)
                .await
                .map_err(|source| DetectError::Kube {
                    what: format!("secret {namespace}/{secret}"),
                    source,
                })?;
            let ca_pem = data
                .get(SECRET_KEY_CA_CERT)
                .cloned()
                .ok_or_else(|| DetectError::MissingSecretKey {
                    secret: secret.clone(),
                    key: SECRET_KEY_CA_CERT.to_string(),
                })?;

            if resource.spec.require_ssl {
                MySqlTls::VerifyCa { ca_pem }
            } else {
                MySqlTls::SkipVerify
            }
        } else {
            MySqlTls::Disabled
        };

        let host = match self.host {
            MySqlHost::Loopback => MYSQL_LOOPBACK_HOST.to_string(),
            MySqlHost::PodIp => pod_ips(pod).into_iter().next().ok_or_else(|| {
                ExecError::Connect {
                    endpoint: format!("{namespace}/{pod_name}"),
                    reason: "pod has no IP address yet".to_string(),
                }
            })?,
        };

        Ok(MySqlTarget {
            host,
            port: MYSQL_PORT,
            database: MYSQL_DATABASE.to_string(),
            credentials,
            tls,
        })
    }
}

#[async_trait]
impl DetectPrimary for MySqlDetector {
    async fn is_primary(&self, pod: &Pod) -> Result<bool, DetectError> {
        let target = self.target(pod).await?;
        let namespace = pod.namespace().unwrap_or_default();

        let host = poll_immediate(
            self.poll,
            "mysql primary member query",
            || self.executor.primary_member_host(&target),
            ExecError::is_transient,
        )
        .await
        .map_err(|err| match err {
            PollError::Failed(e) => DetectError::Exec(e),
            PollError::TimedOut {
                elapsed,
                last_error,
                ..
            } => DetectError::ConnectTimeout {
                elapsed,
                last_error: last_error.to_string(),
            },
        })?
        .ok_or_else(|| DetectError::NoPrimaryRow {
            cluster: format!("{namespace}/{}", self.cluster.name),
        })?;

        let ips = pod_ips(pod);
        let is_primary = host_matches_pod(&host, &ips, &pod.name_any());
        debug!(
            pod = %pod.name_any(),
            primary_host = %host,
            pod_ips = ?ips,
            primary = is_primary,
            "Compared MySQL primary member host with pod"
        );
        Ok(is_primary)
    }
}

#[cfg(test)]
#[path = "mysql_tests.rs"]
mod mysql_tests;
