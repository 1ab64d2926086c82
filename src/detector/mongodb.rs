// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `MongoDB` replica set primary detection.
//!
//! The member is addressed through its stable DNS name under the statefulset's
//! governing service and queried with a direct connection, so the driver talks
//! to that member only. Clusters running with `sslMode: requireSSL` authenticate
//! with the client certificate; every other cluster uses the root credentials
//! from its auth secret.

use crate::cluster::ClusterIdentity;
use crate::constants::{
    MONGODB_ADMIN_DATABASE, MONGODB_CLIENT_PEM_FILE, MONGODB_PORT,
    MONGODB_SERVER_SELECTION_TIMEOUT_SECS, SECRET_KEY_CA_CERT, SECRET_KEY_TLS_CERT,
    SECRET_KEY_TLS_KEY,
};
use crate::credentials::{CredentialProvider, CredentialRequest, RootCredentials};
use crate::crd::{governing_service_name, MongoDB};
use crate::detector::DetectPrimary;
use crate::errors::{DetectError, ExecError};
use crate::kube_api::{ClusterSpecSource, SecretSource};
use crate::retry::{poll_immediate, PollError, PollSettings};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::ResourceExt;
use mongodb::bson::{doc, Document};
use mongodb::error::ErrorKind;
use mongodb::options::{
    AuthMechanism, ClientOptions, Credential, ServerAddress, Tls, TlsOptions,
};
use mongodb::Client;
use std::collections::BTreeMap;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Owner read/write only.
const PRIVATE_FILE_MODE: u32 = 0o600;

/// How the detector authenticates.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MongoAuth {
    /// Root username/password against `admin`
    Basic(RootCredentials),
    /// TLS with client certificate authentication
    X509 {
        ca_file: PathBuf,
        /// Certificate followed by its private key
        cert_key_file: PathBuf,
    },
}

/// Everything an executor needs for one `isMaster` call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MongoTarget {
    pub host: String,
    pub port: u16,
    pub auth: MongoAuth,
}

impl MongoTarget {
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Runs `isMaster` over one short-lived client.
#[async_trait]
pub trait MongoExecutor: Send + Sync {
    async fn is_master(&self, target: &MongoTarget) -> Result<Document, ExecError>;
}

/// [`MongoExecutor`] on the official driver.
#[derive(Clone, Copy, Debug, Default)]
pub struct DriverMongoExecutor;

impl DriverMongoExecutor {
    fn client_options(target: &MongoTarget) -> ClientOptions {
        let mut options = ClientOptions::default();
        options.hosts = vec![ServerAddress::Tcp {
            host: target.host.clone(),
            port: Some(target.port),
        }];
        options.direct_connection = Some(true);
        options.server_selection_timeout =
            Some(Duration::from_secs(MONGODB_SERVER_SELECTION_TIMEOUT_SECS));

        let mut credential = Credential::default();
        match &target.auth {
            MongoAuth::Basic(creds) => {
                credential.username = Some(creds.username.clone());
                credential.password = Some(creds.password.clone());
                credential.source = Some(MONGODB_ADMIN_DATABASE.to_string());
            }
            MongoAuth::X509 {
                ca_file,
                cert_key_file,
            } => {
                credential.mechanism = Some(AuthMechanism::MongoDbX509);

                let mut tls = TlsOptions::default();
                tls.ca_file_path = Some(ca_file.clone());
                tls.cert_key_file_path = Some(cert_key_file.clone());
                options.tls = Some(Tls::Enabled(tls));
            }
        }
        options.credential = Some(credential);
        options
    }
}

fn classify_driver_error(endpoint: &str, err: &mongodb::error::Error) -> ExecError {
    match err.kind.as_ref() {
        ErrorKind::ServerSelection { .. } | ErrorKind::Io(_) => ExecError::Unreachable {
            endpoint: endpoint.to_string(),
            reason: err.to_string(),
        },
        ErrorKind::Authentication { .. } | ErrorKind::InvalidArgument { .. } => {
            ExecError::Connect {
                endpoint: endpoint.to_string(),
                reason: err.to_string(),
            }
        }
        _ => ExecError::Query {
            endpoint: endpoint.to_string(),
            reason: err.to_string(),
        },
    }
}

#[async_trait]
impl MongoExecutor for DriverMongoExecutor {
    async fn is_master(&self, target: &MongoTarget) -> Result<Document, ExecError> {
        let endpoint = target.endpoint();

        let client = Client::with_options(Self::client_options(target)).map_err(|e| {
            ExecError::Connect {
                endpoint: endpoint.clone(),
                reason: e.to_string(),
            }
        })?;

        let reply = client
            .database(MONGODB_ADMIN_DATABASE)
            .run_command(doc! { "isMaster": 1 })
            .await
            .map_err(|e| classify_driver_error(&endpoint, &e));

        client.shutdown().await;
        reply
    }
}

/// Stable DNS name of a replica set member pod.
#[must_use]
pub fn member_host(pod_name: &str, namespace: &str) -> String {
    format!(
        "{pod_name}.{}.{namespace}.svc",
        governing_service_name(pod_name)
    )
}

/// Primary flag of an `isMaster` reply; absent or non-boolean reads as `false`.
#[must_use]
pub fn reply_is_primary(reply: &Document) -> bool {
    reply.get_bool("ismaster").unwrap_or(false)
}

/// Write the CA and client bundle of a certificate secret under `dir`.
///
/// Returns the CA file and the certificate+key bundle paths.
pub async fn store_client_certificates(
    dir: &Path,
    secret: &str,
    data: &BTreeMap<String, Vec<u8>>,
) -> Result<(PathBuf, PathBuf), DetectError> {
    let value = |key: &str| {
        data.get(key).ok_or_else(|| DetectError::MissingSecretKey {
            secret: secret.to_string(),
            key: key.to_string(),
        })
    };
    let ca = value(SECRET_KEY_CA_CERT)?;
    let cert = value(SECRET_KEY_TLS_CERT)?;
    let key = value(SECRET_KEY_TLS_KEY)?;

    let store_err = |source: std::io::Error| DetectError::CertificateStore {
        path: dir.display().to_string(),
        source,
    };

    tokio::fs::create_dir_all(dir).await.map_err(store_err)?;

    let ca_file = dir.join(SECRET_KEY_CA_CERT);
    tokio::fs::write(&ca_file, ca).await.map_err(store_err)?;

    let mut bundle = cert.clone();
    if !bundle.ends_with(b"\n") {
        bundle.push(b'\n');
    }
    bundle.extend_from_slice(key);
    let cert_key_file = dir.join(MONGODB_CLIENT_PEM_FILE);
    write_private(&cert_key_file, &bundle)
        .await
        .map_err(store_err)?;

    Ok((ca_file, cert_key_file))
}

/// Write `contents` to a file readable only by its owner.
async fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(PRIVATE_FILE_MODE)
        .open(path)
        .await?;
    // mode only applies on creation
    file.set_permissions(std::fs::Permissions::from_mode(PRIVATE_FILE_MODE))
        .await?;
    file.write_all(contents).await?;
    file.flush().await
}

/// Primary detector for `MongoDB` replica sets.
pub struct MongoDetector {
    cluster: ClusterIdentity,
    specs: Arc<dyn ClusterSpecSource>,
    secrets: Arc<dyn SecretSource>,
    credentials: Arc<dyn CredentialProvider>,
    executor: Arc<dyn MongoExecutor>,
    cert_dir: PathBuf,
    poll: PollSettings,
}

impl MongoDetector {
    #[must_use]
    pub fn new(
        cluster: ClusterIdentity,
        specs: Arc<dyn ClusterSpecSource>,
        secrets: Arc<dyn SecretSource>,
        credentials: Arc<dyn CredentialProvider>,
        executor: Arc<dyn MongoExecutor>,
        cert_dir: PathBuf,
    ) -> Self {
        Self {
            cluster,
            specs,
            secrets,
            credentials,
            executor,
            cert_dir,
            poll: PollSettings::default(),
        }
    }

    #[must_use]
    pub fn with_poll_settings(mut self, poll: PollSettings) -> Self {
        self.poll = poll;
        self
    }

    async fn auth(
        &self,
        resource: &MongoDB,
        namespace: &str,
        pod_name: &str,
    ) -> Result<MongoAuth, DetectError> {
        if resource.requires_tls() {
            let secret = resource.client_cert_secret_name();
            let data = self
                .secrets
                .secret_data(namespace, &secret)
                .await
                .map_err(|source| DetectError::Kube {
                    what: format!("secret {namespace}/{secret}"),
                    source,
                })?;
            let dir = self.cert_dir.join(namespace).join(&self.cluster.name);
            let (ca_file, cert_key_file) = store_client_certificates(&dir, &secret, &data).await?;
            return Ok(MongoAuth::X509 {
                ca_file,
                cert_key_file,
            });
        }

        let credentials = self
            .credentials
            .root_credentials(CredentialRequest {
                namespace,
                cluster: &self.cluster.name,
                pod: pod_name,
                auth_secret: resource.spec.auth_secret.as_ref().map(|s| s.name.as_str()),
            })
            .await?;
        Ok(MongoAuth::Basic(credentials))
    }
}

#[async_trait]
impl DetectPrimary for MongoDetector {
    async fn is_primary(&self, pod: &Pod) -> Result<bool, DetectError> {
        let namespace = pod.namespace().unwrap_or_default();
        let pod_name = pod.name_any();

        let resource = self
            .specs
            .mongodb(&namespace, &self.cluster.name)
            .await
            .map_err(|source| DetectError::Kube {
                what: format!("MongoDB {namespace}/{}", self.cluster.name),
                source,
            })?;

        let target = MongoTarget {
            host: member_host(&pod_name, &namespace),
            port: MONGODB_PORT,
            auth: self.auth(&resource, &namespace, &pod_name).await?,
        };

        let reply = poll_immediate(
            self.poll,
            "mongodb isMaster",
            || self.executor.is_master(&target),
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
        })?;

        let is_primary = reply_is_primary(&reply);
        debug!(pod = %pod_name, endpoint = %target.endpoint(), primary = is_primary, "isMaster answered");
        Ok(is_primary)
    }
}

#[cfg(test)]
#[path = "mongodb_tests.rs"]
mod mongodb_tests;
