// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Database custom resources read by the detectors.
//!
//! The database operator owns these resources; this controller only reads them.
//! Only the fields needed for primary detection are modelled, everything else in
//! the stored object is ignored during deserialization.
//!
//! # Resource Types
//!
//! - [`MySQL`] - A `MySQL` Group Replication cluster
//! - [`MongoDB`] - A `MongoDB` replica set or sharded cluster

use crate::constants::{
    GOVERNING_SERVICE_SUFFIX, MONGODB_CLIENT_CERT_ALIAS, MYSQL_SERVER_CERT_ALIAS,
};
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Reference to a secret in the resource's namespace.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SecretReference {
    /// Secret name
    pub name: String,
}

/// Per-alias certificate override inside a TLS configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CertificateSpec {
    /// Certificate alias (`server`, `client`, ...)
    pub alias: String,

    /// Custom secret holding the certificate for this alias
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_name: Option<String>,
}

/// TLS configuration of a database resource.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TLSConfig {
    /// Certificate overrides; aliases without an entry use the default secret name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificates: Option<Vec<CertificateSpec>>,
}

impl TLSConfig {
    /// Custom secret name configured for `alias`, if any.
    #[must_use]
    pub fn secret_name_for(&self, alias: &str) -> Option<&str> {
        self.certificates
            .as_ref()?
            .iter()
            .find(|cert| cert.alias == alias)
            .and_then(|cert| cert.secret_name.as_deref())
    }
}

/// Secret holding the certificate of `alias` for the resource `name`.
fn cert_secret_name(name: &str, tls: Option<&TLSConfig>, alias: &str) -> String {
    tls.and_then(|tls| tls.secret_name_for(alias))
        .map_or_else(|| format!("{name}-{alias}-cert"), str::to_string)
}

/// `MySQL` spec fields relevant to primary detection.
#[derive(CustomResource, Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "kubedb.com",
    version = "v1alpha2",
    kind = "MySQL",
    namespaced,
    doc = "MySQL is a MySQL Group Replication cluster managed by the database operator."
)]
#[serde(rename_all = "camelCase")]
pub struct MySQLSpec {
    /// TLS configuration; when set, connections are encrypted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<TLSConfig>,

    /// Whether clients must verify the server certificate
    #[serde(default, rename = "requireSSL")]
    pub require_ssl: bool,

    /// Secret holding the root credentials
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_secret: Option<SecretReference>,
}

impl MySQL {
    /// Secret holding the server certificate and its CA.
    #[must_use]
    pub fn server_cert_secret_name(&self) -> String {
        cert_secret_name(
            &self.name_any(),
            self.spec.tls.as_ref(),
            MYSQL_SERVER_CERT_ALIAS,
        )
    }
}

/// `MongoDB` TLS enforcement mode.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum SSLMode {
    #[default]
    #[serde(rename = "disabled")]
    Disabled,
    #[serde(rename = "allowSSL")]
    AllowSSL,
    #[serde(rename = "preferSSL")]
    PreferSSL,
    #[serde(rename = "requireSSL")]
    RequireSSL,
}

/// `MongoDB` spec fields relevant to primary detection.
#[derive(CustomResource, Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "kubedb.com",
    version = "v1alpha2",
    kind = "MongoDB",
    namespaced,
    doc = "MongoDB is a MongoDB replica set or sharded cluster managed by the database operator."
)]
#[serde(rename_all = "camelCase")]
pub struct MongoDBSpec {
    /// TLS enforcement mode
    #[serde(default, rename = "sslMode")]
    pub ssl_mode: SSLMode,

    /// TLS configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<TLSConfig>,

    /// Secret holding the root credentials
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_secret: Option<SecretReference>,
}

impl MongoDB {
    /// Secret holding the client certificate used for X.509 authentication.
    #[must_use]
    pub fn client_cert_secret_name(&self) -> String {
        cert_secret_name(
            &self.name_any(),
            self.spec.tls.as_ref(),
            MONGODB_CLIENT_CERT_ALIAS,
        )
    }

    /// Whether clients must authenticate with a client certificate.
    #[must_use]
    pub fn requires_tls(&self) -> bool {
        self.spec.ssl_mode == SSLMode::RequireSSL
    }
}

/// Governing service name of the statefulset that owns `pod_name`.
///
/// Statefulset pods are named `<statefulset>-<ordinal>`; the governing service is
/// `<statefulset>-pods`.
#[must_use]
pub fn governing_service_name(pod_name: &str) -> String {
    let statefulset = pod_name
        .rsplit_once('-')
        .map_or(pod_name, |(prefix, _)| prefix);
    format!("{statefulset}-{GOVERNING_SERVICE_SUFFIX}")
}

#[cfg(test)]
#[path = "crd_tests.rs"]
mod crd_tests;
