// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Root credential providers for the database connections.
//!
//! `MySQL` root credentials come from environment variables of the sidecar;
//! `MongoDB` root credentials come from the auth secret referenced by the
//! cluster resource. Both are injected into the detectors as a
//! [`CredentialProvider`].

use crate::config::CredentialEnv;
use crate::constants::{SECRET_KEY_PASSWORD, SECRET_KEY_USERNAME};
use crate::errors::DetectError;
use crate::kube_api::SecretSource;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Username/password pair.
#[derive(Clone, PartialEq, Eq)]
pub struct RootCredentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for RootCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RootCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// What a provider may need to resolve credentials.
#[derive(Clone, Copy, Debug)]
pub struct CredentialRequest<'a> {
    pub namespace: &'a str,
    /// Name of the database cluster resource
    pub cluster: &'a str,
    /// Pod the connection is made for
    pub pod: &'a str,
    /// Auth secret referenced by the cluster resource
    pub auth_secret: Option<&'a str>,
}

/// Source of the database root credentials.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn root_credentials(
        &self,
        request: CredentialRequest<'_>,
    ) -> Result<RootCredentials, DetectError>;
}

type EnvLookup = dyn Fn(&str) -> Option<String> + Send + Sync;

/// Credentials read from environment variables.
pub struct EnvCredentialProvider {
    names: CredentialEnv,
    lookup: Arc<EnvLookup>,
}

impl EnvCredentialProvider {
    /// Provider reading the process environment.
    #[must_use]
    pub fn from_process_env(names: CredentialEnv) -> Self {
        Self::with_lookup(names, |name| std::env::var(name).ok())
    }

    /// Provider reading variables through `lookup`.
    pub fn with_lookup<F>(names: CredentialEnv, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            names,
            lookup: Arc::new(lookup),
        }
    }

    fn require(&self, variable: &str, request: CredentialRequest<'_>) -> Result<String, DetectError> {
        (self.lookup)(variable).ok_or_else(|| DetectError::MissingCredential {
            variable: variable.to_string(),
            pod: format!("{}/{}", request.namespace, request.pod),
        })
    }
}

#[async_trait]
impl CredentialProvider for EnvCredentialProvider {
    async fn root_credentials(
        &self,
        request: CredentialRequest<'_>,
    ) -> Result<RootCredentials, DetectError> {
        Ok(RootCredentials {
            username: self.require(&self.names.username, request)?,
            password: self.require(&self.names.password, request)?,
        })
    }
}

/// Credentials read from the cluster's basic-auth secret.
pub struct SecretCredentialProvider {
    secrets: Arc<dyn SecretSource>,
}

impl SecretCredentialProvider {
    #[must_use]
    pub fn new(secrets: Arc<dyn SecretSource>) -> Self {
        Self { secrets }
    }
}

#[async_trait]
impl CredentialProvider for SecretCredentialProvider {
    async fn root_credentials(
        &self,
        request: CredentialRequest<'_>,
    ) -> Result<RootCredentials, DetectError> {
        let secret = request
            .auth_secret
            .ok_or_else(|| DetectError::MissingAuthSecret {
                cluster: format!("{}/{}", request.namespace, request.cluster),
            })?;

        let data = self
            .secrets
            .secret_data(request.namespace, secret)
            .await
            .map_err(|source| DetectError::Kube {
                what: format!("secret {}/{secret}", request.namespace),
                source,
            })?;

        Ok(RootCredentials {
            username: secret_string(&data, secret, SECRET_KEY_USERNAME)?,
            password: secret_string(&data, secret, SECRET_KEY_PASSWORD)?,
        })
    }
}

/// Read a UTF-8 value from decoded secret data.
pub(crate) fn secret_string(
    data: &BTreeMap<String, Vec<u8>>,
    secret: &str,
    key: &str,
) -> Result<String, DetectError> {
    data.get(key)
        .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
        .ok_or_else(|| DetectError::MissingSecretKey {
            secret: secret.to_string(),
            key: key.to_string(),
        })
}

#[cfg(test)]
#[path = "credentials_tests.rs"]
mod credentials_tests;
