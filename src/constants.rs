// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the primary labeler.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// API Constants
// ============================================================================

/// Kind name for the `MySQL` resource (also the value of the kind label)
pub const KIND_MYSQL: &str = "MySQL";

/// Kind name for the `MongoDB` resource (also the value of the kind label)
pub const KIND_MONGODB: &str = "MongoDB";

/// Field manager used for label patches
pub const FIELD_MANAGER: &str = "primary-labeler";

// ============================================================================
// Database Protocol Constants
// ============================================================================

/// Well-known `MySQL` port
pub const MYSQL_PORT: u16 = 3306;

/// Database selected when connecting to `MySQL`
pub const MYSQL_DATABASE: &str = "mysql";

/// Host used to reach `MySQL` when running as a sidecar of the monitored pod
pub const MYSQL_LOOPBACK_HOST: &str = "127.0.0.1";

/// Well-known `MongoDB` port
pub const MONGODB_PORT: u16 = 27017;

/// Database the `isMaster` command is issued against
pub const MONGODB_ADMIN_DATABASE: &str = "admin";

/// Time the `MongoDB` driver waits for the target server before giving up on one attempt
pub const MONGODB_SERVER_SELECTION_TIMEOUT_SECS: u64 = 5;

/// Name of the client certificate bundle (certificate followed by key) written for X.509 auth
pub const MONGODB_CLIENT_PEM_FILE: &str = "client.pem";

/// Suffix appended to a statefulset name to form its governing service name
pub const GOVERNING_SERVICE_SUFFIX: &str = "pods";

/// Certificate alias of the `MySQL` server certificate
pub const MYSQL_SERVER_CERT_ALIAS: &str = "server";

/// Certificate alias of the `MongoDB` client certificate
pub const MONGODB_CLIENT_CERT_ALIAS: &str = "client";

// ============================================================================
// Secret Keys
// ============================================================================

/// CA certificate key in TLS secrets
pub const SECRET_KEY_CA_CERT: &str = "ca.crt";

/// Certificate key in TLS secrets
pub const SECRET_KEY_TLS_CERT: &str = "tls.crt";

/// Private key in TLS secrets
pub const SECRET_KEY_TLS_KEY: &str = "tls.key";

/// Username key in basic-auth secrets
pub const SECRET_KEY_USERNAME: &str = "username";

/// Password key in basic-auth secrets
pub const SECRET_KEY_PASSWORD: &str = "password";

// ============================================================================
// Connection Retry Constants
// ============================================================================

/// Interval between connection attempts while the database is unreachable (5 seconds)
pub const CONNECT_RETRY_INTERVAL_SECS: u64 = 5;

/// Total time spent retrying an unreachable database (5 minutes)
pub const CONNECT_RETRY_CEILING_SECS: u64 = 300;

// ============================================================================
// Requeue Constants
// ============================================================================

/// Default number of pods reconciled concurrently
pub const DEFAULT_WORKERS: usize = 2;

/// Default number of requeues before a failing pod is dropped
pub const DEFAULT_MAX_REQUEUES: u32 = 5;

/// Base delay of the per-pod exponential requeue backoff (5ms)
pub const REQUEUE_BASE_DELAY_MILLIS: u64 = 5;

/// Maximum delay of the per-pod exponential requeue backoff (1000 seconds)
pub const REQUEUE_MAX_DELAY_SECS: u64 = 1000;

// ============================================================================
// Watch Constants
// ============================================================================

/// Default period after which a reconciled pod is reconciled again (10 minutes)
pub const DEFAULT_RESYNC_PERIOD_SECS: u64 = 600;

/// Default time allowed for the initial cache synchronization
pub const DEFAULT_CACHE_SYNC_TIMEOUT_SECS: u64 = 120;

// ============================================================================
// Credential Constants
// ============================================================================

/// Default environment variable holding the `MySQL` root username
pub const DEFAULT_MYSQL_ROOT_USERNAME_ENV: &str = "MYSQL_ROOT_USERNAME";

/// Default environment variable holding the `MySQL` root password
pub const DEFAULT_MYSQL_ROOT_PASSWORD_ENV: &str = "MYSQL_ROOT_PASSWORD";

/// Default directory where client certificates are materialized
pub const DEFAULT_CERT_DIR: &str = "/tmp/primary-labeler/certs";

// ============================================================================
// Runtime Constants
// ============================================================================

/// Number of worker threads for Tokio runtime
pub const TOKIO_WORKER_THREADS: usize = 4;
