// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for context.rs

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::cluster::ClusterIdentity;
    use crate::config::PodIdentity;
    use crate::test_support::{FakeClusterSpecs, FakePodClient, FakeSecrets, CLUSTER};
    use kube::runtime::controller::Action;
    use kube::runtime::reflector::ObjectRef;
    use std::time::Duration;

    fn collaborators() -> Collaborators {
        Collaborators {
            pods: Arc::new(FakePodClient::default()),
            specs: Arc::new(FakeClusterSpecs::default()),
            secrets: Arc::new(FakeSecrets::default()),
        }
    }

    fn config(kind: ClusterKind) -> ControllerConfig {
        ControllerConfig::new(ClusterIdentity::new(kind, CLUSTER), "demo")
    }

    #[test]
    fn test_detector_follows_cluster_kind() {
        let mysql = build_detector(&config(ClusterKind::MySql), &collaborators());
        assert_eq!(mysql.kind(), ClusterKind::MySql);

        let mongodb = build_detector(&config(ClusterKind::MongoDb), &collaborators());
        assert_eq!(mongodb.kind(), ClusterKind::MongoDb);
    }

    #[test]
    fn test_mysql_host_depends_on_self_monitoring() {
        let mut cfg = config(ClusterKind::MySql);
        assert_eq!(mysql_host(&cfg), MySqlHost::PodIp);

        cfg.self_pod = Some(PodIdentity::new("demo", "my-group-0"));
        assert_eq!(mysql_host(&cfg), MySqlHost::Loopback);
    }

    #[test]
    fn test_requeue_policy_follows_config() {
        let mut cfg = config(ClusterKind::MySql);
        cfg.max_requeues = 1;
        cfg.resync_period = Duration::from_secs(30);

        let context = Context::new(cfg, &collaborators());
        let pod = ObjectRef::new("my-group-0").within("demo");

        assert_eq!(
            context.requeue.on_failure(&pod),
            Action::requeue(Duration::from_millis(5))
        );
        assert_eq!(context.requeue.on_failure(&pod), Action::await_change());
        assert_eq!(
            context.requeue.on_success(&pod),
            Action::requeue(Duration::from_secs(30))
        );
    }
}
