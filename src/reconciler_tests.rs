// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `reconciler.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::config::DemotionPolicy;
    use crate::errors::DetectError;
    use crate::labels::{ROLE_PRIMARY, ROLE_SECONDARY};
    use crate::test_support::{member_pod, mysql_cluster, FakeDetector, FakePodClient};

    const MEMBERS: [&str; 3] = ["my-group-0", "my-group-1", "my-group-2"];

    struct Harness {
        client: Arc<FakePodClient>,
        detector: Arc<FakeDetector>,
        reconciler: Reconciler,
    }

    impl Harness {
        fn new(roles: &[(&str, Option<&str>)], primary: &str) -> Self {
            let cluster = mysql_cluster();
            let pods: Vec<Pod> = roles
                .iter()
                .map(|(name, role)| member_pod(&cluster, name, None, *role))
                .collect();

            let client = Arc::new(FakePodClient::with_pods(pods));
            let detector = Arc::new(FakeDetector::primary(primary));
            let reconciler = Reconciler::new(
                cluster.kind,
                detector.clone(),
                LabelUpdater::new(client.clone(), cluster, DemotionPolicy::Relabel),
            );

            Self {
                client,
                detector,
                reconciler,
            }
        }

        /// Reconcile `name` against its current API state, as the controller would.
        async fn reconcile(&self, name: &str) -> Result<(), ReconcileError> {
            let pod = self.client.get(name).unwrap();
            self.reconciler.reconcile(&pod).await
        }

        async fn reconcile_all(&self) {
            for name in MEMBERS {
                self.reconcile(name).await.unwrap();
            }
        }

        fn primaries(&self) -> Vec<&'static str> {
            MEMBERS
                .into_iter()
                .filter(|name| self.client.role_of(name).as_deref() == Some(ROLE_PRIMARY))
                .collect()
        }
    }

    #[tokio::test]
    async fn test_settled_pass_leaves_exactly_one_primary() {
        let h = Harness::new(
            &[
                ("my-group-0", None),
                ("my-group-1", None),
                ("my-group-2", None),
            ],
            "my-group-1",
        );

        h.reconcile_all().await;

        assert_eq!(h.primaries(), vec!["my-group-1"]);
        assert_eq!(h.client.role_of("my-group-0").as_deref(), Some(ROLE_SECONDARY));
        assert_eq!(h.client.role_of("my-group-2").as_deref(), Some(ROLE_SECONDARY));
    }

    #[tokio::test]
    async fn test_failover_moves_the_primary_label() {
        let h = Harness::new(
            &[
                ("my-group-0", Some(ROLE_PRIMARY)),
                ("my-group-1", Some(ROLE_SECONDARY)),
                ("my-group-2", Some(ROLE_SECONDARY)),
            ],
            "my-group-0",
        );
        h.reconcile_all().await;
        assert_eq!(h.primaries(), vec!["my-group-0"]);

        h.detector.set_primary("my-group-2");
        h.reconcile_all().await;

        assert_eq!(h.primaries(), vec!["my-group-2"]);
    }

    #[tokio::test]
    async fn test_new_primary_heals_stale_label_before_old_primary_reconciles() {
        let h = Harness::new(
            &[
                ("my-group-0", Some(ROLE_PRIMARY)),
                ("my-group-1", Some(ROLE_PRIMARY)),
                ("my-group-2", Some(ROLE_SECONDARY)),
            ],
            "my-group-1",
        );

        h.reconcile("my-group-1").await.unwrap();

        assert_eq!(h.primaries(), vec!["my-group-1"]);
    }

    #[tokio::test]
    async fn test_detector_error_is_returned_unchanged() {
        let h = Harness::new(&[("my-group-0", None)], "my-group-0");
        h.detector.fail_with("demo/my-group");

        let err = h.reconcile("my-group-0").await.unwrap_err();

        assert!(matches!(
            err,
            ReconcileError::Detect(DetectError::NoPrimaryRow { ref cluster }) if cluster == "demo/my-group"
        ));
        assert!(h.client.patches().is_empty());
    }

    #[tokio::test]
    async fn test_patch_error_is_returned() {
        let h = Harness::new(&[("my-group-0", None)], "my-group-0");
        h.client.fail_patches_with(503);

        let err = h.reconcile("my-group-0").await.unwrap_err();

        assert_eq!(err.kind(), "kubernetes");
    }

    #[tokio::test]
    async fn test_secondary_is_labelled_without_touching_siblings() {
        let h = Harness::new(
            &[("my-group-0", None), ("my-group-1", Some(ROLE_PRIMARY))],
            "my-group-1",
        );

        h.reconcile("my-group-0").await.unwrap();

        assert_eq!(h.client.role_of("my-group-0").as_deref(), Some(ROLE_SECONDARY));
        assert_eq!(h.client.role_of("my-group-1").as_deref(), Some(ROLE_PRIMARY));
        assert_eq!(h.client.patches().len(), 1);
    }
}
