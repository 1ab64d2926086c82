// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `cluster.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn pod_with_role(role: Option<&str>) -> Pod {
        let labels = role.map(|r| BTreeMap::from([(ROLE_LABEL.to_string(), r.to_string())]));
        Pod {
            metadata: ObjectMeta {
                name: Some("my-group-0".into()),
                namespace: Some("demo".into()),
                labels,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_cluster_kind_parsing() {
        assert_eq!("mysql".parse::<ClusterKind>(), Ok(ClusterKind::MySql));
        assert_eq!("MySQL".parse::<ClusterKind>(), Ok(ClusterKind::MySql));
        assert_eq!("MongoDB".parse::<ClusterKind>(), Ok(ClusterKind::MongoDb));
        assert!("postgres".parse::<ClusterKind>().is_err());
    }

    #[test]
    fn test_cluster_kind_label_value() {
        assert_eq!(ClusterKind::MySql.label_value(), "MySQL");
        assert_eq!(ClusterKind::MongoDb.to_string(), "MongoDB");
    }

    #[test]
    fn test_selectors() {
        let cluster = ClusterIdentity::new(ClusterKind::MySql, "my-group");
        assert_eq!(
            cluster.member_selector(),
            "kubedb.com/kind=MySQL,kubedb.com/name=my-group"
        );
        assert_eq!(
            cluster.primary_selector(),
            "kubedb.com/kind=MySQL,kubedb.com/name=my-group,kubedb.com/role=primary"
        );
    }

    #[test]
    fn test_role_label_of_pod() {
        assert_eq!(RoleLabel::of(&pod_with_role(Some("primary"))), RoleLabel::Primary);
        assert_eq!(
            RoleLabel::of(&pod_with_role(Some("secondary"))),
            RoleLabel::Secondary
        );
        assert_eq!(RoleLabel::of(&pod_with_role(None)), RoleLabel::Unset);
        assert_eq!(RoleLabel::of(&pod_with_role(Some("standby"))), RoleLabel::Unset);
    }

    #[test]
    fn test_role_label_value() {
        assert_eq!(RoleLabel::Primary.value(), Some("primary"));
        assert_eq!(RoleLabel::Secondary.value(), Some("secondary"));
        assert_eq!(RoleLabel::Unset.value(), None);
    }
}
