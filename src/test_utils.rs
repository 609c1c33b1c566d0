//! Test utilities for property-based testing
//!
//! This module provides generators and helpers for proptest.

#[cfg(test)]
pub mod generators {
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    use crate::core::bom::{DependencyEdge, EcmDependency, ExternalPackage, OrbitDependency};
    use crate::core::build::BuildRecordId;
    use crate::core::milestone::Milestone;

    /// Generate a milestone name
    pub fn milestone_name() -> impl Strategy<Value = String> {
        "[A-Z][a-z]{1,10}"
    }

    /// Generate a catalog with unique ids and case-insensitively unique names
    pub fn milestone_catalog() -> impl Strategy<Value = Vec<Milestone>> {
        proptest::collection::btree_map(milestone_name(), (-50i64..50, any::<bool>()), 1..10).prop_map(
            |rows| {
                let mut seen = BTreeSet::new();
                rows.into_iter()
                    .filter(|(name, _)| seen.insert(name.to_ascii_lowercase()))
                    .enumerate()
                    .map(|(i, (name, (level, active)))| Milestone {
                        id: i as i64 + 1,
                        name,
                        level,
                        active,
                    })
                    .collect()
            },
        )
    }

    /// Generate an external package
    pub fn external_package() -> impl Strategy<Value = ExternalPackage> {
        ("[A-Z0-9]{6}", "[a-z]{3,12}", (1u32..20, 0u32..20), 1i64..500, "[0-9]{1,4}").prop_map(
            |(master_id, project_name, (major, minor), build_number, package_number)| ExternalPackage {
                master_id,
                project_name,
                version: format!("{major}.{minor}"),
                build_number,
                package_number,
            },
        )
    }

    /// Generate the dependency edges of one build
    ///
    /// Ordering keys are unique within each kind, as the store enforces,
    /// but may collide across kinds.
    pub fn dependency_edges(source: BuildRecordId) -> impl Strategy<Value = Vec<DependencyEdge>> {
        (
            proptest::collection::btree_map(0i64..40, 100i64..200, 0..8),
            proptest::collection::btree_map(0i64..40, external_package(), 0..8),
        )
            .prop_map(move |(internal, external)| {
                let mut edges: Vec<DependencyEdge> = internal
                    .into_iter()
                    .map(|(scm_order, target)| {
                        DependencyEdge::Internal(OrbitDependency {
                            build_record_id: source,
                            bom_type: "release".to_string(),
                            dependency_build_record_id: target,
                            scm_order,
                        })
                    })
                    .chain(external.into_iter().map(|(scm_order, package)| {
                        DependencyEdge::External(EcmDependency {
                            build_record_id: source,
                            bom_type: "release".to_string(),
                            package,
                            scm_order,
                        })
                    }))
                    .collect();
                // Storage order is arbitrary
                edges.reverse();
                edges
            })
    }
}

#[cfg(test)]
mod tests {
    use super::generators::*;
    use crate::config::defaults::MIN_PROPTEST_ITERATIONS;
    use proptest::prelude::*;
    use std::collections::HashSet;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(MIN_PROPTEST_ITERATIONS))]

        #[test]
        fn test_catalog_generator_names_unique(rows in milestone_catalog()) {
            prop_assert!(!rows.is_empty());
            let names: HashSet<String> = rows.iter().map(|m| m.name.to_ascii_lowercase()).collect();
            prop_assert_eq!(names.len(), rows.len());
        }

        #[test]
        fn test_edge_generator_keys_unique_per_kind(edges in dependency_edges(1)) {
            let keys: HashSet<_> = edges.iter().map(|e| e.sort_key()).collect();
            prop_assert_eq!(keys.len(), edges.len());
            prop_assert!(edges.iter().all(|e| e.source() == 1));
        }
    }
}
