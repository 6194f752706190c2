//! Pure comparison of desired and observed parameters.
//!
//! Late-init runs before the up-to-date check, so a field filled from an
//! observation compares equal to it in the same pass.

use std::collections::BTreeSet;

use cqlsync_protocol::{KeyspaceParameters, Privilege, RoleParameters};

/// Copy `observed` into an unset `desired`. Returns whether anything changed.
fn late_init_field<T: Clone>(desired: &mut Option<T>, observed: &Option<T>) -> bool {
    match (desired.as_ref(), observed) {
        (None, Some(value)) => {
            *desired = Some(value.clone());
            true
        }
        _ => false,
    }
}

/// Both sides known and equal.
fn field_matches<T: PartialEq>(desired: &Option<T>, observed: &Option<T>) -> bool {
    matches!((desired, observed), (Some(d), Some(o)) if d == o)
}

pub fn keyspace_late_init(desired: &mut KeyspaceParameters, observed: &KeyspaceParameters) -> bool {
    let class = late_init_field(&mut desired.replication_class, &observed.replication_class);
    let factor = late_init_field(&mut desired.replication_factor, &observed.replication_factor);
    let durable = late_init_field(&mut desired.durable_writes, &observed.durable_writes);
    class || factor || durable
}

pub fn keyspace_up_to_date(desired: &KeyspaceParameters, observed: &KeyspaceParameters) -> bool {
    field_matches(&desired.replication_class, &observed.replication_class)
        && field_matches(&desired.replication_factor, &observed.replication_factor)
        && field_matches(&desired.durable_writes, &observed.durable_writes)
}

pub fn role_late_init(desired: &mut RoleParameters, observed: &RoleParameters) -> bool {
    let superuser = late_init_field(&mut desired.superuser, &observed.superuser);
    let login = late_init_field(&mut desired.login, &observed.login);
    superuser || login
}

pub fn role_up_to_date(desired: &RoleParameters, observed: &RoleParameters) -> bool {
    field_matches(&desired.superuser, &observed.superuser)
        && field_matches(&desired.login, &observed.login)
}

/// Existence and freshness of a grant.
///
/// Exists iff any desired privilege was observed; up to date iff all were.
/// Extra observed privileges are not drift. An empty desired set is up to
/// date and does not exist.
pub fn grant_state(desired: &[Privilege], observed: &BTreeSet<String>) -> (bool, bool) {
    let mut exists = false;
    let mut up_to_date = true;
    for privilege in desired {
        if observed.contains(&privilege.cql_name()) {
            exists = true;
        } else {
            up_to_date = false;
        }
    }
    (exists, up_to_date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cqlsync_protocol::ReplicationStrategy;
    use proptest::prelude::*;

    fn keyspace(
        class: Option<ReplicationStrategy>,
        factor: Option<u32>,
        durable: Option<bool>,
    ) -> KeyspaceParameters {
        KeyspaceParameters {
            replication_class: class,
            replication_factor: factor,
            durable_writes: durable,
        }
    }

    fn observed(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_keyspace_late_init_fills_only_unset_fields() {
        let mut desired = keyspace(Some(ReplicationStrategy::NetworkTopology), None, None);
        let seen = keyspace(Some(ReplicationStrategy::Simple), Some(2), Some(false));

        assert!(keyspace_late_init(&mut desired, &seen));
        assert_eq!(desired.replication_class, Some(ReplicationStrategy::NetworkTopology));
        assert_eq!(desired.replication_factor, Some(2));
        assert_eq!(desired.durable_writes, Some(false));
        assert!(!keyspace_up_to_date(&desired, &seen));
    }

    #[test]
    fn test_keyspace_late_init_skips_unknown_observed_fields() {
        let mut desired = keyspace(None, None, Some(true));
        let seen = keyspace(Some(ReplicationStrategy::Simple), None, Some(true));

        assert!(keyspace_late_init(&mut desired, &seen));
        assert_eq!(desired.replication_factor, None);
        assert!(!keyspace_up_to_date(&desired, &seen));
        assert!(!keyspace_late_init(&mut desired, &seen));
    }

    #[test]
    fn test_keyspace_unknown_on_either_side_is_drift() {
        let full = keyspace(Some(ReplicationStrategy::Simple), Some(1), Some(true));
        assert!(keyspace_up_to_date(&full, &full));
        assert!(!keyspace_up_to_date(&keyspace(None, Some(1), Some(true)), &full));
        assert!(!keyspace_up_to_date(&full, &keyspace(Some(ReplicationStrategy::Simple), Some(1), None)));
    }

    #[test]
    fn test_role_diff() {
        let mut desired = RoleParameters {
            superuser: Some(true),
            login: None,
        };
        let seen = RoleParameters {
            superuser: Some(false),
            login: Some(true),
        };
        assert!(role_late_init(&mut desired, &seen));
        assert_eq!(desired.login, Some(true));
        assert!(!role_up_to_date(&desired, &seen));

        desired.superuser = Some(false);
        assert!(role_up_to_date(&desired, &seen));
    }

    #[test]
    fn test_grant_partial_observation_exists_but_is_stale() {
        let desired = [Privilege::Select, Privilege::Modify];
        assert_eq!(grant_state(&desired, &observed(&["SELECT"])), (true, false));
        assert_eq!(grant_state(&[Privilege::Select], &observed(&[])), (false, false));
    }

    #[test]
    fn test_grant_superset_is_not_drift() {
        let desired = [Privilege::Select];
        assert_eq!(
            grant_state(&desired, &observed(&["SELECT", "MODIFY", "DROP"])),
            (true, true)
        );
    }

    #[test]
    fn test_grant_matches_store_spelling() {
        let desired = [Privilege::AllPermissions];
        assert_eq!(grant_state(&desired, &observed(&["ALL PERMISSIONS"])), (true, true));
        assert_eq!(grant_state(&desired, &observed(&["ALL_PERMISSIONS"])), (false, false));
    }

    #[test]
    fn test_grant_empty_desired_set() {
        assert_eq!(grant_state(&[], &observed(&["SELECT"])), (false, true));
    }

    fn strategy() -> impl Strategy<Value = Option<ReplicationStrategy>> {
        prop_oneof![
            Just(None),
            Just(Some(ReplicationStrategy::Simple)),
            Just(Some(ReplicationStrategy::NetworkTopology)),
        ]
    }

    proptest! {
        #[test]
        fn prop_keyspace_late_init_is_monotonic(
            class in strategy(),
            factor in proptest::option::of(1u32..10),
            durable in proptest::option::of(any::<bool>()),
            first_class in strategy(),
            first_factor in proptest::option::of(1u32..10),
            first_durable in proptest::option::of(any::<bool>()),
            later_class in strategy(),
            later_factor in proptest::option::of(1u32..10),
            later_durable in proptest::option::of(any::<bool>()),
        ) {
            let mut desired = keyspace(class, factor, durable);
            keyspace_late_init(&mut desired, &keyspace(first_class, first_factor, first_durable));
            let settled = desired.clone();

            // A later observation never overwrites a populated field.
            keyspace_late_init(&mut desired, &keyspace(later_class, later_factor, later_durable));
            if settled.replication_class.is_some() {
                prop_assert_eq!(desired.replication_class, settled.replication_class);
            }
            if settled.replication_factor.is_some() {
                prop_assert_eq!(desired.replication_factor, settled.replication_factor);
            }
            if settled.durable_writes.is_some() {
                prop_assert_eq!(desired.durable_writes, settled.durable_writes);
            }

            // Explicit fields survive late-init untouched.
            if class.is_some() {
                prop_assert_eq!(desired.replication_class, class);
            }
        }

        #[test]
        fn prop_keyspace_late_init_reaches_fixed_point(
            class in strategy(),
            factor in proptest::option::of(1u32..10),
            durable in proptest::option::of(any::<bool>()),
            seen_factor in proptest::option::of(1u32..10),
            seen_durable in proptest::option::of(any::<bool>()),
        ) {
            let seen = keyspace(Some(ReplicationStrategy::Simple), seen_factor, seen_durable);
            let mut desired = keyspace(class, factor, durable);
            keyspace_late_init(&mut desired, &seen);
            prop_assert!(!keyspace_late_init(&mut desired, &seen));
        }

        #[test]
        fn prop_grant_up_to_date_implies_exists_when_nonempty(
            desired in proptest::collection::vec(proptest::sample::select(Privilege::ALL.to_vec()), 1..5),
            seen in proptest::collection::btree_set(
                proptest::sample::select(vec!["SELECT", "MODIFY", "ALTER", "DROP"]), 0..4),
        ) {
            let seen: BTreeSet<String> = seen.into_iter().map(String::from).collect();
            let (exists, up_to_date) = grant_state(&desired, &seen);
            if up_to_date {
                prop_assert!(exists);
            }
        }
    }
}
